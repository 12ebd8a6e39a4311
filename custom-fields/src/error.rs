//! Error types for field definitions and value casting

use thiserror::Error;

/// Result type for fields operations
pub type Result<T> = std::result::Result<T, FieldsError>;

/// Coarse classification of a [`FieldsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input or definition was rejected
    Validation,
    /// A value could not be coerced to the field's declared type
    Cast,
    /// An operation targeted a field key that does not exist
    NotFound,
}

/// A raw value that cannot be coerced to a field type.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("expected {expected}, got {found}")]
pub struct CastError {
    pub expected: &'static str,
    pub found: String,
}

impl CastError {
    pub fn new(expected: &'static str, found: impl Into<String>) -> Self {
        Self {
            expected,
            found: found.into(),
        }
    }
}

/// Errors that can occur in schema and value operations
#[derive(Debug, Error)]
pub enum FieldsError {
    /// Field definition is malformed
    #[error("invalid field definition '{key}': {message}")]
    InvalidDefinition { key: String, message: String },

    /// A field with this key already exists in the schema
    #[error("duplicate field key: {key}")]
    DuplicateFieldKey { key: String },

    /// Update targeted a key the schema does not contain
    #[error("field not found: {key}")]
    FieldNotFound { key: String },

    /// A value was submitted for a key the schema does not define
    #[error("custom field '{key}' is not defined for this model")]
    UndefinedField { key: String },

    /// Required field was empty or missing
    #[error("custom field '{key}' is required")]
    Required { key: String },

    /// Select value is not one of the declared options
    #[error("invalid option '{value}' for select field '{key}'")]
    InvalidOption { key: String, value: String },

    /// A validation rule rejected the value
    #[error("custom field '{key}' failed rule '{rule}': {message}")]
    RuleFailed {
        key: String,
        rule: String,
        message: String,
    },

    /// Value could not be cast to the field's type
    #[error("custom field '{key}' has an invalid value: {source}")]
    Cast {
        key: String,
        #[source]
        source: CastError,
    },
}

impl FieldsError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FieldsError::Cast { .. } => ErrorKind::Cast,
            FieldsError::FieldNotFound { .. } => ErrorKind::NotFound,
            FieldsError::InvalidDefinition { .. }
            | FieldsError::DuplicateFieldKey { .. }
            | FieldsError::UndefinedField { .. }
            | FieldsError::Required { .. }
            | FieldsError::InvalidOption { .. }
            | FieldsError::RuleFailed { .. } => ErrorKind::Validation,
        }
    }

    /// Field key the error refers to.
    pub fn key(&self) -> &str {
        match self {
            FieldsError::InvalidDefinition { key, .. }
            | FieldsError::DuplicateFieldKey { key }
            | FieldsError::FieldNotFound { key }
            | FieldsError::UndefinedField { key }
            | FieldsError::Required { key }
            | FieldsError::InvalidOption { key, .. }
            | FieldsError::RuleFailed { key, .. }
            | FieldsError::Cast { key, .. } => key,
        }
    }

    pub(crate) fn invalid_definition(key: &str, message: impl Into<String>) -> Self {
        FieldsError::InvalidDefinition {
            key: key.to_string(),
            message: message.into(),
        }
    }
}
