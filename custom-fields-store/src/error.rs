//! Error types for the schema registry and value store

use std::path::PathBuf;

use custom_fields::FieldsError;
use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while persisting schemas and values
#[derive(Debug, Error)]
pub enum StoreError {
    /// Schema or value validation failed
    #[error(transparent)]
    Fields(#[from] FieldsError),

    /// No schema is stored for this owner type
    #[error("no custom field schema for '{owner_type}'")]
    SchemaNotFound { owner_type: String },

    /// No schema is stored under this id
    #[error("no custom field schema with id {id}")]
    SchemaIdNotFound { id: i64 },

    /// A stored row could not be decoded
    #[error("corrupt {table} row {id}: {message}")]
    CorruptRow {
        table: &'static str,
        id: i64,
        message: String,
    },

    /// SQLite error, including unique-constraint conflicts
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// IO error
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration loaded but holds an unusable value
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidConfig { key: String, message: String },
}

impl StoreError {
    /// Whether this is a storage-level uniqueness or foreign-key conflict.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            StoreError::Sqlite(e) => {
                e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation)
            }
            _ => false,
        }
    }

    /// The underlying field error, if this is one.
    pub fn as_fields_error(&self) -> Option<&FieldsError> {
        match self {
            StoreError::Fields(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_errors_display_transparently() {
        let err: StoreError = FieldsError::Required {
            key: "priority".into(),
        }
        .into();
        assert_eq!(err.to_string(), "custom field 'priority' is required");
        assert!(err.as_fields_error().is_some());
        assert!(!err.is_constraint_violation());
    }

    #[test]
    fn schema_not_found_names_owner() {
        let err = StoreError::SchemaNotFound {
            owner_type: "Partner".into(),
        };
        assert!(err.to_string().contains("Partner"));
    }
}
