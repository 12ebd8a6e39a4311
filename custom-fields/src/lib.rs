//! Field definition schemas and value casting for custom fields
//!
//! `custom-fields` is a schema-only crate. It describes which extra fields a
//! host model type exposes and turns raw submitted values into typed payloads.
//! It performs no I/O; persistence lives in `custom-fields-store`.
//!
//! # Architecture
//!
//! - **Closed type taxonomy**: [`FieldType`] maps each variant to a static [`TypeSpec`]
//! - **Ordered schemas**: [`Schema`] keeps its field definitions in declaration order
//! - **Tagged payloads**: [`Payload`] is either a scalar or a locale map, never both
//! - **Explicit locale**: every read takes the locale it resolves against

pub mod columns;
pub mod error;
pub mod field_type;
pub mod payload;
pub mod rules;
pub mod types;
pub mod validation;

pub use columns::{searchable_columns, sortable_columns, table_columns, ColumnKind, TableColumn};
pub use error::{CastError, ErrorKind, FieldsError, Result};
pub use field_type::{FieldType, TypeSpec};
pub use payload::{Payload, TypedValue};
pub use rules::{Pattern, Rule};
pub use types::{FieldDef, LocalizedText, Schema, SelectOption};
pub use validation::{
    cast_value, is_absent, prepare_locale_payload, prepare_payload, validate, validate_definition,
    validation_rules_for,
};
