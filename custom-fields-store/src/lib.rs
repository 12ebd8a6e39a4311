//! SQLite-backed schema registry and value store for custom fields
//!
//! This crate persists [`custom_fields::Schema`]s, one per host model type,
//! and the values host instances store against them.
//!
//! # Quick Start
//!
//! ```ignore
//! use custom_fields::{FieldDef, FieldType, Schema};
//! use custom_fields_store::{CustomFields, OwnerRef};
//! use serde_json::json;
//!
//! let fields = CustomFields::in_memory()?;
//! fields.registry().create_schema(
//!     Schema::new("Partner", "Partner Custom Fields")
//!         .with_field(FieldDef::new("industry", "Industry", FieldType::Text))?,
//! )?;
//!
//! let partner = fields.host(&OwnerRef::new("Partner", 1));
//! partner.set_custom_field_value("industry", &json!("Technology"), None)?;
//! let values = partner.custom_field_values(None)?;
//! ```
//!
//! # Hosts
//!
//! Implement [`Customizable`] on a model type to use it with
//! [`CustomFields::host`]. Deleting a host instance does not reach this
//! crate on its own; call [`HostFields::delete_custom_field_values`].
//!
//! # Configuration
//!
//! [`StoreConfig`] is loaded with Figment from defaults, an optional file and
//! `CUSTOM_FIELDS_*` environment variables.

pub mod config;
pub mod db;
pub mod error;
pub mod host;
pub mod registry;
pub mod types;
pub mod values;

pub use config::StoreConfig;
pub use db::Database;
pub use error::{Result, StoreError};
pub use host::{CustomFields, Customizable, HostFields};
pub use registry::SchemaRegistry;
pub use types::{OwnerRef, StoredSchema, StoredValue};
pub use values::ValueStore;
