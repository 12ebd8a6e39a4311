//! Host integration: the entry point and the per-instance facade.

use std::collections::BTreeMap;
use std::sync::Arc;

use custom_fields::{table_columns, validate, FieldsError, Payload, TableColumn, TypedValue};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::StoreConfig;
use crate::db::Database;
use crate::error::{Result, StoreError};
use crate::registry::SchemaRegistry;
use crate::types::{OwnerRef, StoredSchema};
use crate::values::ValueStore;

/// A host model type whose instances carry custom fields.
///
/// Implement this on your own model types to get a [`HostFields`] facade
/// from [`CustomFields::host`].
pub trait Customizable {
    /// Model type name, matched against [`Schema::owner_type`](custom_fields::Schema::owner_type).
    fn owner_type(&self) -> &str;

    /// Primary key of this instance.
    fn owner_id(&self) -> i64;

    fn owner_ref(&self) -> OwnerRef {
        OwnerRef::new(self.owner_type(), self.owner_id())
    }
}

impl Customizable for OwnerRef {
    fn owner_type(&self) -> &str {
        &self.owner_type
    }

    fn owner_id(&self) -> i64 {
        self.owner_id
    }
}

/// Schema registry and value store sharing one database.
pub struct CustomFields {
    registry: SchemaRegistry,
    values: ValueStore,
    config: StoreConfig,
}

impl CustomFields {
    /// Open the database named by `config`, or an in-memory one when it
    /// names none.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let db = match &config.database_path {
            Some(path) => Database::open(path)?,
            None => Database::open_in_memory()?,
        };
        let db = Arc::new(db);
        Ok(Self {
            registry: SchemaRegistry::new(db.clone()),
            values: ValueStore::new(db, config.default_locale.clone()),
            config,
        })
    }

    /// In-memory store with default configuration.
    pub fn in_memory() -> Result<Self> {
        Self::open(StoreConfig::default())
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn values(&self) -> &ValueStore {
        &self.values
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Custom field operations bound to one host instance.
    pub fn host<H: Customizable + ?Sized>(&self, host: &H) -> HostFields<'_> {
        HostFields {
            fields: self,
            owner: host.owner_ref(),
        }
    }
}

/// Custom field operations for one host instance.
///
/// Every call looks up the active schema for the host's type afresh, so
/// schema edits are visible immediately.
pub struct HostFields<'a> {
    fields: &'a CustomFields,
    owner: OwnerRef,
}

impl HostFields<'_> {
    pub fn owner(&self) -> &OwnerRef {
        &self.owner
    }

    /// The active schema for this host's type.
    pub fn custom_field_definition(&self) -> Result<Option<StoredSchema>> {
        self.fields.registry.active_schema(&self.owner.owner_type)
    }

    fn require_schema(&self) -> Result<StoredSchema> {
        self.custom_field_definition()?
            .ok_or_else(|| StoreError::SchemaNotFound {
                owner_type: self.owner.owner_type.clone(),
            })
    }

    /// All values resolved for `locale`, in schema order. Empty when the
    /// host type has no active schema.
    pub fn custom_field_values(&self, locale: Option<&str>) -> Result<IndexMap<String, TypedValue>> {
        let schema = self.custom_field_definition()?;
        self.fields
            .values
            .get_values(schema.as_ref(), &self.owner, locale)
    }

    pub fn custom_field_value(&self, key: &str, locale: Option<&str>) -> Result<Option<TypedValue>> {
        match self.custom_field_definition()? {
            Some(schema) => self
                .fields
                .values
                .get_value(&schema, &self.owner, key, locale),
            None => Ok(None),
        }
    }

    /// The stored payload of one field with all its translations.
    pub fn custom_field_payload(&self, key: &str) -> Result<Option<Payload>> {
        match self.custom_field_definition()? {
            Some(schema) => self.fields.values.get_payload(&schema, &self.owner, key),
            None => Ok(None),
        }
    }

    /// Validate and store several values; nothing is written if any fails.
    pub fn set_custom_field_values(&self, values: &Map<String, Value>) -> Result<()> {
        let schema = self.require_schema()?;
        self.fields.values.set_values(&schema, &self.owner, values)
    }

    /// Store one value. With a locale, a translatable field keeps its other
    /// translations.
    pub fn set_custom_field_value(&self, key: &str, value: &Value, locale: Option<&str>) -> Result<()> {
        let schema = self.require_schema()?;
        match locale {
            Some(locale) => self
                .fields
                .values
                .set_value_in_locale(&schema, &self.owner, key, value, locale),
            None => self.fields.values.set_value(&schema, &self.owner, key, value),
        }
    }

    /// Check `values` without storing them.
    ///
    /// Returns error messages keyed by field; an empty map means the values
    /// would be accepted by [`set_custom_field_values`](Self::set_custom_field_values).
    pub fn validate_custom_field_values(
        &self,
        values: &Map<String, Value>,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let schema = self.custom_field_definition()?;
        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (key, raw) in values {
            let outcome = match schema.as_ref().and_then(|s| s.field(key)) {
                Some(def) => validate(def, raw),
                None => Err(FieldsError::UndefinedField { key: key.clone() }),
            };
            if let Err(e) = outcome {
                errors.entry(key.clone()).or_default().push(e.to_string());
            }
        }

        if let Some(schema) = &schema {
            for def in schema.required_fields() {
                if !values.contains_key(&def.key) {
                    let message = FieldsError::Required {
                        key: def.key.clone(),
                    }
                    .to_string();
                    errors.entry(def.key.clone()).or_default().push(message);
                }
            }
        }

        debug!(owner = %self.owner, failed = errors.len(), "validated custom field values");
        Ok(errors)
    }

    /// Delete all stored values, e.g. when the host instance is deleted.
    pub fn delete_custom_field_values(&self) -> Result<usize> {
        self.fields.values.delete_values(&self.owner)
    }

    /// List-view columns for fields flagged `show_in_table`.
    pub fn table_columns(&self, locale: Option<&str>) -> Result<Vec<TableColumn>> {
        let Some(schema) = self.custom_field_definition()? else {
            return Ok(Vec::new());
        };
        let fallback = self.fields.config.default_locale.as_str();
        Ok(table_columns(&schema, locale.unwrap_or(fallback), fallback))
    }
}
