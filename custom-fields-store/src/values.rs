//! Value store: validated reads and writes of per-instance field values.

use std::collections::HashMap;
use std::sync::Arc;

use custom_fields::{
    prepare_locale_payload, prepare_payload, FieldDef, FieldsError, Payload, TypedValue,
};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::db::Database;
use crate::error::Result;
use crate::types::{OwnerRef, StoredSchema, StoredValue};

/// Reads and writes values for host instances against a schema.
#[derive(Clone)]
pub struct ValueStore {
    db: Arc<Database>,
    default_locale: String,
}

fn field<'a>(schema: &'a StoredSchema, key: &str) -> Result<&'a FieldDef> {
    schema.field(key).ok_or_else(|| {
        FieldsError::UndefinedField {
            key: key.to_string(),
        }
        .into()
    })
}

impl ValueStore {
    pub fn new(db: Arc<Database>, default_locale: impl Into<String>) -> Self {
        Self {
            db,
            default_locale: default_locale.into(),
        }
    }

    /// Locale used when none is passed, and as the translation fallback.
    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Validate and store several values at once.
    ///
    /// Every entry is validated before anything is written; required fields
    /// missing from `values` fail as [`FieldsError::Required`]. Absent values
    /// of optional fields delete the stored row.
    pub fn set_values(
        &self,
        schema: &StoredSchema,
        owner: &OwnerRef,
        values: &Map<String, Value>,
    ) -> Result<()> {
        let mut writes = Vec::with_capacity(values.len());
        for (key, raw) in values {
            let def = field(schema, key)?;
            let payload = prepare_payload(def, raw)?;
            writes.push((def.key.as_str(), payload.as_ref().map(Payload::to_json)));
        }

        for def in schema.required_fields() {
            if !values.contains_key(&def.key) {
                prepare_payload(def, &Value::Null)?;
            }
        }

        self.db.write_values(schema.id, owner, &writes)?;
        debug!(
            owner_type = %owner.owner_type,
            owner_id = owner.owner_id,
            count = writes.len(),
            "stored custom field values"
        );
        Ok(())
    }

    /// Validate and store one value, leaving other fields alone.
    pub fn set_value(
        &self,
        schema: &StoredSchema,
        owner: &OwnerRef,
        key: &str,
        raw: &Value,
    ) -> Result<()> {
        let def = field(schema, key)?;
        let payload = prepare_payload(def, raw)?;
        self.write(schema, owner, key, payload)
    }

    /// Store one locale of a translatable field, keeping the other locales.
    ///
    /// For fields without translation support this is [`set_value`](Self::set_value).
    pub fn set_value_in_locale(
        &self,
        schema: &StoredSchema,
        owner: &OwnerRef,
        key: &str,
        raw: &Value,
        locale: &str,
    ) -> Result<()> {
        let def = field(schema, key)?;
        let existing = if def.type_.supports_translation() {
            self.get_payload(schema, owner, key)?
        } else {
            None
        };
        let payload = prepare_locale_payload(def, raw, locale, existing)?;
        self.write(schema, owner, key, payload)
    }

    fn write(
        &self,
        schema: &StoredSchema,
        owner: &OwnerRef,
        key: &str,
        payload: Option<Payload>,
    ) -> Result<()> {
        match payload {
            Some(payload) => {
                self.db
                    .upsert_value(schema.id, owner, key, &payload.to_json())?;
                debug!(
                    owner_type = %owner.owner_type,
                    owner_id = owner.owner_id,
                    key,
                    "stored custom field value"
                );
            }
            None => {
                self.db.delete_value(schema.id, owner, key)?;
                debug!(
                    owner_type = %owner.owner_type,
                    owner_id = owner.owner_id,
                    key,
                    "cleared custom field value"
                );
            }
        }
        Ok(())
    }

    /// All values of one owner, resolved for `locale`, in schema order.
    ///
    /// Without a schema, or with an inactive one, the result is empty. Rows
    /// for keys no longer in the schema, and rows that no longer cast to the
    /// field's type, are skipped.
    pub fn get_values(
        &self,
        schema: Option<&StoredSchema>,
        owner: &OwnerRef,
        locale: Option<&str>,
    ) -> Result<IndexMap<String, TypedValue>> {
        let Some(schema) = schema.filter(|s| s.is_active) else {
            return Ok(IndexMap::new());
        };
        let locale = locale.unwrap_or(self.default_locale.as_str());

        let mut rows: HashMap<String, StoredValue> = self
            .db
            .values(schema.id, owner)?
            .into_iter()
            .map(|row| (row.field_key.clone(), row))
            .collect();

        let mut resolved = IndexMap::new();
        for def in &schema.fields {
            let Some(row) = rows.remove(&def.key) else {
                continue;
            };
            match Payload::from_json(def.type_, &row.payload) {
                Ok(payload) => {
                    if let Some(value) = payload.resolve(locale, &self.default_locale) {
                        resolved.insert(def.key.clone(), value.clone());
                    }
                }
                Err(e) => warn!(
                    owner = %owner,
                    key = %def.key,
                    error = %e,
                    "skipping custom field value that no longer matches its type"
                ),
            }
        }

        for key in rows.keys() {
            warn!(owner = %owner, key = %key, "skipping value for undefined custom field");
        }
        Ok(resolved)
    }

    /// One value resolved for `locale`. Undefined keys read as `None`.
    pub fn get_value(
        &self,
        schema: &StoredSchema,
        owner: &OwnerRef,
        key: &str,
        locale: Option<&str>,
    ) -> Result<Option<TypedValue>> {
        let locale = locale.unwrap_or(self.default_locale.as_str());
        let payload = self.get_payload(schema, owner, key)?;
        Ok(payload.and_then(|p| p.resolve(locale, &self.default_locale).cloned()))
    }

    /// The stored payload with all translations.
    ///
    /// A row that no longer casts to the field's type reads as `None`, as in
    /// [`get_values`](Self::get_values).
    pub fn get_payload(
        &self,
        schema: &StoredSchema,
        owner: &OwnerRef,
        key: &str,
    ) -> Result<Option<Payload>> {
        let Some(def) = schema.field(key) else {
            return Ok(None);
        };
        let Some(row) = self.db.value(schema.id, owner, key)? else {
            return Ok(None);
        };
        match Payload::from_json(def.type_, &row.payload) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) => {
                warn!(
                    owner = %owner,
                    key,
                    error = %e,
                    "skipping custom field value that no longer matches its type"
                );
                Ok(None)
            }
        }
    }

    /// Delete one stored value. Required fields cannot be unset.
    pub fn unset_value(&self, schema: &StoredSchema, owner: &OwnerRef, key: &str) -> Result<bool> {
        let def = field(schema, key)?;
        if def.required {
            return Err(FieldsError::Required {
                key: def.key.clone(),
            }
            .into());
        }
        self.db.delete_value(schema.id, owner, key)
    }

    /// Delete every value of one owner. Hosts call this when the instance is
    /// deleted.
    pub fn delete_values(&self, owner: &OwnerRef) -> Result<usize> {
        let deleted = self.db.delete_values_for_owner(owner)?;
        debug!(owner = %owner, deleted, "deleted custom field values");
        Ok(deleted)
    }

    pub fn count_values(&self, owner: &OwnerRef, key: Option<&str>) -> Result<usize> {
        self.db.count_values(owner, key)
    }
}
