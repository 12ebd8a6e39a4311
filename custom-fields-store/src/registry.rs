//! Schema registry: one schema per owner type, persisted in `schemas`.

use std::path::Path;
use std::sync::Arc;

use custom_fields::{FieldDef, FieldsError, LocalizedText, Schema};
use serde::Deserialize;
use tracing::{debug, info};

use crate::db::Database;
use crate::error::{Result, StoreError};
use crate::types::StoredSchema;

/// Contents of a seed file: a single schema or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeedFile {
    Many(Vec<Schema>),
    One(Schema),
}

impl SeedFile {
    fn into_schemas(self) -> Vec<Schema> {
        match self {
            SeedFile::Many(schemas) => schemas,
            SeedFile::One(schema) => vec![schema],
        }
    }
}

/// Create, read and mutate schemas.
#[derive(Clone)]
pub struct SchemaRegistry {
    db: Arc<Database>,
}

impl SchemaRegistry {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Persist a new schema after validating every field definition.
    ///
    /// A schema already stored for the same owner type is a constraint
    /// violation, see [`StoreError::is_constraint_violation`].
    pub fn create_schema(&self, schema: Schema) -> Result<StoredSchema> {
        check_schema(&schema)?;
        let stored = self.db.insert_schema(&schema)?;
        info!(
            owner_type = %stored.owner_type,
            id = stored.id,
            fields = stored.fields.len(),
            "created custom field schema"
        );
        Ok(stored)
    }

    /// The active schema for an owner type.
    pub fn active_schema(&self, owner_type: &str) -> Result<Option<StoredSchema>> {
        self.db.active_schema(owner_type)
    }

    /// The schema for an owner type, active or not.
    pub fn schema(&self, owner_type: &str) -> Result<Option<StoredSchema>> {
        self.db.schema_by_owner(owner_type)
    }

    pub fn schema_by_id(&self, id: i64) -> Result<StoredSchema> {
        self.db
            .schema_by_id(id)?
            .ok_or(StoreError::SchemaIdNotFound { id })
    }

    pub fn list_schemas(&self) -> Result<Vec<StoredSchema>> {
        self.db.list_schemas()
    }

    /// Append a field definition.
    pub fn add_field(&self, owner_type: &str, def: FieldDef) -> Result<StoredSchema> {
        let key = def.key.clone();
        let stored = self
            .db
            .modify_schema(owner_type, |schema| {
                schema.add_field(def)?;
                Ok(true)
            })?;
        debug!(owner_type, key = %key, "added custom field");
        Ok(stored)
    }

    /// Replace the definition stored under `key`, keeping its position.
    pub fn update_field(&self, owner_type: &str, key: &str, def: FieldDef) -> Result<StoredSchema> {
        let stored = self
            .db
            .modify_schema(owner_type, |schema| {
                schema.update_field(key, def)?;
                Ok(true)
            })?;
        debug!(owner_type, key, "updated custom field");
        Ok(stored)
    }

    /// Remove a field definition. Unknown keys leave the schema unchanged.
    ///
    /// Values already stored for the key stay in `field_values` and are
    /// skipped on read.
    pub fn remove_field(&self, owner_type: &str, key: &str) -> Result<StoredSchema> {
        let stored = self.db.modify_schema(owner_type, |schema| {
            let removed = schema.remove_field(key);
            if !removed {
                debug!(owner_type, key, "no custom field to remove");
            }
            Ok(removed)
        })?;
        Ok(stored)
    }

    /// Activate or deactivate a schema. Inactive schemas are invisible to
    /// hosts.
    pub fn set_active(&self, owner_type: &str, active: bool) -> Result<StoredSchema> {
        let stored = self.db.modify_schema(owner_type, |schema| {
            schema.is_active = active;
            Ok(true)
        })?;
        info!(owner_type, active, "changed custom field schema state");
        Ok(stored)
    }

    /// Rename a schema and replace its description.
    pub fn update_details(
        &self,
        owner_type: &str,
        name: LocalizedText,
        description: Option<LocalizedText>,
    ) -> Result<StoredSchema> {
        if name.is_empty() {
            return Err(FieldsError::InvalidDefinition {
                key: owner_type.to_string(),
                message: "schema name must not be empty".to_string(),
            }
            .into());
        }
        self.db.modify_schema(owner_type, |schema| {
            schema.name = name;
            schema.description = description;
            Ok(true)
        })
    }

    /// Delete a schema together with all values stored under it.
    pub fn delete_schema(&self, owner_type: &str) -> Result<bool> {
        let deleted = self.db.delete_schema(owner_type)?;
        if deleted {
            info!(owner_type, "deleted custom field schema");
        }
        Ok(deleted)
    }

    /// Create the given schemas for owner types that have none yet.
    ///
    /// Existing schemas are left untouched, so customizations survive a
    /// re-seed. Returns the schemas that were created.
    pub fn seed(&self, defaults: impl IntoIterator<Item = Schema>) -> Result<Vec<StoredSchema>> {
        let mut created = Vec::new();
        for schema in defaults {
            if self.db.schema_by_owner(&schema.owner_type)?.is_some() {
                debug!(owner_type = %schema.owner_type, "schema exists, not seeding");
                continue;
            }
            created.push(self.create_schema(schema)?);
        }
        info!(created = created.len(), "seeded custom field schemas");
        Ok(created)
    }

    /// [`seed`](Self::seed) from a YAML or JSON file holding one schema or a
    /// list of schemas.
    pub fn seed_from_file(&self, path: impl AsRef<Path>) -> Result<Vec<StoredSchema>> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let seed: SeedFile = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            _ => serde_yaml_ng::from_str(&content)?,
        };
        debug!(path = %path.display(), "loaded custom field seed file");
        self.seed(seed.into_schemas())
    }
}

/// Validate a whole schema the way incremental edits are validated.
fn check_schema(schema: &Schema) -> Result<()> {
    if schema.owner_type.trim().is_empty() {
        return Err(FieldsError::InvalidDefinition {
            key: "owner_type".to_string(),
            message: "owner type must not be empty".to_string(),
        }
        .into());
    }
    let mut rebuilt = Schema::new(schema.owner_type.clone(), schema.name.clone());
    for def in &schema.fields {
        rebuilt.add_field(def.clone())?;
    }
    Ok(())
}
