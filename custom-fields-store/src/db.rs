//! SQLite persistence for schemas and field values
//!
//! # Schema
//!
//! - `schemas`: one row per owner type, field definitions as a JSON array
//! - `field_values`: one row per (schema, owner type, owner id, field key),
//!   payload as JSON
//!
//! Uniqueness of schemas per owner type and of values per composite key is
//! enforced by the database. Value writes go through `ON CONFLICT DO UPDATE`.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use custom_fields::{LocalizedText, Schema};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::types::{OwnerRef, StoredSchema, StoredValue};

const SCHEMA_COLUMNS: &str =
    "id, owner_type, field_definitions, name, description, is_active, created_at, updated_at";

const VALUE_COLUMNS: &str =
    "id, schema_id, owner_type, owner_id, field_key, payload, created_at, updated_at";

/// SQLite database holding schemas and values.
///
/// The connection sits behind a `Mutex` so the database is `Send + Sync`.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Database {
    /// Open or create a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        debug!(path = %path.as_ref().display(), "opened custom fields database");
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // --- Schemas ---

    /// Insert a new schema. A second schema for the same owner type fails
    /// with a constraint violation.
    pub fn insert_schema(&self, schema: &Schema) -> Result<StoredSchema> {
        let now = Utc::now();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO schemas (owner_type, field_definitions, name, description, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                schema.owner_type,
                serde_json::to_string(&schema.fields)?,
                serde_json::to_string(&schema.name)?,
                encode_optional(schema.description.as_ref())?,
                schema.is_active,
                now,
            ],
        )?;
        Ok(StoredSchema {
            id: conn.last_insert_rowid(),
            schema: schema.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// The schema for an owner type, active or not.
    pub fn schema_by_owner(&self, owner_type: &str) -> Result<Option<StoredSchema>> {
        load_schema_by_owner(&self.conn(), owner_type)
    }

    /// The schema for an owner type, only if it is active.
    pub fn active_schema(&self, owner_type: &str) -> Result<Option<StoredSchema>> {
        let sql = format!(
            "SELECT {SCHEMA_COLUMNS} FROM schemas WHERE owner_type = ?1 AND is_active = 1"
        );
        let row = self
            .conn()
            .query_row(&sql, [owner_type], SchemaRow::from_row)
            .optional()?;
        row.map(SchemaRow::decode).transpose()
    }

    pub fn schema_by_id(&self, id: i64) -> Result<Option<StoredSchema>> {
        let sql = format!("SELECT {SCHEMA_COLUMNS} FROM schemas WHERE id = ?1");
        let row = self
            .conn()
            .query_row(&sql, [id], SchemaRow::from_row)
            .optional()?;
        row.map(SchemaRow::decode).transpose()
    }

    /// All schemas ordered by owner type.
    pub fn list_schemas(&self) -> Result<Vec<StoredSchema>> {
        let conn = self.conn();
        let sql = format!("SELECT {SCHEMA_COLUMNS} FROM schemas ORDER BY owner_type");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], SchemaRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(SchemaRow::decode).collect()
    }

    /// Read, modify and write back one schema inside a transaction.
    ///
    /// `f` returns whether it changed the schema. A changed schema is
    /// rewritten in a single `UPDATE`; an unchanged one, or a failed `f`,
    /// writes nothing.
    pub fn modify_schema<F>(&self, owner_type: &str, f: F) -> Result<StoredSchema>
    where
        F: FnOnce(&mut Schema) -> std::result::Result<bool, StoreError>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut stored =
            load_schema_by_owner(&tx, owner_type)?.ok_or_else(|| StoreError::SchemaNotFound {
                owner_type: owner_type.to_string(),
            })?;

        if !f(&mut stored.schema)? {
            return Ok(stored);
        }
        stored.updated_at = Utc::now();

        tx.execute(
            "UPDATE schemas
             SET field_definitions = ?2, name = ?3, description = ?4, is_active = ?5, updated_at = ?6
             WHERE id = ?1",
            params![
                stored.id,
                serde_json::to_string(&stored.schema.fields)?,
                serde_json::to_string(&stored.schema.name)?,
                encode_optional(stored.schema.description.as_ref())?,
                stored.schema.is_active,
                stored.updated_at,
            ],
        )?;
        tx.commit()?;
        Ok(stored)
    }

    /// Delete a schema; its values go with it through the foreign key.
    pub fn delete_schema(&self, owner_type: &str) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM schemas WHERE owner_type = ?1", [owner_type])?;
        Ok(deleted > 0)
    }

    // --- Values ---

    /// Insert or update the value row for one field of one owner.
    pub fn upsert_value(
        &self,
        schema_id: i64,
        owner: &OwnerRef,
        field_key: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        upsert_value_in(&self.conn(), schema_id, owner, field_key, payload)
    }

    /// Apply several value writes in one transaction. `None` deletes the row.
    pub fn write_values(
        &self,
        schema_id: i64,
        owner: &OwnerRef,
        writes: &[(&str, Option<serde_json::Value>)],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for (field_key, payload) in writes {
            match payload {
                Some(payload) => upsert_value_in(&tx, schema_id, owner, field_key, payload)?,
                None => {
                    delete_value_in(&tx, schema_id, owner, field_key)?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn value(
        &self,
        schema_id: i64,
        owner: &OwnerRef,
        field_key: &str,
    ) -> Result<Option<StoredValue>> {
        let sql = format!(
            "SELECT {VALUE_COLUMNS} FROM field_values
             WHERE schema_id = ?1 AND owner_type = ?2 AND owner_id = ?3 AND field_key = ?4"
        );
        let row = self
            .conn()
            .query_row(
                &sql,
                params![schema_id, owner.owner_type, owner.owner_id, field_key],
                ValueRow::from_row,
            )
            .optional()?;
        row.map(ValueRow::decode).transpose()
    }

    /// All value rows of one owner under one schema, oldest first.
    pub fn values(&self, schema_id: i64, owner: &OwnerRef) -> Result<Vec<StoredValue>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {VALUE_COLUMNS} FROM field_values
             WHERE schema_id = ?1 AND owner_type = ?2 AND owner_id = ?3
             ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![schema_id, owner.owner_type, owner.owner_id],
                ValueRow::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(ValueRow::decode).collect()
    }

    pub fn delete_value(&self, schema_id: i64, owner: &OwnerRef, field_key: &str) -> Result<bool> {
        delete_value_in(&self.conn(), schema_id, owner, field_key)
    }

    /// Delete every value row of one owner, across schemas.
    pub fn delete_values_for_owner(&self, owner: &OwnerRef) -> Result<usize> {
        let deleted = self.conn().execute(
            "DELETE FROM field_values WHERE owner_type = ?1 AND owner_id = ?2",
            params![owner.owner_type, owner.owner_id],
        )?;
        Ok(deleted)
    }

    /// Count value rows of one owner, optionally for a single key.
    pub fn count_values(&self, owner: &OwnerRef, field_key: Option<&str>) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = match field_key {
            Some(key) => conn.query_row(
                "SELECT COUNT(*) FROM field_values
                 WHERE owner_type = ?1 AND owner_id = ?2 AND field_key = ?3",
                params![owner.owner_type, owner.owner_id, key],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                "SELECT COUNT(*) FROM field_values WHERE owner_type = ?1 AND owner_id = ?2",
                params![owner.owner_type, owner.owner_id],
                |row| row.get(0),
            )?,
        };
        let count = usize::try_from(count)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, count))?;
        Ok(count)
    }
}

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schemas (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_type TEXT NOT NULL UNIQUE,
            field_definitions TEXT NOT NULL DEFAULT '[]',
            name TEXT NOT NULL,
            description TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_schemas_owner_active ON schemas(owner_type, is_active);

        CREATE TABLE IF NOT EXISTS field_values (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            schema_id INTEGER NOT NULL REFERENCES schemas(id) ON DELETE CASCADE,
            owner_type TEXT NOT NULL,
            owner_id INTEGER NOT NULL,
            field_key TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (schema_id, owner_type, owner_id, field_key)
        );

        CREATE INDEX IF NOT EXISTS idx_values_schema ON field_values(schema_id);
        CREATE INDEX IF NOT EXISTS idx_values_owner ON field_values(owner_type, owner_id);
        CREATE INDEX IF NOT EXISTS idx_values_field_key ON field_values(field_key);
        "#,
    )?;
    Ok(())
}

fn encode_optional(text: Option<&LocalizedText>) -> Result<Option<String>> {
    Ok(text.map(serde_json::to_string).transpose()?)
}

fn upsert_value_in(
    conn: &Connection,
    schema_id: i64,
    owner: &OwnerRef,
    field_key: &str,
    payload: &serde_json::Value,
) -> Result<()> {
    conn.execute(
        "INSERT INTO field_values (schema_id, owner_type, owner_id, field_key, payload, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT (schema_id, owner_type, owner_id, field_key)
         DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
        params![
            schema_id,
            owner.owner_type,
            owner.owner_id,
            field_key,
            serde_json::to_string(payload)?,
            Utc::now(),
        ],
    )?;
    Ok(())
}

fn delete_value_in(
    conn: &Connection,
    schema_id: i64,
    owner: &OwnerRef,
    field_key: &str,
) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM field_values
         WHERE schema_id = ?1 AND owner_type = ?2 AND owner_id = ?3 AND field_key = ?4",
        params![schema_id, owner.owner_type, owner.owner_id, field_key],
    )?;
    Ok(deleted > 0)
}

fn load_schema_by_owner(conn: &Connection, owner_type: &str) -> Result<Option<StoredSchema>> {
    let sql = format!("SELECT {SCHEMA_COLUMNS} FROM schemas WHERE owner_type = ?1");
    let row = conn
        .query_row(&sql, [owner_type], SchemaRow::from_row)
        .optional()?;
    row.map(SchemaRow::decode).transpose()
}

/// Raw `schemas` row before JSON decoding.
struct SchemaRow {
    id: i64,
    owner_type: String,
    field_definitions: String,
    name: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SchemaRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_type: row.get(1)?,
            field_definitions: row.get(2)?,
            name: row.get(3)?,
            description: row.get(4)?,
            is_active: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn decode(self) -> Result<StoredSchema> {
        let id = self.id;
        let corrupt = |e: serde_json::Error| StoreError::CorruptRow {
            table: "schemas",
            id,
            message: e.to_string(),
        };
        let description = self
            .description
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(corrupt)?;
        Ok(StoredSchema {
            id,
            schema: Schema {
                owner_type: self.owner_type,
                name: serde_json::from_str(&self.name).map_err(corrupt)?,
                description,
                fields: serde_json::from_str(&self.field_definitions).map_err(corrupt)?,
                is_active: self.is_active,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Raw `field_values` row before JSON decoding.
struct ValueRow {
    id: i64,
    schema_id: i64,
    owner_type: String,
    owner_id: i64,
    field_key: String,
    payload: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ValueRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            schema_id: row.get(1)?,
            owner_type: row.get(2)?,
            owner_id: row.get(3)?,
            field_key: row.get(4)?,
            payload: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn decode(self) -> Result<StoredValue> {
        let payload = serde_json::from_str(&self.payload).map_err(|e| StoreError::CorruptRow {
            table: "field_values",
            id: self.id,
            message: e.to_string(),
        })?;
        Ok(StoredValue {
            id: self.id,
            schema_id: self.schema_id,
            owner: OwnerRef::new(self.owner_type, self.owner_id),
            field_key: self.field_key,
            payload,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custom_fields::{FieldDef, FieldType};
    use serde_json::json;
    use tempfile::TempDir;

    fn partner_schema() -> Schema {
        Schema::new("Partner", [("en", "Partner Custom Fields")])
            .with_field(FieldDef::new("industry", "Industry", FieldType::Text))
            .unwrap()
    }

    #[test]
    fn insert_and_load_schema() {
        let db = Database::open_in_memory().unwrap();
        let stored = db.insert_schema(&partner_schema()).unwrap();
        let loaded = db.schema_by_owner("Partner").unwrap().unwrap();
        assert_eq!(loaded.id, stored.id);
        assert_eq!(loaded.schema, partner_schema());
        assert_eq!(db.schema_by_id(stored.id).unwrap().unwrap().owner_type, "Partner");
    }

    #[test]
    fn duplicate_owner_type_is_constraint_violation() {
        let db = Database::open_in_memory().unwrap();
        db.insert_schema(&partner_schema()).unwrap();
        let err = db.insert_schema(&partner_schema()).unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn inactive_schema_hidden_from_active_lookup() {
        let db = Database::open_in_memory().unwrap();
        let mut schema = partner_schema();
        schema.is_active = false;
        db.insert_schema(&schema).unwrap();
        assert!(db.active_schema("Partner").unwrap().is_none());
        assert!(db.schema_by_owner("Partner").unwrap().is_some());
    }

    #[test]
    fn failed_modification_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        db.insert_schema(&partner_schema()).unwrap();
        let err = db
            .modify_schema("Partner", |schema| {
                schema.fields.clear();
                Err(StoreError::SchemaNotFound {
                    owner_type: "abort".into(),
                })
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::SchemaNotFound { .. }));
        assert_eq!(db.schema_by_owner("Partner").unwrap().unwrap().fields.len(), 1);
    }

    #[test]
    fn upsert_keeps_one_row() {
        let db = Database::open_in_memory().unwrap();
        let schema = db.insert_schema(&partner_schema()).unwrap();
        let owner = OwnerRef::new("Partner", 1);

        db.upsert_value(schema.id, &owner, "industry", &json!({"value": "Technology"}))
            .unwrap();
        db.upsert_value(schema.id, &owner, "industry", &json!({"value": "Finance"}))
            .unwrap();

        assert_eq!(db.count_values(&owner, Some("industry")).unwrap(), 1);
        let row = db.value(schema.id, &owner, "industry").unwrap().unwrap();
        assert_eq!(row.payload, json!({"value": "Finance"}));
    }

    #[test]
    fn plain_insert_of_duplicate_value_violates_unique_index() {
        let db = Database::open_in_memory().unwrap();
        let schema = db.insert_schema(&partner_schema()).unwrap();
        let insert = |conn: &Connection| {
            conn.execute(
                "INSERT INTO field_values (schema_id, owner_type, owner_id, field_key, payload, created_at, updated_at)
                 VALUES (?1, 'Partner', 1, 'industry', '{}', ?2, ?2)",
                params![schema.id, Utc::now()],
            )
        };
        insert(&db.conn()).unwrap();
        let err: StoreError = insert(&db.conn()).unwrap_err().into();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn deleting_schema_cascades_to_values() {
        let db = Database::open_in_memory().unwrap();
        let schema = db.insert_schema(&partner_schema()).unwrap();
        let owner = OwnerRef::new("Partner", 7);
        db.upsert_value(schema.id, &owner, "industry", &json!({"value": "Tech"}))
            .unwrap();

        assert!(db.delete_schema("Partner").unwrap());
        assert_eq!(db.count_values(&owner, None).unwrap(), 0);
    }

    #[test]
    fn delete_values_for_owner_leaves_other_owners() {
        let db = Database::open_in_memory().unwrap();
        let schema = db.insert_schema(&partner_schema()).unwrap();
        let first = OwnerRef::new("Partner", 1);
        let second = OwnerRef::new("Partner", 2);
        for owner in [&first, &second] {
            db.upsert_value(schema.id, owner, "industry", &json!({"value": "Tech"}))
                .unwrap();
        }

        assert_eq!(db.delete_values_for_owner(&first).unwrap(), 1);
        assert_eq!(db.count_values(&first, None).unwrap(), 0);
        assert_eq!(db.values(schema.id, &second).unwrap().len(), 1);
    }

    #[test]
    fn file_database_persists_across_opens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom-fields.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_schema(&partner_schema()).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_schemas().unwrap().len(), 1);
    }
}
