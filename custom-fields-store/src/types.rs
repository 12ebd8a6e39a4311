//! Stored forms of schemas and values.

use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use custom_fields::Schema;
use serde::Serialize;

/// Identity of one host instance: its model type and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OwnerRef {
    pub owner_type: String,
    pub owner_id: i64,
}

impl OwnerRef {
    pub fn new(owner_type: impl Into<String>, owner_id: i64) -> Self {
        Self {
            owner_type: owner_type.into(),
            owner_id,
        }
    }
}

impl std::fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.owner_type, self.owner_id)
    }
}

/// A schema row as persisted in `schemas`.
///
/// Derefs to the [`Schema`] it wraps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSchema {
    pub id: i64,
    #[serde(flatten)]
    pub schema: Schema,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deref for StoredSchema {
    type Target = Schema;

    fn deref(&self) -> &Schema {
        &self.schema
    }
}

impl DerefMut for StoredSchema {
    fn deref_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }
}

/// A row of `field_values` with its payload still in JSON form.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredValue {
    pub id: i64,
    pub schema_id: i64,
    pub owner: OwnerRef,
    pub field_key: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
