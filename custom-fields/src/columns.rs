//! List-view column descriptors derived from `show_in_table`.
//!
//! These describe columns; rendering them is left to the consumer.

use serde::Serialize;

use crate::field_type::FieldType;
use crate::types::{FieldDef, Schema};

/// Prefix under which custom field columns are addressed.
pub const COLUMN_PREFIX: &str = "custom_fields";

/// How a column renders its value.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Icon,
}

/// One list-view column for a custom field.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TableColumn {
    /// `custom_fields.<key>`
    pub name: String,
    pub key: String,
    pub label: String,
    pub field_type: FieldType,
    pub kind: ColumnKind,
    pub searchable: bool,
    pub sortable: bool,
}

impl TableColumn {
    fn for_field(def: &FieldDef, locale: &str, fallback: &str) -> Self {
        Self {
            name: column_name(&def.key),
            key: def.key.clone(),
            label: def.label.resolve(locale, fallback).to_string(),
            field_type: def.type_,
            kind: match def.type_ {
                FieldType::Boolean => ColumnKind::Icon,
                _ => ColumnKind::Text,
            },
            searchable: matches!(
                def.type_,
                FieldType::Text | FieldType::Textarea | FieldType::Select
            ),
            sortable: true,
        }
    }
}

pub fn column_name(key: &str) -> String {
    format!("{COLUMN_PREFIX}.{key}")
}

/// Columns for every field flagged `show_in_table`, in schema order.
/// Inactive schemas produce no columns.
pub fn table_columns(schema: &Schema, locale: &str, fallback: &str) -> Vec<TableColumn> {
    if !schema.is_active {
        return Vec::new();
    }
    schema
        .table_fields()
        .map(|def| TableColumn::for_field(def, locale, fallback))
        .collect()
}

/// Names of visible columns that support text search.
pub fn searchable_columns(schema: &Schema) -> Vec<String> {
    table_columns(schema, "", "")
        .into_iter()
        .filter(|c| c.searchable)
        .map(|c| c.name)
        .collect()
}

/// Names of visible columns that support sorting.
pub fn sortable_columns(schema: &Schema) -> Vec<String> {
    table_columns(schema, "", "")
        .into_iter()
        .filter(|c| c.sortable)
        .map(|c| c.name)
        .collect()
}
