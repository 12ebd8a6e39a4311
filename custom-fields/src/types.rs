//! Core schema types.
//!
//! All types serialize to/from JSON via serde. A [`Schema`] describes which
//! fields one host model type exposes; each [`FieldDef`] describes one field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FieldsError, Result};
use crate::field_type::FieldType;
use crate::validation::validate_definition;

/// Display text that is either a plain string or a locale map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LocalizedText {
    Plain(String),
    Translated(BTreeMap<String, String>),
}

impl LocalizedText {
    /// Resolve for `locale`, then `fallback`, then the first locale present.
    pub fn resolve(&self, locale: &str, fallback: &str) -> &str {
        match self {
            LocalizedText::Plain(s) => s,
            LocalizedText::Translated(map) => map
                .get(locale)
                .or_else(|| map.get(fallback))
                .or_else(|| map.values().next())
                .map(String::as_str)
                .unwrap_or(""),
        }
    }

    /// Text for exactly this locale, without fallback.
    pub fn get(&self, locale: &str) -> Option<&str> {
        match self {
            LocalizedText::Plain(s) => Some(s),
            LocalizedText::Translated(map) => map.get(locale).map(String::as_str),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            LocalizedText::Plain(s) => s.trim().is_empty(),
            LocalizedText::Translated(map) => map.values().all(|s| s.trim().is_empty()),
        }
    }
}

impl From<&str> for LocalizedText {
    fn from(s: &str) -> Self {
        LocalizedText::Plain(s.to_string())
    }
}

impl From<String> for LocalizedText {
    fn from(s: String) -> Self {
        LocalizedText::Plain(s)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for LocalizedText {
    fn from(pairs: [(&str, &str); N]) -> Self {
        LocalizedText::Translated(
            pairs
                .into_iter()
                .map(|(locale, text)| (locale.to_string(), text.to_string()))
                .collect(),
        )
    }
}

/// A single option in a select field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectOption {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<LocalizedText>,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<LocalizedText>) -> Self {
        Self {
            value: value.into(),
            label: Some(label.into()),
        }
    }

    /// The option label, or its value when no label was given.
    pub fn display_label<'a>(&'a self, locale: &str, fallback: &str) -> &'a str {
        self.label
            .as_ref()
            .map(|l| l.resolve(locale, fallback))
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.value)
    }
}

/// A field definition — the metadata of one custom field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDef {
    pub key: String,
    pub label: LocalizedText,
    #[serde(rename = "type")]
    pub type_: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub show_in_table: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<LocalizedText>,
}

impl FieldDef {
    /// A non-required field with no options, rules or help text.
    pub fn new(key: impl Into<String>, label: impl Into<LocalizedText>, type_: FieldType) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            type_,
            required: false,
            show_in_table: false,
            options: Vec::new(),
            validation_rules: Vec::new(),
            help_text: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn show_in_table(mut self) -> Self {
        self.show_in_table = true;
        self
    }

    pub fn option(mut self, option: SelectOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn rule(mut self, rule: impl Into<String>) -> Self {
        self.validation_rules.push(rule.into());
        self
    }

    pub fn help_text(mut self, text: impl Into<LocalizedText>) -> Self {
        self.help_text = Some(text.into());
        self
    }

    /// Parse an untyped definition, e.g. one submitted through an admin form.
    pub fn from_value(value: &serde_json::Value) -> Result<FieldDef> {
        serde_json::from_value(value.clone()).map_err(|e| {
            let key = value
                .get("key")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            FieldsError::invalid_definition(key, e.to_string())
        })
    }

    /// Whether `value` is one of this field's option values.
    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value)
    }
}

fn default_true() -> bool {
    true
}

/// The set of custom fields for one host model type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schema {
    pub owner_type: String,
    pub name: LocalizedText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<LocalizedText>,
    #[serde(default, rename = "field_definitions")]
    pub fields: Vec<FieldDef>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Schema {
    /// An empty, active schema.
    pub fn new(owner_type: impl Into<String>, name: impl Into<LocalizedText>) -> Self {
        Self {
            owner_type: owner_type.into(),
            name: name.into(),
            description: None,
            fields: Vec::new(),
            is_active: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<LocalizedText>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a field while building, validating it like [`Schema::add_field`].
    pub fn with_field(mut self, def: FieldDef) -> Result<Self> {
        self.add_field(def)?;
        Ok(self)
    }

    /// Get a field definition by key.
    pub fn field(&self, key: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.key == key)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.key == key)
    }

    /// Field keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }

    /// Append a field definition.
    pub fn add_field(&mut self, def: FieldDef) -> Result<()> {
        validate_definition(&def)?;
        if self.position(&def.key).is_some() {
            return Err(FieldsError::DuplicateFieldKey { key: def.key });
        }
        self.fields.push(def);
        Ok(())
    }

    /// Replace the definition stored under `key`, keeping its position.
    ///
    /// Keys are immutable: `def.key` must equal `key`.
    pub fn update_field(&mut self, key: &str, def: FieldDef) -> Result<()> {
        let idx = self
            .position(key)
            .ok_or_else(|| FieldsError::FieldNotFound {
                key: key.to_string(),
            })?;
        if def.key != key {
            return Err(FieldsError::invalid_definition(
                key,
                format!("field key cannot be changed to '{}'", def.key),
            ));
        }
        validate_definition(&def)?;
        self.fields[idx] = def;
        Ok(())
    }

    /// Remove the definition stored under `key`. Absent keys are a no-op;
    /// returns whether a field was removed.
    pub fn remove_field(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(idx) => {
                self.fields.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Fields flagged for list views, in declaration order.
    pub fn table_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.show_in_table)
    }

    /// Fields that must carry a value.
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.required)
    }
}
