//! Validation and casting engine.
//!
//! Turns raw submitted JSON into a [`Payload`] or rejects it. The order of
//! checks is: absence and required-ness, type cast, rules, select membership.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::error::{CastError, FieldsError, Result};
use crate::field_type::FieldType;
use crate::payload::{Payload, TypedValue};
use crate::rules::Rule;
use crate::types::FieldDef;

static KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]+$").expect("key pattern compiles"));

/// Check that a field definition is well formed.
pub fn validate_definition(def: &FieldDef) -> Result<()> {
    let key = def.key.as_str();
    if key.is_empty() {
        return Err(FieldsError::invalid_definition(key, "key is required"));
    }
    if !KEY_PATTERN.is_match(key) {
        return Err(FieldsError::invalid_definition(
            key,
            "key may only contain lowercase letters, digits and underscores",
        ));
    }
    if def.label.is_empty() {
        return Err(FieldsError::invalid_definition(key, "label is required"));
    }

    if def.type_.requires_options() {
        if def.options.is_empty() {
            return Err(FieldsError::invalid_definition(
                key,
                format!("{} fields need at least one option", def.type_),
            ));
        }
        let mut seen = HashSet::new();
        for option in &def.options {
            if option.value.trim().is_empty() {
                return Err(FieldsError::invalid_definition(key, "option value is empty"));
            }
            if !seen.insert(option.value.as_str()) {
                return Err(FieldsError::invalid_definition(
                    key,
                    format!("duplicate option value '{}'", option.value),
                ));
            }
        }
    } else if !def.options.is_empty() {
        return Err(FieldsError::invalid_definition(
            key,
            format!("{} fields do not take options", def.type_),
        ));
    }

    for rule in &def.validation_rules {
        Rule::parse(rule).map_err(|message| FieldsError::invalid_definition(key, message))?;
    }
    Ok(())
}

/// All rules a value for `def` is checked against: `required` when the field
/// is required, the type's defaults, then the definition's own rules.
pub fn validation_rules_for(def: &FieldDef) -> Vec<Rule> {
    let mut rules = Vec::new();
    if def.required {
        rules.push(Rule::Required);
    }
    let declared = def
        .type_
        .spec()
        .default_rules
        .iter()
        .copied()
        .chain(def.validation_rules.iter().map(String::as_str));
    for s in declared {
        match Rule::parse(s) {
            Ok(rule) if !rules.contains(&rule) => rules.push(rule),
            Ok(_) => {}
            Err(message) => warn!(key = %def.key, %message, "ignoring unparseable rule"),
        }
    }
    rules
}

/// Null, blank strings, empty arrays and objects, and locale maps with only
/// absent entries all count as "no value".
pub fn is_absent(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.values().all(is_absent),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Cast a raw value to `field_type` without any rule checks.
pub fn cast_value(field_type: FieldType, raw: &Value) -> std::result::Result<TypedValue, CastError> {
    field_type.cast(raw)
}

/// Validate a raw value against a field definition.
pub fn validate(def: &FieldDef, raw: &Value) -> Result<()> {
    prepare_payload(def, raw).map(|_| ())
}

/// Validate and cast a raw value into the payload to store.
///
/// Returns `Ok(None)` when the value is absent and the field is optional. A
/// locale map on a translatable field becomes [`Payload::Translated`]; any
/// other value becomes [`Payload::Scalar`].
pub fn prepare_payload(def: &FieldDef, raw: &Value) -> Result<Option<Payload>> {
    if is_absent(raw) {
        return absent(def);
    }

    let rules = validation_rules_for(def);
    let payload = match raw {
        Value::Object(locales) if def.type_.supports_translation() => {
            let mut map = BTreeMap::new();
            for (locale, value) in locales {
                if is_absent(value) {
                    continue;
                }
                map.insert(locale.clone(), cast_checked(def, &rules, value)?);
            }
            Payload::Translated(map)
        }
        other => Payload::Scalar(cast_checked(def, &rules, other)?),
    };
    Ok(Some(payload))
}

/// Validate a single-locale write and merge it into `existing`.
///
/// Non-translatable fields, and locale maps, are handled as by
/// [`prepare_payload`]. An absent value removes that locale.
pub fn prepare_locale_payload(
    def: &FieldDef,
    raw: &Value,
    locale: &str,
    existing: Option<Payload>,
) -> Result<Option<Payload>> {
    if !def.type_.supports_translation() || raw.is_object() {
        return prepare_payload(def, raw);
    }

    if is_absent(raw) {
        let mut map = match existing {
            Some(Payload::Translated(map)) => map,
            _ => BTreeMap::new(),
        };
        map.remove(locale);
        if map.is_empty() {
            return absent(def);
        }
        return Ok(Some(Payload::Translated(map)));
    }

    let rules = validation_rules_for(def);
    let value = cast_checked(def, &rules, raw)?;
    Ok(Some(Payload::merge_locale(existing, locale, value)))
}

fn absent(def: &FieldDef) -> Result<Option<Payload>> {
    if def.required {
        Err(FieldsError::Required {
            key: def.key.clone(),
        })
    } else {
        Ok(None)
    }
}

fn cast_checked(def: &FieldDef, rules: &[Rule], raw: &Value) -> Result<TypedValue> {
    let value = def.type_.cast(raw).map_err(|source| FieldsError::Cast {
        key: def.key.clone(),
        source,
    })?;

    for rule in rules {
        rule.check(&value)
            .map_err(|message| FieldsError::RuleFailed {
                key: def.key.clone(),
                rule: rule.to_string(),
                message,
            })?;
    }

    if def.type_ == FieldType::Select {
        let chosen = value.display();
        if !def.has_option(&chosen) {
            return Err(FieldsError::InvalidOption {
                key: def.key.clone(),
                value: chosen,
            });
        }
    }
    Ok(value)
}
