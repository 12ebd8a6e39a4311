//! Typed values and the stored payload shape.
//!
//! A payload persists as `{"value": v}` for plain fields or
//! `{"translatable": true, "value": {"en": v, "ar": v}}` for translated ones.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CastError;
use crate::field_type::FieldType;

/// A value after casting through its field type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl TypedValue {
    /// JSON form used for persistence. Dates become `YYYY-MM-DD` strings.
    pub fn to_json(&self) -> Value {
        match self {
            TypedValue::Text(s) => Value::String(s.clone()),
            TypedValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            TypedValue::Boolean(b) => Value::Bool(*b),
            TypedValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            TypedValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Human-readable rendering for list views.
    pub fn display(&self) -> String {
        match self {
            TypedValue::Text(s) => s.clone(),
            TypedValue::Number(n) => n.to_string(),
            TypedValue::Boolean(true) => "Yes".to_string(),
            TypedValue::Boolean(false) => "No".to_string(),
            TypedValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// The stored value of one field on one host instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Scalar(TypedValue),
    /// Locale code to value. Iteration order is locale-code order.
    Translated(BTreeMap<String, TypedValue>),
}

impl Payload {
    pub fn is_translated(&self) -> bool {
        matches!(self, Payload::Translated(_))
    }

    /// Serialize to the persisted JSON shape.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        match self {
            Payload::Scalar(v) => {
                object.insert("value".into(), v.to_json());
            }
            Payload::Translated(map) => {
                let values = map
                    .iter()
                    .map(|(locale, v)| (locale.clone(), v.to_json()))
                    .collect::<Map<_, _>>();
                object.insert("translatable".into(), Value::Bool(true));
                object.insert("value".into(), Value::Object(values));
            }
        }
        Value::Object(object)
    }

    /// Decode a persisted payload, re-casting every value through `field_type`.
    ///
    /// A bare locale map without a `value` key is read as a translated payload.
    pub fn from_json(field_type: FieldType, json: &Value) -> Result<Payload, CastError> {
        let Value::Object(object) = json else {
            return Err(CastError::new("payload object", json.to_string()));
        };

        let translatable = object
            .get("translatable")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        match object.get("value") {
            Some(Value::Object(locales)) if translatable || field_type.supports_translation() => {
                Self::translated_from(field_type, locales)
            }
            Some(_) if translatable => Err(CastError::new("locale map", json.to_string())),
            Some(value) => field_type.cast(value).map(Payload::Scalar),
            None if field_type.supports_translation() && !object.is_empty() => {
                Self::translated_from(field_type, object)
            }
            None => Err(CastError::new("payload with value", json.to_string())),
        }
    }

    fn translated_from(
        field_type: FieldType,
        locales: &Map<String, Value>,
    ) -> Result<Payload, CastError> {
        let mut map = BTreeMap::new();
        for (locale, raw) in locales {
            map.insert(locale.clone(), field_type.cast(raw)?);
        }
        Ok(Payload::Translated(map))
    }

    /// Pick the value for `locale`, falling back to `fallback`, then to the
    /// first stored locale. Scalars ignore the locale.
    pub fn resolve(&self, locale: &str, fallback: &str) -> Option<&TypedValue> {
        match self {
            Payload::Scalar(v) => Some(v),
            Payload::Translated(map) => map
                .get(locale)
                .or_else(|| map.get(fallback))
                .or_else(|| map.values().next()),
        }
    }

    /// Write one locale into a translated payload, keeping the others.
    /// A previous scalar value is dropped.
    pub fn merge_locale(existing: Option<Payload>, locale: &str, value: TypedValue) -> Payload {
        let mut map = match existing {
            Some(Payload::Translated(map)) => map,
            _ => BTreeMap::new(),
        };
        map.insert(locale.to_string(), value);
        Payload::Translated(map)
    }
}
