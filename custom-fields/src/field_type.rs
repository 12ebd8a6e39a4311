//! The closed field type taxonomy.
//!
//! Each [`FieldType`] variant resolves to a static [`TypeSpec`] record holding
//! its cast function, default validation rules, and capability flags. Callers
//! dispatch through the record instead of branching on the variant.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CastError;
use crate::payload::TypedValue;

/// The type of a custom field — determines how raw input is cast and checked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Textarea,
    Number,
    Boolean,
    Date,
    Select,
}

/// Per-variant behaviour of a [`FieldType`].
#[derive(Debug)]
pub struct TypeSpec {
    /// Stable name, matches the serialized form.
    pub name: &'static str,
    /// Rule strings every field of this type is checked against.
    pub default_rules: &'static [&'static str],
    /// Whether a locale map may be stored instead of a single value.
    pub translatable: bool,
    /// Whether the definition must declare a non-empty `options` list.
    pub requires_options: bool,
    /// Primitive coercion from submitted JSON.
    pub cast: fn(&Value) -> Result<TypedValue, CastError>,
}

static TEXT: TypeSpec = TypeSpec {
    name: "text",
    default_rules: &["string", "max:255"],
    translatable: true,
    requires_options: false,
    cast: cast_string,
};

static TEXTAREA: TypeSpec = TypeSpec {
    name: "textarea",
    default_rules: &["string", "max:65535"],
    translatable: true,
    requires_options: false,
    cast: cast_string,
};

static NUMBER: TypeSpec = TypeSpec {
    name: "number",
    default_rules: &["numeric"],
    translatable: false,
    requires_options: false,
    cast: cast_number,
};

static BOOLEAN: TypeSpec = TypeSpec {
    name: "boolean",
    default_rules: &["boolean"],
    translatable: false,
    requires_options: false,
    cast: cast_boolean,
};

static DATE: TypeSpec = TypeSpec {
    name: "date",
    default_rules: &["date"],
    translatable: false,
    requires_options: false,
    cast: cast_date,
};

static SELECT: TypeSpec = TypeSpec {
    name: "select",
    default_rules: &["string"],
    translatable: false,
    requires_options: true,
    cast: cast_string,
};

impl FieldType {
    /// All variants, in declaration order.
    pub const ALL: [FieldType; 6] = [
        FieldType::Text,
        FieldType::Textarea,
        FieldType::Number,
        FieldType::Boolean,
        FieldType::Date,
        FieldType::Select,
    ];

    /// The behaviour record for this type.
    pub fn spec(self) -> &'static TypeSpec {
        match self {
            FieldType::Text => &TEXT,
            FieldType::Textarea => &TEXTAREA,
            FieldType::Number => &NUMBER,
            FieldType::Boolean => &BOOLEAN,
            FieldType::Date => &DATE,
            FieldType::Select => &SELECT,
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn supports_translation(self) -> bool {
        self.spec().translatable
    }

    pub fn requires_options(self) -> bool {
        self.spec().requires_options
    }

    /// Cast a raw submitted value to this type.
    pub fn cast(self, raw: &Value) -> Result<TypedValue, CastError> {
        (self.spec().cast)(raw)
    }

    /// Parse a serialized type name, e.g. `"textarea"`.
    pub fn from_name(name: &str) -> Option<FieldType> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn describe(raw: &Value) -> String {
    match raw {
        Value::Null => "null".to_string(),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
        other => other.to_string(),
    }
}

fn cast_string(raw: &Value) -> Result<TypedValue, CastError> {
    match raw {
        Value::String(s) => Ok(TypedValue::Text(s.clone())),
        Value::Number(n) => Ok(TypedValue::Text(n.to_string())),
        other => Err(CastError::new("string", describe(other))),
    }
}

fn cast_number(raw: &Value) -> Result<TypedValue, CastError> {
    let number = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => Ok(TypedValue::Number(n)),
        _ => Err(CastError::new("number", describe(raw))),
    }
}

fn cast_boolean(raw: &Value) -> Result<TypedValue, CastError> {
    let flag = match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    };
    flag.map(TypedValue::Boolean)
        .ok_or_else(|| CastError::new("boolean", describe(raw)))
}

fn cast_date(raw: &Value) -> Result<TypedValue, CastError> {
    let Value::String(s) = raw else {
        return Err(CastError::new("date", describe(raw)));
    };
    parse_date(s.trim())
        .map(TypedValue::Date)
        .ok_or_else(|| CastError::new("date", describe(raw)))
}

/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps, and `YYYY-MM-DD HH:MM:SS`.
pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.date())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn type_names_match_serialized_form() {
        for ft in FieldType::ALL {
            let json = serde_json::to_value(ft).unwrap();
            assert_eq!(json, Value::String(ft.name().to_string()));
            assert_eq!(FieldType::from_name(ft.name()), Some(ft));
        }
        assert_eq!(FieldType::from_name("color"), None);
    }

    #[test]
    fn only_select_requires_options() {
        let requiring: Vec<_> = FieldType::ALL
            .into_iter()
            .filter(|t| t.requires_options())
            .collect();
        assert_eq!(requiring, vec![FieldType::Select]);
    }

    #[test]
    fn only_text_types_translate() {
        assert!(FieldType::Text.supports_translation());
        assert!(FieldType::Textarea.supports_translation());
        assert!(!FieldType::Number.supports_translation());
        assert!(!FieldType::Select.supports_translation());
    }

    #[rstest]
    #[case(FieldType::Number, json!(1000000), TypedValue::Number(1000000.0))]
    #[case(FieldType::Number, json!(" 12.5 "), TypedValue::Number(12.5))]
    #[case(FieldType::Boolean, json!(true), TypedValue::Boolean(true))]
    #[case(FieldType::Boolean, json!("0"), TypedValue::Boolean(false))]
    #[case(FieldType::Boolean, json!(1), TypedValue::Boolean(true))]
    #[case(FieldType::Text, json!("Technology"), TypedValue::Text("Technology".into()))]
    #[case(FieldType::Select, json!(42), TypedValue::Text("42".into()))]
    #[case(
        FieldType::Date,
        json!("2020-01-01"),
        TypedValue::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
    )]
    #[case(
        FieldType::Date,
        json!("2020-01-01T10:30:00+00:00"),
        TypedValue::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
    )]
    #[case(
        FieldType::Date,
        json!("2021-06-15 08:00:00"),
        TypedValue::Date(NaiveDate::from_ymd_opt(2021, 6, 15).unwrap())
    )]
    fn casts_coercible_input(
        #[case] ft: FieldType,
        #[case] raw: Value,
        #[case] expected: TypedValue,
    ) {
        assert_eq!(ft.cast(&raw).unwrap(), expected);
    }

    #[rstest]
    #[case(FieldType::Number, json!("lots"))]
    #[case(FieldType::Number, json!(true))]
    #[case(FieldType::Boolean, json!("yes please"))]
    #[case(FieldType::Boolean, json!(2))]
    #[case(FieldType::Date, json!("not a date"))]
    #[case(FieldType::Date, json!(20200101))]
    #[case(FieldType::Text, json!(false))]
    #[case(FieldType::Textarea, json!(["a"]))]
    #[case(FieldType::Select, json!(null))]
    fn rejects_non_coercible_input(#[case] ft: FieldType, #[case] raw: Value) {
        let err = ft.cast(&raw).unwrap_err();
        assert!(!err.found.is_empty());
    }
}
