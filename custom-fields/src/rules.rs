//! Validation rules attached to field definitions.
//!
//! Rules are written as strings in definitions (`"max:255"`, `"in:a,b"`) and
//! parsed into [`Rule`] values. Unknown rule names are rejected at parse time.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::field_type::parse_date;
use crate::payload::TypedValue;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});

/// One validation rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Required,
    String,
    Numeric,
    Integer,
    Boolean,
    Date,
    Email,
    /// Minimum string length or numeric value.
    Min(f64),
    /// Maximum string length or numeric value.
    Max(f64),
    In(Vec<String>),
    Regex(Pattern),
}

/// The pattern of a `regex:` rule, compiled once at parse time.
///
/// Accepts a bare pattern (`^[A-Z]+$`) or a delimited one with trailing
/// flags (`/^[a-z]+$/i`). Flags `i`, `m`, `s` and `x` map to inline flags;
/// `u` is accepted and ignored.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Pattern, String> {
        let compiled = match delimited(source) {
            Some((body, flags)) => {
                let mut inline = String::new();
                for flag in flags.chars() {
                    match flag {
                        'i' | 'm' | 's' | 'x' => inline.push(flag),
                        'u' => {}
                        other => return Err(format!("unsupported regex flag '{other}'")),
                    }
                }
                if inline.is_empty() {
                    body.to_string()
                } else {
                    format!("(?{inline}){body}")
                }
            }
            None => source.to_string(),
        };
        let regex = Regex::new(&compiled)
            .map_err(|e| format!("rule 'regex:{source}' is not a valid pattern: {e}"))?;
        Ok(Pattern {
            source: source.to_string(),
            regex,
        })
    }

    /// The pattern as written in the rule.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Split `/body/flags` into body and flags.
fn delimited(source: &str) -> Option<(&str, &str)> {
    let rest = source.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    Some((&rest[..end], &rest[end + 1..]))
}

impl Rule {
    /// Parse a rule string such as `"max:255"`.
    pub fn parse(s: &str) -> Result<Rule, String> {
        let s = s.trim();
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };

        let rule = match (name, arg) {
            ("required", None) => Rule::Required,
            ("string", None) => Rule::String,
            ("numeric", None) => Rule::Numeric,
            ("integer", None) => Rule::Integer,
            ("boolean", None) => Rule::Boolean,
            ("date", None) => Rule::Date,
            ("email", None) => Rule::Email,
            ("min", Some(arg)) => Rule::Min(parse_bound(name, arg)?),
            ("max", Some(arg)) => Rule::Max(parse_bound(name, arg)?),
            ("in", Some(arg)) => {
                let values: Vec<String> = arg.split(',').map(|v| v.trim().to_string()).collect();
                if values.iter().any(String::is_empty) {
                    return Err(format!("rule '{s}' has an empty value"));
                }
                Rule::In(values)
            }
            ("regex", Some(pattern)) => Rule::Regex(Pattern::new(pattern)?),
            _ => return Err(format!("unknown validation rule '{s}'")),
        };
        Ok(rule)
    }

    /// Check one cast value against this rule.
    ///
    /// `Required` always passes here; absence is decided before casting.
    pub fn check(&self, value: &TypedValue) -> Result<(), String> {
        match self {
            Rule::Required => Ok(()),
            Rule::String => match value {
                TypedValue::Text(_) => Ok(()),
                _ => Err("must be a string".into()),
            },
            Rule::Numeric => match value {
                TypedValue::Number(_) => Ok(()),
                TypedValue::Text(s) if s.trim().parse::<f64>().is_ok() => Ok(()),
                _ => Err("must be a number".into()),
            },
            Rule::Integer => match value {
                TypedValue::Number(n) if n.fract() == 0.0 => Ok(()),
                TypedValue::Text(s) if s.trim().parse::<i64>().is_ok() => Ok(()),
                _ => Err("must be an integer".into()),
            },
            Rule::Boolean => match value {
                TypedValue::Boolean(_) => Ok(()),
                _ => Err("must be true or false".into()),
            },
            Rule::Date => match value {
                TypedValue::Date(_) => Ok(()),
                TypedValue::Text(s) if parse_date(s.trim()).is_some() => Ok(()),
                _ => Err("must be a valid date".into()),
            },
            Rule::Email => match value {
                TypedValue::Text(s) if EMAIL.is_match(s) => Ok(()),
                _ => Err("must be a valid email address".into()),
            },
            Rule::Min(min) => match measure(value) {
                Some(m) if m < *min => Err(format!("must be at least {min}")),
                _ => Ok(()),
            },
            Rule::Max(max) => match measure(value) {
                Some(m) if m > *max => Err(format!("may not be greater than {max}")),
                _ => Ok(()),
            },
            Rule::In(values) => {
                let shown = value.display();
                if values.iter().any(|v| *v == shown) {
                    Ok(())
                } else {
                    Err(format!("must be one of: {}", values.join(", ")))
                }
            }
            Rule::Regex(pattern) => {
                if pattern.is_match(&value.display()) {
                    Ok(())
                } else {
                    Err("format is invalid".into())
                }
            }
        }
    }
}

/// Character count for strings, magnitude for numbers.
fn measure(value: &TypedValue) -> Option<f64> {
    match value {
        TypedValue::Text(s) => Some(s.chars().count() as f64),
        TypedValue::Number(n) => Some(*n),
        TypedValue::Boolean(_) | TypedValue::Date(_) => None,
    }
}

fn parse_bound(name: &str, arg: &str) -> Result<f64, String> {
    arg.trim()
        .parse::<f64>()
        .map_err(|_| format!("rule '{name}' needs a numeric argument, got '{arg}'"))
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => f.write_str("required"),
            Rule::String => f.write_str("string"),
            Rule::Numeric => f.write_str("numeric"),
            Rule::Integer => f.write_str("integer"),
            Rule::Boolean => f.write_str("boolean"),
            Rule::Date => f.write_str("date"),
            Rule::Email => f.write_str("email"),
            Rule::Min(n) => write!(f, "min:{n}"),
            Rule::Max(n) => write!(f, "max:{n}"),
            Rule::In(values) => write!(f, "in:{}", values.join(",")),
            Rule::Regex(pattern) => write!(f, "regex:{}", pattern.as_str()),
        }
    }
}
