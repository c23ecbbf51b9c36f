//! Heterogeneous fact results.
//!
//! A fact's result can be a scalar, a string, a list, or a whole JSON
//! document, depending on which source and rule produced it. [`FactValue`]
//! models that as a tagged union, and the two coercions (`as_float`,
//! `as_boolean`) are the only places where cross-type conversion happens:
//! aggregate reducers and the driver's final-result selection both go
//! through them rather than inspecting variants directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    #[default]
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    List(Vec<FactValue>),
    Map(BTreeMap<String, FactValue>),
}

impl FactValue {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Coerce to a float, or `None` when no sensible conversion exists.
    ///
    /// Booleans map to 1.0/0.0 and strings are parsed; lists and maps have
    /// no numeric form.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            Self::String(text) => text.parse().ok(),
            Self::Boolean(true) => Some(1.0),
            Self::Boolean(false) => Some(0.0),
            Self::Null | Self::List(_) | Self::Map(_) => None,
        }
    }

    /// Coerce to a boolean, or `None` when no sensible conversion exists.
    ///
    /// Strings accept the canonical `true`/`false` forms case-insensitively;
    /// numbers are truthy when non-zero.
    #[must_use]
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(flag) => Some(*flag),
            Self::String(text) if text.eq_ignore_ascii_case("true") => Some(true),
            Self::String(text) if text.eq_ignore_ascii_case("false") => Some(false),
            Self::Number(number) => Some(*number != 0.0),
            Self::Null | Self::String(_) | Self::List(_) | Self::Map(_) => None,
        }
    }
}

impl From<serde_json::Value> for FactValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(flag) => Self::Boolean(flag),
            serde_json::Value::Number(number) => number.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(text) => Self::String(text),
            serde_json::Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(entries) => Self::Map(entries.into_iter().map(|(key, item)| (key, Self::from(item))).collect()),
        }
    }
}

/// Canonical rendering used for stringified comparisons (`regex_match`,
/// `deps_match`, `unique`) and for submitting final results to the catalog.
/// Integral numbers print without a fractional part.
impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(flag) => write!(f, "{flag}"),
            Self::Number(number) => {
                if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e15 {
                    write!(f, "{}", *number as i64)
                } else {
                    write!(f, "{number}")
                }
            }
            Self::String(text) => write!(f, "{text}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (position, item) in items.iter().enumerate() {
                    if position > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (position, (key, item)) in entries.iter().enumerate() {
                    if position > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {item}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_float_number() {
        assert_eq!(FactValue::Number(1.5).as_float(), Some(1.5));
    }

    #[test]
    fn test_as_float_string() {
        assert_eq!(FactValue::String("42".into()).as_float(), Some(42.0));
        assert_eq!(FactValue::String("1.2.3".into()).as_float(), None);
        assert_eq!(FactValue::String("".into()).as_float(), None);
    }

    #[test]
    fn test_as_float_boolean() {
        assert_eq!(FactValue::Boolean(true).as_float(), Some(1.0));
        assert_eq!(FactValue::Boolean(false).as_float(), Some(0.0));
    }

    #[test]
    fn test_as_float_absent_for_structures() {
        assert_eq!(FactValue::Null.as_float(), None);
        assert_eq!(FactValue::List(vec![FactValue::Number(1.0)]).as_float(), None);
        assert_eq!(FactValue::Map(BTreeMap::new()).as_float(), None);
    }

    #[test]
    fn test_as_boolean_string_forms() {
        assert_eq!(FactValue::String("true".into()).as_boolean(), Some(true));
        assert_eq!(FactValue::String("FALSE".into()).as_boolean(), Some(false));
        assert_eq!(FactValue::String("yes".into()).as_boolean(), None);
    }

    #[test]
    fn test_as_boolean_number() {
        assert_eq!(FactValue::Number(0.0).as_boolean(), Some(false));
        assert_eq!(FactValue::Number(-2.5).as_boolean(), Some(true));
    }

    #[test]
    fn test_as_boolean_absent_for_structures() {
        assert_eq!(FactValue::Null.as_boolean(), None);
        assert_eq!(FactValue::List(Vec::new()).as_boolean(), None);
    }

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(FactValue::from(serde_json::json!(null)), FactValue::Null);
        assert_eq!(FactValue::from(serde_json::json!(true)), FactValue::Boolean(true));
        assert_eq!(FactValue::from(serde_json::json!(3)), FactValue::Number(3.0));
        assert_eq!(FactValue::from(serde_json::json!("x")), FactValue::String("x".into()));
    }

    #[test]
    fn test_from_json_structures() {
        let value = FactValue::from(serde_json::json!({"a": [1, "b"]}));
        let FactValue::Map(entries) = value else {
            panic!("expected a map");
        };
        assert_eq!(
            entries.get("a"),
            Some(&FactValue::List(vec![FactValue::Number(1.0), FactValue::String("b".into())]))
        );
    }

    #[test]
    fn test_display_integral_number() {
        assert_eq!(FactValue::Number(3.0).to_string(), "3");
        assert_eq!(FactValue::Number(3.25).to_string(), "3.25");
    }

    #[test]
    fn test_display_list() {
        let value = FactValue::List(vec![FactValue::Boolean(true), FactValue::String("x".into())]);
        assert_eq!(value.to_string(), "[true, x]");
    }

    #[test]
    fn test_deserialize_untagged_from_yaml() {
        let value: FactValue = serde_yaml::from_str(".version").unwrap();
        assert_eq!(value, FactValue::String(".version".into()));

        let value: FactValue = serde_yaml::from_str("12").unwrap();
        assert_eq!(value, FactValue::Number(12.0));
    }
}
