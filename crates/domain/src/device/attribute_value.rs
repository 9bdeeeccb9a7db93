//! Loosely typed attribute values as reported by the remote API.
//!
//! The API is inconsistent about types: booleans and numbers frequently
//! arrive as strings (`"true"`, `"72"`). The accessors here accept both.

use serde::{Deserialize, Serialize};

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Json(serde_json::Value),
}

impl AttributeValue {
    /// Interpret as a boolean (`true`, `"true"`, `1`, `"1"`).
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            Self::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            Self::Float(_) | Self::Json(_) => None,
        }
    }

    /// Interpret as a floating-point number.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::String(s) => s.trim().parse().ok(),
            Self::Bool(_) | Self::Json(_) => None,
        }
    }

    /// Interpret as an integer, truncating fractional values.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) => Some(f.trunc() as i64),
            Self::String(s) => {
                let s = s.trim();
                s.parse()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
            }
            Self::Bool(_) | Self::Json(_) => None,
        }
    }

    /// Borrow as a string, if it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_read_bool_from_string() {
        assert_eq!(AttributeValue::from("true").as_bool(), Some(true));
        assert_eq!(AttributeValue::from("False").as_bool(), Some(false));
        assert_eq!(AttributeValue::from("maybe").as_bool(), None);
    }

    #[test]
    fn should_read_number_from_string() {
        assert_eq!(AttributeValue::from("72").as_f64(), Some(72.0));
        assert_eq!(AttributeValue::from("71.5").as_i64(), Some(71));
        assert_eq!(AttributeValue::Int(40).as_f64(), Some(40.0));
    }

    #[test]
    fn should_deserialize_untagged_values() {
        let val: AttributeValue = serde_json::from_str("\"heat\"").unwrap();
        assert_eq!(val.as_str(), Some("heat"));
        let val: AttributeValue = serde_json::from_str("68").unwrap();
        assert_eq!(val, AttributeValue::Int(68));
        let val: AttributeValue = serde_json::from_str("true").unwrap();
        assert_eq!(val, AttributeValue::Bool(true));
    }

    #[test]
    fn should_deserialize_json_object_as_json_variant() {
        let val: AttributeValue = serde_json::from_str(r#"{"nested": "value"}"#).unwrap();
        assert!(matches!(val, AttributeValue::Json(_)));
    }
}
