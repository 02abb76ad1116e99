use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// A single persisted field value as exchanged with the store.
///
/// Values compare exactly: `Text("5.0")` and `Text("5.00")` are different
/// values, and so are `Integer(3)` and `Text("3")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Boolean(bool),
    Text(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer(_) => "INTEGER",
            Self::Boolean(_) => "BOOLEAN",
            Self::Text(_) => "TEXT",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Renders the value the way form-encoded and multipart bodies expect it.
    pub fn to_form_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Integer(i) => i.to_string(),
            Self::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Integer(i) => JsonValue::from(*i),
            Self::Boolean(b) => JsonValue::Bool(*b),
            Self::Text(s) => JsonValue::String(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Text(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_rendering() {
        assert_eq!(Value::Integer(42).to_form_string(), "42");
        assert_eq!(Value::Boolean(false).to_form_string(), "false");
        assert_eq!(Value::Null.to_form_string(), "");
        assert_eq!(Value::from("Red").to_form_string(), "Red");
    }

    #[test]
    fn test_exact_equality() {
        assert_ne!(Value::from("5.0"), Value::from("5.00"));
        assert_ne!(Value::Integer(3), Value::from("3"));
        assert_eq!(Value::from(Some(7i64)), Value::Integer(7));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_lenient_integer_read() {
        assert_eq!(Value::from(" 12 ").as_i64(), Some(12));
        assert_eq!(Value::Boolean(true).as_i64(), None);
    }
}
