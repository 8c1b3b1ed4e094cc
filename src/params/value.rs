//! Parameter values.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A value bound to a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Json(serde_json::Value),
}

/// Semantic type of a bound value, for driver-side coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    #[default]
    Unknown,
    Null,
    Boolean,
    Integer,
    Float,
    Text,
    Bytes,
    Date,
    Timestamp,
    Json,
}

impl Value {
    /// The semantic type implied by this value.
    pub fn semantic_type(&self) -> SemanticType {
        match self {
            Value::Null => SemanticType::Null,
            Value::Bool(_) => SemanticType::Boolean,
            Value::Int(_) => SemanticType::Integer,
            Value::Float(_) => SemanticType::Float,
            Value::Text(_) => SemanticType::Text,
            Value::Bytes(_) => SemanticType::Bytes,
            Value::Date(_) => SemanticType::Date,
            Value::Timestamp(_) => SemanticType::Timestamp,
            Value::Json(_) => SemanticType::Json,
        }
    }

    /// Parse a loosely typed command-line value: integer, float, boolean, null, else text.
    pub fn infer(raw: &str) -> Value {
        if let Ok(n) = raw.parse::<i64>() {
            Value::Int(n)
        } else if let Ok(f) = raw.parse::<f64>() {
            Value::Float(f)
        } else if raw.eq_ignore_ascii_case("true") {
            Value::Bool(true)
        } else if raw.eq_ignore_ascii_case("false") {
            Value::Bool(false)
        } else if raw.eq_ignore_ascii_case("null") {
            Value::Null
        } else {
            Value::Text(raw.to_string())
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Date(d) => write!(f, "'{}'", d),
            Value::Timestamp(t) => write!(f, "'{}'", t),
            Value::Json(j) => write!(f, "'{}'", j),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(t: NaiveDateTime) -> Self {
        Value::Timestamp(t)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(j)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}
