//! Operand values accepted by the filter parser.
//!
//! Query strings only ever carry strings, while JSON request bodies and
//! programmatic callers carry typed scalars. Both shapes land in
//! [`FilterInput`], a tagged variant that the parser checks against each
//! operator's declared arity.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar operand value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null literal.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed 64-bit integer literal.
    Int(i64),
    /// 64-bit floating point literal.
    Float(f64),
    /// UTF-8 string literal.
    String(String),
}

impl Value {
    /// Returns the string payload when the value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Interprets the value as a boolean flag (`true`/`false`/`1`/`0`).
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(0) => Some(false),
            Value::Int(1) => Some(true),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Interprets the value as a number, coercing numeric strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Converts the scalar into its JSON representation.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(v) => serde_json::Value::Bool(*v),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(v) => serde_json::Value::String(v.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

/// Loosely-typed filter input: a scalar, a sequential list, or a keyed map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterInput {
    /// Scalar operand (implicit `eq` when attached to a field).
    Scalar(Value),
    /// Sequential list (implicit `in` when attached to a field).
    List(Vec<FilterInput>),
    /// Operator map, nested field scope, or `and`/`or` group.
    Map(BTreeMap<String, FilterInput>),
}

impl FilterInput {
    /// Creates an empty map input.
    pub fn empty() -> Self {
        FilterInput::Map(BTreeMap::new())
    }

    /// Returns `true` for an empty map or list.
    pub fn is_empty(&self) -> bool {
        match self {
            FilterInput::Scalar(_) => false,
            FilterInput::List(items) => items.is_empty(),
            FilterInput::Map(map) => map.is_empty(),
        }
    }

    /// Short label used in error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            FilterInput::Scalar(_) => "scalar",
            FilterInput::List(_) => "list",
            FilterInput::Map(_) => "map",
        }
    }
}

impl From<Value> for FilterInput {
    fn from(value: Value) -> Self {
        FilterInput::Scalar(value)
    }
}

impl From<&str> for FilterInput {
    fn from(value: &str) -> Self {
        FilterInput::Scalar(value.into())
    }
}

impl From<String> for FilterInput {
    fn from(value: String) -> Self {
        FilterInput::Scalar(value.into())
    }
}

impl From<bool> for FilterInput {
    fn from(value: bool) -> Self {
        FilterInput::Scalar(value.into())
    }
}

impl From<i64> for FilterInput {
    fn from(value: i64) -> Self {
        FilterInput::Scalar(value.into())
    }
}

impl From<f64> for FilterInput {
    fn from(value: f64) -> Self {
        FilterInput::Scalar(value.into())
    }
}

impl From<serde_json::Value> for FilterInput {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FilterInput::Scalar(Value::Null),
            serde_json::Value::Bool(b) => FilterInput::Scalar(Value::Bool(b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => FilterInput::Scalar(Value::Int(i)),
                None => FilterInput::Scalar(Value::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            serde_json::Value::String(s) => FilterInput::Scalar(Value::String(s)),
            serde_json::Value::Array(items) => {
                FilterInput::List(items.into_iter().map(FilterInput::from).collect())
            }
            serde_json::Value::Object(map) => FilterInput::Map(
                map.into_iter()
                    .map(|(k, v)| (k, FilterInput::from(v)))
                    .collect(),
            ),
        }
    }
}
