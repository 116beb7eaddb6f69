//! Coerced tool arguments

use crate::ToolError;
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A single argument after coercion to its declared type
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    StringList(Vec<String>),
}

impl ArgValue {
    /// JSON rendering; dates become `YYYY-MM-DD` strings
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Integer(i) => Value::from(*i),
            Self::Number(n) => Value::from(*n),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Self::StringList(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

impl Serialize for ArgValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Arguments for one invocation, keyed by parameter name.
///
/// Only produced by [`crate::ToolSchema::coerce`], so every present value
/// already has its declared type and every required parameter is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolArgs {
    #[serde(skip)]
    tool: String,
    #[serde(flatten)]
    values: BTreeMap<String, ArgValue>,
}

impl ToolArgs {
    pub(crate) fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            values: BTreeMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    /// Raw access to a coerced value
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// Whether the argument is present
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(ArgValue::Number(n)) => Some(*n),
            Some(ArgValue::Integer(i)) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ArgValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        match self.values.get(name) {
            Some(ArgValue::Date(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn list(&self, name: &str) -> Option<&[String]> {
        match self.values.get(name) {
            Some(ArgValue::StringList(items)) => Some(items),
            _ => None,
        }
    }

    /// Required string argument, or `InvalidArguments`
    pub fn require_str(&self, name: &str) -> Result<&str, ToolError> {
        self.str(name).ok_or_else(|| self.missing(name))
    }

    /// Required integer argument, or `InvalidArguments`
    pub fn require_i64(&self, name: &str) -> Result<i64, ToolError> {
        self.i64(name).ok_or_else(|| self.missing(name))
    }

    /// Required date argument, or `InvalidArguments`
    pub fn require_date(&self, name: &str) -> Result<NaiveDate, ToolError> {
        self.date(name).ok_or_else(|| self.missing(name))
    }

    /// Required list argument, or `InvalidArguments`
    pub fn require_list(&self, name: &str) -> Result<&[String], ToolError> {
        self.list(name).ok_or_else(|| self.missing(name))
    }

    fn missing(&self, name: &str) -> ToolError {
        ToolError::invalid(&self.tool, format!("missing required parameter '{name}'"))
    }

    /// JSON object of the coerced arguments
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect::<Map<_, _>>(),
        )
    }
}
