//! Typed parameter schemas and argument coercion

use crate::{ArgValue, ToolArgs, ToolError};
use chrono::NaiveDate;
use nexus_llm::ToolDefinition;
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Declared type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    /// Calendar date, `YYYY-MM-DD`
    Date,
    /// List of strings; a comma-separated string is accepted too
    StringList,
}

impl ParamType {
    fn json_schema(self) -> Value {
        match self {
            Self::String => json!({"type": "string"}),
            Self::Integer => json!({"type": "integer"}),
            Self::Number => json!({"type": "number"}),
            Self::Boolean => json!({"type": "boolean"}),
            Self::Date => json!({"type": "string", "format": "date"}),
            Self::StringList => json!({"type": "array", "items": {"type": "string"}}),
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    /// Applied when an optional parameter is absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<ArgValue>,
    /// Closed set of accepted values for string parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    /// Inclusive bounds for integer parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<(i64, i64)>,
}

impl ParamSpec {
    /// A required parameter
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: true,
            default: None,
            allowed: None,
            range: None,
        }
    }

    /// An optional parameter with no default
    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    /// Set the default used when the parameter is absent
    pub fn with_default(mut self, default: ArgValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Restrict a string parameter to a closed set of values
    pub fn one_of(mut self, allowed: &[&str]) -> Self {
        self.allowed = Some(allowed.iter().map(|s| (*s).to_string()).collect());
        self
    }

    /// Restrict an integer parameter to `min..=max`
    pub fn between(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }
}

/// A tool's name, description and parameters, shown verbatim to the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
}

impl ToolSchema {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
        }
    }

    /// Append a parameter
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    /// JSON Schema object for the parameters
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for p in &self.parameters {
            let mut prop = p.param_type.json_schema();
            if let Value::Object(obj) = &mut prop {
                obj.insert("description".into(), Value::String(p.description.clone()));
                if let Some(default) = &p.default {
                    obj.insert("default".into(), default.to_json());
                }
                if let Some(allowed) = &p.allowed {
                    obj.insert("enum".into(), json!(allowed));
                }
                if let Some((min, max)) = p.range {
                    obj.insert("minimum".into(), json!(min));
                    obj.insert("maximum".into(), json!(max));
                }
            }
            properties.insert(p.name.clone(), prop);
            if p.required {
                required.push(Value::String(p.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Definition handed to the LLM provider
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, &self.description, self.to_json_schema())
    }

    /// Validate and coerce raw JSON arguments.
    ///
    /// `null` stands for "no arguments" and `null` fields count as absent.
    /// Unknown fields, missing required fields and values that cannot be
    /// coerced are rejected.
    pub fn coerce(&self, raw: &Value) -> Result<ToolArgs, ToolError> {
        let empty = Map::new();
        let object = match raw {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(self.invalid(format!(
                    "arguments must be a JSON object, got {}",
                    json_kind(other)
                )));
            }
        };

        if let Some(unknown) = object
            .keys()
            .find(|k| !self.parameters.iter().any(|p| &p.name == *k))
        {
            return Err(self.invalid(format!("unknown parameter '{unknown}'")));
        }

        let mut args = ToolArgs::new(&self.name);
        for spec in &self.parameters {
            match object.get(&spec.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    let coerced = coerce_value(spec, value).map_err(|reason| {
                        self.invalid(format!("parameter '{}': {reason}", spec.name))
                    })?;
                    args.insert(&spec.name, coerced);
                }
                None if spec.required => {
                    return Err(self.invalid(format!("missing required parameter '{}'", spec.name)));
                }
                None => {
                    if let Some(default) = &spec.default {
                        args.insert(&spec.name, default.clone());
                    }
                }
            }
        }

        Ok(args)
    }

    fn invalid(&self, reason: String) -> ToolError {
        ToolError::invalid(&self.name, reason)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn coerce_value(spec: &ParamSpec, value: &Value) -> Result<ArgValue, String> {
    let coerced = match (spec.param_type, value) {
        (ParamType::String, Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Err("must not be empty".into());
            }
            ArgValue::String(s.to_string())
        }
        (ParamType::Integer, Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => ArgValue::Integer(i),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 9.0e15 => ArgValue::Integer(f as i64),
            _ => return Err(format!("expected an integer, got {n}")),
        },
        (ParamType::Integer, Value::String(s)) => ArgValue::Integer(
            s.trim()
                .parse()
                .map_err(|_| format!("expected an integer, got '{s}'"))?,
        ),
        (ParamType::Number, Value::Number(n)) => {
            ArgValue::Number(n.as_f64().ok_or_else(|| format!("expected a number, got {n}"))?)
        }
        (ParamType::Number, Value::String(s)) => {
            let n: f64 = s
                .trim()
                .parse()
                .map_err(|_| format!("expected a number, got '{s}'"))?;
            if !n.is_finite() {
                return Err(format!("expected a finite number, got '{s}'"));
            }
            ArgValue::Number(n)
        }
        (ParamType::Boolean, Value::Bool(b)) => ArgValue::Boolean(*b),
        (ParamType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => ArgValue::Boolean(true),
            "false" => ArgValue::Boolean(false),
            _ => return Err(format!("expected true or false, got '{s}'")),
        },
        (ParamType::Date, Value::String(s)) => ArgValue::Date(
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| format!("expected a YYYY-MM-DD date, got '{s}'"))?,
        ),
        (ParamType::StringList, Value::Array(items)) => ArgValue::StringList(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
                    other => Err(format!("list items must be non-empty strings, got {other}")),
                })
                .collect::<Result<_, _>>()?,
        ),
        (ParamType::StringList, Value::String(s)) => ArgValue::StringList(
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        (expected, other) => {
            return Err(format!("expected {expected:?}, got {}", json_kind(other)));
        }
    };

    if let (Some(allowed), ArgValue::String(s)) = (&spec.allowed, &coerced) {
        if !allowed.iter().any(|a| a.eq_ignore_ascii_case(s)) {
            return Err(format!("'{s}' is not one of {}", allowed.join(", ")));
        }
    }
    if let (Some((min, max)), ArgValue::Integer(i)) = (spec.range, &coerced) {
        if !(min..=max).contains(i) {
            return Err(format!("{i} is outside {min}..={max}"));
        }
    }
    if let ArgValue::StringList(items) = &coerced {
        if items.is_empty() {
            return Err("list must not be empty".into());
        }
    }

    Ok(coerced)
}
