//! Request parameters that drive template resolution and output bounds

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BroodError, Result};

/// Immutable request parameters supplied by the caller
///
/// Stored as a JSON object so that absent parameters surface as
/// [`BroodError::MissingParameter`] when a pipeline is built, not as a
/// deserialization failure. Nested values are addressed with dotted paths
/// such as `available_times.start`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineContext {
    params: Map<String, Value>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a parameter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Remove a parameter, returning the context without it
    pub fn without(mut self, name: &str) -> Self {
        self.params.remove(name);
        self
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(params) => Ok(Self { params }),
            other => Err(BroodError::Config(format!(
                "context must be a JSON object, found {}",
                type_name(&other)
            ))),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| BroodError::Config(format!("invalid context JSON: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| BroodError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Look up a value by dotted path
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.params.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    fn require(&self, path: &str, stage: &str) -> Result<&Value> {
        self.lookup(path).ok_or_else(|| BroodError::MissingParameter {
            name: path.to_string(),
            stage: stage.to_string(),
        })
    }

    /// Render a parameter as prompt text
    ///
    /// Lists of scalars are joined with `", "`. Objects cannot be rendered.
    pub fn render(&self, path: &str, stage: &str) -> Result<String> {
        let value = self.require(path, stage)?;
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    scalar_text(item).ok_or_else(|| invalid(path, "a list of scalars", value))
                })
                .collect::<Result<Vec<_>>>()
                .map(|parts| parts.join(", ")),
            other => scalar_text(other).ok_or_else(|| invalid(path, "a scalar or list", other)),
        }
    }

    /// Read a boolean flag
    pub fn flag(&self, path: &str, stage: &str) -> Result<bool> {
        let value = self.require(path, stage)?;
        value.as_bool().ok_or_else(|| invalid(path, "a boolean", value))
    }

    /// Read a non-negative integer
    pub fn count(&self, path: &str, stage: &str) -> Result<usize> {
        let value = self.require(path, stage)?;
        value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| invalid(path, "a non-negative integer", value))
    }

    /// Read the `[min_locations, max_locations]` result bound
    pub fn count_bounds(&self, stage: &str) -> Result<CountBounds> {
        let min = self.count("min_locations", stage)?;
        let max = self.count("max_locations", stage)?;
        if min > max {
            return Err(BroodError::InvalidParameter {
                name: "min_locations".into(),
                expected: format!("at most max_locations ({max})"),
                found: min.to_string(),
            });
        }
        Ok(CountBounds { min, max })
    }
}

/// Inclusive bound on the number of final activities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountBounds {
    pub min: usize,
    pub max: usize,
}

impl CountBounds {
    pub fn contains(&self, n: usize) -> bool {
        self.min <= n && n <= self.max
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn invalid(path: &str, expected: &str, found: &Value) -> BroodError {
    BroodError::InvalidParameter {
        name: path.to_string(),
        expected: expected.to_string(),
        found: type_name(found).to_string(),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
