//! Partition key values
//!
//! A partition key is a JSON scalar or *undefined* (the document lacks the
//! key path). On the wire it travels as a one-element JSON array: `["a"]`,
//! `[1]`, `[null]`, and `[{}]` for undefined.
//!
//! Numbers are kept in canonical form so that `1` and `1.0` name the same
//! logical partition.

use std::fmt;

use serde_json::Value;

use crate::error::{CosmosError, CosmosResult};

use super::properties::PartitionKeyDefinition;

/// Value a document is partitioned by
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionKey {
    /// A scalar (string, number, bool or null)
    Value(Value),
    /// The document has no value at the key path
    Undefined,
}

impl PartitionKey {
    /// Build a key from a JSON value, rejecting arrays and objects
    pub fn new(value: Value) -> CosmosResult<Self> {
        match value {
            Value::Array(_) | Value::Object(_) => Err(CosmosError::bad_request(format!(
                "partition key must be a scalar, got {}",
                value
            ))),
            scalar => Ok(Self::Value(canonical_number(scalar))),
        }
    }

    pub fn undefined() -> Self {
        Self::Undefined
    }

    /// Header form: a one-element JSON array
    pub fn to_header(&self) -> String {
        let element = match self {
            Self::Value(v) => v.clone(),
            Self::Undefined => Value::Object(serde_json::Map::new()),
        };
        Value::Array(vec![element]).to_string()
    }

    /// Parse the header form
    pub fn from_header(header: &str) -> CosmosResult<Self> {
        let parsed: Value = serde_json::from_str(header).map_err(|e| {
            CosmosError::bad_request(format!("malformed partition key header {:?}: {}", header, e))
        })?;
        match parsed {
            Value::Array(mut elements) if elements.len() == 1 => match elements.remove(0) {
                Value::Object(map) if map.is_empty() => Ok(Self::Undefined),
                element => Self::new(element),
            },
            _ => Err(CosmosError::bad_request(format!(
                "partition key header must be a one-element array: {:?}",
                header
            ))),
        }
    }

    /// Extract the key of a document under a partition key definition.
    ///
    /// A document without a value at the path is `Undefined`; a non-scalar
    /// value is rejected.
    pub fn from_document(document: &Value, definition: &PartitionKeyDefinition) -> CosmosResult<Self> {
        match lookup_path(document, definition.path()) {
            Some(value) => Self::new(value.clone()),
            None => Ok(Self::Undefined),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Undefined => None,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_header())
    }
}

impl From<&str> for PartitionKey {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_string()))
    }
}

impl From<String> for PartitionKey {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<i64> for PartitionKey {
    fn from(value: i64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<f64> for PartitionKey {
    fn from(value: f64) -> Self {
        Self::Value(canonical_number(Value::from(value)))
    }
}

impl From<bool> for PartitionKey {
    fn from(value: bool) -> Self {
        Self::Value(Value::Bool(value))
    }
}

/// Integral floats become integers; everything else is returned as is
fn canonical_number(value: Value) -> Value {
    let Value::Number(number) = &value else {
        return value;
    };
    if number.is_i64() || number.is_u64() {
        return value;
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Value::from(f as i64)
        }
        _ => value,
    }
}

/// Follow a `/a/b/c` path into a document
pub fn lookup_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .try_fold(document, |current, segment| current.get(segment))
}
