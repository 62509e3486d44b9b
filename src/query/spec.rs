//! Query text plus named parameters, as sent on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named parameter bound to an `@placeholder`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlParameter {
    pub name: String,
    pub value: Value,
}

impl SqlParameter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Query text with its parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SqlQuerySpec {
    pub query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<SqlParameter>,
}

impl SqlQuerySpec {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            parameters: Vec::new(),
        }
    }

    /// Bind a parameter. The name includes the leading `@`.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.push(SqlParameter::new(name, value));
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

impl From<&str> for SqlQuerySpec {
    fn from(query: &str) -> Self {
        SqlQuerySpec::new(query)
    }
}

impl From<String> for SqlQuerySpec {
    fn from(query: String) -> Self {
        SqlQuerySpec::new(query)
    }
}
