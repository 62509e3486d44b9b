//! Backend service boundary
//!
//! The pipeline's final stage hands a `TransportRequest` to a `Transport`
//! and gets back a status, headers and a JSON body. Transports report only
//! failures to exchange the request; HTTP-like error statuses are ordinary
//! responses and are classified by the pipeline.

use std::collections::BTreeMap;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::resource::ResourcePath;

use super::operation::OperationKind;

/// Result of one exchange with the backend
pub type TransportResult = Result<TransportResponse, TransportError>;

/// Wire-level request
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub operation: OperationKind,
    pub path: ResourcePath,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl TransportRequest {
    pub fn new(operation: OperationKind, path: ResourcePath) -> Self {
        Self {
            operation,
            path,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_string(), value.into());
    }
}

/// Wire-level response
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl TransportResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status) || self.status == 304
    }

    /// Error message carried in the body, if any
    pub fn message(&self) -> String {
        self.body
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("status {}", self.status))
    }
}

/// Failure to exchange a request with the backend
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection refused, reset or otherwise broken
    #[error("connection failed: {0}")]
    Connection(String),

    /// No response within the request timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Backend boundary
pub trait Transport: Send + Sync {
    /// Exchange one request
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, TransportResult>;
}
