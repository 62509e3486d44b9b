//! Typed responses
//!
//! A successful operation yields the resulting resource plus the metadata
//! the backend returned alongside it.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CosmosResult;

use super::headers;
use super::transport::TransportResponse;

/// Metadata returned with every successful response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMetadata {
    pub status: u16,
    pub activity_id: Option<String>,
    pub request_charge: f64,
    pub session_token: Option<String>,
    pub etag: Option<String>,
    pub continuation: Option<String>,
    pub item_count: Option<usize>,
    /// Id assigned client-side because the caller omitted one
    pub generated_id: Option<String>,
    /// All response headers
    pub headers: BTreeMap<String, String>,
}

impl ResponseMetadata {
    pub fn from_transport(response: &TransportResponse) -> Self {
        Self {
            status: response.status,
            activity_id: response.header(headers::ACTIVITY_ID).map(str::to_string),
            request_charge: response
                .header(headers::REQUEST_CHARGE)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.0),
            session_token: response.header(headers::SESSION_TOKEN).map(str::to_string),
            etag: response.header(headers::ETAG).map(str::to_string),
            continuation: response.header(headers::CONTINUATION).map(str::to_string),
            item_count: response
                .header(headers::ITEM_COUNT)
                .and_then(|v| v.parse().ok()),
            generated_id: None,
            headers: response.headers.clone(),
        }
    }
}

/// A resource plus response metadata
#[derive(Debug, Clone)]
pub struct ResourceResponse {
    pub resource: Value,
    pub metadata: ResponseMetadata,
}

impl ResourceResponse {
    pub fn new(resource: Value, metadata: ResponseMetadata) -> Self {
        Self { resource, metadata }
    }

    /// The resource's `id`, if it has one
    pub fn id(&self) -> Option<&str> {
        self.resource.get("id").and_then(Value::as_str)
    }

    pub fn into_resource(self) -> Value {
        self.resource
    }

    /// Decode the resource into a typed shape
    pub fn deserialize<T: DeserializeOwned>(&self) -> CosmosResult<T> {
        Ok(serde_json::from_value(self.resource.clone())?)
    }
}
