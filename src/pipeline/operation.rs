//! Logical Operation Model
//!
//! Every call the client makes is one `Request`: an operation kind, a
//! resolved path, an optional body and per-call options.

use serde_json::Value;

use crate::resource::{PartitionKey, ResourcePath};

/// Operation kinds understood by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Read,
    Upsert,
    /// Replace an item or a resource's properties
    Replace,
    Delete,
    /// One page of a query or feed
    Query,
    ReadPartitionKeyRanges,
}

impl OperationKind {
    /// Operation name for logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Upsert => "upsert",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::Query => "query",
            Self::ReadPartitionKeyRanges => "read_pkranges",
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::Create | Self::Upsert | Self::Replace | Self::Delete
        )
    }
}

/// What to do when a create collides with an existing resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Surface `Conflict`
    #[default]
    Fail,
    /// Read and return the existing resource (get-or-create)
    ReturnExisting,
}

impl ConflictPolicy {
    pub fn from_fail_if_exists(fail_if_exists: bool) -> Self {
        if fail_if_exists {
            Self::Fail
        } else {
            Self::ReturnExisting
        }
    }
}

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub conflict_policy: ConflictPolicy,

    /// Only apply the write if the resource etag still matches
    pub if_match: Option<String>,

    /// Routing key for item operations and single-partition queries
    pub partition_key: Option<PartitionKey>,

    /// Target one physical partition
    pub partition_key_range_id: Option<String>,

    /// Resume a paged feed
    pub continuation: Option<String>,

    /// Page size override
    pub max_item_count: Option<usize>,

    /// Allow an unscoped query to span partitions
    pub enable_cross_partition_query: bool,

    /// Explicit session token; otherwise the captured one is used
    pub session_token: Option<String>,

    /// Leave documents without `id` untouched
    pub disable_automatic_id_generation: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_partition_key(mut self, key: PartitionKey) -> Self {
        self.partition_key = Some(key);
        self
    }

    pub fn with_if_match(mut self, etag: impl Into<String>) -> Self {
        self.if_match = Some(etag.into());
        self
    }
}

/// A logical request against one resource path
#[derive(Debug, Clone)]
pub struct Request {
    pub operation: OperationKind,
    pub path: ResourcePath,
    pub body: Option<Value>,
    pub options: RequestOptions,
}

impl Request {
    pub fn new(operation: OperationKind, path: ResourcePath) -> Self {
        Self {
            operation,
            path,
            body: None,
            options: RequestOptions::default(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn read(path: ResourcePath) -> Self {
        Self::new(OperationKind::Read, path)
    }

    pub fn delete(path: ResourcePath) -> Self {
        Self::new(OperationKind::Delete, path)
    }
}
