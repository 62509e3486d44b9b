//! Resource property documents
//!
//! Wire shapes of databases and containers, including the read-only system
//! properties the service stamps on every resource.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// System-generated, read-only properties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemProperties {
    /// Resource id
    #[serde(rename = "_rid", default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,

    /// Last update, seconds since the epoch
    #[serde(rename = "_ts", default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,

    /// Addressable link
    #[serde(rename = "_self", default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,

    /// Etag for optimistic concurrency
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// Database properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseProperties {
    pub id: String,

    #[serde(flatten)]
    pub system: SystemProperties,
}

impl DatabaseProperties {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            system: SystemProperties::default(),
        }
    }
}

/// How a container derives partition keys from documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionKeyDefinition {
    /// Key paths; exactly one is supported
    pub paths: Vec<String>,

    #[serde(default = "default_partition_kind")]
    pub kind: String,
}

fn default_partition_kind() -> String {
    "Hash".to_string()
}

impl PartitionKeyDefinition {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            paths: vec![path.into()],
            kind: default_partition_kind(),
        }
    }

    /// The key path (`/tenant`)
    pub fn path(&self) -> &str {
        self.paths.first().map(String::as_str).unwrap_or("")
    }
}

/// Indexing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexingMode {
    #[default]
    Consistent,
    Lazy,
    None,
}

/// One included or excluded index path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexPath {
    pub path: String,
}

/// Indexing policy of a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingPolicy {
    #[serde(default = "default_automatic")]
    pub automatic: bool,

    #[serde(default)]
    pub indexing_mode: IndexingMode,

    #[serde(default)]
    pub included_paths: Vec<IndexPath>,

    #[serde(default)]
    pub excluded_paths: Vec<IndexPath>,
}

fn default_automatic() -> bool {
    true
}

impl Default for IndexingPolicy {
    fn default() -> Self {
        Self {
            automatic: true,
            indexing_mode: IndexingMode::Consistent,
            included_paths: vec![IndexPath {
                path: "/*".to_string(),
            }],
            excluded_paths: Vec::new(),
        }
    }
}

/// Container properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerProperties {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<PartitionKeyDefinition>,

    /// Absent: items never expire. `-1`: expiry on, no default. `n`: seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_ttl: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexing_policy: Option<IndexingPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_resolution_policy: Option<Value>,

    #[serde(flatten)]
    pub system: SystemProperties,
}

impl ContainerProperties {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            partition_key: None,
            default_ttl: None,
            indexing_policy: None,
            conflict_resolution_policy: None,
            system: SystemProperties::default(),
        }
    }

    pub fn with_partition_key(mut self, path: impl Into<String>) -> Self {
        self.partition_key = Some(PartitionKeyDefinition::new(path));
        self
    }

    pub fn with_default_ttl(mut self, seconds: i64) -> Self {
        self.default_ttl = Some(seconds);
        self
    }

    pub fn with_indexing_policy(mut self, policy: IndexingPolicy) -> Self {
        self.indexing_policy = Some(policy);
        self
    }

    pub fn with_conflict_resolution_policy(mut self, policy: Value) -> Self {
        self.conflict_resolution_policy = Some(policy);
        self
    }
}
