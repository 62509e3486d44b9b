//! Client Configuration
//!
//! Account endpoint, credential and connection policy. Supplied once at
//! client construction and immutable afterwards.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CosmosError, CosmosResult};

/// Environment variable holding the account endpoint
pub const ENV_ACCOUNT_HOST: &str = "ACCOUNT_HOST";
/// Alternate name some samples use for the endpoint
pub const ENV_ACCOUNT_URI: &str = "ACCOUNT_URI";
/// Environment variable holding the account key
pub const ENV_ACCOUNT_KEY: &str = "ACCOUNT_KEY";

/// Local emulator endpoint
pub const EMULATOR_ENDPOINT: &str = "https://localhost:8081/";
/// Well-known local emulator key
pub const EMULATOR_KEY: &str =
    "C2y6yDjf5/R+ob0N8A7Cgv30VRDJIWEHLM+4QDU5DE2nQ9nDuVTqobD4b8mGGyPMbIZnqyMsEcaGQy67XIw/Jw==";

/// Consistency level requested for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConsistencyLevel {
    Strong,
    BoundedStaleness,
    #[default]
    Session,
    ConsistentPrefix,
    Eventual,
}

impl ConsistencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLevel::Strong => "Strong",
            ConsistencyLevel::BoundedStaleness => "BoundedStaleness",
            ConsistencyLevel::Session => "Session",
            ConsistencyLevel::ConsistentPrefix => "ConsistentPrefix",
            ConsistencyLevel::Eventual => "Eventual",
        }
    }
}

/// Per-connection behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionPolicy {
    /// Page size requested for feeds and queries (default: 100)
    #[serde(default = "default_max_item_count")]
    pub max_item_count: usize,

    /// Per-request timeout in milliseconds (default: 60000)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_max_item_count() -> usize {
    100
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            max_item_count: default_max_item_count(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ConnectionPolicy {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Client configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Account endpoint, e.g. `https://myaccount.documents.azure.com:443/`
    pub endpoint: String,

    /// Account key
    pub key: String,

    #[serde(default)]
    pub consistency_level: ConsistencyLevel,

    #[serde(default)]
    pub connection_policy: ConnectionPolicy,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("key", &"<redacted>")
            .field("consistency_level", &self.consistency_level)
            .field("connection_policy", &self.connection_policy)
            .finish()
    }
}

impl ClientConfig {
    /// Create a config with default consistency and connection policy
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            key: key.into(),
            consistency_level: ConsistencyLevel::default(),
            connection_policy: ConnectionPolicy::default(),
        }
    }

    /// Config pointing at the local emulator
    pub fn emulator() -> Self {
        Self::new(EMULATOR_ENDPOINT, EMULATOR_KEY)
    }

    pub fn with_consistency_level(mut self, level: ConsistencyLevel) -> Self {
        self.consistency_level = level;
        self
    }

    pub fn with_connection_policy(mut self, policy: ConnectionPolicy) -> Self {
        self.connection_policy = policy;
        self
    }

    /// Load from `ACCOUNT_HOST` (or `ACCOUNT_URI`) and `ACCOUNT_KEY`
    pub fn from_env() -> CosmosResult<Self> {
        let endpoint = std::env::var(ENV_ACCOUNT_HOST)
            .or_else(|_| std::env::var(ENV_ACCOUNT_URI))
            .map_err(|_| {
                CosmosError::config(format!(
                    "{} or {} must be set",
                    ENV_ACCOUNT_HOST, ENV_ACCOUNT_URI
                ))
            })?;
        let key = std::env::var(ENV_ACCOUNT_KEY)
            .map_err(|_| CosmosError::config(format!("{} must be set", ENV_ACCOUNT_KEY)))?;

        let config = Self::new(endpoint, key);
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> CosmosResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CosmosError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            CosmosError::config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no request could succeed with
    pub fn validate(&self) -> CosmosResult<()> {
        if !(self.endpoint.starts_with("https://") || self.endpoint.starts_with("http://")) {
            return Err(CosmosError::config(format!(
                "endpoint must be an http(s) URI: {}",
                self.endpoint
            )));
        }
        if self.key.is_empty() {
            return Err(CosmosError::config("account key cannot be empty"));
        }
        if self.connection_policy.max_item_count == 0 {
            return Err(CosmosError::config("max_item_count must be at least 1"));
        }
        if self.connection_policy.request_timeout_ms == 0 {
            return Err(CosmosError::config("request_timeout_ms must be at least 1"));
        }
        Ok(())
    }
}
