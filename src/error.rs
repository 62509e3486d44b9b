//! # Client Errors
//!
//! Error taxonomy shared by the resolver, the request pipeline and the
//! query engine. Every failure carries its kind and, where one exists, the
//! originating status code so callers can decide to retry, treat the
//! failure as success, or abort.

use thiserror::Error;

/// Result type for client operations
pub type CosmosResult<T> = Result<T, CosmosError>;

/// Why a query parameter failed to bind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterFault {
    /// The query text references a placeholder with no bound value
    MissingBinding,
    /// A bound parameter is never referenced by the query text
    NotReferenced,
}

impl ParameterFault {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterFault::MissingBinding => "placeholder has no bound value",
            ParameterFault::NotReferenced => "bound parameter is not referenced",
        }
    }
}

/// Client errors
#[derive(Debug, Clone, Error)]
pub enum CosmosError {
    // ==================
    // Local Validation
    // ==================
    /// Empty id or id containing a disallowed character
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Placeholder and parameter bindings disagree
    #[error("Unbound parameter {name}: {}", .fault.as_str())]
    UnboundParameter { name: String, fault: ParameterFault },

    /// Query shape the engine cannot execute
    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    // ==================
    // Classified Responses
    // ==================
    /// Resource already exists
    #[error("Conflict ({status}): {message}")]
    Conflict { status: u16, message: String },

    /// 4xx application error
    #[error("Client error ({status}): {message}")]
    ClientError { status: u16, message: String },

    /// 5xx service fault
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Retryable failure: transport error, timeout or throttling
    #[error("Transient failure{}: {message}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Transient {
        status: Option<u16>,
        message: String,
    },

    /// Query was cancelled between or during page fetches
    #[error("Operation cancelled")]
    Cancelled,

    // ==================
    // Ambient
    // ==================
    /// Client configuration is invalid or missing
    #[error("Configuration error: {0}")]
    Config(String),

    /// Body could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CosmosError {
    pub fn invalid_identifier(msg: impl Into<String>) -> Self {
        Self::InvalidIdentifier(msg.into())
    }

    pub fn unsupported_query(msg: impl Into<String>) -> Self {
        Self::UnsupportedQuery(msg.into())
    }

    /// A 400 raised locally, e.g. a query that does not parse
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::ClientError {
            status: 400,
            message: msg.into(),
        }
    }

    pub fn transient(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Transient {
            status,
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Classify a non-success status returned by the backend.
    ///
    /// 409 always classifies as `Conflict`; whether it reaches the caller
    /// is decided by the pipeline's conflict policy.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            408 | 429 => Self::Transient {
                status: Some(status),
                message,
            },
            409 => Self::Conflict { status, message },
            400..=499 => Self::ClientError { status, message },
            500..=599 => Self::ServerError { status, message },
            _ => Self::ServerError { status, message },
        }
    }

    /// Originating status code, where one exists
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Conflict { status, .. }
            | Self::ClientError { status, .. }
            | Self::ServerError { status, .. } => Some(*status),
            Self::Transient { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether an external retry policy may reissue the operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Stable error code for logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "COSMOS_INVALID_IDENTIFIER",
            Self::UnboundParameter { .. } => "COSMOS_UNBOUND_PARAMETER",
            Self::UnsupportedQuery(_) => "COSMOS_UNSUPPORTED_QUERY",
            Self::Conflict { .. } => "COSMOS_CONFLICT",
            Self::ClientError { .. } => "COSMOS_CLIENT_ERROR",
            Self::ServerError { .. } => "COSMOS_SERVER_ERROR",
            Self::Transient { .. } => "COSMOS_TRANSIENT",
            Self::Cancelled => "COSMOS_CANCELLED",
            Self::Config(_) => "COSMOS_CONFIG",
            Self::Serialization(_) => "COSMOS_SERIALIZATION",
        }
    }
}

impl From<serde_json::Error> for CosmosError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            CosmosError::from_status(404, "missing"),
            CosmosError::ClientError { status: 404, .. }
        ));
        assert!(matches!(
            CosmosError::from_status(409, "exists"),
            CosmosError::Conflict { status: 409, .. }
        ));
        assert!(matches!(
            CosmosError::from_status(503, "down"),
            CosmosError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            CosmosError::from_status(429, "throttled"),
            CosmosError::Transient {
                status: Some(429),
                ..
            }
        ));
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(CosmosError::transient(None, "reset").is_retryable());
        assert!(!CosmosError::from_status(500, "boom").is_retryable());
        assert!(!CosmosError::Cancelled.is_retryable());
    }

    #[test]
    fn test_status_code_exposed() {
        assert_eq!(CosmosError::from_status(412, "etag").status_code(), Some(412));
        assert_eq!(CosmosError::transient(None, "reset").status_code(), None);
        assert_eq!(CosmosError::Cancelled.status_code(), None);
    }

    #[test]
    fn test_display_messages() {
        let err = CosmosError::UnboundParameter {
            name: "@id".to_string(),
            fault: ParameterFault::NotReferenced,
        };
        assert_eq!(
            err.to_string(),
            "Unbound parameter @id: bound parameter is not referenced"
        );
        assert_eq!(
            CosmosError::transient(Some(429), "slow down").to_string(),
            "Transient failure (429): slow down"
        );
        assert_eq!(
            CosmosError::transient(None, "reset").to_string(),
            "Transient failure: reset"
        );
    }
}
