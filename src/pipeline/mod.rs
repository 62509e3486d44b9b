//! # Request Pipeline
//!
//! One logical operation at a time: a `Request` is resolved to a wire
//! request, passed through the middleware chain to the `Transport`, and the
//! outcome is classified into a typed response or a typed failure.
//!
//! ## Stages
//!
//! - id generation and body validation
//! - observability (logs, counters)
//! - session token capture and replay
//! - transport dispatch with the request timeout
//! - status classification and conflict policy

pub mod context;
pub mod headers;
pub mod middleware;
pub mod operation;
pub mod pipeline;
pub mod response;
pub mod transport;

pub use context::RequestContext;
pub use middleware::Middleware;
pub use operation::{ConflictPolicy, OperationKind, Request, RequestOptions};
pub use pipeline::{Next, RequestPipeline};
pub use response::{ResourceResponse, ResponseMetadata};
pub use transport::{Transport, TransportError, TransportRequest, TransportResponse, TransportResult};
