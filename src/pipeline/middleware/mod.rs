//! Middleware Traits and Implementations
//!
//! Stages that wrap every exchange with the backend.

use futures_util::future::BoxFuture;

use super::context::RequestContext;
use super::pipeline::Next;
use super::transport::{TransportRequest, TransportResult};

/// Middleware trait for pipeline stages
pub trait Middleware: Send + Sync {
    /// Process the request, optionally modifying it, then call `next`
    fn process<'a>(
        &'a self,
        request: TransportRequest,
        ctx: &'a RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, TransportResult>;
}

pub mod observe;
pub mod session;
