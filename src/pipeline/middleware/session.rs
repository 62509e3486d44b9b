//! Session Token Middleware
//!
//! Captures the session token returned by the backend and replays it on
//! later requests against the same container, giving read-your-writes
//! under `Session` consistency.

use std::collections::HashMap;
use std::sync::RwLock;

use futures_util::future::BoxFuture;

use crate::config::ConsistencyLevel;
use crate::pipeline::context::RequestContext;
use crate::pipeline::headers;
use crate::pipeline::pipeline::Next;
use crate::pipeline::transport::{TransportRequest, TransportResult};

use super::Middleware;

/// Session token middleware
pub struct SessionMiddleware {
    consistency: ConsistencyLevel,
    /// Latest token per container link
    tokens: RwLock<HashMap<String, String>>,
}

impl SessionMiddleware {
    pub fn new(consistency: ConsistencyLevel) -> Self {
        Self {
            consistency,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Token captured for a container link
    pub fn token_for(&self, container_link: &str) -> Option<String> {
        self.tokens
            .read()
            .ok()
            .and_then(|tokens| tokens.get(container_link).cloned())
    }
}

impl Middleware for SessionMiddleware {
    fn process<'a>(
        &'a self,
        mut request: TransportRequest,
        ctx: &'a RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, TransportResult> {
        Box::pin(async move {
            if self.consistency != ConsistencyLevel::Session {
                return next.run(request, ctx).await;
            }

            let container_link = request.path.container_path().map(|p| p.to_string());

            if let Some(link) = &container_link {
                if request.header(headers::SESSION_TOKEN).is_none() {
                    if let Some(token) = self.token_for(link) {
                        request.set_header(headers::SESSION_TOKEN, token);
                    }
                }
            }

            let result = next.run(request, ctx).await;

            if let (Some(link), Ok(response)) = (container_link, &result) {
                if let Some(token) = response.header(headers::SESSION_TOKEN) {
                    if let Ok(mut tokens) = self.tokens.write() {
                        tokens.insert(link, token.to_string());
                    }
                }
            }

            result
        })
    }
}
