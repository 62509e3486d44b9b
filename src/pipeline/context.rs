//! Request Context
//!
//! Carried through the middleware chain alongside the request.

use std::time::Instant;

use uuid::Uuid;

/// Context for one exchange with the backend
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlates client logs with backend activity
    pub activity_id: Uuid,

    started_at: Instant,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            activity_id: Uuid::new_v4(),
            started_at: Instant::now(),
        }
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
