//! Client-side counters
//!
//! - Counters only, monotonic
//! - Shared by every handle derived from one client
//! - Thread-safe, Relaxed ordering

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters for one client
#[derive(Debug, Default)]
pub struct ClientMetrics {
    /// Requests handed to the transport
    requests_sent: AtomicU64,
    /// Requests that ended in a classified failure
    requests_failed: AtomicU64,
    /// 409 responses, absorbed or surfaced
    conflicts: AtomicU64,
    /// 408/429 responses and transport failures
    transient_failures: AtomicU64,
    /// Request charge in hundredths of a unit
    request_charge_centi: AtomicU64,
    /// Query pages received
    pages_fetched: AtomicU64,
    /// Documents yielded by query cursors
    documents_returned: AtomicU64,
    /// Query cursors cancelled
    queries_cancelled: AtomicU64,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_requests_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_requests_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_conflicts(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transient_failures(&self) {
        self.transient_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Add a request charge reported by the backend
    pub fn add_request_charge(&self, charge: f64) {
        if charge.is_finite() && charge > 0.0 {
            let centi = (charge * 100.0).round() as u64;
            self.request_charge_centi.fetch_add(centi, Ordering::Relaxed);
        }
    }

    pub fn increment_pages_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_documents_returned(&self, count: u64) {
        self.documents_returned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_queries_cancelled(&self) {
        self.queries_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all counters as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
            request_charge: self.request_charge_centi.load(Ordering::Relaxed) as f64 / 100.0,
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            documents_returned: self.documents_returned.load(Ordering::Relaxed),
            queries_cancelled: self.queries_cancelled.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the counters
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub requests_sent: u64,
    pub requests_failed: u64,
    pub conflicts: u64,
    pub transient_failures: u64,
    pub request_charge: f64,
    pub pages_fetched: u64,
    pub documents_returned: u64,
    pub queries_cancelled: u64,
}
