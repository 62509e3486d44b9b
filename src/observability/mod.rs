//! Observability for the client
//!
//! - Structured logging (JSON lines, quiet by default)
//! - Monotonic client counters
//!
//! ```ignore
//! use cosmos_sql::observability::{Logger, Severity};
//!
//! Logger::set_min_severity(Severity::Info);
//! Logger::info("REQUEST_COMPLETE", &[("status", "201")]);
//! ```

mod logger;
mod metrics;

pub use logger::{Logger, Severity};
pub use metrics::{ClientMetrics, MetricsSnapshot};
