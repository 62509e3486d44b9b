//! Observability Middleware
//!
//! Structured log line and counters for every exchange with the backend.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::observability::{ClientMetrics, Logger, Severity};
use crate::pipeline::context::RequestContext;
use crate::pipeline::headers;
use crate::pipeline::pipeline::Next;
use crate::pipeline::transport::{TransportRequest, TransportResult};

use super::Middleware;

/// Observability middleware
pub struct ObserveMiddleware {
    metrics: Arc<ClientMetrics>,
}

impl ObserveMiddleware {
    pub fn new(metrics: Arc<ClientMetrics>) -> Self {
        Self { metrics }
    }
}

impl Middleware for ObserveMiddleware {
    fn process<'a>(
        &'a self,
        request: TransportRequest,
        ctx: &'a RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, TransportResult> {
        Box::pin(async move {
            let op_name = request.operation.name();
            let path = request.path.to_string();

            self.metrics.increment_requests_sent();
            let result = next.run(request, ctx).await;

            let elapsed = ctx.elapsed_ms().to_string();
            let activity_id = ctx.activity_id.to_string();

            match &result {
                Ok(response) => {
                    if let Some(charge) = response
                        .header(headers::REQUEST_CHARGE)
                        .and_then(|v| v.parse::<f64>().ok())
                    {
                        self.metrics.add_request_charge(charge);
                    }

                    let severity = match response.status {
                        409 => {
                            self.metrics.increment_conflicts();
                            Severity::Warn
                        }
                        408 | 429 => {
                            self.metrics.increment_transient_failures();
                            Severity::Warn
                        }
                        _ if response.is_success() => Severity::Trace,
                        _ => Severity::Warn,
                    };
                    if !response.is_success() {
                        self.metrics.increment_requests_failed();
                    }

                    let status = response.status.to_string();
                    Logger::log(
                        severity,
                        "REQUEST_COMPLETE",
                        &[
                            ("activity_id", &activity_id),
                            ("duration_ms", &elapsed),
                            ("operation", op_name),
                            ("path", &path),
                            ("status", &status),
                        ],
                    );
                }
                Err(e) => {
                    self.metrics.increment_requests_failed();
                    self.metrics.increment_transient_failures();
                    let message = e.to_string();
                    Logger::error(
                        "REQUEST_FAILED",
                        &[
                            ("activity_id", &activity_id),
                            ("duration_ms", &elapsed),
                            ("error", &message),
                            ("operation", op_name),
                            ("path", &path),
                        ],
                    );
                }
            }

            result
        })
    }
}
