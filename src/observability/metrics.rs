//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_jobs_total` (counter): relay invocations by outcome
//! - `relay_job_duration_seconds` (histogram): end-to-end relay latency
//! - `relay_redirects_total` (counter): redirect hops followed
//! - `relay_address_rejections_total` (counter): guard rejections by phase
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until a
//!   recorder is installed
//! - The Prometheus exporter serves its own listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// How a relay invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// A response was relayed back.
    Completed,
    /// The target call failed; reported in the result body.
    Failed,
    /// The job itself was unusable.
    Rejected,
}

impl JobOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Failed => "failed",
            JobOutcome::Rejected => "rejected",
        }
    }
}

/// Install the Prometheus recorder and its HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_job(outcome: JobOutcome, start: Instant) {
    metrics::counter!("relay_jobs_total", "outcome" => outcome.as_str()).increment(1);
    metrics::histogram!("relay_job_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_redirect() {
    metrics::counter!("relay_redirects_total").increment(1);
}

/// `phase` is `pre_dial`, `post_dial` or `redirect`.
pub fn record_address_rejection(phase: &'static str) {
    metrics::counter!("relay_address_rejections_total", "phase" => phase).increment(1);
}
