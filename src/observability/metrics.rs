//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_auth_failures_total` (counter): by reason
//! - `gateway_rate_limited_total` (counter): rejected by the limiter
//! - `gateway_rate_limit_fail_open_total` (counter): admitted because the
//!   counter store was unreachable
//! - `gateway_input_rejected_total` (counter): by sanitizer check
//! - `gateway_upstream_attempts_total` (counter): by operation and outcome
//! - `gateway_circuit_state` (gauge): 0 closed, 1 open, 2 half-open
//! - `gateway_fallbacks_total` (counter): fallback recaps by error class
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed, so tests need no setup
//! - Labels never carry caller input

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

use crate::resilience::CircuitState;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "gateway_request_duration_seconds",
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_auth_failure(reason: &'static str) {
    metrics::counter!("gateway_auth_failures_total", "reason" => reason).increment(1);
}

pub fn record_rate_limited(reason: &'static str) {
    metrics::counter!("gateway_rate_limited_total", "reason" => reason).increment(1);
}

pub fn record_rate_limit_fail_open() {
    metrics::counter!("gateway_rate_limit_fail_open_total").increment(1);
}

pub fn record_input_rejected(check: &'static str) {
    metrics::counter!("gateway_input_rejected_total", "check" => check).increment(1);
}

pub fn record_upstream_attempt(operation: &str, outcome: &'static str) {
    metrics::counter!(
        "gateway_upstream_attempts_total",
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_circuit_state(breaker: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::Open => 1.0,
        CircuitState::HalfOpen => 2.0,
    };
    metrics::gauge!("gateway_circuit_state", "breaker" => breaker.to_string()).set(value);
}

pub fn record_fallback(reason: &'static str) {
    metrics::counter!("gateway_fallbacks_total", "reason" => reason).increment(1);
}
