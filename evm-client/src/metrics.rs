//! Metrics hook trait (spec §4.13): a small observability surface with a
//! no-op default and a pluggable sink for real instrumentation.

use std::time::Duration;

use crate::ws::connection::ConnectionState;

pub trait MetricsHook: Send + Sync {
    fn on_request_started(&self, _method: &str) {}
    fn on_request_completed(&self, _method: &str, _latency: Duration) {}
    fn on_request_timeout(&self, _method: &str) {}
    fn on_backpressure(&self, _kind: &str) {}
    fn on_connection_state_change(&self, _from: ConnectionState, _to: ConnectionState) {}
    fn on_ring_buffer_saturation(&self, _fill_ratio: f64) {}
}

/// The default implementation: every hook is a no-op.
pub struct NoopMetrics;

impl MetricsHook for NoopMetrics {}

/// A `tracing`-backed implementation for callers who want the default
/// ambient logging stack without wiring their own metrics sink.
pub struct TracingMetrics;

impl MetricsHook for TracingMetrics {
    fn on_request_started(&self, method: &str) {
        tracing::debug!(method, "request started");
    }

    fn on_request_completed(&self, method: &str, latency: Duration) {
        tracing::debug!(method, latency_ms = latency.as_millis() as u64, "request completed");
    }

    fn on_request_timeout(&self, method: &str) {
        tracing::warn!(method, "request timed out");
    }

    fn on_backpressure(&self, kind: &str) {
        tracing::warn!(kind, "backpressure event");
    }

    fn on_connection_state_change(&self, from: ConnectionState, to: ConnectionState) {
        tracing::info!(?from, ?to, "connection state changed");
    }

    fn on_ring_buffer_saturation(&self, fill_ratio: f64) {
        tracing::warn!(fill_ratio, "ring buffer saturation");
    }
}
