//! Observability infrastructure for the forwarder
//!
//! Provides:
//! - Prometheus metrics (forward counts, discovery latency, window fallbacks)
//! - Structured logging of lifecycle events with tracing

use crate::models::{ForwardSession, SessionId};
use prometheus::{register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for cluster query latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ForwarderMetricsInner> = OnceLock::new();

struct ForwarderMetricsInner {
    forwards_started: IntCounter,
    forwards_active: IntGauge,
    forward_exits: IntCounter,
    discovery_latency_seconds: Histogram,
    discovery_errors: IntCounter,
    log_window_fallbacks: IntCounter,
}

impl ForwarderMetricsInner {
    fn new() -> Self {
        Self {
            forwards_started: register_int_counter!(
                "kpf_forwards_started_total",
                "Total number of port-forward processes started"
            )
            .expect("Failed to register forwards_started"),

            forwards_active: register_int_gauge!(
                "kpf_forwards_active",
                "Number of port-forward processes currently registered"
            )
            .expect("Failed to register forwards_active"),

            forward_exits: register_int_counter!(
                "kpf_forward_exits_total",
                "Total number of port-forward processes that exited"
            )
            .expect("Failed to register forward_exits"),

            discovery_latency_seconds: register_histogram!(
                "kpf_discovery_latency_seconds",
                "Time spent listing and parsing pods",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register discovery_latency_seconds"),

            discovery_errors: register_int_counter!(
                "kpf_discovery_errors_total",
                "Total number of failed cluster queries"
            )
            .expect("Failed to register discovery_errors"),

            log_window_fallbacks: register_int_counter!(
                "kpf_log_window_fallbacks_total",
                "Log windows that fell back to a headless background process"
            )
            .expect("Failed to register log_window_fallbacks"),
        }
    }
}

/// Forwarder metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct ForwarderMetrics {
    _private: (),
}

impl Default for ForwarderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ForwarderMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ForwarderMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ForwarderMetricsInner {
        GLOBAL_METRICS.get_or_init(ForwarderMetricsInner::new)
    }

    pub fn inc_forwards_started(&self) {
        self.inner().forwards_started.inc();
    }

    pub fn set_forwards_active(&self, count: i64) {
        self.inner().forwards_active.set(count);
    }

    pub fn inc_forward_exits(&self) {
        self.inner().forward_exits.inc();
    }

    pub fn observe_discovery_latency(&self, duration_secs: f64) {
        self.inner().discovery_latency_seconds.observe(duration_secs);
    }

    pub fn inc_discovery_errors(&self) {
        self.inner().discovery_errors.inc();
    }

    pub fn inc_log_window_fallbacks(&self) {
        self.inner().log_window_fallbacks.inc();
    }
}

/// Structured logger for forwarder lifecycle events
#[derive(Clone, Default)]
pub struct StructuredLogger {
    _private: (),
}

impl StructuredLogger {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Log server startup
    pub fn log_startup(&self, version: &str, kubectl: &str) {
        info!(
            event = "server_started",
            version = %version,
            kubectl = %kubectl,
            "Port-forward server started"
        );
    }

    /// Log server shutdown
    pub fn log_shutdown(&self, reason: &str, stopped: usize) {
        info!(
            event = "server_shutdown",
            reason = %reason,
            stopped = stopped,
            "Port-forward server shutting down"
        );
    }

    pub fn log_forward_started(&self, id: SessionId, session: &ForwardSession, pid: Option<u32>) {
        info!(
            event = "forward_started",
            session = %id,
            label = %session.label,
            namespace = %session.namespace,
            pod = %session.pod_name,
            local_port = session.local_port,
            remote_port = session.remote_port,
            pid = ?pid,
            "Port-forward started"
        );
    }

    /// Log a forward process exit; unexpected exits are warnings
    pub fn log_forward_exited(&self, id: SessionId, label: &str, code: Option<i32>, unexpected: bool) {
        if unexpected {
            warn!(
                event = "forward_exited",
                session = %id,
                label = %label,
                exit_code = ?code,
                "Port-forward exited"
            );
        } else {
            info!(
                event = "forward_exited",
                session = %id,
                label = %label,
                exit_code = ?code,
                "Port-forward exited after stop"
            );
        }
    }

    pub fn log_forwards_stopped(&self, count: usize, forced: usize) {
        info!(
            event = "forwards_stopped",
            count = count,
            forced = forced,
            "Stopped port-forward processes"
        );
    }

    pub fn log_discovery_failed(&self, namespace: Option<&str>, error: &str) {
        warn!(
            event = "discovery_failed",
            namespace = ?namespace,
            error = %error,
            "Cluster query failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarder_metrics_creation() {
        // Metrics live in the global Prometheus registry; repeated handles
        // share them.
        let metrics = ForwarderMetrics::new();
        let other = ForwarderMetrics::new();

        metrics.inc_forwards_started();
        other.set_forwards_active(2);
        metrics.inc_forward_exits();
        metrics.observe_discovery_latency(0.2);
        metrics.inc_discovery_errors();
        metrics.inc_log_window_fallbacks();

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "kpf_forwards_started_total"));
    }
}
