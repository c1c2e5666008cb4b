//! Observability infrastructure for the task endpoint server
//!
//! Provides:
//! - Prometheus metrics (request counts and latency, rate limiting, credentials outcomes)
//! - Structured JSON logging of lifecycle events with tracing

use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::info;

/// Histogram buckets for request latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EndpointMetricsInner> = OnceLock::new();

struct EndpointMetricsInner {
    requests: IntCounterVec,
    request_latency_seconds: HistogramVec,
    rate_limited: IntCounter,
    credentials_lookups: IntCounterVec,
    tag_fetch_failures: IntCounter,
    stats_skipped: IntCounter,
    audit_failures: IntCounter,
}

impl EndpointMetricsInner {
    fn new() -> Self {
        Self {
            requests: register_int_counter_vec!(
                "task_endpoint_requests_total",
                "Requests served by the task endpoint server",
                &["version", "endpoint", "status"]
            )
            .expect("Failed to register requests_total"),

            request_latency_seconds: register_histogram_vec!(
                "task_endpoint_request_latency_seconds",
                "Time spent handling a task endpoint request",
                &["version", "endpoint"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register request_latency_seconds"),

            rate_limited: register_int_counter!(
                "task_endpoint_rate_limited_total",
                "Requests rejected by the rate limiter"
            )
            .expect("Failed to register rate_limited_total"),

            credentials_lookups: register_int_counter_vec!(
                "task_endpoint_credentials_lookups_total",
                "Credentials lookups by outcome",
                &["outcome"]
            )
            .expect("Failed to register credentials_lookups_total"),

            tag_fetch_failures: register_int_counter!(
                "task_endpoint_tag_fetch_failures_total",
                "Resource tag fetches that failed or timed out"
            )
            .expect("Failed to register tag_fetch_failures_total"),

            stats_skipped: register_int_counter!(
                "task_endpoint_stats_skipped_total",
                "Containers left out of task stats for lack of a sample"
            )
            .expect("Failed to register stats_skipped_total"),

            audit_failures: register_int_counter!(
                "task_endpoint_audit_failures_total",
                "Audit entries that could not be recorded"
            )
            .expect("Failed to register audit_failures_total"),
        }
    }
}

/// Handle to the process-wide endpoint metrics.
///
/// Clones share the same underlying Prometheus collectors.
#[derive(Clone)]
pub struct EndpointMetrics {
    _private: (),
}

impl Default for EndpointMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EndpointMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EndpointMetricsInner {
        GLOBAL_METRICS.get_or_init(EndpointMetricsInner::new)
    }

    pub fn observe_request(&self, version: &str, endpoint: &str, status: u16, duration_secs: f64) {
        let inner = self.inner();
        inner
            .requests
            .with_label_values(&[version, endpoint, &status.to_string()])
            .inc();
        inner
            .request_latency_seconds
            .with_label_values(&[version, endpoint])
            .observe(duration_secs);
    }

    pub fn inc_rate_limited(&self) {
        self.inner().rate_limited.inc();
    }

    pub fn inc_credentials_lookup(&self, outcome: &str) {
        self.inner()
            .credentials_lookups
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn inc_tag_fetch_failures(&self) {
        self.inner().tag_fetch_failures.inc();
    }

    pub fn inc_stats_skipped(&self) {
        self.inner().stats_skipped.inc();
    }

    pub fn inc_audit_failures(&self) {
        self.inner().audit_failures.inc();
    }
}

/// Structured logger for server lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    cluster: String,
    container_instance_arn: String,
}

impl StructuredLogger {
    pub fn new(cluster: impl Into<String>, container_instance_arn: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            container_instance_arn: container_instance_arn.into(),
        }
    }

    pub fn log_startup(&self, version: &str, addr: &str, steady_state_rate: f64, burst: u32) {
        info!(
            event = "endpoint_started",
            cluster = %self.cluster,
            container_instance_arn = %self.container_instance_arn,
            agent_version = %version,
            addr = %addr,
            steady_state_rate = steady_state_rate,
            burst = burst,
            "Task endpoint server started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "endpoint_shutdown",
            cluster = %self.cluster,
            container_instance_arn = %self.container_instance_arn,
            reason = %reason,
            "Task endpoint server shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_metrics_are_gathered() {
        let metrics = EndpointMetrics::new();
        metrics.observe_request("v3", "task_metadata", 200, 0.002);
        metrics.inc_rate_limited();
        metrics.inc_credentials_lookup("ok");

        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"task_endpoint_requests_total".to_string()));
        assert!(names.contains(&"task_endpoint_rate_limited_total".to_string()));
        assert!(names.contains(&"task_endpoint_credentials_lookups_total".to_string()));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("default", "ci");
        assert_eq!(logger.cluster, "default");
        assert_eq!(logger.container_instance_arn, "ci");
    }
}
