//! Observability for cluster inspections
//!
//! Provides:
//! - Prometheus metrics (inspection outcomes, latency, in-flight count, release fetch errors)
//! - Structured logging of batch-level events with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge, Histogram,
    IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::info;

/// Histogram buckets for per-cluster inspection latency (in seconds)
const INSPECTION_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<InspectionMetricsInner> = OnceLock::new();

struct InspectionMetricsInner {
    inspections_total: IntCounterVec,
    inspection_duration_seconds: Histogram,
    inspections_in_flight: IntGauge,
    release_fetch_errors: IntCounter,
}

impl InspectionMetricsInner {
    fn new() -> Self {
        Self {
            inspections_total: register_int_counter_vec!(
                "karpx_inspections_total",
                "Cluster inspections by terminal outcome",
                &["outcome"]
            )
            .expect("Failed to register inspections_total"),

            inspection_duration_seconds: register_histogram!(
                "karpx_inspection_duration_seconds",
                "Time spent inspecting one cluster",
                INSPECTION_BUCKETS.to_vec()
            )
            .expect("Failed to register inspection_duration_seconds"),

            inspections_in_flight: register_int_gauge!(
                "karpx_inspections_in_flight",
                "Cluster inspections currently holding a concurrency permit"
            )
            .expect("Failed to register inspections_in_flight"),

            release_fetch_errors: register_int_counter!(
                "karpx_release_fetch_errors_total",
                "Failed fetches of the controller release index"
            )
            .expect("Failed to register release_fetch_errors"),
        }
    }
}

/// Handle to the process-wide inspection metrics.
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct InspectionMetrics {
    _private: (),
}

impl Default for InspectionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl InspectionMetrics {
    /// Create a metrics handle (registers the metrics on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(InspectionMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &InspectionMetricsInner {
        GLOBAL_METRICS.get_or_init(InspectionMetricsInner::new)
    }

    /// Record a finished inspection with its terminal outcome (`done` or `error`)
    pub fn observe_inspection(&self, outcome: &str, elapsed: Duration) {
        let inner = self.inner();
        inner.inspections_total.with_label_values(&[outcome]).inc();
        inner.inspection_duration_seconds.observe(elapsed.as_secs_f64());
    }

    /// Count one inspection as in flight until the guard is dropped.
    /// Aborted tasks drop their guard too.
    pub fn track_in_flight(&self) -> InFlightGuard {
        let gauge = self.inner().inspections_in_flight.clone();
        gauge.inc();
        InFlightGuard { gauge }
    }

    pub fn in_flight(&self) -> i64 {
        self.inner().inspections_in_flight.get()
    }

    pub fn inc_release_fetch_errors(&self) {
        self.inner().release_fetch_errors.inc();
    }

    /// Total inspections recorded with the given outcome
    pub fn inspections(&self, outcome: &str) -> u64 {
        self.inner().inspections_total.with_label_values(&[outcome]).get()
    }

    pub fn release_fetch_errors(&self) -> u64 {
        self.inner().release_fetch_errors.get()
    }
}

/// Decrements the in-flight gauge on drop
pub struct InFlightGuard {
    gauge: IntGauge,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

/// Log the start of an inspection batch
pub fn log_batch_started(clusters: usize, max_in_flight: usize) {
    info!(
        event = "inspection_batch_started",
        clusters = clusters,
        max_in_flight = max_in_flight,
        "Inspecting clusters"
    );
}

/// Log the end of an inspection batch
pub fn log_batch_finished(clusters: usize, failed: usize, elapsed: Duration) {
    info!(
        event = "inspection_batch_finished",
        clusters = clusters,
        failed = failed,
        elapsed_ms = elapsed.as_millis() as u64,
        "Cluster inspection finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_share_metrics() {
        let first = InspectionMetrics::new();
        let second = first.clone();

        let before = first.inspections("done");
        second.observe_inspection("done", Duration::from_millis(20));
        assert!(first.inspections("done") > before);

        let errors = first.release_fetch_errors();
        InspectionMetrics::default().inc_release_fetch_errors();
        assert!(second.release_fetch_errors() > errors);
    }
}
