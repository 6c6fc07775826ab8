//! Prometheus Metrics Definitions
//!
//! Gate decisions, lifecycle cycles and population throughput, exposed at
//! `GET /metrics` for scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, Encoder,
    HistogramVec, IntCounter, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// Population duration buckets (seconds), 100ms to 30min.
const POPULATION_DURATION_BUCKETS: &[f64] = &[
    0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<GateMetrics>> = Lazy::new(GateMetrics::new);

/// The registered metrics, or `None` if registration failed.
pub fn metrics() -> Option<&'static GateMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all gate metrics.
#[derive(Clone)]
pub struct GateMetrics {
    /// Existence checks - labels: outcome (miss, false_positive, no_active_partner, confirmed, error)
    pub gate_decisions_total: CounterVec,

    /// Lifecycle cycles - labels: trigger (startup, scheduled), outcome
    pub lifecycle_cycles_total: CounterVec,

    /// Identifiers that changed the membership structure during population
    pub population_ids_added_total: IntCounter,

    /// Population duration - labels: trigger
    pub population_duration_seconds: HistogramVec,
}

impl GateMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            gate_decisions_total: register_counter_vec!(
                "consentgate_gate_decisions_total",
                "Existence checks by outcome",
                &["outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register gate_decisions_total: {}", e)))?,

            lifecycle_cycles_total: register_counter_vec!(
                "consentgate_lifecycle_cycles_total",
                "Build cycles by trigger and outcome",
                &["trigger", "outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register lifecycle_cycles_total: {}", e)))?,

            population_ids_added_total: register_int_counter!(
                "consentgate_population_ids_added_total",
                "Identifiers that changed the membership structure during population"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register population_ids_added_total: {}", e)))?,

            population_duration_seconds: register_histogram_vec!(
                "consentgate_population_duration_seconds",
                "Population duration in seconds",
                &["trigger"],
                POPULATION_DURATION_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register population_duration_seconds: {}", e)))?,
        })
    }

    /// Record one existence check.
    pub fn record_decision(&self, outcome: &str) {
        self.gate_decisions_total.with_label_values(&[outcome]).inc();
    }

    /// Record the end of a lifecycle cycle.
    pub fn record_cycle(&self, trigger: &str, outcome: &str) {
        self.lifecycle_cycles_total
            .with_label_values(&[trigger, outcome])
            .inc();
    }

    /// Record a finished population run.
    pub fn record_population(&self, trigger: &str, added: u64, duration_secs: f64) {
        self.population_ids_added_total.inc_by(added);
        self.population_duration_seconds
            .with_label_values(&[trigger])
            .observe(duration_secs);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    // make sure gate metrics are registered even before the first event
    let _ = metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
