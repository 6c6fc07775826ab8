//! Telemetry - structured logging and Prometheus metrics.

pub mod metrics;
pub mod tracer;

pub use metrics::{metrics, metrics_handler, GateMetrics, METRICS};
pub use tracer::init_tracing;
