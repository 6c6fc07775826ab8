//! consentgate API - Existence Gate Service
//!
//! Answers "does this citizen have at least one enabled channel?" behind a
//! shared Bloom filter. A filter miss answers immediately; a hit is
//! confirmed against the consent store and the partner registry.
//!
//! Background jobs build the filter at startup and rebuild it daily, one
//! replica at a time under a lease.

pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
pub mod macros;
pub mod providers;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub use config::{resolve_bind_addr, ServiceConfig, StoreBackend, ValidatorConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{
    rebuild_scheduler_task, CycleOutcome, CycleTrigger, LifecycleCoordinator, PopulationPipeline,
    PopulationReport,
};
pub use providers::HttpPartnerValidator;
pub use services::{ExistenceGate, GateDecision, MembershipGate};
pub use state::AppState;

/// Build the full HTTP router.
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::citizen_router())
        .nest("/health", routes::health_router())
        .with_state(state)
        .route("/metrics", get(telemetry::metrics_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
