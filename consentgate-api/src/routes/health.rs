//! Health Check Endpoints
//!
//! - /health/ping - pong
//! - /health/live - the process answers
//! - /health/ready - state of the shared bloom filter
//!
//! Readiness stays 200 while the filter is absent or still being populated:
//! the citizen check skips the fast reject in those states but still answers
//! correctly. Only an unreachable store is a 503.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use consentgate_storage::MembershipStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Lifecycle state of the shared filter as seen from this replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterState {
    Ready,
    Building,
    Absent,
    Unreachable,
}

impl FilterState {
    fn health(self) -> HealthStatus {
        match self {
            FilterState::Ready => HealthStatus::Healthy,
            FilterState::Building | FilterState::Absent => HealthStatus::Degraded,
            FilterState::Unreachable => HealthStatus::Unhealthy,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub status: HealthStatus,
    pub filter: FilterState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

async fn ping() -> &'static str {
    "pong"
}

async fn liveness() -> StatusCode {
    StatusCode::OK
}

async fn readiness(
    State(membership): State<Arc<dyn MembershipStore>>,
    State(start_time): State<Instant>,
) -> impl IntoResponse {
    let (filter, error) = match filter_state(membership.as_ref()).await {
        Ok(filter) => (filter, None),
        Err(e) => (FilterState::Unreachable, Some(e)),
    };
    let status = filter.health();

    let code = if status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let response = ReadinessResponse {
        status,
        filter,
        error,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: start_time.elapsed().as_secs(),
    };
    (code, Json(response))
}

async fn filter_state(store: &dyn MembershipStore) -> Result<FilterState, String> {
    let err = |e: consentgate_core::StoreError| e.to_string();
    if store.is_ready().await.map_err(err)? {
        return Ok(FilterState::Ready);
    }
    if store.exists().await.map_err(err)? {
        Ok(FilterState::Building)
    } else {
        Ok(FilterState::Absent)
    }
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}
