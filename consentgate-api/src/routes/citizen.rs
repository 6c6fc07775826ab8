//! Citizen existence check.
//!
//! `GET /emd/citizen/filter/{fiscalCode}` answers `200 "OK"` when the citizen
//! has at least one enabled channel and `200 "NO CHANNELS ENABLED"`
//! otherwise.

use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use consentgate_core::{hash_for_log, is_valid_fiscal_code};
use std::sync::Arc;

use crate::constants::{BODY_CHANNELS_ENABLED, BODY_NO_CHANNELS_ENABLED};
use crate::error::{ApiError, ApiResult};
use crate::services::ExistenceGate;
use crate::state::AppState;

/// GET /emd/citizen/filter/{fiscalCode}
pub async fn filter_citizen(
    State(gate): State<Arc<ExistenceGate>>,
    Path(fiscal_code): Path<String>,
) -> ApiResult<&'static str> {
    if !is_valid_fiscal_code(&fiscal_code) {
        return Err(ApiError::invalid_format("fiscalCode", "an Italian fiscal code"));
    }

    let present = gate.check(&fiscal_code).await.map_err(|e| {
        tracing::warn!(subject = %hash_for_log(&fiscal_code), error = %e, "Existence check failed");
        ApiError::from(e)
    })?;

    Ok(if present {
        BODY_CHANNELS_ENABLED
    } else {
        BODY_NO_CHANNELS_ENABLED
    })
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/emd/citizen/filter/:fiscal_code", get(filter_citizen))
}
