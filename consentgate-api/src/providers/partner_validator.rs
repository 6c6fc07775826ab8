//! Partner registry client.
//!
//! `POST {base}/emd/tpp/list` with `{"tppIdList": [...]}`; the answer is a
//! JSON list of partner records.

use crate::config::ValidatorConfig;
use crate::constants::TPP_LIST_PATH;
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use consentgate_core::{PartnerId, PartnerStatus, UpstreamError};
use consentgate_storage::PartnerValidator;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct TppListRequest<'a> {
    #[serde(rename = "tppIdList")]
    tpp_id_list: &'a [PartnerId],
}

/// [`PartnerValidator`] backed by the partner registry HTTP API.
#[derive(Debug, Clone)]
pub struct HttpPartnerValidator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPartnerValidator {
    pub fn new(config: &ValidatorConfig) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::internal_error(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", config.base_url.trim_end_matches('/'), TPP_LIST_PATH),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PartnerValidator for HttpPartnerValidator {
    async fn validate(&self, partner_ids: &[PartnerId]) -> Result<Vec<PartnerStatus>, UpstreamError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&TppListRequest {
                tpp_id_list: partner_ids,
            })
            .send()
            .await
            .map_err(|e| UpstreamError::Validator {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(
                endpoint = %self.endpoint,
                status = %status,
                "Partner registry returned non-2xx status"
            );
            return Err(UpstreamError::ValidatorStatus {
                status: status.as_u16(),
                message,
            });
        }

        let statuses: Vec<PartnerStatus> =
            response.json().await.map_err(|e| UpstreamError::Validator {
                reason: format!("invalid partner registry response: {}", e),
            })?;

        tracing::debug!(
            requested = partner_ids.len(),
            returned = statuses.len(),
            "Partner registry answered"
        );
        Ok(statuses)
    }
}
