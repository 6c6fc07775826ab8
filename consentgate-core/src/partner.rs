//! Partner status as reported by the partner registry.

use crate::PartnerId;
use serde::{Deserialize, Serialize};

/// One entry of the validator's answer. Only `partner_id` and `active` drive
/// gate decisions; the rest is carried for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerStatus {
    #[serde(rename = "tppId")]
    pub partner_id: PartnerId,

    #[serde(rename = "state", default)]
    pub active: bool,

    #[serde(rename = "entityId", default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    #[serde(rename = "businessName", default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
}

impl PartnerStatus {
    pub fn new(partner_id: impl Into<PartnerId>, active: bool) -> Self {
        Self {
            partner_id: partner_id.into(),
            active,
            entity_id: None,
            business_name: None,
        }
    }
}

/// Whether any entry in a validator answer is an active partner.
pub fn any_active(statuses: &[PartnerStatus]) -> bool {
    statuses.iter().any(|s| s.active)
}
