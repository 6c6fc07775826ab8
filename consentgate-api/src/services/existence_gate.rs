//! Existence Gate
//!
//! ```text
//! check(id)
//!   │
//!   ├─ membership miss ─────────────────────────────► false   (Miss)
//!   │
//!   └─ membership hit ─ active relationships?
//!        ├─ none ───────────────────────────────────► false   (FalsePositive)
//!        └─ some ─ partner registry
//!             ├─ no partner active ─────────────────► false   (NoActivePartner)
//!             └─ at least one active ───────────────► true    (Confirmed)
//! ```
//!
//! Backing-store and registry failures propagate as errors. They are never
//! turned into `false`.

use crate::services::MembershipGate;
use crate::telemetry::metrics;
use consentgate_core::{any_active, hash_for_log, GateResult, PartnerId};
use consentgate_storage::{PartnerValidator, SubjectStore};
use std::sync::Arc;

/// How an existence check was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Rejected by the membership structure.
    Miss,
    /// Membership hit but no active relationship in the backing store.
    FalsePositive,
    /// Active relationships exist but no partner is currently active.
    NoActivePartner,
    /// At least one active relationship with an active partner.
    Confirmed,
}

impl GateDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateDecision::Miss => "miss",
            GateDecision::FalsePositive => "false_positive",
            GateDecision::NoActivePartner => "no_active_partner",
            GateDecision::Confirmed => "confirmed",
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, GateDecision::Confirmed)
    }
}

/// Authoritative existence check behind the membership pre-filter.
#[derive(Clone)]
pub struct ExistenceGate {
    membership: MembershipGate,
    subjects: Arc<dyn SubjectStore>,
    validator: Arc<dyn PartnerValidator>,
}

impl ExistenceGate {
    pub fn new(
        membership: MembershipGate,
        subjects: Arc<dyn SubjectStore>,
        validator: Arc<dyn PartnerValidator>,
    ) -> Self {
        Self {
            membership,
            subjects,
            validator,
        }
    }

    /// Whether the subject has at least one enabled channel.
    pub async fn check(&self, id: &str) -> GateResult<bool> {
        Ok(self.decide(id).await?.is_present())
    }

    /// Run the check and report which branch decided it.
    pub async fn decide(&self, id: &str) -> GateResult<GateDecision> {
        let result = self.decide_inner(id).await;
        if let Some(m) = metrics() {
            match &result {
                Ok(decision) => m.record_decision(decision.as_str()),
                Err(_) => m.record_decision("error"),
            }
        }
        result
    }

    async fn decide_inner(&self, id: &str) -> GateResult<GateDecision> {
        if !self.membership.check(id).await {
            tracing::debug!(subject = %hash_for_log(id), "Bloom filter miss");
            return Ok(GateDecision::Miss);
        }

        let relationships = self.subjects.query_active_relationships(id).await?;
        let candidates: Vec<PartnerId> = relationships
            .into_iter()
            .filter(|(_, active)| *active)
            .map(|(partner, _)| partner)
            .collect();

        if candidates.is_empty() {
            tracing::debug!(subject = %hash_for_log(id), "Bloom filter false positive");
            return Ok(GateDecision::FalsePositive);
        }

        let statuses = self.validator.validate(&candidates).await?;
        let decision = if any_active(&statuses) {
            GateDecision::Confirmed
        } else {
            GateDecision::NoActivePartner
        };

        tracing::debug!(
            subject = %hash_for_log(id),
            candidates = candidates.len(),
            decision = decision.as_str(),
            "Existence check confirmed against partner registry"
        );
        Ok(decision)
    }
}
