//! Collaborator traits.
//!
//! All operations are async and may suspend on network I/O. Implementations
//! must be thread-safe; the service shares one instance of each across all
//! request handlers and background jobs.

use async_trait::async_trait;
use consentgate_core::{
    LeaseError, PartnerId, PartnerStatus, StoreError, Subject, UpstreamError,
};
use futures_util::stream::BoxStream;
use std::collections::BTreeMap;
use std::time::Duration;

// ============================================================================
// MEMBERSHIP STORE
// ============================================================================

/// Client to one named, shared probabilistic set.
///
/// # Guarantees
///
/// Once initialized, `contains` never returns `false` for an item that was
/// added and not lost by an intervening `delete`.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Name of the structure this client addresses.
    fn name(&self) -> &str;

    /// Whether the structure currently exists.
    async fn exists(&self) -> Result<bool, StoreError>;

    /// Create the structure, not ready.
    ///
    /// Returns `true` when this call created it and `false` when it already
    /// existed with the same parameters. An existing structure with different
    /// parameters is a [`StoreError::ParameterMismatch`].
    async fn init(&self, capacity: u64, false_probability: f64) -> Result<bool, StoreError>;

    /// Whether the structure exists and has been fully populated since it
    /// was created. Until then a `false` from `contains` proves nothing.
    async fn is_ready(&self) -> Result<bool, StoreError>;

    /// Flag the structure as fully populated. A missing structure is
    /// [`StoreError::NotInitialized`].
    async fn mark_ready(&self) -> Result<(), StoreError>;

    /// Insert an item. Returns whether the structure changed.
    async fn add(&self, id: &str) -> Result<bool, StoreError>;

    /// Probabilistic membership. A missing structure is
    /// [`StoreError::NotInitialized`].
    async fn contains(&self, id: &str) -> Result<bool, StoreError>;

    /// Drop the whole structure. Returns whether there was one to drop.
    async fn delete(&self) -> Result<bool, StoreError>;
}

// ============================================================================
// LEASE
// ============================================================================

/// Named distributed mutual exclusion with zero-wait acquisition.
///
/// A handle identifies one holder. Acquisition is not reentrant: a handle
/// that already holds the lease is refused like any other contender until it
/// releases or the hold expires.
#[async_trait]
pub trait Lease: Send + Sync {
    /// Name of the lease.
    fn name(&self) -> &str;

    /// Try once to take the lease for `hold`. Never waits.
    async fn try_acquire(&self, hold: Duration) -> Result<bool, LeaseError>;

    /// Give the lease back if this handle holds it. Returns whether it did.
    async fn release(&self) -> Result<bool, LeaseError>;
}

// ============================================================================
// BACKING STORE
// ============================================================================

/// Authoritative store of subjects and their relationships.
#[async_trait]
pub trait SubjectStore: Send + Sync {
    /// Every subject, streamed. Never materialized in full.
    fn stream_all(&self) -> BoxStream<'_, Result<Subject, UpstreamError>>;

    /// Active relationships of one subject, keyed by partner id. Empty when
    /// the subject is unknown or has none.
    async fn query_active_relationships(
        &self,
        id: &str,
    ) -> Result<BTreeMap<PartnerId, bool>, UpstreamError>;
}

// ============================================================================
// PARTNER VALIDATOR
// ============================================================================

/// Partner registry consulted to confirm a cache hit.
#[async_trait]
pub trait PartnerValidator: Send + Sync {
    /// Current status of the given partners. Unknown ids may be omitted.
    async fn validate(&self, partner_ids: &[PartnerId]) -> Result<Vec<PartnerStatus>, UpstreamError>;
}
