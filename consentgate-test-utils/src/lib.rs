//! consentgate test utilities
//!
//! Shared test infrastructure for the workspace:
//! - Instrumented collaborators that count calls and can be told to fail
//! - Fixtures for common subject data sets
//! - Proptest generators for identifiers and subjects

pub use consentgate_core::{
    GateConfig, LeaseError, PartnerId, PartnerStatus, StoreError, Subject, SubjectId,
    UpstreamError,
};
pub use consentgate_storage::{
    InMemoryLeaseRegistry, InMemoryMembershipStore, InMemorySubjectStore, Lease, MembershipStore,
    PartnerValidator, SubjectStore,
};

use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// MEMBERSHIP STORE
// ============================================================================

#[derive(Default)]
struct MembershipCounters {
    init_calls: AtomicUsize,
    add_calls: AtomicUsize,
    contains_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    adds_in_flight: AtomicUsize,
    max_adds_in_flight: AtomicUsize,
    fail_init: AtomicBool,
    fail_add: AtomicBool,
    fail_contains: AtomicBool,
}

/// In-memory membership store that records how it is driven.
///
/// Each `add` yields to the scheduler while counted as in flight, so
/// concurrently issued adds overlap and `max_adds_in_flight` reflects the
/// caller's batching.
#[derive(Clone)]
pub struct CountingMembershipStore {
    inner: InMemoryMembershipStore,
    counters: Arc<MembershipCounters>,
}

impl CountingMembershipStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self::wrap(InMemoryMembershipStore::new(name))
    }

    pub fn wrap(inner: InMemoryMembershipStore) -> Self {
        Self {
            inner,
            counters: Arc::new(MembershipCounters::default()),
        }
    }

    pub fn inner(&self) -> &InMemoryMembershipStore {
        &self.inner
    }

    pub fn init_calls(&self) -> usize {
        self.counters.init_calls.load(Ordering::SeqCst)
    }

    pub fn add_calls(&self) -> usize {
        self.counters.add_calls.load(Ordering::SeqCst)
    }

    pub fn contains_calls(&self) -> usize {
        self.counters.contains_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.counters.delete_calls.load(Ordering::SeqCst)
    }

    pub fn adds_in_flight(&self) -> usize {
        self.counters.adds_in_flight.load(Ordering::SeqCst)
    }

    pub fn max_adds_in_flight(&self) -> usize {
        self.counters.max_adds_in_flight.load(Ordering::SeqCst)
    }

    pub fn fail_init(&self, fail: bool) {
        self.counters.fail_init.store(fail, Ordering::SeqCst);
    }

    pub fn fail_add(&self, fail: bool) {
        self.counters.fail_add.store(fail, Ordering::SeqCst);
    }

    pub fn fail_contains(&self, fail: bool) {
        self.counters.fail_contains.store(fail, Ordering::SeqCst);
    }

    fn injected() -> StoreError {
        StoreError::Unavailable {
            reason: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl MembershipStore for CountingMembershipStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn exists(&self) -> Result<bool, StoreError> {
        self.inner.exists().await
    }

    async fn init(&self, capacity: u64, false_probability: f64) -> Result<bool, StoreError> {
        self.counters.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.counters.fail_init.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.init(capacity, false_probability).await
    }

    async fn is_ready(&self) -> Result<bool, StoreError> {
        self.inner.is_ready().await
    }

    async fn mark_ready(&self) -> Result<(), StoreError> {
        self.inner.mark_ready().await
    }

    async fn add(&self, id: &str) -> Result<bool, StoreError> {
        self.counters.add_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.counters.adds_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters
            .max_adds_in_flight
            .fetch_max(now, Ordering::SeqCst);

        tokio::task::yield_now().await;
        let result = if self.counters.fail_add.load(Ordering::SeqCst) {
            Err(Self::injected())
        } else {
            self.inner.add(id).await
        };

        self.counters.adds_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn contains(&self, id: &str) -> Result<bool, StoreError> {
        self.counters.contains_calls.fetch_add(1, Ordering::SeqCst);
        if self.counters.fail_contains.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.contains(id).await
    }

    async fn delete(&self) -> Result<bool, StoreError> {
        self.counters.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete().await
    }
}

// ============================================================================
// LEASE
// ============================================================================

#[derive(Default)]
struct LeaseCounters {
    acquire_calls: AtomicUsize,
    release_calls: AtomicUsize,
    fail_acquire: AtomicBool,
}

/// Lease contender that counts acquisitions and releases.
#[derive(Clone)]
pub struct CountingLease {
    inner: consentgate_storage::InMemoryLease,
    counters: Arc<LeaseCounters>,
}

impl CountingLease {
    pub fn new(registry: &InMemoryLeaseRegistry, name: impl Into<String>) -> Self {
        Self {
            inner: registry.lease(name),
            counters: Arc::new(LeaseCounters::default()),
        }
    }

    pub fn acquire_calls(&self) -> usize {
        self.counters.acquire_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.counters.release_calls.load(Ordering::SeqCst)
    }

    pub fn fail_acquire(&self, fail: bool) {
        self.counters.fail_acquire.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Lease for CountingLease {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn try_acquire(&self, hold: Duration) -> Result<bool, LeaseError> {
        self.counters.acquire_calls.fetch_add(1, Ordering::SeqCst);
        if self.counters.fail_acquire.load(Ordering::SeqCst) {
            return Err(LeaseError::Unavailable {
                name: self.inner.name().to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.inner.try_acquire(hold).await
    }

    async fn release(&self) -> Result<bool, LeaseError> {
        self.counters.release_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.release().await
    }
}

// ============================================================================
// SUBJECT STORE
// ============================================================================

#[derive(Default)]
struct SubjectCounters {
    stream_calls: AtomicUsize,
    query_calls: AtomicUsize,
    fail_query: AtomicBool,
    fail_stream_after: Mutex<Option<usize>>,
    hold: Mutex<Option<StreamHold>>,
}

/// Pauses the next `stream_all` before its first item.
///
/// The stream signals [`StreamHold::started`] once it is polled and yields
/// nothing until [`StreamHold::resume`].
#[derive(Clone, Default)]
pub struct StreamHold {
    started: Arc<Notify>,
    resume: Arc<Notify>,
}

impl StreamHold {
    pub async fn started(&self) {
        self.started.notified().await;
    }

    pub fn resume(&self) {
        self.resume.notify_one();
    }
}

/// In-memory subject store that counts calls and can fail mid-stream.
#[derive(Clone)]
pub struct CountingSubjectStore {
    inner: InMemorySubjectStore,
    counters: Arc<SubjectCounters>,
}

impl CountingSubjectStore {
    pub fn new(subjects: impl IntoIterator<Item = Subject>) -> Self {
        Self::wrap(InMemorySubjectStore::with_subjects(subjects))
    }

    pub fn wrap(inner: InMemorySubjectStore) -> Self {
        Self {
            inner,
            counters: Arc::new(SubjectCounters::default()),
        }
    }

    pub fn inner(&self) -> &InMemorySubjectStore {
        &self.inner
    }

    pub fn stream_calls(&self) -> usize {
        self.counters.stream_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.counters.query_calls.load(Ordering::SeqCst)
    }

    pub fn fail_query(&self, fail: bool) {
        self.counters.fail_query.store(fail, Ordering::SeqCst);
    }

    /// Pause the next `stream_all` until the returned hold is resumed.
    pub fn hold_stream(&self) -> StreamHold {
        let hold = StreamHold::default();
        if let Ok(mut guard) = self.counters.hold.lock() {
            *guard = Some(hold.clone());
        }
        hold
    }

    /// Make `stream_all` yield `n` subjects and then an error.
    pub fn fail_stream_after(&self, n: Option<usize>) {
        if let Ok(mut guard) = self.counters.fail_stream_after.lock() {
            *guard = n;
        }
    }
}

#[async_trait]
impl SubjectStore for CountingSubjectStore {
    fn stream_all(&self) -> BoxStream<'_, Result<Subject, UpstreamError>> {
        self.counters.stream_calls.fetch_add(1, Ordering::SeqCst);
        let fail_after = self
            .counters
            .fail_stream_after
            .lock()
            .ok()
            .and_then(|guard| *guard);

        let hold = self.counters.hold.lock().ok().and_then(|mut guard| guard.take());

        let subjects = match fail_after {
            None => self.inner.stream_all(),
            Some(n) => self
                .inner
                .stream_all()
                .take(n)
                .chain(futures_util::stream::once(async {
                    Err(UpstreamError::BackingStore {
                        reason: "injected stream failure".to_string(),
                    })
                }))
                .boxed(),
        };

        match hold {
            None => subjects,
            Some(hold) => futures_util::stream::once(async move {
                hold.started.notify_one();
                hold.resume.notified().await;
            })
            .filter_map(|()| async { None::<Result<Subject, UpstreamError>> })
            .chain(subjects)
            .boxed(),
        }
    }

    async fn query_active_relationships(
        &self,
        id: &str,
    ) -> Result<BTreeMap<PartnerId, bool>, UpstreamError> {
        self.counters.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.counters.fail_query.load(Ordering::SeqCst) {
            return Err(UpstreamError::BackingStore {
                reason: "injected failure".to_string(),
            });
        }
        self.inner.query_active_relationships(id).await
    }
}

// ============================================================================
// PARTNER VALIDATOR
// ============================================================================

/// Partner registry answering from a fixed table.
#[derive(Clone, Default)]
pub struct MockPartnerValidator {
    partners: Arc<Mutex<HashMap<PartnerId, bool>>>,
    calls: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Vec<PartnerId>>>,
    fail: Arc<AtomicBool>,
}

impl MockPartnerValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper that registers a partner.
    pub fn with_partner(self, partner_id: impl Into<PartnerId>, active: bool) -> Self {
        self.set_partner(partner_id, active);
        self
    }

    pub fn set_partner(&self, partner_id: impl Into<PartnerId>, active: bool) {
        if let Ok(mut partners) = self.partners.lock() {
            partners.insert(partner_id.into(), active);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Vec<PartnerId> {
        self.last_request
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PartnerValidator for MockPartnerValidator {
    async fn validate(&self, partner_ids: &[PartnerId]) -> Result<Vec<PartnerStatus>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = partner_ids.to_vec();
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(UpstreamError::ValidatorStatus {
                status: 503,
                message: "injected failure".to_string(),
            });
        }

        let partners = self.partners.lock().map_err(|_| UpstreamError::Validator {
            reason: "partner table lock poisoned".to_string(),
        })?;
        Ok(partner_ids
            .iter()
            .filter_map(|id| partners.get(id).map(|active| PartnerStatus::new(id.clone(), *active)))
            .collect())
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made subject data sets.

    use super::*;

    /// A subject whose relationships are all active.
    pub fn active_subject(id: &str, partners: &[&str]) -> Subject {
        partners
            .iter()
            .fold(Subject::new(id), |s, p| s.with_relationship(*p, true))
    }

    /// A subject whose relationships are all inactive.
    pub fn inactive_subject(id: &str, partners: &[&str]) -> Subject {
        partners
            .iter()
            .fold(Subject::new(id), |s, p| s.with_relationship(*p, false))
    }

    /// `active` eligible subjects (`ACTIVE-n`, partner `tpp-1` active),
    /// `inactive` ineligible ones (`INACTIVE-n`, partner `tpp-1` revoked) and
    /// one subject with no relationships at all (`EMPTY`).
    pub fn population(active: usize, inactive: usize) -> Vec<Subject> {
        let mut subjects = Vec::with_capacity(active + inactive + 1);
        for i in 0..active {
            subjects.push(active_subject(&format!("ACTIVE-{}", i), &["tpp-1"]));
        }
        for i in 0..inactive {
            subjects.push(inactive_subject(&format!("INACTIVE-{}", i), &["tpp-1"]));
        }
        subjects.push(Subject::new("EMPTY"));
        subjects
    }

    /// Gate configuration sized for tests.
    pub fn test_config(capacity: u64, batch_size: usize) -> GateConfig {
        GateConfig {
            expected_insertions: capacity,
            population_batch_size: batch_size,
            ..GateConfig::default()
        }
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies.

    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    /// A syntactically valid fiscal code for a natural person.
    pub fn arb_fiscal_code() -> impl Strategy<Value = String> {
        "[A-Z]{6}[0-9]{2}[ABCDEHLMPRST][0-9]{2}[A-Z][0-9]{3}[A-Z]"
    }

    /// A partner id.
    pub fn arb_partner_id() -> impl Strategy<Value = PartnerId> {
        "tpp-[0-9]{1,3}"
    }

    /// A subject with up to four relationships of arbitrary state.
    pub fn arb_subject() -> impl Strategy<Value = Subject> {
        (
            arb_fiscal_code(),
            prop::collection::btree_map(arb_partner_id(), any::<bool>(), 0..4),
        )
            .prop_map(|(id, relationships)| {
                relationships
                    .into_iter()
                    .fold(Subject::new(id), |s, (partner, active)| {
                        s.with_relationship(partner, active)
                    })
            })
    }

    /// Subjects with distinct ids.
    pub fn arb_subjects(max: usize) -> impl Strategy<Value = Vec<Subject>> {
        prop::collection::vec(arb_subject(), 0..max).prop_map(|subjects| {
            let mut seen = BTreeSet::new();
            subjects
                .into_iter()
                .filter(|s| seen.insert(s.id.clone()))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counting_store_tracks_calls() {
        let store = CountingMembershipStore::new("test");
        store.init(100, 0.01).await.unwrap();
        store.add("A").await.unwrap();
        store.contains("A").await.unwrap();
        assert_eq!(store.init_calls(), 1);
        assert_eq!(store.add_calls(), 1);
        assert_eq!(store.contains_calls(), 1);
        assert_eq!(store.adds_in_flight(), 0);
        assert_eq!(store.max_adds_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_stream_failure_injection() {
        use futures_util::TryStreamExt;

        let store = CountingSubjectStore::new(fixtures::population(5, 0));
        store.fail_stream_after(Some(2));
        let result: Result<Vec<Subject>, _> = store.stream_all().try_collect().await;
        assert!(result.is_err());
        assert_eq!(store.stream_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_validator_omits_unknown_partners() {
        let validator = MockPartnerValidator::new().with_partner("tpp-1", true);
        let statuses = validator
            .validate(&["tpp-1".to_string(), "tpp-9".to_string()])
            .await
            .unwrap();
        assert_eq!(statuses, vec![PartnerStatus::new("tpp-1", true)]);
        assert_eq!(validator.calls(), 1);
        assert_eq!(validator.last_request().len(), 2);
    }
}
