//! Membership Gate
//!
//! Thin wrapper over the shared membership structure used on the query path
//! and by the creation-path side channel.

use consentgate_core::{hash_for_log, StoreError, Subject};
use consentgate_storage::MembershipStore;
use std::sync::Arc;

/// Fast-reject pre-filter in front of the backing store.
#[derive(Clone)]
pub struct MembershipGate {
    store: Arc<dyn MembershipStore>,
}

impl MembershipGate {
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn MembershipStore> {
        &self.store
    }

    /// `false` means definitely absent. A store failure, a missing structure
    /// or one still being populated answers `true` so the caller falls
    /// through to the authoritative check.
    pub async fn check(&self, id: &str) -> bool {
        match self.store.contains(id).await {
            Ok(true) => true,
            Ok(false) => match self.store.is_ready().await {
                Ok(ready) => {
                    if !ready {
                        tracing::debug!(
                            filter = %self.store.name(),
                            subject = %hash_for_log(id),
                            "Bloom filter not ready, treating as possibly present"
                        );
                    }
                    !ready
                }
                Err(e) => {
                    tracing::warn!(
                        filter = %self.store.name(),
                        subject = %hash_for_log(id),
                        error = %e,
                        "Readiness check failed, treating as possibly present"
                    );
                    true
                }
            },
            Err(e) => {
                tracing::warn!(
                    filter = %self.store.name(),
                    subject = %hash_for_log(id),
                    error = %e,
                    "Membership check failed, treating as possibly present"
                );
                true
            }
        }
    }

    /// Insert one identifier.
    pub async fn add(&self, id: &str) -> Result<bool, StoreError> {
        self.store.add(id).await
    }

    /// Creation-path side channel: called after the business layer persists
    /// a new subject. Only cache-eligible subjects are inserted. Failures are
    /// logged and swallowed; the next rebuild picks the subject up.
    ///
    /// Returns whether the identifier was inserted.
    pub async fn record_new_subject(&self, subject: &Subject) -> bool {
        if !subject.is_cache_eligible() {
            return false;
        }

        match self.store.add(&subject.id).await {
            Ok(changed) => {
                tracing::debug!(
                    filter = %self.store.name(),
                    subject = %hash_for_log(&subject.id),
                    changed,
                    "Subject added to bloom filter"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    filter = %self.store.name(),
                    subject = %hash_for_log(&subject.id),
                    error = %e,
                    "Failed to add subject to bloom filter"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consentgate_storage::InMemoryMembershipStore;

    #[tokio::test]
    async fn test_check_is_fail_open_without_structure() {
        let gate = MembershipGate::new(Arc::new(InMemoryMembershipStore::new("absent")));
        assert!(gate.check("RSSMRA85T10A562S").await);
    }

    #[tokio::test]
    async fn test_check_rejects_only_once_ready() {
        let store = Arc::new(InMemoryMembershipStore::new("test"));
        store.init(100, 0.001).await.unwrap();
        store.add("PRESENT").await.unwrap();
        let gate = MembershipGate::new(store.clone());

        // half-built structure: a miss proves nothing yet
        assert!(gate.check("PRESENT").await);
        assert!(gate.check("MISSING").await);

        store.mark_ready().await.unwrap();
        assert!(gate.check("PRESENT").await);
        assert!(!gate.check("MISSING").await);
    }

    #[tokio::test]
    async fn test_record_new_subject_skips_ineligible() {
        let store = Arc::new(InMemoryMembershipStore::new("test"));
        store.init(100, 0.001).await.unwrap();
        let gate = MembershipGate::new(store.clone());

        let inactive = Subject::new("INACTIVE").with_relationship("tpp-1", false);
        assert!(!gate.record_new_subject(&inactive).await);

        let active = Subject::new("ACTIVE").with_relationship("tpp-1", true);
        assert!(gate.record_new_subject(&active).await);
        assert!(store.contains("ACTIVE").await.unwrap());
        assert!(gate.check("ACTIVE").await);
    }

    #[tokio::test]
    async fn test_record_new_subject_swallows_store_errors() {
        let gate = MembershipGate::new(Arc::new(InMemoryMembershipStore::new("absent")));
        let active = Subject::new("ACTIVE").with_relationship("tpp-1", true);
        assert!(!gate.record_new_subject(&active).await);
    }
}
