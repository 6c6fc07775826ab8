//! Bloom filter held in process memory.

use crate::traits::MembershipStore;
use async_trait::async_trait;
use consentgate_core::{BloomBits, BloomGeometry, StoreError};
use std::sync::{Arc, RwLock};

struct Filter {
    geometry: BloomGeometry,
    bits: BloomBits,
    ready: bool,
}

/// In-memory [`MembershipStore`]. Clones address the same structure.
#[derive(Clone)]
pub struct InMemoryMembershipStore {
    name: String,
    filter: Arc<RwLock<Option<Filter>>>,
}

impl InMemoryMembershipStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter: Arc::new(RwLock::new(None)),
        }
    }

    /// Geometry of the current structure, if any.
    pub fn geometry(&self) -> Option<BloomGeometry> {
        self.filter
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|f| f.geometry))
    }

    fn not_initialized(&self) -> StoreError {
        StoreError::NotInitialized {
            name: self.name.clone(),
        }
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self) -> Result<bool, StoreError> {
        let guard = self.filter.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(guard.is_some())
    }

    async fn init(&self, capacity: u64, false_probability: f64) -> Result<bool, StoreError> {
        let geometry = BloomGeometry::with_accuracy(capacity, false_probability)?;
        let mut guard = self.filter.write().map_err(|_| StoreError::LockPoisoned)?;

        if let Some(existing) = guard.as_ref() {
            if existing.geometry.same_parameters(capacity, false_probability) {
                return Ok(false);
            }
            return Err(StoreError::ParameterMismatch {
                name: self.name.clone(),
                reason: format!(
                    "existing capacity={} p={}, requested capacity={} p={}",
                    existing.geometry.capacity,
                    existing.geometry.false_probability,
                    capacity,
                    false_probability
                ),
            });
        }

        *guard = Some(Filter {
            geometry,
            bits: BloomBits::new(geometry.num_bits),
            ready: false,
        });
        Ok(true)
    }

    async fn is_ready(&self) -> Result<bool, StoreError> {
        let guard = self.filter.read().map_err(|_| StoreError::LockPoisoned)?;
        let ready = guard.as_ref().is_some_and(|f| f.ready);
        Ok(ready)
    }

    async fn mark_ready(&self) -> Result<(), StoreError> {
        let mut guard = self.filter.write().map_err(|_| StoreError::LockPoisoned)?;
        let filter = guard.as_mut().ok_or_else(|| self.not_initialized())?;
        filter.ready = true;
        Ok(())
    }

    async fn add(&self, id: &str) -> Result<bool, StoreError> {
        let mut guard = self.filter.write().map_err(|_| StoreError::LockPoisoned)?;
        let filter = guard.as_mut().ok_or_else(|| self.not_initialized())?;

        let mut changed = false;
        for index in filter.geometry.bit_indices(id.as_bytes()) {
            changed |= filter.bits.set(index);
        }
        Ok(changed)
    }

    async fn contains(&self, id: &str) -> Result<bool, StoreError> {
        let guard = self.filter.read().map_err(|_| StoreError::LockPoisoned)?;
        let filter = guard.as_ref().ok_or_else(|| self.not_initialized())?;

        let present = filter
            .geometry
            .bit_indices(id.as_bytes())
            .all(|index| filter.bits.get(index));
        Ok(present)
    }

    async fn delete(&self) -> Result<bool, StoreError> {
        let mut guard = self.filter.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(guard.take().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_operations_before_init() {
        let store = InMemoryMembershipStore::new("test");
        assert!(!store.exists().await.unwrap());
        assert!(matches!(
            store.contains("A1").await,
            Err(StoreError::NotInitialized { .. })
        ));
        assert!(matches!(
            store.add("A1").await,
            Err(StoreError::NotInitialized { .. })
        ));
        assert!(!store.delete().await.unwrap());
    }

    #[tokio::test]
    async fn test_init_is_idempotent_for_same_parameters() {
        let store = InMemoryMembershipStore::new("test");
        assert!(store.init(1000, 0.01).await.unwrap());
        assert!(!store.init(1000, 0.01).await.unwrap());
        assert!(store.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_init_rejects_parameter_mismatch() {
        let store = InMemoryMembershipStore::new("test");
        store.init(1000, 0.01).await.unwrap();
        let err = store.init(2000, 0.01).await.unwrap_err();
        assert!(matches!(err, StoreError::ParameterMismatch { .. }));
    }

    #[tokio::test]
    async fn test_init_rejects_invalid_parameters() {
        let store = InMemoryMembershipStore::new("test");
        assert!(matches!(
            store.init(0, 0.01).await,
            Err(StoreError::InvalidParameters { .. })
        ));
        assert!(!store.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_add_reports_change_once() {
        let store = InMemoryMembershipStore::new("test");
        store.init(1000, 0.01).await.unwrap();
        assert!(store.add("A1").await.unwrap());
        assert!(!store.add("A1").await.unwrap());
        assert!(store.contains("A1").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_then_reinit_starts_empty() {
        let store = InMemoryMembershipStore::new("test");
        store.init(1000, 0.01).await.unwrap();
        store.add("A1").await.unwrap();
        assert!(store.delete().await.unwrap());
        assert!(!store.exists().await.unwrap());

        assert!(store.init(1000, 0.01).await.unwrap());
        assert!(!store.contains("A1").await.unwrap());
    }

    #[tokio::test]
    async fn test_ready_flag_follows_structure() {
        let store = InMemoryMembershipStore::new("test");
        assert!(!store.is_ready().await.unwrap());
        assert!(matches!(
            store.mark_ready().await,
            Err(StoreError::NotInitialized { .. })
        ));

        store.init(1000, 0.01).await.unwrap();
        assert!(!store.is_ready().await.unwrap());
        store.mark_ready().await.unwrap();
        assert!(store.is_ready().await.unwrap());

        // same-parameter init keeps the flag, recreation clears it
        assert!(!store.init(1000, 0.01).await.unwrap());
        assert!(store.is_ready().await.unwrap());
        store.delete().await.unwrap();
        store.init(1000, 0.01).await.unwrap();
        assert!(!store.is_ready().await.unwrap());
    }

    #[tokio::test]
    async fn test_clones_share_structure() {
        let first = InMemoryMembershipStore::new("test");
        let second = first.clone();
        first.init(1000, 0.01).await.unwrap();
        first.add("A1").await.unwrap();
        assert!(second.contains("A1").await.unwrap());
        assert_eq!(second.geometry().map(|g| g.num_hashes), Some(7));
    }
}
