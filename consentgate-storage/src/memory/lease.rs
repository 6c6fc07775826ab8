//! Expiring leases held in process memory.

use crate::traits::Lease;
use async_trait::async_trait;
use consentgate_core::LeaseError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct Holder {
    token: Uuid,
    expires_at: Instant,
}

impl Holder {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Shared table of leases. Hand out one [`InMemoryLease`] per contender.
#[derive(Clone, Default)]
pub struct InMemoryLeaseRegistry {
    leases: Arc<Mutex<HashMap<String, Holder>>>,
}

impl InMemoryLeaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new contender for the lease called `name`.
    pub fn lease(&self, name: impl Into<String>) -> InMemoryLease {
        InMemoryLease {
            registry: self.clone(),
            name: name.into(),
            token: Uuid::new_v4(),
        }
    }

    /// Whether `name` is currently held by anyone.
    pub fn is_held(&self, name: &str) -> bool {
        self.leases
            .lock()
            .map(|leases| {
                leases
                    .get(name)
                    .is_some_and(|h| !h.is_expired(Instant::now()))
            })
            .unwrap_or(false)
    }
}

/// One contender for a named in-memory lease.
#[derive(Clone)]
pub struct InMemoryLease {
    registry: InMemoryLeaseRegistry,
    name: String,
    token: Uuid,
}

impl InMemoryLease {
    fn poisoned(&self) -> LeaseError {
        LeaseError::Unavailable {
            name: self.name.clone(),
            reason: "lease table lock poisoned".to_string(),
        }
    }
}

#[async_trait]
impl Lease for InMemoryLease {
    fn name(&self) -> &str {
        &self.name
    }

    async fn try_acquire(&self, hold: Duration) -> Result<bool, LeaseError> {
        if hold.is_zero() {
            return Err(LeaseError::InvalidHold {
                name: self.name.clone(),
                reason: "hold must be greater than zero".to_string(),
            });
        }

        let mut leases = self.registry.leases.lock().map_err(|_| self.poisoned())?;
        let now = Instant::now();
        if let Some(current) = leases.get(&self.name) {
            if !current.is_expired(now) {
                return Ok(false);
            }
        }
        leases.insert(
            self.name.clone(),
            Holder {
                token: self.token,
                expires_at: now + hold,
            },
        );
        Ok(true)
    }

    async fn release(&self) -> Result<bool, LeaseError> {
        let mut leases = self.registry.leases.lock().map_err(|_| self.poisoned())?;
        match leases.get(&self.name) {
            Some(current) if current.token == self.token => {
                leases.remove(&self.name);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOLD: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_second_contender_is_refused() {
        let registry = InMemoryLeaseRegistry::new();
        let first = registry.lease("startup-task-lock");
        let second = registry.lease("startup-task-lock");

        assert!(first.try_acquire(HOLD).await.unwrap());
        assert!(!second.try_acquire(HOLD).await.unwrap());
        assert!(!first.try_acquire(HOLD).await.unwrap());
        assert!(registry.is_held("startup-task-lock"));
    }

    #[tokio::test]
    async fn test_release_frees_the_lease() {
        let registry = InMemoryLeaseRegistry::new();
        let first = registry.lease("lock");
        let second = registry.lease("lock");

        first.try_acquire(HOLD).await.unwrap();
        assert!(!second.release().await.unwrap());
        assert!(first.release().await.unwrap());
        assert!(!first.release().await.unwrap());
        assert!(second.try_acquire(HOLD).await.unwrap());
    }

    #[tokio::test]
    async fn test_names_are_independent() {
        let registry = InMemoryLeaseRegistry::new();
        assert!(registry.lease("a").try_acquire(HOLD).await.unwrap());
        assert!(registry.lease("b").try_acquire(HOLD).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_hold_can_be_taken_over() {
        let registry = InMemoryLeaseRegistry::new();
        let crashed = registry.lease("lock");
        let survivor = registry.lease("lock");

        assert!(crashed.try_acquire(HOLD).await.unwrap());
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!survivor.try_acquire(HOLD).await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(survivor.try_acquire(HOLD).await.unwrap());
        // the stale holder cannot release the new hold
        assert!(!crashed.release().await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_hold_is_rejected() {
        let registry = InMemoryLeaseRegistry::new();
        let err = registry.lease("lock").try_acquire(Duration::ZERO).await;
        assert!(matches!(err, Err(LeaseError::InvalidHold { .. })));
    }
}
