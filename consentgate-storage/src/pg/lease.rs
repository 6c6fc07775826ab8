//! Expiring leases as rows in `leases`.

use crate::traits::Lease;
use async_trait::async_trait;
use consentgate_core::LeaseError;
use deadpool_postgres::Pool;
use std::time::Duration;
use uuid::Uuid;

/// PostgreSQL-backed [`Lease`].
///
/// Acquisition is a single upsert that only overwrites an expired row, so
/// at most one contender sees its row count come back as 1. Each handle has
/// its own holder token; release deletes the row only if the token matches.
#[derive(Clone)]
pub struct PgLease {
    pool: Pool,
    name: String,
    holder: Uuid,
}

impl PgLease {
    pub fn new(pool: Pool, name: impl Into<String>) -> Self {
        Self {
            pool,
            name: name.into(),
            holder: Uuid::new_v4(),
        }
    }

    pub fn holder(&self) -> Uuid {
        self.holder
    }

    fn unavailable(&self, e: impl std::fmt::Display) -> LeaseError {
        LeaseError::Unavailable {
            name: self.name.clone(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl Lease for PgLease {
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

        let client = self.pool.get().await.map_err(|e| self.unavailable(e))?;
        let acquired = client
            .execute(
                "INSERT INTO leases (name, holder, expires_at) \
                 VALUES ($1, $2, now() + make_interval(secs => $3)) \
                 ON CONFLICT (name) DO UPDATE \
                 SET holder = EXCLUDED.holder, expires_at = EXCLUDED.expires_at \
                 WHERE leases.expires_at <= now()",
                &[&self.name, &self.holder, &hold.as_secs_f64()],
            )
            .await
            .map_err(|e| self.unavailable(e))?;
        Ok(acquired == 1)
    }

    async fn release(&self) -> Result<bool, LeaseError> {
        let client = self.pool.get().await.map_err(|e| self.unavailable(e))?;
        let released = client
            .execute(
                "DELETE FROM leases WHERE name = $1 AND holder = $2",
                &[&self.name, &self.holder],
            )
            .await
            .map_err(|e| self.unavailable(e))?;
        Ok(released > 0)
    }
}
