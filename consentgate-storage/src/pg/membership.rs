//! Bloom filter stored in PostgreSQL, one row per set bit.

use super::unavailable;
use crate::traits::MembershipStore;
use async_trait::async_trait;
use consentgate_core::{BloomGeometry, StoreError};
use deadpool_postgres::{Client, Pool};
use std::collections::BTreeSet;

/// PostgreSQL-backed [`MembershipStore`].
///
/// Geometry is read from `membership_filters` on every call rather than
/// cached, so a rebuild with new parameters on another replica is picked up
/// immediately.
#[derive(Clone)]
pub struct PgMembershipStore {
    pool: Pool,
    name: String,
}

impl PgMembershipStore {
    pub fn new(pool: Pool, name: impl Into<String>) -> Self {
        Self {
            pool,
            name: name.into(),
        }
    }

    async fn geometry(&self, client: &Client) -> Result<Option<BloomGeometry>, StoreError> {
        let row = client
            .query_opt(
                "SELECT capacity, false_probability, num_bits, num_hashes \
                 FROM membership_filters WHERE name = $1",
                &[&self.name],
            )
            .await
            .map_err(unavailable)?;

        Ok(row.map(|row| BloomGeometry {
            capacity: row.get::<_, i64>(0) as u64,
            false_probability: row.get(1),
            num_bits: row.get::<_, i64>(2) as u64,
            num_hashes: row.get::<_, i32>(3) as u32,
        }))
    }

    async fn indices_for(&self, client: &Client, id: &str) -> Result<Vec<i64>, StoreError> {
        let geometry = self
            .geometry(client)
            .await?
            .ok_or_else(|| StoreError::NotInitialized {
                name: self.name.clone(),
            })?;
        let distinct: BTreeSet<i64> = geometry
            .bit_indices(id.as_bytes())
            .map(|i| i as i64)
            .collect();
        Ok(distinct.into_iter().collect())
    }
}

#[async_trait]
impl MembershipStore for PgMembershipStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self) -> Result<bool, StoreError> {
        let client = self.pool.get().await.map_err(unavailable)?;
        let row = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM membership_filters WHERE name = $1)",
                &[&self.name],
            )
            .await
            .map_err(unavailable)?;
        Ok(row.get(0))
    }

    async fn init(&self, capacity: u64, false_probability: f64) -> Result<bool, StoreError> {
        let geometry = BloomGeometry::with_accuracy(capacity, false_probability)?;
        let client = self.pool.get().await.map_err(unavailable)?;

        let inserted = client
            .execute(
                "INSERT INTO membership_filters (name, capacity, false_probability, num_bits, num_hashes) \
                 VALUES ($1, $2, $3, $4, $5) ON CONFLICT (name) DO NOTHING",
                &[
                    &self.name,
                    &(geometry.capacity as i64),
                    &geometry.false_probability,
                    &(geometry.num_bits as i64),
                    &(geometry.num_hashes as i32),
                ],
            )
            .await
            .map_err(unavailable)?;
        if inserted == 1 {
            return Ok(true);
        }

        match self.geometry(&client).await? {
            Some(existing) if existing.same_parameters(capacity, false_probability) => Ok(false),
            Some(existing) => Err(StoreError::ParameterMismatch {
                name: self.name.clone(),
                reason: format!(
                    "existing capacity={} p={}, requested capacity={} p={}",
                    existing.capacity, existing.false_probability, capacity, false_probability
                ),
            }),
            // deleted between the insert and the read; report as not created
            None => Err(StoreError::Unavailable {
                reason: format!("{} was deleted during initialization", self.name),
            }),
        }
    }

    async fn is_ready(&self) -> Result<bool, StoreError> {
        let client = self.pool.get().await.map_err(unavailable)?;
        let row = client
            .query_opt(
                "SELECT ready FROM membership_filters WHERE name = $1",
                &[&self.name],
            )
            .await
            .map_err(unavailable)?;
        Ok(row.is_some_and(|row| row.get::<_, bool>(0)))
    }

    async fn mark_ready(&self) -> Result<(), StoreError> {
        let client = self.pool.get().await.map_err(unavailable)?;
        let updated = client
            .execute(
                "UPDATE membership_filters SET ready = true WHERE name = $1",
                &[&self.name],
            )
            .await
            .map_err(unavailable)?;
        if updated == 0 {
            return Err(StoreError::NotInitialized {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    async fn add(&self, id: &str) -> Result<bool, StoreError> {
        let client = self.pool.get().await.map_err(unavailable)?;
        let indices = self.indices_for(&client, id).await?;

        let inserted = client
            .execute(
                "INSERT INTO membership_filter_bits (name, bit) \
                 SELECT $1, unnest($2::bigint[]) ON CONFLICT DO NOTHING",
                &[&self.name, &indices],
            )
            .await
            .map_err(unavailable)?;
        Ok(inserted > 0)
    }

    async fn contains(&self, id: &str) -> Result<bool, StoreError> {
        let client = self.pool.get().await.map_err(unavailable)?;
        let indices = self.indices_for(&client, id).await?;

        let row = client
            .query_one(
                "SELECT count(*) FROM membership_filter_bits WHERE name = $1 AND bit = ANY($2)",
                &[&self.name, &indices],
            )
            .await
            .map_err(unavailable)?;
        let set: i64 = row.get(0);
        Ok(set as usize == indices.len())
    }

    async fn delete(&self) -> Result<bool, StoreError> {
        let client = self.pool.get().await.map_err(unavailable)?;
        let deleted = client
            .execute("DELETE FROM membership_filters WHERE name = $1", &[&self.name])
            .await
            .map_err(unavailable)?;
        Ok(deleted > 0)
    }
}
