//! Subjects stored as JSONB relationship maps.

use crate::traits::SubjectStore;
use async_trait::async_trait;
use consentgate_core::{PartnerId, Relationship, Subject, UpstreamError};
use deadpool_postgres::Pool;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

/// PostgreSQL-backed [`SubjectStore`].
#[derive(Clone)]
pub struct PgSubjectStore {
    pool: Pool,
}

impl PgSubjectStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Insert or replace a subject.
    pub async fn upsert(&self, subject: &Subject) -> Result<(), UpstreamError> {
        let relationships = serde_json::to_value(&subject.relationships).map_err(|e| {
            UpstreamError::MalformedRecord {
                id: subject.id.clone(),
                reason: e.to_string(),
            }
        })?;
        let client = self.pool.get().await.map_err(backing_store)?;
        client
            .execute(
                "INSERT INTO subjects (id, relationships) VALUES ($1, $2) \
                 ON CONFLICT (id) DO UPDATE SET relationships = EXCLUDED.relationships",
                &[&subject.id, &relationships],
            )
            .await
            .map_err(backing_store)?;
        Ok(())
    }
}

fn backing_store(e: impl std::fmt::Display) -> UpstreamError {
    UpstreamError::BackingStore {
        reason: e.to_string(),
    }
}

fn decode_relationships(
    id: &str,
    value: JsonValue,
) -> Result<BTreeMap<PartnerId, Relationship>, UpstreamError> {
    serde_json::from_value(value).map_err(|e| UpstreamError::MalformedRecord {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

fn row_to_subject(row: &Row) -> Result<Subject, UpstreamError> {
    let id: String = row.try_get(0).map_err(backing_store)?;
    let value: JsonValue = row.try_get(1).map_err(backing_store)?;
    let relationships = decode_relationships(&id, value)?;
    Ok(Subject { id, relationships })
}

#[async_trait]
impl SubjectStore for PgSubjectStore {
    fn stream_all(&self) -> BoxStream<'_, Result<Subject, UpstreamError>> {
        let pool = self.pool.clone();
        let open = async move {
            let client = pool.get().await.map_err(backing_store)?;
            let rows = client
                .query_raw(
                    "SELECT id, relationships FROM subjects",
                    std::iter::empty::<&(dyn ToSql + Sync)>(),
                )
                .await
                .map_err(backing_store)?;
            Ok::<_, UpstreamError>((client, Box::pin(rows)))
        };

        // the pooled connection travels with the row stream until it ends
        stream::once(open)
            .map_ok(|(client, rows)| {
                stream::try_unfold((client, rows), |(client, mut rows)| async move {
                    let next = match rows.try_next().await.map_err(backing_store)? {
                        Some(row) => Some((row_to_subject(&row)?, (client, rows))),
                        None => None,
                    };
                    Ok::<_, UpstreamError>(next)
                })
            })
            .try_flatten()
            .boxed()
    }

    async fn query_active_relationships(
        &self,
        id: &str,
    ) -> Result<BTreeMap<PartnerId, bool>, UpstreamError> {
        let client = self.pool.get().await.map_err(backing_store)?;
        let row = client
            .query_opt("SELECT relationships FROM subjects WHERE id = $1", &[&id])
            .await
            .map_err(backing_store)?;

        let Some(row) = row else {
            return Ok(BTreeMap::new());
        };
        let value: JsonValue = row.try_get(0).map_err(backing_store)?;
        Ok(decode_relationships(id, value)?
            .into_iter()
            .filter(|(_, r)| r.active)
            .map(|(partner, _)| (partner, true))
            .collect())
    }
}
