//! Idempotent schema bootstrap.

use super::unavailable;
use consentgate_core::StoreError;
use deadpool_postgres::Pool;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS subjects (
    id            TEXT PRIMARY KEY,
    relationships JSONB NOT NULL DEFAULT '{}'::jsonb
);

CREATE TABLE IF NOT EXISTS membership_filters (
    name              TEXT PRIMARY KEY,
    capacity          BIGINT NOT NULL,
    false_probability DOUBLE PRECISION NOT NULL,
    num_bits          BIGINT NOT NULL,
    num_hashes        INTEGER NOT NULL,
    ready             BOOLEAN NOT NULL DEFAULT false,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT now()
);

ALTER TABLE membership_filters ADD COLUMN IF NOT EXISTS ready BOOLEAN NOT NULL DEFAULT false;

CREATE TABLE IF NOT EXISTS membership_filter_bits (
    name TEXT NOT NULL REFERENCES membership_filters (name) ON DELETE CASCADE,
    bit  BIGINT NOT NULL,
    PRIMARY KEY (name, bit)
);

CREATE TABLE IF NOT EXISTS leases (
    name       TEXT PRIMARY KEY,
    holder     UUID NOT NULL,
    expires_at TIMESTAMPTZ NOT NULL
);
"#;

/// Create the gate's tables if they are missing.
///
/// Replicas starting together serialize on an advisory lock so concurrent
/// `CREATE TABLE IF NOT EXISTS` statements cannot collide.
pub async fn ensure_schema(pool: &Pool) -> Result<(), StoreError> {
    let mut client = pool.get().await.map_err(unavailable)?;
    let tx = client.transaction().await.map_err(unavailable)?;
    tx.execute("SELECT pg_advisory_xact_lock(hashtext('consentgate_schema'))", &[])
        .await
        .map_err(unavailable)?;
    tx.batch_execute(SCHEMA).await.map_err(unavailable)?;
    tx.commit().await.map_err(unavailable)?;

    tracing::info!("Database schema ensured");
    Ok(())
}
