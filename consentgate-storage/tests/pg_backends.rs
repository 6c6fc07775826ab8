#![cfg(feature = "db-tests")]
//! PostgreSQL backends against a live database.
//!
//! Run with `--features db-tests` and the `CONSENTGATE_DB_*` variables set.

use consentgate_core::{StoreError, Subject};
use consentgate_storage::{
    ensure_schema, DbConfig, Lease, MembershipStore, PgLease, PgMembershipStore, PgSubjectStore,
    SubjectStore,
};
use deadpool_postgres::Pool;
use futures_util::TryStreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use uuid::Uuid;

async fn test_pool() -> Pool {
    let pool = DbConfig::from_env()
        .create_pool()
        .expect("Failed to create pool");
    ensure_schema(&pool).await.expect("Failed to create schema");
    pool
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

#[tokio::test]
async fn test_pg_membership_lifecycle() {
    let pool = test_pool().await;
    let store = PgMembershipStore::new(pool, unique("filter"));

    assert!(!store.exists().await.unwrap());
    assert!(matches!(
        store.contains("A1").await,
        Err(StoreError::NotInitialized { .. })
    ));

    assert!(store.init(1000, 0.01).await.unwrap());
    assert!(!store.is_ready().await.unwrap());
    assert!(!store.init(1000, 0.01).await.unwrap());
    assert!(matches!(
        store.init(10, 0.01).await,
        Err(StoreError::ParameterMismatch { .. })
    ));

    for i in 1..=500 {
        store.add(&format!("A{}", i)).await.unwrap();
    }
    assert!(store.contains("A1").await.unwrap());
    assert!(!store.add("A1").await.unwrap());

    store.mark_ready().await.unwrap();
    assert!(store.is_ready().await.unwrap());

    assert!(store.delete().await.unwrap());
    assert!(!store.exists().await.unwrap());
    assert!(!store.is_ready().await.unwrap());
    assert!(matches!(
        store.mark_ready().await,
        Err(StoreError::NotInitialized { .. })
    ));
}

#[tokio::test]
async fn test_pg_stores_agree_across_handles() {
    let pool = test_pool().await;
    let name = unique("shared");
    let first = PgMembershipStore::new(pool.clone(), name.clone());
    let second = PgMembershipStore::new(pool, name);

    first.init(100, 0.01).await.unwrap();
    first.add("RSSMRA85T10A562S").await.unwrap();
    assert!(second.contains("RSSMRA85T10A562S").await.unwrap());
    second.delete().await.unwrap();
}

#[tokio::test]
async fn test_pg_lease_exclusion() {
    let pool = test_pool().await;
    let name = unique("lock");
    let barrier = Arc::new(Barrier::new(5));

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let lease = PgLease::new(pool.clone(), name.clone());
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                let won = lease.try_acquire(Duration::from_secs(60)).await.unwrap();
                (won, lease)
            })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        let (won, lease) = handle.await.unwrap();
        if won {
            winners.push(lease);
        }
    }
    assert_eq!(winners.len(), 1);
    assert!(winners[0].release().await.unwrap());
}

#[tokio::test]
async fn test_pg_lease_held_until_release() {
    let pool = test_pool().await;
    let name = unique("lock");
    let first = PgLease::new(pool.clone(), name.clone());
    let second = PgLease::new(pool, name);

    assert!(first.try_acquire(Duration::from_secs(60)).await.unwrap());
    assert!(!second.try_acquire(Duration::from_secs(60)).await.unwrap());
    assert!(!second.release().await.unwrap());
    assert!(first.release().await.unwrap());
    assert!(second.try_acquire(Duration::from_secs(60)).await.unwrap());
    second.release().await.unwrap();
}

#[tokio::test]
async fn test_pg_lease_expires() {
    let pool = test_pool().await;
    let name = unique("lock");
    let crashed = PgLease::new(pool.clone(), name.clone());
    let survivor = PgLease::new(pool, name);

    assert!(crashed.try_acquire(Duration::from_millis(200)).await.unwrap());
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(survivor.try_acquire(Duration::from_secs(60)).await.unwrap());
    survivor.release().await.unwrap();
}

#[tokio::test]
async fn test_pg_subject_store_roundtrip() {
    let pool = test_pool().await;
    let store = PgSubjectStore::new(pool);
    let id = unique("subject");

    store
        .upsert(
            &Subject::new(id.clone())
                .with_relationship("tpp-1", true)
                .with_relationship("tpp-2", false),
        )
        .await
        .unwrap();

    let active = store.query_active_relationships(&id).await.unwrap();
    assert_eq!(active.keys().collect::<Vec<_>>(), vec!["tpp-1"]);
    assert!(store
        .query_active_relationships(&unique("missing"))
        .await
        .unwrap()
        .is_empty());

    let streamed: Vec<Subject> = store.stream_all().try_collect().await.unwrap();
    assert!(streamed.iter().any(|s| s.id == id));
}
