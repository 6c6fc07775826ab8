//! Property tests for the in-memory membership store.
//!
//! - no false negatives for any set of added ids
//! - empirical false-positive rate stays near the configured target

use consentgate_storage::{InMemoryMembershipStore, MembershipStore};
use proptest::prelude::*;
use tokio::runtime::{Builder, Runtime};

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Builder::new_current_thread()
        .build()
        .map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

#[tokio::test]
async fn test_reference_scenario() {
    let store = InMemoryMembershipStore::new("emd-bloom-filter");
    assert!(store.init(1000, 0.01).await.unwrap());

    for i in 1..=500 {
        store.add(&format!("A{}", i)).await.unwrap();
    }

    assert!(store.contains("A1").await.unwrap());
    assert!(store.contains("A500").await.unwrap());
    assert!(!store.contains("B999").await.unwrap());
}

#[tokio::test]
async fn test_false_positive_rate_within_tolerance() {
    let store = InMemoryMembershipStore::new("fp-rate");
    store.init(1000, 0.01).await.unwrap();

    for i in 0..1000 {
        store.add(&format!("member-{}", i)).await.unwrap();
    }

    let samples = 10_000;
    let mut false_positives = 0usize;
    for i in 0..samples {
        if store.contains(&format!("probe-{}", i)).await.unwrap() {
            false_positives += 1;
        }
    }
    let rate = false_positives as f64 / samples as f64;
    assert!(rate <= 0.02, "false-positive rate {} above tolerance", rate);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_no_false_negatives(
        ids in prop::collection::vec("[A-Z0-9]{1,16}", 1..300),
        capacity in 1u64..2000,
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let store = InMemoryMembershipStore::new("prop");
            store.init(capacity, 0.01).await.unwrap();
            for id in &ids {
                store.add(id).await.unwrap();
            }
            for id in &ids {
                prop_assert!(store.contains(id).await.unwrap(), "lost {}", id);
            }
            Ok::<_, TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_membership_survives_other_handles(
        ids in prop::collection::vec("[a-z]{4,12}", 1..100),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let writer = InMemoryMembershipStore::new("shared");
            let reader = writer.clone();
            writer.init(500, 0.001).await.unwrap();
            for id in &ids {
                writer.add(id).await.unwrap();
            }
            for id in &ids {
                prop_assert!(reader.contains(id).await.unwrap());
            }
            Ok::<_, TestCaseError>(())
        })?;
    }
}
