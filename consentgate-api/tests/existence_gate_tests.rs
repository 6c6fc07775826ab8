//! Existence gate decision paths.
//!
//! A membership miss is conclusive; a hit is always confirmed against the
//! backing store and, when there is something to confirm, the partner
//! registry. Upstream failures on a hit are errors, never a negative answer.

use consentgate_api::{ExistenceGate, GateDecision, MembershipGate};
use consentgate_core::GateError;
use consentgate_test_utils::fixtures::{active_subject, inactive_subject};
use consentgate_test_utils::*;
use std::sync::Arc;

const CITIZEN: &str = "RSSMRA85T10A562S";

struct Harness {
    membership: CountingMembershipStore,
    subjects: CountingSubjectStore,
    validator: MockPartnerValidator,
    gate: ExistenceGate,
}

async fn harness(subjects: Vec<Subject>, in_filter: &[&str]) -> Harness {
    let membership = CountingMembershipStore::new("emd-bloom-filter");
    membership.init(1000, 0.001).await.unwrap();
    for id in in_filter {
        membership.add(id).await.unwrap();
    }
    membership.mark_ready().await.unwrap();
    let subjects = CountingSubjectStore::new(subjects);
    let validator = MockPartnerValidator::new();

    let gate = ExistenceGate::new(
        MembershipGate::new(Arc::new(membership.clone())),
        Arc::new(subjects.clone()),
        Arc::new(validator.clone()),
    );
    Harness {
        membership,
        subjects,
        validator,
        gate,
    }
}

#[tokio::test]
async fn test_miss_short_circuits_all_collaborators() {
    let h = harness(vec![active_subject(CITIZEN, &["tpp-1"])], &[]).await;
    h.validator.set_partner("tpp-1", true);

    assert_eq!(h.gate.decide(CITIZEN).await.unwrap(), GateDecision::Miss);
    assert!(!h.gate.check(CITIZEN).await.unwrap());
    assert_eq!(h.membership.contains_calls(), 2);
    assert_eq!(h.subjects.query_calls(), 0);
    assert_eq!(h.validator.calls(), 0);
}

#[tokio::test]
async fn test_hit_without_active_relationship_skips_validator() {
    let h = harness(vec![inactive_subject(CITIZEN, &["tpp-1"])], &[CITIZEN]).await;

    assert_eq!(
        h.gate.decide(CITIZEN).await.unwrap(),
        GateDecision::FalsePositive
    );
    assert_eq!(h.subjects.query_calls(), 1);
    assert_eq!(h.validator.calls(), 0);
}

#[tokio::test]
async fn test_hit_for_unknown_subject_is_false_positive() {
    let h = harness(vec![], &[CITIZEN]).await;

    assert!(!h.gate.check(CITIZEN).await.unwrap());
    assert_eq!(h.validator.calls(), 0);
}

#[tokio::test]
async fn test_active_partner_confirms_presence() {
    let h = harness(vec![active_subject(CITIZEN, &["tpp-1"])], &[CITIZEN]).await;
    h.validator.set_partner("tpp-1", true);

    assert_eq!(h.gate.decide(CITIZEN).await.unwrap(), GateDecision::Confirmed);
    assert_eq!(h.validator.calls(), 1);
    assert_eq!(h.validator.last_request(), vec!["tpp-1".to_string()]);
}

#[tokio::test]
async fn test_inactive_partner_denies_presence() {
    let h = harness(vec![active_subject(CITIZEN, &["tpp-1"])], &[CITIZEN]).await;
    h.validator.set_partner("tpp-1", false);

    assert_eq!(
        h.gate.decide(CITIZEN).await.unwrap(),
        GateDecision::NoActivePartner
    );
    assert!(!h.gate.check(CITIZEN).await.unwrap());
}

#[tokio::test]
async fn test_only_active_relationships_are_sent_for_validation() {
    let subject = Subject::new(CITIZEN)
        .with_relationship("tpp-1", false)
        .with_relationship("tpp-2", true)
        .with_relationship("tpp-3", true);
    let h = harness(vec![subject], &[CITIZEN]).await;
    h.validator.set_partner("tpp-3", true);

    assert!(h.gate.check(CITIZEN).await.unwrap());
    assert_eq!(
        h.validator.last_request(),
        vec!["tpp-2".to_string(), "tpp-3".to_string()]
    );
}

#[tokio::test]
async fn test_partner_unknown_to_registry_is_not_active() {
    let h = harness(vec![active_subject(CITIZEN, &["tpp-gone"])], &[CITIZEN]).await;

    assert!(!h.gate.check(CITIZEN).await.unwrap());
    assert_eq!(h.validator.calls(), 1);
}

#[tokio::test]
async fn test_backing_store_failure_propagates() {
    let h = harness(vec![active_subject(CITIZEN, &["tpp-1"])], &[CITIZEN]).await;
    h.subjects.fail_query(true);

    let err = h.gate.check(CITIZEN).await.unwrap_err();
    assert!(err.is_upstream());
    assert_eq!(h.validator.calls(), 0);
}

#[tokio::test]
async fn test_validator_failure_propagates() {
    let h = harness(vec![active_subject(CITIZEN, &["tpp-1"])], &[CITIZEN]).await;
    h.validator.fail(true);

    assert!(matches!(
        h.gate.check(CITIZEN).await,
        Err(GateError::Upstream(UpstreamError::ValidatorStatus { .. }))
    ));
}

#[tokio::test]
async fn test_membership_failure_falls_through_to_confirmation() {
    let h = harness(vec![active_subject(CITIZEN, &["tpp-1"])], &[]).await;
    h.validator.set_partner("tpp-1", true);
    h.membership.fail_contains(true);

    assert!(h.gate.check(CITIZEN).await.unwrap());
    assert_eq!(h.subjects.query_calls(), 1);
}

#[tokio::test]
async fn test_missing_structure_falls_through_to_confirmation() {
    let subjects = CountingSubjectStore::new(vec![active_subject(CITIZEN, &["tpp-1"])]);
    let validator = MockPartnerValidator::new().with_partner("tpp-1", true);
    let gate = ExistenceGate::new(
        MembershipGate::new(Arc::new(InMemoryMembershipStore::new("never-built"))),
        Arc::new(subjects.clone()),
        Arc::new(validator),
    );

    assert!(gate.check(CITIZEN).await.unwrap());
    assert!(!gate.check("VRDGPP80A01H501X").await.unwrap());
}

#[tokio::test]
async fn test_side_channel_insert_makes_new_subject_visible() {
    let h = harness(vec![], &[]).await;
    let subject = active_subject(CITIZEN, &["tpp-1"]);
    h.subjects.inner().upsert(subject.clone());
    h.validator.set_partner("tpp-1", true);
    assert!(!h.gate.check(CITIZEN).await.unwrap());

    let side_channel = MembershipGate::new(Arc::new(h.membership.clone()));
    assert!(side_channel.record_new_subject(&subject).await);
    assert!(h.gate.check(CITIZEN).await.unwrap());
}
