//! Population Pipeline
//!
//! Streams every subject from the backing store, keeps those with at least
//! one active relationship and loads their identifiers into the membership
//! structure in fixed-size batches.
//!
//! The adds of one batch run concurrently and the batch is awaited as a
//! whole before the next one starts, so at most `batch_size` adds are ever
//! in flight and `run` only returns once every add has been acknowledged.

use consentgate_core::{GateResult, SubjectId};
use consentgate_storage::{MembershipStore, SubjectStore};
use futures_util::future::try_join_all;
use futures_util::TryStreamExt;
use std::sync::Arc;

/// Counts from one population run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulationReport {
    /// Subjects read from the backing store.
    pub scanned: u64,
    /// Subjects with at least one active relationship.
    pub eligible: u64,
    /// Identifiers that changed the structure (not already present).
    pub added: u64,
    /// Batches sent.
    pub batches: u64,
}

/// Loads the membership structure from the backing store.
#[derive(Clone)]
pub struct PopulationPipeline {
    subjects: Arc<dyn SubjectStore>,
    membership: Arc<dyn MembershipStore>,
    batch_size: usize,
}

impl PopulationPipeline {
    pub fn new(
        subjects: Arc<dyn SubjectStore>,
        membership: Arc<dyn MembershipStore>,
        batch_size: usize,
    ) -> Self {
        Self {
            subjects,
            membership,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Run one full pass. A stream or store error aborts the pass; batches
    /// already loaded stay loaded.
    pub async fn run(&self) -> GateResult<PopulationReport> {
        let mut report = PopulationReport::default();
        let mut batch: Vec<SubjectId> = Vec::with_capacity(self.batch_size);
        let mut subjects = self.subjects.stream_all();

        while let Some(subject) = subjects.try_next().await? {
            report.scanned += 1;
            if !subject.is_cache_eligible() {
                continue;
            }
            report.eligible += 1;
            batch.push(subject.id);

            if batch.len() == self.batch_size {
                report.added += self.load_batch(&batch).await?;
                report.batches += 1;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            report.added += self.load_batch(&batch).await?;
            report.batches += 1;
        }

        tracing::debug!(
            scanned = report.scanned,
            eligible = report.eligible,
            added = report.added,
            batches = report.batches,
            "Population pass finished"
        );
        Ok(report)
    }

    async fn load_batch(&self, ids: &[SubjectId]) -> GateResult<u64> {
        let changed = try_join_all(ids.iter().map(|id| self.membership.add(id))).await?;
        Ok(changed.into_iter().filter(|c| *c).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consentgate_core::{GateError, Subject};
    use consentgate_storage::{InMemoryMembershipStore, InMemorySubjectStore};

    async fn ready_store() -> Arc<InMemoryMembershipStore> {
        let store = Arc::new(InMemoryMembershipStore::new("test"));
        store.init(1000, 0.001).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_only_eligible_subjects_are_loaded() {
        let subjects = Arc::new(InMemorySubjectStore::with_subjects([
            Subject::new("A").with_relationship("tpp-1", true),
            Subject::new("B").with_relationship("tpp-1", false),
            Subject::new("C"),
        ]));
        let membership = ready_store().await;
        let pipeline = PopulationPipeline::new(subjects, membership.clone(), 100);

        let report = pipeline.run().await.unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.eligible, 1);
        assert_eq!(report.added, 1);
        assert_eq!(report.batches, 1);
        assert!(membership.contains("A").await.unwrap());
    }

    #[tokio::test]
    async fn test_batches_are_split_by_size() {
        let subjects = Arc::new(InMemorySubjectStore::with_subjects(
            (0..25).map(|i| Subject::new(format!("S{}", i)).with_relationship("tpp-1", true)),
        ));
        let pipeline = PopulationPipeline::new(subjects, ready_store().await, 10);

        let report = pipeline.run().await.unwrap();
        assert_eq!(report.eligible, 25);
        assert_eq!(report.batches, 3);
    }

    #[tokio::test]
    async fn test_uninitialized_structure_aborts() {
        let subjects = Arc::new(InMemorySubjectStore::with_subjects([
            Subject::new("A").with_relationship("tpp-1", true),
        ]));
        let membership = Arc::new(InMemoryMembershipStore::new("missing"));
        let pipeline = PopulationPipeline::new(subjects, membership, 10);

        assert!(matches!(pipeline.run().await, Err(GateError::Store(_))));
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let pipeline = PopulationPipeline::new(
            Arc::new(InMemorySubjectStore::new()),
            Arc::new(InMemoryMembershipStore::new("test")),
            0,
        );
        assert_eq!(pipeline.batch_size(), 1);
    }
}
