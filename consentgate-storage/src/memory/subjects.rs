//! Subjects held in process memory.

use crate::traits::SubjectStore;
use async_trait::async_trait;
use consentgate_core::{PartnerId, Subject, SubjectId, UpstreamError};
use futures_util::stream::{self, BoxStream, StreamExt};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// In-memory [`SubjectStore`]. Clones share the same subjects.
#[derive(Clone, Default)]
pub struct InMemorySubjectStore {
    subjects: Arc<RwLock<BTreeMap<SubjectId, Subject>>>,
}

impl InMemorySubjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subjects(subjects: impl IntoIterator<Item = Subject>) -> Self {
        let store = Self::new();
        for subject in subjects {
            store.upsert(subject);
        }
        store
    }

    /// Insert or replace a subject. Returns whether it was new.
    pub fn upsert(&self, subject: Subject) -> bool {
        match self.subjects.write() {
            Ok(mut guard) => guard.insert(subject.id.clone(), subject).is_none(),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.subjects.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> UpstreamError {
        UpstreamError::BackingStore {
            reason: "subject table lock poisoned".to_string(),
        }
    }
}

#[async_trait]
impl SubjectStore for InMemorySubjectStore {
    fn stream_all(&self) -> BoxStream<'_, Result<Subject, UpstreamError>> {
        let snapshot: Vec<Result<Subject, UpstreamError>> = match self.subjects.read() {
            Ok(guard) => guard.values().cloned().map(Ok).collect(),
            Err(_) => vec![Err(Self::poisoned())],
        };
        stream::iter(snapshot).boxed()
    }

    async fn query_active_relationships(
        &self,
        id: &str,
    ) -> Result<BTreeMap<PartnerId, bool>, UpstreamError> {
        let guard = self.subjects.read().map_err(|_| Self::poisoned())?;
        Ok(guard
            .get(id)
            .map(|subject| {
                subject
                    .active_partner_ids()
                    .into_iter()
                    .map(|partner| (partner, true))
                    .collect()
            })
            .unwrap_or_default())
    }
}
