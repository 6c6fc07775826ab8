//! Application state shared by all handlers.

use crate::services::{ExistenceGate, MembershipGate};
use consentgate_storage::{MembershipStore, PartnerValidator, SubjectStore};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub existence_gate: Arc<ExistenceGate>,
    pub membership: Arc<dyn MembershipStore>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        membership: Arc<dyn MembershipStore>,
        subjects: Arc<dyn SubjectStore>,
        validator: Arc<dyn PartnerValidator>,
    ) -> Self {
        let membership_gate = MembershipGate::new(Arc::clone(&membership));
        let existence_gate = ExistenceGate::new(membership_gate, subjects, validator);
        Self {
            existence_gate: Arc::new(existence_gate),
            membership,
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<ExistenceGate>, existence_gate);
crate::impl_from_ref!(Arc<dyn MembershipStore>, membership);
crate::impl_from_ref!(Instant, start_time);
