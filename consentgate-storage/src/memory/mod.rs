//! In-process backends.

mod lease;
mod membership;
mod subjects;

pub use lease::{InMemoryLease, InMemoryLeaseRegistry};
pub use membership::InMemoryMembershipStore;
pub use subjects::InMemorySubjectStore;
