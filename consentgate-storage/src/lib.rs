//! consentgate storage
//!
//! The collaborators the gate talks to, as traits, with two families of
//! implementations:
//!
//! - [`memory`]: single-process backends for tests and local runs. Clones
//!   share state, so several handles behave like several replicas.
//! - [`pg`]: PostgreSQL backends. Every replica pointed at the same database
//!   sees one membership structure and one set of leases.

pub mod memory;
pub mod pg;
pub mod traits;

pub use memory::{InMemoryLease, InMemoryLeaseRegistry, InMemoryMembershipStore, InMemorySubjectStore};
pub use pg::{ensure_schema, DbConfig, PgLease, PgMembershipStore, PgSubjectStore};
pub use traits::{Lease, MembershipStore, PartnerValidator, SubjectStore};
