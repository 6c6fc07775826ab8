//! PostgreSQL backends.
//!
//! One database serves every replica: the membership structure lives in
//! `membership_filters` / `membership_filter_bits`, leases in `leases` and the
//! authoritative subjects in `subjects`. Tables are created by
//! [`ensure_schema`].

mod config;
mod lease;
mod membership;
mod schema;
mod subjects;

pub use config::DbConfig;
pub use lease::PgLease;
pub use membership::PgMembershipStore;
pub use schema::ensure_schema;
pub use subjects::PgSubjectStore;

use consentgate_core::StoreError;

pub(crate) fn unavailable(e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable {
        reason: e.to_string(),
    }
}
