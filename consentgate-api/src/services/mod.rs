//! Service Layer
//!
//! The query path. `MembershipGate` answers "definitely absent / possibly
//! present" from the shared structure; `ExistenceGate` turns a "possibly
//! present" into an authoritative answer using the backing store and the
//! partner registry.

mod existence_gate;
mod membership_gate;

pub use existence_gate::*;
pub use membership_gate::*;
