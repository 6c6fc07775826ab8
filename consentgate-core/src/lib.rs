//! consentgate core
//!
//! Domain types shared by the storage backends and the service: subjects and
//! their partner relationships, Bloom filter geometry, gate configuration and
//! the error taxonomy.

pub mod bloom;
pub mod config;
pub mod constants;
pub mod error;
pub mod identity;
pub mod partner;
pub mod subject;

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use bloom::{BloomBits, BloomGeometry, MAX_BITS};
pub use config::GateConfig;
pub use error::{ConfigError, GateError, GateResult, LeaseError, StoreError, UpstreamError};
pub use identity::{hash_for_log, is_valid_fiscal_code};
pub use partner::{any_active, PartnerStatus};
pub use subject::{PartnerId, Relationship, Subject, SubjectId};
