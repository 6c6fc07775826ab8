//! Error types for gate operations

use thiserror::Error;

/// Membership store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Membership structure {name} does not exist")]
    NotInitialized { name: String },

    #[error("Membership structure {name} already exists with different parameters: {reason}")]
    ParameterMismatch { name: String, reason: String },

    #[error("Invalid membership parameters: {reason}")]
    InvalidParameters { reason: String },

    #[error("Membership store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Lease service errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LeaseError {
    #[error("Lease service unavailable for {name}: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("Invalid hold duration for {name}: {reason}")]
    InvalidHold { name: String, reason: String },
}

/// Failures of the collaborators consulted on the confirmation path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Backing store failed: {reason}")]
    BackingStore { reason: String },

    #[error("Partner validator failed: {reason}")]
    Validator { reason: String },

    #[error("Partner validator returned status {status}: {message}")]
    ValidatorStatus { status: u16, message: String },

    #[error("Malformed record {id}: {reason}")]
    MalformedRecord { id: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for gate operations.
#[derive(Debug, Clone, Error)]
pub enum GateError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Lease error: {0}")]
    Lease(#[from] LeaseError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl GateError {
    /// Whether the failure came from a collaborator consulted while confirming
    /// a cache hit.
    pub fn is_upstream(&self) -> bool {
        matches!(self, GateError::Upstream(_))
    }
}

/// Result type alias for gate operations.
pub type GateResult<T> = Result<T, GateError>;

// =============================================================================
// TESTS
// =============================================================================
