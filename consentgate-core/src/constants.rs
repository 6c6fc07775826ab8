//! Default values for gate configuration.

// ============================================================================
// MEMBERSHIP STRUCTURE
// ============================================================================

/// Name of the shared Bloom filter.
pub const DEFAULT_BLOOM_NAME: &str = "emd-bloom-filter";

/// Expected number of insertions used to size the filter.
pub const DEFAULT_EXPECTED_INSERTIONS: u64 = 1_000_000;

/// Target false-positive rate.
pub const DEFAULT_FALSE_PROBABILITY: f64 = 0.01;

// ============================================================================
// LEASE
// ============================================================================

/// Name of the lease guarding startup and rebuild cycles.
pub const DEFAULT_LEASE_NAME: &str = "startup-task-lock";

/// How long a lease holder keeps the lease before it expires (seconds).
pub const DEFAULT_LEASE_HOLD_SECS: u64 = 60;

// ============================================================================
// POPULATION
// ============================================================================

/// Number of identifiers loaded per batch.
pub const DEFAULT_POPULATION_BATCH_SIZE: usize = 100;

/// Daily rebuild time, UTC, `HH:MM`.
pub const DEFAULT_REBUILD_AT: &str = "04:00";
