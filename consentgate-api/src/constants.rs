//! Constants for the consentgate API
//!
//! Default values and fixed strings used across the service.

// ============================================================================
// HTTP SURFACE
// ============================================================================

/// Body returned when a subject has at least one enabled channel.
pub const BODY_CHANNELS_ENABLED: &str = "OK";

/// Body returned when a subject has no enabled channel.
pub const BODY_NO_CHANNELS_ENABLED: &str = "NO CHANNELS ENABLED";

/// Default bind host
pub const DEFAULT_API_BIND: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_API_PORT: u16 = 3000;

// ============================================================================
// PARTNER REGISTRY
// ============================================================================

/// Default base URL of the partner registry.
pub const DEFAULT_TPP_BASE_URL: &str = "http://localhost:8080";

/// Path of the bulk partner lookup, relative to the base URL.
pub const TPP_LIST_PATH: &str = "/emd/tpp/list";

/// Default request timeout for the partner registry (milliseconds).
pub const DEFAULT_TPP_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// LOGGING
// ============================================================================

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "consentgate_api=debug,tower_http=debug,info";
