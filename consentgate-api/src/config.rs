//! Service Configuration Module
//!
//! Everything the binary reads from the environment besides the gate
//! parameters (which live in `consentgate_core::GateConfig`) and the
//! database pool (`consentgate_storage::DbConfig`).

use crate::constants::{DEFAULT_API_BIND, DEFAULT_API_PORT, DEFAULT_TPP_BASE_URL, DEFAULT_TPP_TIMEOUT_MS};
use crate::error::{ApiError, ApiResult};
use consentgate_core::{ConfigError, GateConfig};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// PARTNER REGISTRY
// ============================================================================

/// Where and how to reach the partner registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Base URL, without trailing slash.
    pub base_url: String,

    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TPP_BASE_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TPP_TIMEOUT_MS),
        }
    }
}

impl ValidatorConfig {
    /// Create ValidatorConfig from environment variables.
    ///
    /// Environment variables:
    /// - `CONSENTGATE_TPP_BASE_URL`: partner registry base URL (default: http://localhost:8080)
    /// - `CONSENTGATE_TPP_TIMEOUT_MS`: request timeout (default: 5000)
    pub fn from_env() -> Self {
        let base_url = std::env::var("CONSENTGATE_TPP_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_TPP_BASE_URL.to_string());

        let timeout = Duration::from_millis(
            std::env::var("CONSENTGATE_TPP_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TPP_TIMEOUT_MS),
        );

        Self { base_url, timeout }
    }
}

// ============================================================================
// STORE BACKEND
// ============================================================================

/// Which family of backends the binary wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Shared PostgreSQL database; required for more than one replica.
    #[default]
    Postgres,
    /// Process-local state; single replica only.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::InvalidValue {
                field: "CONSENTGATE_STORE_BACKEND".to_string(),
                value: other.to_string(),
                reason: "expected 'postgres' or 'memory'".to_string(),
            }),
        }
    }
}

// ============================================================================
// SERVICE CONFIGURATION
// ============================================================================

/// Full configuration of the service binary.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub gate: GateConfig,
    pub validator: ValidatorConfig,
    pub backend: StoreBackend,
    pub bind_addr: SocketAddr,
}

impl ServiceConfig {
    pub fn from_env() -> ApiResult<Self> {
        let backend = match std::env::var("CONSENTGATE_STORE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => StoreBackend::default(),
        };

        Ok(Self {
            gate: GateConfig::from_env()?,
            validator: ValidatorConfig::from_env(),
            backend,
            bind_addr: resolve_bind_addr()?,
        })
    }
}

/// Resolve the listen address from `CONSENTGATE_API_BIND` and `PORT` (or
/// `CONSENTGATE_API_PORT`).
pub fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("CONSENTGATE_API_BIND").unwrap_or_else(|_| DEFAULT_API_BIND.to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("CONSENTGATE_API_PORT").ok())
        .unwrap_or_else(|| DEFAULT_API_PORT.to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
