//! REST API Route Handlers
//!
//! - `citizen`: the public existence check
//! - `health`: liveness and readiness probes

pub mod citizen;
pub mod health;

pub use citizen::create_router as citizen_router;
pub use health::create_router as health_router;
