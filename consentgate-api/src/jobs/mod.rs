//! Background Jobs
//!
//! - `population`: streams subjects into the membership structure
//! - `lifecycle`: startup build and daily rebuild under the build lease
//!
//! # Usage
//!
//! ```ignore
//! use consentgate_api::jobs::{rebuild_scheduler_task, LifecycleCoordinator};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let coordinator = Arc::new(LifecycleCoordinator::new(lease, membership, pipeline, config));
//!
//! tokio::spawn({
//!     let coordinator = Arc::clone(&coordinator);
//!     async move { coordinator.run_startup().await }
//! });
//! tokio::spawn(rebuild_scheduler_task(coordinator, shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod lifecycle;
pub mod population;

pub use lifecycle::{
    duration_until_next, rebuild_scheduler_task, CycleOutcome, CycleTrigger, LifecycleCoordinator,
    LifecycleMetrics, LifecycleSnapshot,
};
pub use population::{PopulationPipeline, PopulationReport};
