//! Lifecycle Coordinator
//!
//! Builds the shared membership structure at startup and rebuilds it once a
//! day. Every cycle runs under the build lease:
//!
//! ```text
//! try_acquire ─┬─ denied ──────────────────────────────────────► Skipped
//!              └─ granted ─ prepare ─┬─ failed ─────────► release ► InitFailed
//!                                    └─ ready ─ populate ┬► mark ready ► release ► Completed
//!                                                        └► release ► PopulationFailed
//!
//! A freshly created structure answers `contains` with `false` for everything
//! until population finishes, so it is only flagged ready at the end of a
//! successful cycle. The query path treats a not-ready structure as
//! possibly present.
//! ```
//!
//! - Startup: an existing structure is kept and refreshed; a missing one is
//!   created first.
//! - Scheduled: the structure is deleted and recreated unconditionally.
//!
//! Losing the lease race is not an error: another replica is handling the
//! cycle. Failed cycles are not retried before the next trigger.

use crate::jobs::population::{PopulationPipeline, PopulationReport};
use crate::telemetry::metrics;
use chrono::{DateTime, NaiveTime, Utc};
use consentgate_core::{GateConfig, StoreError};
use consentgate_storage::{Lease, MembershipStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

// ============================================================================
// TYPES
// ============================================================================

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleTrigger {
    Startup,
    Scheduled,
}

impl CycleTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleTrigger::Startup => "startup",
            CycleTrigger::Scheduled => "scheduled",
        }
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The lease was held elsewhere (or unreachable); nothing was done.
    Skipped,
    /// The structure is populated.
    Completed {
        /// Whether this cycle created the structure.
        created: bool,
        added: u64,
        scanned: u64,
        eligible: u64,
    },
    /// The structure could not be checked, deleted or created.
    InitFailed { reason: String },
    /// The structure exists but population stopped part way.
    PopulationFailed { reason: String },
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Skipped => "skipped",
            CycleOutcome::Completed { .. } => "completed",
            CycleOutcome::InitFailed { .. } => "init_failed",
            CycleOutcome::PopulationFailed { .. } => "population_failed",
        }
    }

    fn completed(created: bool, report: PopulationReport) -> Self {
        CycleOutcome::Completed {
            created,
            added: report.added,
            scanned: report.scanned,
            eligible: report.eligible,
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// In-process counters for lifecycle activity.
#[derive(Debug, Default)]
pub struct LifecycleMetrics {
    pub cycles_skipped: AtomicU64,
    pub cycles_completed: AtomicU64,
    pub init_failures: AtomicU64,
    pub population_failures: AtomicU64,
    pub ids_added: AtomicU64,
}

impl LifecycleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> LifecycleSnapshot {
        LifecycleSnapshot {
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            init_failures: self.init_failures.load(Ordering::Relaxed),
            population_failures: self.population_failures.load(Ordering::Relaxed),
            ids_added: self.ids_added.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Skipped => self.cycles_skipped.fetch_add(1, Ordering::Relaxed),
            CycleOutcome::Completed { added, .. } => {
                self.ids_added.fetch_add(*added, Ordering::Relaxed);
                self.cycles_completed.fetch_add(1, Ordering::Relaxed)
            }
            CycleOutcome::InitFailed { .. } => self.init_failures.fetch_add(1, Ordering::Relaxed),
            CycleOutcome::PopulationFailed { .. } => {
                self.population_failures.fetch_add(1, Ordering::Relaxed)
            }
        };
    }
}

/// Snapshot of lifecycle metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSnapshot {
    pub cycles_skipped: u64,
    pub cycles_completed: u64,
    pub init_failures: u64,
    pub population_failures: u64,
    pub ids_added: u64,
}

// ============================================================================
// COORDINATOR
// ============================================================================

/// Runs build cycles against the shared membership structure.
pub struct LifecycleCoordinator {
    lease: Arc<dyn Lease>,
    membership: Arc<dyn MembershipStore>,
    pipeline: PopulationPipeline,
    config: GateConfig,
    metrics: Arc<LifecycleMetrics>,
}

impl LifecycleCoordinator {
    pub fn new(
        lease: Arc<dyn Lease>,
        membership: Arc<dyn MembershipStore>,
        pipeline: PopulationPipeline,
        config: GateConfig,
    ) -> Self {
        Self {
            lease,
            membership,
            pipeline,
            config,
            metrics: Arc::new(LifecycleMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<LifecycleMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Startup cycle: refresh an existing structure or create and fill a new one.
    pub async fn run_startup(&self) -> CycleOutcome {
        self.run(CycleTrigger::Startup).await
    }

    /// Scheduled cycle: delete, recreate and fill.
    pub async fn run_rebuild(&self) -> CycleOutcome {
        self.run(CycleTrigger::Scheduled).await
    }

    async fn run(&self, trigger: CycleTrigger) -> CycleOutcome {
        let lease_name = self.lease.name().to_string();
        match self.lease.try_acquire(self.config.lease_hold).await {
            Ok(true) => {
                tracing::debug!(lease = %lease_name, trigger = trigger.as_str(), "Lease acquired");
            }
            Ok(false) => {
                tracing::info!(
                    lease = %lease_name,
                    trigger = trigger.as_str(),
                    "Lease held by another instance, skipping bloom filter cycle"
                );
                return self.finish(trigger, CycleOutcome::Skipped);
            }
            Err(e) => {
                tracing::warn!(
                    lease = %lease_name,
                    trigger = trigger.as_str(),
                    error = %e,
                    "Lease service unavailable, skipping bloom filter cycle"
                );
                return self.finish(trigger, CycleOutcome::Skipped);
            }
        }

        let outcome = self.run_locked(trigger).await;

        match self.lease.release().await {
            Ok(true) => tracing::info!(lease = %lease_name, "Lease released"),
            Ok(false) => tracing::warn!(
                lease = %lease_name,
                "Lease expired before release; hold shorter than the cycle"
            ),
            Err(e) => tracing::error!(
                lease = %lease_name,
                error = %e,
                "Failed to release lease; it frees on expiry"
            ),
        }

        self.finish(trigger, outcome)
    }

    async fn run_locked(&self, trigger: CycleTrigger) -> CycleOutcome {
        let created = match self.prepare(trigger).await {
            Ok(created) => created,
            Err(e) => {
                tracing::error!(
                    filter = %self.membership.name(),
                    trigger = trigger.as_str(),
                    error = %e,
                    "Bloom filter initialization failed"
                );
                return CycleOutcome::InitFailed {
                    reason: e.to_string(),
                };
            }
        };

        let started = Instant::now();
        let result = self.pipeline.run().await;
        let elapsed = started.elapsed();

        let result = match result {
            Ok(report) => match self.membership.mark_ready().await {
                Ok(()) => Ok(report),
                Err(e) => Err(e.to_string()),
            },
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(report) => {
                if let Some(m) = metrics() {
                    m.record_population(trigger.as_str(), report.added, elapsed.as_secs_f64());
                }
                tracing::info!(
                    filter = %self.membership.name(),
                    trigger = trigger.as_str(),
                    created,
                    scanned = report.scanned,
                    eligible = report.eligible,
                    added = report.added,
                    duration_ms = elapsed.as_millis() as u64,
                    "Bloom filter population complete"
                );
                CycleOutcome::completed(created, report)
            }
            Err(reason) => {
                tracing::error!(
                    filter = %self.membership.name(),
                    trigger = trigger.as_str(),
                    error = %reason,
                    "Bloom filter population failed, structure left not ready"
                );
                CycleOutcome::PopulationFailed { reason }
            }
        }
    }

    /// Bring the structure to a populatable state. Returns whether it was
    /// created by this call.
    async fn prepare(&self, trigger: CycleTrigger) -> Result<bool, StoreError> {
        let capacity = self.config.expected_insertions;
        let false_probability = self.config.false_probability;

        match trigger {
            CycleTrigger::Startup => {
                if self.membership.exists().await? {
                    tracing::info!(filter = %self.membership.name(), "Bloom filter exists, refreshing");
                    Ok(false)
                } else {
                    self.membership.init(capacity, false_probability).await
                }
            }
            CycleTrigger::Scheduled => {
                let deleted = self.membership.delete().await?;
                tracing::info!(filter = %self.membership.name(), deleted, "Bloom filter reset");
                self.membership.init(capacity, false_probability).await
            }
        }
    }

    fn finish(&self, trigger: CycleTrigger, outcome: CycleOutcome) -> CycleOutcome {
        self.metrics.record(&outcome);
        if let Some(m) = metrics() {
            m.record_cycle(trigger.as_str(), outcome.as_str());
        }
        outcome
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// Time from `now` until the next `at` (UTC). If `now` is exactly `at`, the
/// next occurrence is a day later.
pub fn duration_until_next(now: DateTime<Utc>, at: NaiveTime) -> Duration {
    let today = now.date_naive().and_time(at).and_utc();
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Background task that runs a rebuild every day at the configured time.
///
/// Shutdown is only observed between cycles; a running rebuild is never
/// cancelled.
pub async fn rebuild_scheduler_task(
    coordinator: Arc<LifecycleCoordinator>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<LifecycleMetrics> {
    let rebuild_at = coordinator.config().rebuild_at;
    tracing::info!(rebuild_at = %rebuild_at, "Bloom filter rebuild scheduler started");

    loop {
        let delay = duration_until_next(Utc::now(), rebuild_at);
        tracing::debug!(delay_secs = delay.as_secs(), "Next bloom filter rebuild scheduled");

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Bloom filter rebuild scheduler shutting down");
                    break;
                }
            }

            _ = tokio::time::sleep(delay) => {
                let outcome = coordinator.run_rebuild().await;
                tracing::info!(outcome = outcome.as_str(), "Scheduled bloom filter rebuild finished");
            }
        }
    }

    let metrics = coordinator.metrics();
    let snapshot = metrics.snapshot();
    tracing::info!(
        cycles_completed = snapshot.cycles_completed,
        cycles_skipped = snapshot.cycles_skipped,
        init_failures = snapshot.init_failures,
        population_failures = snapshot.population_failures,
        ids_added = snapshot.ids_added,
        "Bloom filter rebuild scheduler stopped"
    );
    metrics
}
