//! consentgate API Server Entry Point
//!
//! Wires the backends, starts the filter lifecycle jobs and serves HTTP
//! until ctrl-c.

use std::sync::Arc;

use consentgate_api::jobs::rebuild_scheduler_task;
use consentgate_api::telemetry::init_tracing;
use consentgate_api::{
    create_api_router, ApiError, ApiResult, AppState, HttpPartnerValidator, LifecycleCoordinator,
    PopulationPipeline, ServiceConfig, StoreBackend,
};
use consentgate_storage::{
    ensure_schema, DbConfig, InMemoryLeaseRegistry, InMemoryMembershipStore, InMemorySubjectStore,
    Lease, MembershipStore, PgLease, PgMembershipStore, PgSubjectStore, SubjectStore,
};
use tokio::sync::watch;

struct Backends {
    membership: Arc<dyn MembershipStore>,
    lease: Arc<dyn Lease>,
    subjects: Arc<dyn SubjectStore>,
}

async fn build_backends(config: &ServiceConfig) -> ApiResult<Backends> {
    let gate = &config.gate;
    match config.backend {
        StoreBackend::Postgres => {
            let pool = DbConfig::from_env().create_pool().map_err(|e| {
                ApiError::configuration_error(format!("Failed to create database pool: {}", e))
            })?;
            ensure_schema(&pool).await.map_err(|e| {
                ApiError::internal_error(format!("Failed to prepare database schema: {}", e))
            })?;

            Ok(Backends {
                membership: Arc::new(PgMembershipStore::new(pool.clone(), gate.bloom_name.clone())),
                lease: Arc::new(PgLease::new(pool.clone(), gate.lease_name.clone())),
                subjects: Arc::new(PgSubjectStore::new(pool)),
            })
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory backends; state is not shared across replicas");
            let registry = InMemoryLeaseRegistry::new();
            Ok(Backends {
                membership: Arc::new(InMemoryMembershipStore::new(gate.bloom_name.clone())),
                lease: Arc::new(registry.lease(gate.lease_name.clone())),
                subjects: Arc::new(InMemorySubjectStore::new()),
            })
        }
    }
}

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing()?;

    let config = ServiceConfig::from_env()?;
    let backends = build_backends(&config).await?;
    let validator = Arc::new(HttpPartnerValidator::new(&config.validator)?);

    let pipeline = PopulationPipeline::new(
        Arc::clone(&backends.subjects),
        Arc::clone(&backends.membership),
        config.gate.population_batch_size,
    );
    let coordinator = Arc::new(LifecycleCoordinator::new(
        backends.lease,
        Arc::clone(&backends.membership),
        pipeline,
        config.gate.clone(),
    ));

    tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move {
            let outcome = coordinator.run_startup().await;
            tracing::info!(outcome = outcome.as_str(), "Startup bloom filter cycle finished");
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(rebuild_scheduler_task(coordinator, shutdown_rx));

    let state = AppState::new(backends.membership, backends.subjects, validator);
    let app = create_api_router(state);

    let addr = config.bind_addr;
    tracing::info!(%addr, backend = ?config.backend, "Starting consentgate API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    if let Err(e) = scheduler.await {
        tracing::error!(error = %e, "Rebuild scheduler task failed");
    }
    Ok(())
}
