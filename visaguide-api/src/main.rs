//! VisaGuide API Server Entry Point
//!
//! Loads configuration, selects the record store, registers the content
//! generators, optionally starts the repopulation schedule, and serves the
//! Axum router until Ctrl-C.

use std::sync::Arc;

use tokio::sync::watch;
use visaguide_api::jobs::{repopulate_schedule_task, RepopulateScheduleConfig};
use visaguide_api::telemetry::{init_tracing, TelemetryConfig};
use visaguide_api::{
    create_api_router, ApiConfig, ApiError, ApiResult, AppState, DbConfig, PgRecordStore,
    StoreBackend,
};
use visaguide_llm::{GeneratorConfig, GeneratorRegistry};
use visaguide_storage::{InMemoryMirrorStore, InMemoryRecordStore, RecordStore};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let config = ApiConfig::from_env().map_err(|e| ApiError::internal_error(e.to_string()))?;
    init_tracing(&TelemetryConfig::default().with_log_format(config.log_format))?;

    let records: Arc<dyn RecordStore> = match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory record store; records are lost on restart");
            Arc::new(InMemoryRecordStore::new())
        }
        StoreBackend::Postgres => Arc::new(PgRecordStore::new(DbConfig::from_env())),
    };

    let generator_config = GeneratorConfig::from_env();
    let generators = GeneratorRegistry::from_config(&generator_config)?;
    if generators.is_empty() {
        tracing::warn!("No content generator configured; lookups will be rejected");
    } else if !generators.has(config.default_provider) {
        tracing::warn!(
            provider = %config.default_provider,
            "Default provider has no generator; requests must name a provider"
        );
    }

    let schedule = RepopulateScheduleConfig::from_env()
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let mirror = Arc::new(InMemoryMirrorStore::new(config.mirror_channel_capacity));
    let addr = config.bind_addr();
    let state = AppState::new(config, records, mirror, Arc::new(generators));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let schedule_handle = if schedule.enabled {
        let repopulator = (*state.repopulator).clone();
        Some(tokio::spawn(repopulate_schedule_task(
            repopulator,
            schedule,
            shutdown_rx,
        )))
    } else {
        None
    };

    let app = create_api_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(%addr, "Starting VisaGuide API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
        })
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = schedule_handle {
        if let Ok(metrics) = handle.await {
            let snapshot = metrics.snapshot();
            tracing::info!(runs = snapshot.runs, "Repopulation schedule stopped");
        }
    }

    Ok(())
}
