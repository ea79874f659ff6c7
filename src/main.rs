use anyhow::Context;
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swoops_reconciler::config::ReconcilerConfig;
use swoops_reconciler::jobs::{
    ownership_sync::start_ownership_sync_job, player_sync::start_player_sync_job,
    simulation_sync::start_simulation_sync_job,
};
use swoops_reconciler::services::{
    events::{LogEmitter, LogGameCompleteHandler},
    locks::LockManager,
    player_sync::PlayerSyncService,
    reconciler::SimulationReconciler,
    simulator_client::{HttpSimulatorClient, SimulatorClient},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,swoops_reconciler=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ReconcilerConfig::from_env().context("Invalid configuration")?;

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .context("Failed to run migrations")?;

    let client: Arc<dyn SimulatorClient> = Arc::new(
        HttpSimulatorClient::new(
            config.simulator_base_url.clone(),
            config.simulator_api_key.clone(),
            config.simulator_timeout,
        )
        .context("Failed to build simulator client")?,
    );
    let locks = LockManager::new(db.clone(), chrono::Duration::seconds(config.job_lock_ttl_secs));
    tracing::info!(holder = locks.holder(), "Lock manager ready");

    let reconciler = SimulationReconciler::new(
        db.clone(),
        client.clone(),
        locks.clone(),
        Arc::new(LogEmitter),
        Arc::new(LogGameCompleteHandler),
    );
    let player_sync = PlayerSyncService::new(db.clone(), client, config.token_range);

    let jobs = vec![
        start_simulation_sync_job(db.clone(), reconciler, locks.clone(), config.simulation_poll_interval),
        start_player_sync_job(db.clone(), player_sync, locks.clone(), config.player_sync_interval),
        start_ownership_sync_job(db.clone(), config.chain.clone(), locks, config.ownership_sync_interval),
    ];
    tracing::info!(jobs = jobs.len(), "Background jobs started");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received, waiting for jobs to stop");

    for job in jobs {
        if let Err(e) = job.await {
            tracing::error!(error = %e, "Job task ended abnormally");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
