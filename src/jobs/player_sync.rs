//! Player sync job
//!
//! Mirrors the simulator's player listing. Skips the startup pass when the
//! last successful sync is more recent than the interval.

use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{info, warn};

use super::{interval_secs, run_locked_pass};
use crate::services::locks::LockManager;
use crate::services::player_sync::PlayerSyncService;
use crate::services::sync_status::{self, jobs};

pub fn start_player_sync_job(
    db: DatabaseConnection,
    service: PlayerSyncService,
    locks: LockManager,
    sync_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(sync_interval_secs = sync_interval.as_secs(), "Player sync job started");
        let mut interval = interval(sync_interval);

        // First tick completes immediately; decide whether it should run
        interval.tick().await;
        match sync_status::should_sync(&db, jobs::PLAYER_SYNC).await {
            Ok(false) => info!("Skipping player sync on startup (recently synced)"),
            Ok(true) => sync_once(&db, &service, &locks, sync_interval).await,
            Err(e) => {
                warn!(error = %e, "Failed to check sync status, running player sync anyway");
                sync_once(&db, &service, &locks, sync_interval).await;
            }
        }

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping player sync job");
                    break;
                }
                _ = interval.tick() => {
                    sync_once(&db, &service, &locks, sync_interval).await;
                }
            }
        }

        info!("Player sync job stopped");
    })
}

async fn sync_once(db: &DatabaseConnection, service: &PlayerSyncService, locks: &LockManager, sync_interval: Duration) {
    run_locked_pass(db, locks, jobs::PLAYER_SYNC, interval_secs(sync_interval), service.sync()).await;
}
