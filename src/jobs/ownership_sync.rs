//! Ownership sync job
//!
//! Pulls new transfer events from the chain (when configured), appends them
//! to the transfer log and recomputes every player's owner.

use sea_orm::DatabaseConnection;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{info, warn};

use super::{interval_secs, run_locked_pass};
use crate::config::ChainConfig;
use crate::models::transfer::OwnershipScope;
use crate::services::locks::LockManager;
use crate::services::ownership::{highest_ingested_block, ingest_transfers, OwnershipReconciler};
use crate::services::sync_status::jobs;
use crate::services::transfer_scanner::{ChainError, TransferLogScanner};

#[derive(Debug, Error)]
pub enum OwnershipSyncError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OwnershipSyncStats {
    pub ingested: u64,
    pub changed: usize,
}

pub async fn run_ownership_sync(
    db: &DatabaseConnection,
    scanner: Option<&TransferLogScanner>,
    reconciler: &OwnershipReconciler,
) -> Result<OwnershipSyncStats, OwnershipSyncError> {
    let ingested = match scanner {
        Some(scanner) => {
            let from_block = scanner.resume_block(highest_ingested_block(db).await?);
            let entries = scanner.scan_from(from_block).await?;
            ingest_transfers(db, &entries).await?
        }
        None => 0,
    };

    let changed = reconciler.reconcile(&OwnershipScope::All).await?;
    info!(ingested = ingested, changed = changed, "Ownership sync complete");

    Ok(OwnershipSyncStats { ingested, changed })
}

pub fn start_ownership_sync_job(
    db: DatabaseConnection,
    chain: Option<ChainConfig>,
    locks: LockManager,
    sync_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let scanner = match chain {
            Some(chain) => {
                match TransferLogScanner::new(&chain.rpc_url, &chain.contract_address, chain.deploy_block).await {
                    Ok(scanner) => Some(scanner),
                    Err(e) => {
                        warn!(error = %e, "Transfer scanner unavailable, recomputing from stored transfers only");
                        None
                    }
                }
            }
            None => {
                info!("ETH_RPC_URL or PLAYER_CONTRACT_ADDRESS not set, transfer scanning disabled");
                None
            }
        };

        let reconciler = OwnershipReconciler::new(db.clone());
        info!(
            sync_interval_secs = sync_interval.as_secs(),
            scanning = scanner.is_some(),
            "Ownership sync job started"
        );
        let mut interval = interval(sync_interval);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping ownership sync job");
                    break;
                }
                _ = interval.tick() => {
                    run_locked_pass(
                        &db,
                        &locks,
                        jobs::OWNERSHIP_SYNC,
                        interval_secs(sync_interval),
                        run_ownership_sync(&db, scanner.as_ref(), &reconciler),
                    )
                    .await;
                }
            }
        }

        info!("Ownership sync job stopped");
    })
}
