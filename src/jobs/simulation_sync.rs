//! Simulation sync job
//!
//! Submits simulations still waiting for a handle, then runs one
//! reconciliation pass over everything that is due.

use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::info;

use super::{interval_secs, run_locked_pass};
use crate::error::ReconcileError;
use crate::services::locks::LockManager;
use crate::services::reconciler::{PassStats, SimulationReconciler};
use crate::services::sync_status::jobs;

pub async fn run_simulation_sync(reconciler: &SimulationReconciler) -> Result<PassStats, ReconcileError> {
    let submitted = reconciler.submit_unsubmitted().await?;
    if submitted > 0 {
        info!(submitted = submitted, "Submitted waiting simulations");
    }
    reconciler.run_pass().await
}

pub fn start_simulation_sync_job(
    db: DatabaseConnection,
    reconciler: SimulationReconciler,
    locks: LockManager,
    poll_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(poll_interval_secs = poll_interval.as_secs(), "Simulation sync job started");
        let mut interval = interval(poll_interval);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping simulation sync job");
                    break;
                }
                _ = interval.tick() => {
                    run_locked_pass(
                        &db,
                        &locks,
                        jobs::SIMULATION_SYNC,
                        interval_secs(poll_interval),
                        run_simulation_sync(&reconciler),
                    )
                    .await;
                }
            }
        }

        info!("Simulation sync job stopped");
    })
}
