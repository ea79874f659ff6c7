//! Background jobs
//!
//! Each job is a spawned interval loop. A pass runs under the job's named
//! lock, so concurrent workers never interleave passes of the same job, and
//! its outcome is recorded in `sync_status`.

use sea_orm::DatabaseConnection;
use std::future::Future;
use tracing::{error, info, warn};

use crate::error::error_chain;
use crate::services::locks::LockManager;
use crate::services::sync_status;

pub mod ownership_sync;
pub mod player_sync;
pub mod simulation_sync;

/// Run one pass of `job` under the lock of the same name.
///
/// Returns `None` when another worker holds the lock or the pass failed;
/// failures are logged and recorded, never propagated.
pub async fn run_locked_pass<F, T, E>(
    db: &DatabaseConnection,
    locks: &LockManager,
    job: &str,
    min_interval_secs: i32,
    pass: F,
) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
{
    match locks.run_exclusive(job, pass).await {
        Ok(None) => {
            info!(job = job, "Lock held by another worker, skipping pass");
            None
        }
        Ok(Some(Ok(value))) => {
            if let Err(e) = sync_status::record_success(db, job, min_interval_secs).await {
                warn!(job = job, error = %e, "Failed to record sync success");
            }
            Some(value)
        }
        Ok(Some(Err(e))) => {
            let detail = error_chain(&e);
            error!(job = job, error = %detail, "Job pass failed");
            if let Err(e2) = sync_status::record_failure(db, job, &detail, min_interval_secs).await {
                warn!(job = job, error = %e2, "Failed to record sync failure");
            }
            None
        }
        Err(e) => {
            error!(job = job, error = %e, "Failed to acquire job lock");
            None
        }
    }
}

/// Interval length in whole seconds, as stored in `sync_status`
pub(crate) fn interval_secs(interval: std::time::Duration) -> i32 {
    i32::try_from(interval.as_secs()).unwrap_or(i32::MAX)
}
