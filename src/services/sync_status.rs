//! Sync status tracking for the background jobs
//!
//! Each job records its last attempt and last success, so a restart does not
//! immediately repeat work that ran moments before.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};

use crate::entities::sync_status::{self, Entity as SyncStatus};

/// Job names for tracking sync status
pub mod jobs {
    pub const SIMULATION_SYNC: &str = "simulation_sync";
    pub const PLAYER_SYNC: &str = "player_sync";
    pub const OWNERSHIP_SYNC: &str = "ownership_sync";
}

async fn find(db: &DatabaseConnection, job_name: &str) -> Result<Option<sync_status::Model>, DbErr> {
    SyncStatus::find()
        .filter(sync_status::Column::JobName.eq(job_name))
        .one(db)
        .await
}

/// Whether a record permits running at `now`
pub fn is_sync_due(record: Option<&sync_status::Model>, now: DateTime<Utc>) -> bool {
    let Some(record) = record else {
        return true;
    };
    match record.last_success_at {
        None => true,
        Some(last_success) => {
            now.signed_duration_since(last_success) >= Duration::seconds(record.min_interval_secs as i64)
        }
    }
}

/// Check if a sync job should run based on its last successful sync
///
/// Returns true if there is no record yet, the job never succeeded, or the
/// last success is at least the job's minimum interval ago.
pub async fn should_sync(db: &DatabaseConnection, job_name: &str) -> Result<bool, DbErr> {
    let record = find(db, job_name).await?;
    let due = is_sync_due(record.as_ref(), Utc::now());

    match record.as_ref().and_then(|r| r.last_success_at) {
        None => tracing::info!(job = job_name, "No previous successful sync, will sync"),
        Some(last_success) if due => {
            tracing::info!(job = job_name, last_success = %last_success, "Will sync")
        }
        Some(last_success) => {
            tracing::info!(job = job_name, last_success = %last_success, "Skipping sync, ran recently")
        }
    }

    Ok(due)
}

/// Record a successful sync
pub async fn record_success(
    db: &DatabaseConnection,
    job_name: &str,
    default_interval_secs: i32,
) -> Result<(), DbErr> {
    let now = Utc::now();

    match find(db, job_name).await? {
        Some(record) => {
            let success_count = record.success_count + 1;
            let mut active_model: sync_status::ActiveModel = record.into();
            active_model.last_success_at = Set(Some(now));
            active_model.last_attempt_at = Set(Some(now));
            active_model.last_error = Set(None);
            active_model.success_count = Set(success_count);
            active_model.update(db).await?;
        }
        None => {
            let new_record = sync_status::ActiveModel {
                job_name: Set(job_name.to_string()),
                last_success_at: Set(Some(now)),
                last_attempt_at: Set(Some(now)),
                last_error: Set(None),
                success_count: Set(1),
                error_count: Set(0),
                min_interval_secs: Set(default_interval_secs),
                ..Default::default()
            };
            new_record.insert(db).await?;
        }
    }

    tracing::debug!(job = job_name, "Recorded successful sync");
    Ok(())
}

/// Record a failed sync attempt
pub async fn record_failure(
    db: &DatabaseConnection,
    job_name: &str,
    error: &str,
    default_interval_secs: i32,
) -> Result<(), DbErr> {
    let now = Utc::now();

    match find(db, job_name).await? {
        Some(record) => {
            let error_count = record.error_count + 1;
            let mut active_model: sync_status::ActiveModel = record.into();
            active_model.last_attempt_at = Set(Some(now));
            active_model.last_error = Set(Some(error.to_string()));
            active_model.error_count = Set(error_count);
            active_model.update(db).await?;
        }
        None => {
            let new_record = sync_status::ActiveModel {
                job_name: Set(job_name.to_string()),
                last_success_at: Set(None),
                last_attempt_at: Set(Some(now)),
                last_error: Set(Some(error.to_string())),
                success_count: Set(0),
                error_count: Set(1),
                min_interval_secs: Set(default_interval_secs),
                ..Default::default()
            };
            new_record.insert(db).await?;
        }
    }

    tracing::debug!(job = job_name, error = error, "Recorded failed sync");
    Ok(())
}
