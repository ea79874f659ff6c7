//! Named job locks
//!
//! A lock is a lease row in `job_locks`. Holding it means no other worker,
//! in this process or another, runs the same job. Leases expire after the
//! TTL so a crashed holder cannot block a job forever.

use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set, SqlErr};
use std::future::Future;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::entities::{job_locks, prelude::JobLocks};

/// Lock names, one per job
pub mod names {
    pub const SIMULATION_SYNC: &str = "simulation_sync";
    pub const PLAYER_SYNC: &str = "player_sync";
    pub const OWNERSHIP_SYNC: &str = "ownership_sync";

    /// Submission is serialized per simulation
    pub fn simulation_submit(simulation_id: i32) -> String {
        format!("simulation_submit:{}", simulation_id)
    }
}

/// Default lease length
pub const DEFAULT_LOCK_TTL_SECS: i64 = 600;

#[derive(Clone)]
pub struct LockManager {
    db: DatabaseConnection,
    holder: String,
    ttl: Duration,
}

impl LockManager {
    pub fn new(db: DatabaseConnection, ttl: Duration) -> Self {
        Self::with_holder(db, format!("worker-{}", Uuid::new_v4()), ttl)
    }

    pub fn with_holder(db: DatabaseConnection, holder: String, ttl: Duration) -> Self {
        Self { db, holder, ttl }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub async fn try_acquire(&self, name: &str) -> Result<bool, DbErr> {
        self.try_acquire_at(name, Utc::now()).await
    }

    /// Take the lease if it is free, expired, or already ours (renewing it).
    ///
    /// Both the renewal and the takeover are conditional updates, so of two
    /// workers racing for an expired lease only one sees its row change.
    pub async fn try_acquire_at(&self, name: &str, now: DateTime<Utc>) -> Result<bool, DbErr> {
        let lease_until = now + self.ttl;

        let renewed = JobLocks::update_many()
            .col_expr(job_locks::Column::LeaseUntil, Expr::value(lease_until))
            .filter(job_locks::Column::Name.eq(name))
            .filter(job_locks::Column::Holder.eq(self.holder.as_str()))
            .exec(&self.db)
            .await?;
        if renewed.rows_affected == 1 {
            debug!(lock = name, holder = %self.holder, lease_until = %lease_until, "Lock renewed");
            return Ok(true);
        }

        let taken = JobLocks::update_many()
            .col_expr(job_locks::Column::Holder, Expr::value(self.holder.clone()))
            .col_expr(job_locks::Column::AcquiredAt, Expr::value(now))
            .col_expr(job_locks::Column::LeaseUntil, Expr::value(lease_until))
            .filter(job_locks::Column::Name.eq(name))
            .filter(job_locks::Column::LeaseUntil.lte(now))
            .exec(&self.db)
            .await?;
        if taken.rows_affected == 1 {
            info!(lock = name, holder = %self.holder, "Took over expired lock");
            return Ok(true);
        }

        let lock = job_locks::ActiveModel {
            name: Set(name.to_string()),
            holder: Set(self.holder.clone()),
            acquired_at: Set(now),
            lease_until: Set(lease_until),
        };
        match JobLocks::insert(lock).exec_without_returning(&self.db).await {
            Ok(_) => {
                debug!(lock = name, holder = %self.holder, lease_until = %lease_until, "Lock acquired");
                Ok(true)
            }
            // The row exists and someone else holds an unexpired lease
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                debug!(lock = name, "Lock is held by another worker");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Drop the lease if we still hold it
    pub async fn release(&self, name: &str) -> Result<bool, DbErr> {
        let result = JobLocks::delete_many()
            .filter(job_locks::Column::Name.eq(name))
            .filter(job_locks::Column::Holder.eq(self.holder.as_str()))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Run `work` while holding `name`.
    ///
    /// Returns `None` without polling `work` when another worker holds the
    /// lock. The lease is renewed every third of the TTL while `work` runs;
    /// if a renewal finds the lease gone, `work` is dropped and `None` is
    /// returned. The lock is released once `work` completes, whatever it
    /// returned.
    pub async fn run_exclusive<F, T>(&self, name: &str, work: F) -> Result<Option<T>, DbErr>
    where
        F: Future<Output = T>,
    {
        if !self.try_acquire(name).await? {
            info!(lock = name, "Job already running elsewhere, skipping");
            return Ok(None);
        }

        let finished = tokio::select! {
            biased;
            output = work => Some(output),
            _ = self.keep_alive(name) => None,
        };
        let Some(output) = finished else {
            return Ok(None);
        };

        if let Err(e) = self.release(name).await {
            // The lease still expires on its own
            error!(lock = name, error = %e, "Failed to release lock");
        }

        Ok(Some(output))
    }

    /// Renew `name` until a renewal finds it held by someone else
    async fn keep_alive(&self, name: &str) {
        let period = self.renew_period();
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            ticker.tick().await;
            match self.try_acquire(name).await {
                Ok(true) => {}
                Ok(false) => {
                    error!(lock = name, holder = %self.holder, "Lost lock while running, abandoning job");
                    return;
                }
                Err(e) => warn!(lock = name, error = %e, "Failed to renew lock"),
            }
        }
    }

    fn renew_period(&self) -> std::time::Duration {
        (self.ttl / 3)
            .to_std()
            .unwrap_or_default()
            .max(std::time::Duration::from_millis(100))
    }
}
