//! Simulation reconciliation
//!
//! Each pass polls every due simulation once, newest first, and moves it
//! along its lifecycle:
//!
//! - remote status unchanged: nothing, unless the simulation is older than
//!   [`FORCE_TIMEOUT_HOURS`], in which case it becomes TIMED_OUT
//! - remote PENDING/STARTED: status copied
//! - remote FINISHED: result materialized, game-complete handler notified
//! - any failure: ERRORED with linear backoff, TERMINAL_ERROR once
//!   [`MAX_RETRY`] failures have accumulated
//!
//! Protocol violations skip the retry path: the simulation goes straight to
//! TERMINAL_ERROR and the pass is aborted with the error.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::entities::{
    prelude::{Games, Simulations},
    simulations,
};
use crate::error::{error_chain, ReconcileError};
use crate::models::simulation::{
    lineup_json, parse_lineup, ContestKind, Lineup, SimulationEvent, SimulationStatus, Visibility,
    LINEUP_SIZE,
};
use crate::models::simulator::{RemoteGame, SubmitGameRequest};
use crate::services::events::{EventEmitter, GameCompleteHandler};
use crate::services::locks::{names, LockManager};
use crate::services::materializer::{Materialization, ResultMaterializer};
use crate::services::simulator_client::SimulatorClient;

/// Failures tolerated before a simulation is given up on
pub const MAX_RETRY: i32 = 5;
/// Backoff step; the wait after failure N is N steps
pub const RETRY_BACKOFF_MINUTES: i64 = 5;
/// Age, measured from creation, after which an unchanged simulation is timed out
pub const FORCE_TIMEOUT_HOURS: i64 = 8;

pub fn retry_backoff(num_retries: i32) -> Duration {
    Duration::minutes(RETRY_BACKOFF_MINUTES * num_retries as i64)
}

/// Whether a pass running at `now` should poll this simulation
pub fn is_due(simulation: &simulations::Model, now: DateTime<Utc>) -> bool {
    match simulation.status.parse::<SimulationStatus>() {
        Ok(SimulationStatus::Pending | SimulationStatus::Started) => true,
        Ok(SimulationStatus::Errored) => {
            simulation.num_retries < MAX_RETRY
                && simulation.next_retry_at.is_none_or(|at| now >= at)
        }
        _ => false,
    }
}

pub fn is_timed_out(simulation: &simulations::Model, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(simulation.created_at) >= Duration::hours(FORCE_TIMEOUT_HOURS)
}

/// Bookkeeping after a failed poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureTransition {
    pub status: SimulationStatus,
    pub num_retries: i32,
    pub next_retry_at: DateTime<Utc>,
}

pub fn failure_transition(previous_retries: i32, now: DateTime<Utc>) -> FailureTransition {
    let num_retries = previous_retries + 1;
    let status = if num_retries >= MAX_RETRY {
        SimulationStatus::TerminalError
    } else {
        SimulationStatus::Errored
    };

    FailureTransition {
        status,
        num_retries,
        next_retry_at: now + retry_backoff(num_retries),
    }
}

/// Counts from one reconciliation pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassStats {
    pub polled: usize,
    pub unchanged: usize,
    pub advanced: usize,
    pub finished: usize,
    pub timed_out: usize,
    pub errored: usize,
    pub terminal: usize,
}

impl PassStats {
    /// Count a poll that completed without error
    fn record(&mut self, before: &simulations::Model, after: &simulations::Model) {
        match after.status.parse::<SimulationStatus>() {
            _ if before.status == after.status => self.unchanged += 1,
            Ok(SimulationStatus::Finished) => self.finished += 1,
            Ok(SimulationStatus::TimedOut) => self.timed_out += 1,
            Ok(SimulationStatus::Errored) => self.errored += 1,
            Ok(SimulationStatus::TerminalError) => self.terminal += 1,
            _ => self.advanced += 1,
        }
    }

    /// Count a failed poll by where the failure left the record
    fn record_failure(&mut self, after: Option<&simulations::Model>) {
        match after.map(|a| a.status.parse::<SimulationStatus>()) {
            Some(Ok(SimulationStatus::TerminalError)) => self.terminal += 1,
            _ => self.errored += 1,
        }
    }
}

#[derive(Clone)]
pub struct SimulationReconciler {
    db: DatabaseConnection,
    client: Arc<dyn SimulatorClient>,
    locks: LockManager,
    events: Arc<dyn EventEmitter>,
    game_complete: Arc<dyn GameCompleteHandler>,
    materializer: ResultMaterializer,
}

impl SimulationReconciler {
    pub fn new(
        db: DatabaseConnection,
        client: Arc<dyn SimulatorClient>,
        locks: LockManager,
        events: Arc<dyn EventEmitter>,
        game_complete: Arc<dyn GameCompleteHandler>,
    ) -> Self {
        let materializer = ResultMaterializer::new(db.clone(), client.clone());
        Self {
            db,
            client,
            locks,
            events,
            game_complete,
            materializer,
        }
    }

    /// Record a new simulation for a game; nothing is sent to the simulator yet
    pub async fn create_simulation(
        &self,
        game_id: i32,
        lineup_1: &[Uuid],
        lineup_2: &[Uuid],
    ) -> Result<simulations::Model, ReconcileError> {
        let (lineup_1, lineup_2) = validate_lineups(lineup_1, lineup_2)?;

        Games::find_by_id(game_id)
            .one(&self.db)
            .await?
            .ok_or(ReconcileError::GameNotFound(game_id))?;

        let now = Utc::now();
        let simulation = simulations::ActiveModel {
            game_id: Set(game_id),
            handle: Set(None),
            lineup_1: Set(lineup_json(&lineup_1)),
            lineup_2: Set(lineup_json(&lineup_2)),
            status: Set(SimulationStatus::NotCreated.to_string()),
            num_retries: Set(0),
            next_retry_at: Set(None),
            error_message: Set(None),
            result_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(simulation_id = simulation.id, game_id = game_id, "Created simulation");
        Ok(simulation)
    }

    /// Send a simulation to the simulator and mark it PENDING.
    ///
    /// Serialized per simulation; a simulation that already has a handle is
    /// returned as-is. Simulator failures are returned to the caller.
    pub async fn submit_simulation(&self, simulation_id: i32) -> Result<simulations::Model, ReconcileError> {
        let lock = names::simulation_submit(simulation_id);
        match self
            .locks
            .run_exclusive(&lock, self.submit_locked(simulation_id))
            .await?
        {
            Some(result) => result,
            None => Err(ReconcileError::LockBusy(lock)),
        }
    }

    async fn submit_locked(&self, simulation_id: i32) -> Result<simulations::Model, ReconcileError> {
        let simulation = Simulations::find_by_id(simulation_id)
            .one(&self.db)
            .await?
            .ok_or(ReconcileError::SimulationNotFound(simulation_id))?;

        if simulation.handle.is_some() {
            debug!(simulation_id = simulation_id, "Simulation already submitted");
            return Ok(simulation);
        }

        let game = Games::find_by_id(simulation.game_id)
            .one(&self.db)
            .await?
            .ok_or(ReconcileError::GameNotFound(simulation.game_id))?;
        let published = game
            .visibility
            .parse::<Visibility>()
            .map(|v| v.is_published())
            .unwrap_or(false);

        let request = SubmitGameRequest {
            lineup_1: parse_lineup(&simulation.lineup_1).map_err(ReconcileError::InvalidLineup)?,
            lineup_2: parse_lineup(&simulation.lineup_2).map_err(ReconcileError::InvalidLineup)?,
            published,
        };
        let submitted = self.client.submit_game(&request).await?;

        let mut active: simulations::ActiveModel = simulation.into();
        active.handle = Set(Some(submitted.id.clone()));
        active.status = Set(SimulationStatus::Pending.to_string());
        active.updated_at = Set(Utc::now());
        let simulation = active.update(&self.db).await?;

        info!(
            simulation_id = simulation.id,
            handle = %submitted.id,
            published = published,
            "Submitted simulation"
        );
        Ok(simulation)
    }

    /// Submit every simulation still waiting for a handle. Failures are
    /// logged and left for the next call.
    pub async fn submit_unsubmitted(&self) -> Result<usize, ReconcileError> {
        let waiting = Simulations::find()
            .filter(simulations::Column::Status.eq(SimulationStatus::NotCreated.as_str()))
            .filter(simulations::Column::Handle.is_null())
            .order_by_asc(simulations::Column::CreatedAt)
            .all(&self.db)
            .await?;

        let mut submitted = 0;
        for simulation in waiting {
            match self.submit_simulation(simulation.id).await {
                Ok(_) => submitted += 1,
                Err(e) => warn!(simulation_id = simulation.id, error = %e, "Failed to submit simulation"),
            }
        }

        Ok(submitted)
    }

    /// Simulations a pass at `now` would poll, newest first
    pub async fn due_simulations(&self, now: DateTime<Utc>) -> Result<Vec<simulations::Model>, ReconcileError> {
        let statuses: Vec<&str> = SimulationStatus::pollable().iter().map(|s| s.as_str()).collect();
        let candidates = Simulations::find()
            .filter(simulations::Column::Status.is_in(statuses))
            .order_by_desc(simulations::Column::CreatedAt)
            .order_by_desc(simulations::Column::Id)
            .all(&self.db)
            .await?;

        Ok(candidates.into_iter().filter(|s| is_due(s, now)).collect())
    }

    pub async fn run_pass(&self) -> Result<PassStats, ReconcileError> {
        self.run_pass_at(Utc::now()).await
    }

    /// One reconciliation pass as of `now`
    pub async fn run_pass_at(&self, now: DateTime<Utc>) -> Result<PassStats, ReconcileError> {
        let due = self.due_simulations(now).await?;
        info!(due = due.len(), "Starting simulation reconciliation pass");

        let mut stats = PassStats::default();

        for simulation in due {
            stats.polled += 1;

            let outcome = self.reconcile_one(&simulation, now).await;
            let current = match outcome {
                Ok(updated) => {
                    stats.record(&simulation, &updated);
                    updated
                }
                Err(e) if e.is_fatal() => {
                    error!(
                        simulation_id = simulation.id,
                        handle = ?simulation.handle,
                        error = %e,
                        "Simulator contract violated, aborting pass"
                    );
                    let current = self.mark_protocol_violation(&simulation, &e, now).await;
                    self.emit(current.as_ref().unwrap_or(&simulation));
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        simulation_id = simulation.id,
                        handle = ?simulation.handle,
                        retries = simulation.num_retries,
                        error = %e,
                        "Simulation poll failed"
                    );
                    let updated = self.record_failure(&simulation, &e, now).await;
                    stats.record_failure(updated.as_ref());
                    updated.unwrap_or(simulation)
                }
            };

            self.emit(&current);
        }

        info!(
            polled = stats.polled,
            unchanged = stats.unchanged,
            advanced = stats.advanced,
            finished = stats.finished,
            timed_out = stats.timed_out,
            errored = stats.errored,
            terminal = stats.terminal,
            "Simulation reconciliation pass complete"
        );

        Ok(stats)
    }

    /// Poll one simulation and apply the remote status. Returns the
    /// simulation as persisted afterwards.
    async fn reconcile_one(
        &self,
        simulation: &simulations::Model,
        now: DateTime<Utc>,
    ) -> Result<simulations::Model, ReconcileError> {
        let local: SimulationStatus = simulation
            .status
            .parse()
            .map_err(ReconcileError::ProtocolViolation)?;
        let handle = simulation
            .handle
            .as_deref()
            .ok_or(ReconcileError::MissingHandle(simulation.id))?;

        let remote = self.client.fetch_game(handle).await?;
        let remote_status = remote.status().as_simulation_status();

        if remote_status == local {
            if is_timed_out(simulation, now) {
                warn!(
                    simulation_id = simulation.id,
                    handle = handle,
                    status = %local,
                    created_at = %simulation.created_at,
                    "Simulation stuck past timeout, giving up"
                );
                return self.set_status(simulation, SimulationStatus::TimedOut, now).await;
            }
            debug!(simulation_id = simulation.id, status = %local, "Simulation unchanged");
            return Ok(simulation.clone());
        }

        match remote {
            RemoteGame::Pending | RemoteGame::Started => {
                info!(
                    simulation_id = simulation.id,
                    handle = handle,
                    from = %local,
                    to = %remote_status,
                    "Simulation status changed"
                );
                self.set_status(simulation, remote_status, now).await
            }
            RemoteGame::Finished(payload) => match self.materializer.materialize(simulation, &payload).await? {
                Materialization::Committed(finished) => {
                    self.notify_game_complete(&finished).await;
                    Ok(finished)
                }
                // Another worker committed it and owns the notice
                Materialization::AlreadyMaterialized(current) => Ok(current),
            },
        }
    }

    async fn set_status(
        &self,
        simulation: &simulations::Model,
        status: SimulationStatus,
        now: DateTime<Utc>,
    ) -> Result<simulations::Model, ReconcileError> {
        let mut active: simulations::ActiveModel = simulation.clone().into();
        active.status = Set(status.to_string());
        active.updated_at = Set(now);
        Ok(active.update(&self.db).await?)
    }

    /// Best-effort; a failing handler never affects the simulation
    async fn notify_game_complete(&self, simulation: &simulations::Model) {
        let game = match Games::find_by_id(simulation.game_id).one(&self.db).await {
            Ok(Some(game)) => game,
            Ok(None) => return,
            Err(e) => {
                warn!(simulation_id = simulation.id, error = %e, "Failed to load game for completion notice");
                return;
            }
        };

        let notifies = game
            .contest_kind
            .parse::<ContestKind>()
            .is_ok_and(|kind| kind.notifies_on_completion());
        if !notifies {
            return;
        }

        if let Err(e) = self.game_complete.game_complete(&game, simulation).await {
            warn!(
                simulation_id = simulation.id,
                game_id = game.id,
                error = %e,
                "Game complete handler failed"
            );
        }
    }

    async fn record_failure(
        &self,
        simulation: &simulations::Model,
        err: &ReconcileError,
        now: DateTime<Utc>,
    ) -> Option<simulations::Model> {
        let transition = failure_transition(simulation.num_retries, now);

        let mut active: simulations::ActiveModel = simulation.clone().into();
        active.status = Set(transition.status.to_string());
        active.num_retries = Set(transition.num_retries);
        active.next_retry_at = Set(Some(transition.next_retry_at));
        active.error_message = Set(Some(error_chain(err)));
        active.updated_at = Set(now);

        match active.update(&self.db).await {
            Ok(updated) => {
                if transition.status == SimulationStatus::TerminalError {
                    error!(
                        simulation_id = simulation.id,
                        retries = transition.num_retries,
                        "Simulation exhausted its retries"
                    );
                } else {
                    info!(
                        simulation_id = simulation.id,
                        retries = transition.num_retries,
                        next_retry_at = %transition.next_retry_at,
                        "Simulation scheduled for retry"
                    );
                }
                Some(updated)
            }
            Err(e) => {
                error!(simulation_id = simulation.id, error = %e, "Failed to record simulation failure");
                None
            }
        }
    }

    async fn mark_protocol_violation(
        &self,
        simulation: &simulations::Model,
        err: &ReconcileError,
        now: DateTime<Utc>,
    ) -> Option<simulations::Model> {
        let mut active: simulations::ActiveModel = simulation.clone().into();
        active.status = Set(SimulationStatus::TerminalError.to_string());
        active.error_message = Set(Some(error_chain(err)));
        active.updated_at = Set(now);

        match active.update(&self.db).await {
            Ok(updated) => Some(updated),
            Err(e) => {
                error!(simulation_id = simulation.id, error = %e, "Failed to record protocol violation");
                None
            }
        }
    }

    fn emit(&self, simulation: &simulations::Model) {
        match simulation.status.parse::<SimulationStatus>() {
            Ok(status) => self.events.emit(SimulationEvent {
                simulation_id: simulation.id,
                handle: simulation.handle.clone(),
                status,
            }),
            Err(e) => warn!(simulation_id = simulation.id, error = %e, "Not emitting event"),
        }
    }
}

/// Exactly five players per lineup, nobody listed twice
pub fn validate_lineups(lineup_1: &[Uuid], lineup_2: &[Uuid]) -> Result<(Lineup, Lineup), ReconcileError> {
    let to_lineup = |ids: &[Uuid], which: u8| -> Result<Lineup, ReconcileError> {
        ids.try_into().map_err(|_| {
            ReconcileError::InvalidLineup(format!(
                "lineup {} has {} players, expected {}",
                which,
                ids.len(),
                LINEUP_SIZE
            ))
        })
    };
    let lineup_1 = to_lineup(lineup_1, 1)?;
    let lineup_2 = to_lineup(lineup_2, 2)?;

    let distinct: HashSet<&Uuid> = lineup_1.iter().chain(lineup_2.iter()).collect();
    if distinct.len() != 2 * LINEUP_SIZE {
        return Err(ReconcileError::InvalidLineup(
            "a player appears more than once across the lineups".to_string(),
        ));
    }

    Ok((lineup_1, lineup_2))
}
