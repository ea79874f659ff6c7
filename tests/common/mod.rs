#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, DbErr, Set};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use swoops_reconciler::entities::{accounts, games, players, simulations, teams};
use swoops_reconciler::models::simulation::{
    lineup_json, ContestKind, Lineup, SimulationStatus, Visibility,
};
use swoops_reconciler::models::simulator::{
    PlayerPage, RawPlayerPayload, RawResultPayload, RawStatPayload, RemoteGame, SubmitGameRequest,
    SubmittedGame,
};
use swoops_reconciler::services::events::{BroadcastEmitter, GameCompleteHandler};
use swoops_reconciler::services::locks::LockManager;
use swoops_reconciler::services::reconciler::SimulationReconciler;
use swoops_reconciler::services::simulator_client::{SimulatorClient, SimulatorError};

/// Set up an in-memory SQLite database with all migrations applied.
/// A single pooled connection keeps every query on the same database.
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Current time truncated to whole seconds, so stored timestamps compare cleanly
pub fn now() -> DateTime<Utc> {
    Utc::now().duration_trunc(Duration::seconds(1)).unwrap_or_else(|_| Utc::now())
}

pub fn lineup() -> Lineup {
    std::array::from_fn(|_| Uuid::new_v4())
}

/// One scripted answer to `fetch_game`
#[derive(Debug, Clone)]
pub enum Reply {
    Game(RemoteGame),
    Transport(String),
    Protocol(String),
}

/// Simulator fake driven by per-handle scripts.
///
/// Each poll consumes the next scripted reply; the last reply repeats.
#[derive(Default)]
pub struct ScriptedSimulator {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    submissions: Mutex<Vec<SubmitGameRequest>>,
    player_pages: Mutex<Vec<Vec<RawPlayerPayload>>>,
    player_stats: Mutex<Vec<RawStatPayload>>,
    fail_submissions: AtomicBool,
    fail_player_stats: AtomicBool,
    fetch_calls: AtomicUsize,
    stats_calls: AtomicUsize,
}

impl ScriptedSimulator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, handle: &str, replies: impl IntoIterator<Item = Reply>) {
        self.replies
            .lock()
            .unwrap()
            .entry(handle.to_string())
            .or_default()
            .extend(replies);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<SubmitGameRequest> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn fail_submissions(&self, fail: bool) {
        self.fail_submissions.store(fail, Ordering::SeqCst);
    }

    pub fn fail_player_stats(&self, fail: bool) {
        self.fail_player_stats.store(fail, Ordering::SeqCst);
    }

    pub fn set_player_pages(&self, pages: Vec<Vec<RawPlayerPayload>>) {
        *self.player_pages.lock().unwrap() = pages;
    }

    pub fn set_player_stats(&self, stats: Vec<RawStatPayload>) {
        *self.player_stats.lock().unwrap() = stats;
    }
}

#[async_trait]
impl SimulatorClient for ScriptedSimulator {
    async fn submit_game(&self, request: &SubmitGameRequest) -> Result<SubmittedGame, SimulatorError> {
        if self.fail_submissions.load(Ordering::SeqCst) {
            return Err(SimulatorError::Transport("connection refused".to_string()));
        }
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(request.clone());
        Ok(SubmittedGame {
            id: format!("game-{}", submissions.len()),
        })
    }

    async fn fetch_game(&self, handle: &str) -> Result<RemoteGame, SimulatorError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            let queue = replies.entry(handle.to_string()).or_default();
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        };

        match reply {
            Some(Reply::Game(game)) => Ok(game),
            Some(Reply::Transport(msg)) => Err(SimulatorError::Transport(msg)),
            Some(Reply::Protocol(msg)) => Err(SimulatorError::Protocol(msg)),
            None => Err(SimulatorError::Remote {
                status: 404,
                body: format!("unknown game {}", handle),
            }),
        }
    }

    async fn fetch_players_page(&self, cursor: Option<&str>) -> Result<PlayerPage, SimulatorError> {
        let pages = self.player_pages.lock().unwrap();
        let index = match cursor {
            None => 0,
            Some(c) => c
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| SimulatorError::Remote {
                    status: 400,
                    body: format!("bad cursor {}", c),
                })?,
        };

        Ok(PlayerPage {
            results: pages.get(index).cloned().unwrap_or_default(),
            next: (index + 1 < pages.len()).then(|| format!("page-{}", index + 1)),
        })
    }

    async fn fetch_player_stats(&self, ids: &[Uuid]) -> Result<Vec<RawStatPayload>, SimulatorError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_player_stats.load(Ordering::SeqCst) {
            return Err(SimulatorError::Remote {
                status: 503,
                body: "stats unavailable".to_string(),
            });
        }
        Ok(self
            .player_stats
            .lock()
            .unwrap()
            .iter()
            .filter(|s| ids.contains(&s.uuid))
            .cloned()
            .collect())
    }
}

/// Records every game-complete notification; can be told to fail
#[derive(Default)]
pub struct RecordingGameComplete {
    pub completed: Mutex<Vec<(i32, i32)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl GameCompleteHandler for RecordingGameComplete {
    async fn game_complete(
        &self,
        game: &games::Model,
        simulation: &simulations::Model,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.completed.lock().unwrap().push((game.id, simulation.id));
        if self.fail.load(Ordering::SeqCst) {
            return Err("notification service down".into());
        }
        Ok(())
    }
}

impl RecordingGameComplete {
    pub fn count(&self) -> usize {
        self.completed.lock().unwrap().len()
    }
}

/// Everything a reconciliation test needs, wired together
pub struct Harness {
    pub db: DatabaseConnection,
    pub simulator: Arc<ScriptedSimulator>,
    pub events: BroadcastEmitter,
    pub completions: Arc<RecordingGameComplete>,
    pub locks: LockManager,
    pub reconciler: SimulationReconciler,
}

pub async fn harness() -> Harness {
    let db = setup_test_db().await.expect("Failed to set up test DB");
    let simulator = ScriptedSimulator::new();
    let events = BroadcastEmitter::new(64);
    let completions = Arc::new(RecordingGameComplete::default());
    let locks = LockManager::with_holder(db.clone(), "test-worker".to_string(), Duration::seconds(600));

    let reconciler = SimulationReconciler::new(
        db.clone(),
        simulator.clone(),
        locks.clone(),
        Arc::new(events.clone()),
        completions.clone(),
    );

    Harness {
        db,
        simulator,
        events,
        completions,
        locks,
        reconciler,
    }
}

pub async fn seed_team(db: &DatabaseConnection, name: &str) -> teams::Model {
    teams::ActiveModel {
        name: Set(name.to_string()),
        wins: Set(0),
        losses: Set(0),
        created_at: Set(now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to seed team")
}

pub async fn seed_account(db: &DatabaseConnection, wallet: &str, team_id: Option<i32>) -> accounts::Model {
    accounts::ActiveModel {
        wallet_address: Set(wallet.to_lowercase()),
        team_id: Set(team_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to seed account")
}

pub async fn seed_game(
    db: &DatabaseConnection,
    kind: ContestKind,
    visibility: Visibility,
    team_ids: [Option<i32>; 2],
) -> games::Model {
    games::ActiveModel {
        contest_kind: Set(kind.to_string()),
        visibility: Set(visibility.as_str().to_string()),
        team_1_id: Set(team_ids[0]),
        team_2_id: Set(team_ids[1]),
        created_at: Set(now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to seed game")
}

pub async fn seed_player(db: &DatabaseConnection, uuid: Uuid, token: Option<i64>, team_id: Option<i32>) -> players::Model {
    players::ActiveModel {
        uuid: Set(uuid),
        token: Set(token),
        team_id: Set(team_id),
        full_name: Set(format!("Player {}", &uuid.to_string()[..8])),
        games_played: Set(0),
        wins: Set(0),
        losses: Set(0),
        first_synced_at: Set(now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to seed player")
}

/// Insert a simulation in an arbitrary state, bypassing submission
pub async fn seed_simulation(
    db: &DatabaseConnection,
    game_id: i32,
    status: SimulationStatus,
    handle: Option<&str>,
    created_at: DateTime<Utc>,
) -> simulations::Model {
    simulations::ActiveModel {
        game_id: Set(game_id),
        handle: Set(handle.map(str::to_string)),
        lineup_1: Set(lineup_json(&lineup())),
        lineup_2: Set(lineup_json(&lineup())),
        status: Set(status.to_string()),
        num_retries: Set(0),
        next_retry_at: Set(None),
        error_message: Set(None),
        result_id: Set(None),
        created_at: Set(created_at),
        updated_at: Set(created_at),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to seed simulation")
}

/// A FINISHED payload with one total and five player entries per side.
///
/// Player `slot` of lineup N scores `N * 10 + slot` points, so every box
/// score is distinguishable.
pub fn finished_payload(lineup_1: &Lineup, lineup_2: &Lineup, score_1: i32, score_2: i32) -> RawResultPayload {
    let mut box_scores = vec![
        json!({ "Team": "Challengers", "PTS": score_1, "TRB": 40, "AST": 22, "TOV": 11 }),
        json!({ "Team": "Challenged", "PTS": score_2, "TRB": 38, "AST": 19, "TOV": 14 }),
    ];
    let mut players = serde_json::Map::new();

    for (n, side, lineup) in [(1, "Challengers", lineup_1), (2, "Challenged", lineup_2)] {
        // Reverse order, so slot mapping cannot rely on payload order
        for (slot, id) in lineup.iter().enumerate().rev() {
            let canonical = format!("{} #{}", side, slot);
            box_scores.push(json!({
                "Team": side,
                "canonical": canonical,
                "PTS": n * 10 + slot as i32,
                "FG": 4,
                "FGA": 9,
                "FG%": 0.444,
                "MP": "24:00",
            }));
            players.insert(canonical, json!(id));
        }
    }

    serde_json::from_value(json!({
        "box_scores": box_scores,
        "players": players,
        "pbp": [
            { "Possession": "Challengers", "pbp_string": "Tip-off won", "clock": "12:00" },
            { "Possession": "Challenged", "pbp_string": "Three-pointer made", "clock": "11:31" },
        ],
    }))
    .expect("Failed to build payload")
}

pub fn finished(lineup_1: &Lineup, lineup_2: &Lineup, score_1: i32, score_2: i32) -> Reply {
    Reply::Game(RemoteGame::Finished(Box::new(finished_payload(
        lineup_1, lineup_2, score_1, score_2,
    ))))
}
