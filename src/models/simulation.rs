//! Simulation lifecycle types
//!
//! Status progresses: NOT_CREATED → PENDING ⇄ STARTED → FINISHED
//!                                      ↘ ERRORED → (retry) → PENDING/STARTED/FINISHED
//!                                      ↘ TERMINAL_ERROR
//!                                      ↘ TIMED_OUT

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Players per lineup
pub const LINEUP_SIZE: usize = 5;

/// Ordered player uuids of one side; slot `i` is the i-th position
pub type Lineup = [Uuid; LINEUP_SIZE];

/// Read a lineup stored as a JSON array of uuids
pub fn parse_lineup(value: &serde_json::Value) -> Result<Lineup, String> {
    let ids: Vec<Uuid> = serde_json::from_value(value.clone())
        .map_err(|e| format!("lineup is not a list of uuids: {}", e))?;
    let count = ids.len();
    ids.try_into()
        .map_err(|_| format!("lineup has {} players, expected {}", count, LINEUP_SIZE))
}

pub fn lineup_json(lineup: &Lineup) -> serde_json::Value {
    serde_json::json!(lineup)
}

/// Persisted simulation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationStatus {
    /// Lineups recorded, not yet submitted to the simulator
    NotCreated,
    /// Submitted, simulator has not started it
    Pending,
    /// Simulator is running the game
    Started,
    /// Result materialized
    Finished,
    /// Last poll failed; eligible for retry after `next_retry_at`
    Errored,
    /// Retry ceiling reached
    TerminalError,
    /// Stuck in PENDING/STARTED past the force-timeout threshold
    TimedOut,
}

impl SimulationStatus {
    pub const ALL: [SimulationStatus; 7] = [
        SimulationStatus::NotCreated,
        SimulationStatus::Pending,
        SimulationStatus::Started,
        SimulationStatus::Finished,
        SimulationStatus::Errored,
        SimulationStatus::TerminalError,
        SimulationStatus::TimedOut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationStatus::NotCreated => "NOT_CREATED",
            SimulationStatus::Pending => "PENDING",
            SimulationStatus::Started => "STARTED",
            SimulationStatus::Finished => "FINISHED",
            SimulationStatus::Errored => "ERRORED",
            SimulationStatus::TerminalError => "TERMINAL_ERROR",
            SimulationStatus::TimedOut => "TIMED_OUT",
        }
    }

    /// No transition ever leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SimulationStatus::Finished | SimulationStatus::TerminalError | SimulationStatus::TimedOut
        )
    }

    /// Statuses the reconciliation pass considers at all
    pub fn pollable() -> [SimulationStatus; 3] {
        [
            SimulationStatus::Pending,
            SimulationStatus::Started,
            SimulationStatus::Errored,
        ]
    }
}

impl std::fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SimulationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SimulationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown simulation status: {}", s))
    }
}

/// Status reported by the simulator for a submitted game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteStatus {
    Pending,
    Started,
    Finished,
}

impl RemoteStatus {
    pub fn as_simulation_status(&self) -> SimulationStatus {
        match self {
            RemoteStatus::Pending => SimulationStatus::Pending,
            RemoteStatus::Started => SimulationStatus::Started,
            RemoteStatus::Finished => SimulationStatus::Finished,
        }
    }
}

impl std::str::FromStr for RemoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(RemoteStatus::Pending),
            "STARTED" => Ok(RemoteStatus::Started),
            "FINISHED" => Ok(RemoteStatus::Finished),
            _ => Err(format!("Unsupported simulator status: {}", s)),
        }
    }
}

/// Kind of contest a game belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContestKind {
    HeadToHead,
    HeadToHeadMatchMake,
    Tournament,
}

impl ContestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContestKind::HeadToHead => "HEAD_TO_HEAD",
            ContestKind::HeadToHeadMatchMake => "HEAD_TO_HEAD_MATCH_MAKE",
            ContestKind::Tournament => "TOURNAMENT",
        }
    }

    /// Contests whose completion is announced to the game-complete handler
    pub fn notifies_on_completion(&self) -> bool {
        matches!(self, ContestKind::HeadToHead | ContestKind::HeadToHeadMatchMake)
    }

    /// Only plain head-to-head matches count toward team records
    pub fn counts_toward_record(&self) -> bool {
        matches!(self, ContestKind::HeadToHead)
    }
}

impl std::fmt::Display for ContestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HEAD_TO_HEAD" => Ok(ContestKind::HeadToHead),
            "HEAD_TO_HEAD_MATCH_MAKE" => Ok(ContestKind::HeadToHeadMatchMake),
            "TOURNAMENT" => Ok(ContestKind::Tournament),
            _ => Err(format!("Unknown contest kind: {}", s)),
        }
    }
}

/// Contest visibility; decides whether the simulator publishes the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Hidden,
    Staff,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Hidden => "hidden",
            Visibility::Staff => "staff",
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, Visibility::Public)
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "hidden" => Ok(Visibility::Hidden),
            "staff" => Ok(Visibility::Staff),
            _ => Err(format!("Unknown visibility: {}", s)),
        }
    }
}

/// Status change notification, one per polled simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationEvent {
    pub simulation_id: i32,
    pub handle: Option<String>,
    pub status: SimulationStatus,
}
