//! Error type shared by the reconciliation services

use sea_orm::DbErr;
use thiserror::Error;

use crate::services::simulator_client::SimulatorError;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    /// Transient simulator failure; retried with backoff
    #[error("simulator error: {0}")]
    Simulator(SimulatorError),

    /// The simulator broke its contract; never retried
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("invalid lineup: {0}")]
    InvalidLineup(String),

    #[error("simulation {0} not found")]
    SimulationNotFound(i32),

    #[error("game {0} not found")]
    GameNotFound(i32),

    #[error("simulation {0} has no simulator handle")]
    MissingHandle(i32),

    #[error("lock {0} is held by another worker")]
    LockBusy(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReconcileError {
    /// Fatal errors abort the pass instead of entering the retry path
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReconcileError::ProtocolViolation(_))
    }
}

impl From<SimulatorError> for ReconcileError {
    fn from(err: SimulatorError) -> Self {
        match err {
            SimulatorError::Protocol(msg) => ReconcileError::ProtocolViolation(msg),
            other => ReconcileError::Simulator(other),
        }
    }
}

/// Render an error with its full source chain, for persisting as failure detail
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str("\ncaused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
