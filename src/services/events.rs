//! Outbound notifications from the reconciliation pass

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;

use crate::entities::{games, simulations};
use crate::models::simulation::SimulationEvent;

/// Receives one event per polled simulation
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: SimulationEvent);
}

/// Fans events out to in-process subscribers
#[derive(Clone)]
pub struct BroadcastEmitter {
    tx: broadcast::Sender<SimulationEvent>,
}

impl BroadcastEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SimulationEvent> {
        self.tx.subscribe()
    }
}

impl EventEmitter for BroadcastEmitter {
    fn emit(&self, event: SimulationEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}

/// Writes events to the log only
#[derive(Clone, Default)]
pub struct LogEmitter;

impl EventEmitter for LogEmitter {
    fn emit(&self, event: SimulationEvent) {
        info!(
            simulation_id = event.simulation_id,
            handle = ?event.handle,
            status = %event.status,
            "Simulation status event"
        );
    }
}

/// Notified when a head-to-head game finishes
#[async_trait]
pub trait GameCompleteHandler: Send + Sync {
    async fn game_complete(
        &self,
        game: &games::Model,
        simulation: &simulations::Model,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

#[derive(Clone, Default)]
pub struct LogGameCompleteHandler;

#[async_trait]
impl GameCompleteHandler for LogGameCompleteHandler {
    async fn game_complete(
        &self,
        game: &games::Model,
        simulation: &simulations::Model,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            game_id = game.id,
            simulation_id = simulation.id,
            contest_kind = %game.contest_kind,
            "Game complete"
        );
        Ok(())
    }
}
