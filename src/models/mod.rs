pub mod simulation;
pub mod simulator;
pub mod transfer;
