// src/lib.rs

pub mod entities {
    pub mod prelude;
    pub mod accounts;
    pub mod box_scores;
    pub mod games;
    pub mod job_locks;
    pub mod play_by_plays;
    pub mod player_game_stats;
    pub mod players;
    pub mod results;
    pub mod simulations;
    pub mod sync_status;
    pub mod team_game_stats;
    pub mod teams;
    pub mod transfer_logs;
}

pub mod services {
    pub mod events;
    pub mod locks;
    pub mod materializer;
    pub mod ownership;
    pub mod player_sync;
    pub mod post_commit;
    pub mod reconciler;
    pub mod simulator_client;
    pub mod sync_status;
    pub mod transfer_scanner;
}

pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
