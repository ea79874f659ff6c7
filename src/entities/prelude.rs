pub use super::accounts::Entity as Accounts;
pub use super::box_scores::Entity as BoxScores;
pub use super::games::Entity as Games;
pub use super::job_locks::Entity as JobLocks;
pub use super::play_by_plays::Entity as PlayByPlays;
pub use super::player_game_stats::Entity as PlayerGameStats;
pub use super::players::Entity as Players;
pub use super::results::Entity as Results;
pub use super::simulations::Entity as Simulations;
pub use super::sync_status::Entity as SyncStatus;
pub use super::team_game_stats::Entity as TeamGameStats;
pub use super::teams::Entity as Teams;
pub use super::transfer_logs::Entity as TransferLogs;
