pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_teams_accounts;
mod m20261001_000002_create_players;
mod m20261002_000001_create_games_simulations;
mod m20261002_000002_create_results;
mod m20261003_000001_create_game_stats;
mod m20261005_000001_create_transfer_logs;
mod m20261006_000001_create_job_locks;
mod m20261006_000002_create_sync_status;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_teams_accounts::Migration),
            Box::new(m20261001_000002_create_players::Migration),
            Box::new(m20261002_000001_create_games_simulations::Migration),
            Box::new(m20261002_000002_create_results::Migration),
            Box::new(m20261003_000001_create_game_stats::Migration),
            Box::new(m20261005_000001_create_transfer_logs::Migration),
            Box::new(m20261006_000001_create_job_locks::Migration),
            Box::new(m20261006_000002_create_sync_status::Migration),
        ]
    }
}
