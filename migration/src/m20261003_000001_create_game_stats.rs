//! Post-game side tables: play-by-play feed and per-player / per-team stat rows.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PlayByPlays::Table)
                    .if_not_exists()
                    .col(pk_auto(PlayByPlays::Id))
                    .col(integer_uniq(PlayByPlays::SimulationId))
                    .col(json(PlayByPlays::Events))
                    .col(timestamp_with_time_zone(PlayByPlays::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PlayerGameStats::Table)
                    .if_not_exists()
                    .col(pk_auto(PlayerGameStats::Id))
                    .col(integer(PlayerGameStats::SimulationId))
                    .col(uuid(PlayerGameStats::PlayerUuid))
                    .col(integer_null(PlayerGameStats::TeamId))
                    .col(small_integer(PlayerGameStats::Lineup))
                    .col(boolean(PlayerGameStats::Won))
                    .col(integer(PlayerGameStats::Pts))
                    .col(integer(PlayerGameStats::Trb))
                    .col(integer(PlayerGameStats::Ast))
                    .col(integer(PlayerGameStats::Stl))
                    .col(integer(PlayerGameStats::Blk))
                    .col(integer(PlayerGameStats::Tov))
                    .col(integer(PlayerGameStats::Fg))
                    .col(integer(PlayerGameStats::Fga))
                    .col(integer(PlayerGameStats::ThreeP))
                    .col(integer(PlayerGameStats::ThreePa))
                    .col(timestamp_with_time_zone(PlayerGameStats::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_player_game_stats_sim_player")
                    .table(PlayerGameStats::Table)
                    .col(PlayerGameStats::SimulationId)
                    .col(PlayerGameStats::PlayerUuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TeamGameStats::Table)
                    .if_not_exists()
                    .col(pk_auto(TeamGameStats::Id))
                    .col(integer(TeamGameStats::SimulationId))
                    .col(integer_null(TeamGameStats::TeamId))
                    .col(small_integer(TeamGameStats::Lineup))
                    .col(boolean(TeamGameStats::Won))
                    .col(integer(TeamGameStats::PointsFor))
                    .col(integer(TeamGameStats::PointsAgainst))
                    .col(integer(TeamGameStats::Trb))
                    .col(integer(TeamGameStats::Ast))
                    .col(integer(TeamGameStats::Tov))
                    .col(timestamp_with_time_zone(TeamGameStats::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_team_game_stats_sim_lineup")
                    .table(TeamGameStats::Table)
                    .col(TeamGameStats::SimulationId)
                    .col(TeamGameStats::Lineup)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TeamGameStats::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PlayerGameStats::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PlayByPlays::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PlayByPlays {
    Table,
    Id,
    SimulationId,
    Events,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PlayerGameStats {
    Table,
    Id,
    SimulationId,
    PlayerUuid,
    TeamId,
    Lineup,
    Won,
    Pts,
    Trb,
    Ast,
    Stl,
    Blk,
    Tov,
    Fg,
    Fga,
    ThreeP,
    ThreePa,
    CreatedAt,
}

#[derive(DeriveIden)]
enum TeamGameStats {
    Table,
    Id,
    SimulationId,
    TeamId,
    Lineup,
    Won,
    PointsFor,
    PointsAgainst,
    Trb,
    Ast,
    Tov,
    CreatedAt,
}
