//! Games (one per contest pairing) and the simulator requests that resolve them.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Games::Table)
                    .if_not_exists()
                    .col(pk_auto(Games::Id))
                    .col(string(Games::ContestKind))
                    .col(string(Games::Visibility))
                    .col(integer_null(Games::Team1Id))
                    .col(integer_null(Games::Team2Id))
                    .col(timestamp_with_time_zone(Games::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Simulations::Table)
                    .if_not_exists()
                    .col(pk_auto(Simulations::Id))
                    .col(integer_uniq(Simulations::GameId))
                    .col(string_null(Simulations::Handle))
                    .col(json(Simulations::Lineup1))
                    .col(json(Simulations::Lineup2))
                    .col(string(Simulations::Status))
                    .col(integer(Simulations::NumRetries).default(0))
                    .col(timestamp_with_time_zone_null(Simulations::NextRetryAt))
                    .col(text_null(Simulations::ErrorMessage))
                    .col(integer_null(Simulations::ResultId).unique_key())
                    .col(timestamp_with_time_zone(Simulations::CreatedAt))
                    .col(timestamp_with_time_zone(Simulations::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_simulations_game_id")
                            .from(Simulations::Table, Simulations::GameId)
                            .to(Games::Table, Games::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // The reconciliation pass selects by status, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_simulations_status_created_at")
                    .table(Simulations::Table)
                    .col(Simulations::Status)
                    .col(Simulations::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_simulations_handle")
                    .table(Simulations::Table)
                    .col(Simulations::Handle)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Simulations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Games::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Games {
    Table,
    Id,
    ContestKind,
    Visibility,
    #[sea_orm(iden = "team_1_id")]
    Team1Id,
    #[sea_orm(iden = "team_2_id")]
    Team2Id,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Simulations {
    Table,
    Id,
    GameId,
    Handle,
    #[sea_orm(iden = "lineup_1")]
    Lineup1,
    #[sea_orm(iden = "lineup_2")]
    Lineup2,
    Status,
    NumRetries,
    NextRetryAt,
    ErrorMessage,
    ResultId,
    CreatedAt,
    UpdatedAt,
}
