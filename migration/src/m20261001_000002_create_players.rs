//! Players mirrored from the simulator service, keyed by their stable uuid.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Players::Table)
                    .if_not_exists()
                    .col(pk_auto(Players::Id))
                    .col(uuid_uniq(Players::Uuid))
                    // NULL for free agents; unique whenever present
                    .col(big_integer_null(Players::Token).unique_key())
                    .col(integer_null(Players::TeamId))
                    .col(string(Players::FullName))
                    .col(integer_null(Players::Age))
                    .col(integer_null(Players::StarRating))
                    .col(integer_null(Players::ThreePtRating))
                    .col(integer_null(Players::Interior2ptRating))
                    .col(integer_null(Players::Midrange2ptRating))
                    .col(integer_null(Players::FtRating))
                    .col(integer_null(Players::DrbRating))
                    .col(integer_null(Players::OrbRating))
                    .col(integer_null(Players::AstRating))
                    .col(integer_null(Players::PhysicalityRating))
                    .col(integer_null(Players::InteriorDefenseRating))
                    .col(integer_null(Players::PerimeterDefenseRating))
                    .col(integer_null(Players::LongevityRating))
                    .col(integer_null(Players::HustleRating))
                    .col(integer_null(Players::BballIqRating))
                    .col(integer_null(Players::LeadershipRating))
                    .col(integer_null(Players::CoachabilityRating))
                    .col(string_null(Players::Hair))
                    .col(string_null(Players::SkinTone))
                    .col(string_null(Players::Jersey))
                    .col(string_null(Players::TopAttribute1))
                    .col(string_null(Players::TopAttribute2))
                    .col(string_null(Players::TopAttribute3))
                    .col(string_null(Players::Position1))
                    .col(string_null(Players::Position2))
                    .col(integer(Players::GamesPlayed).default(0))
                    .col(integer(Players::Wins).default(0))
                    .col(integer(Players::Losses).default(0))
                    .col(double_null(Players::PointsAvg))
                    .col(double_null(Players::ReboundsAvg))
                    .col(double_null(Players::AssistsAvg))
                    .col(timestamp_with_time_zone(Players::FirstSyncedAt))
                    .to_owned(),
            )
            .await?;

        // Ownership reconciliation looks players up by token and by team
        manager
            .create_index(
                Index::create()
                    .name("idx_players_team_id")
                    .table(Players::Table)
                    .col(Players::TeamId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Players::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Players {
    Table,
    Id,
    Uuid,
    Token,
    TeamId,
    FullName,
    Age,
    StarRating,
    ThreePtRating,
    #[sea_orm(iden = "interior_2pt_rating")]
    Interior2ptRating,
    #[sea_orm(iden = "midrange_2pt_rating")]
    Midrange2ptRating,
    FtRating,
    DrbRating,
    OrbRating,
    AstRating,
    PhysicalityRating,
    InteriorDefenseRating,
    PerimeterDefenseRating,
    LongevityRating,
    HustleRating,
    BballIqRating,
    LeadershipRating,
    CoachabilityRating,
    Hair,
    SkinTone,
    Jersey,
    #[sea_orm(iden = "top_attribute_1")]
    TopAttribute1,
    #[sea_orm(iden = "top_attribute_2")]
    TopAttribute2,
    #[sea_orm(iden = "top_attribute_3")]
    TopAttribute3,
    #[sea_orm(iden = "position_1")]
    Position1,
    #[sea_orm(iden = "position_2")]
    Position2,
    GamesPlayed,
    Wins,
    Losses,
    PointsAvg,
    ReboundsAvg,
    AssistsAvg,
    FirstSyncedAt,
}
