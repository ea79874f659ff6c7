//! Box scores and the result rows that link twelve of them to a finished simulation.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BoxScores::Table)
                    .if_not_exists()
                    .col(pk_auto(BoxScores::Id))
                    .col(integer(BoxScores::Ast))
                    .col(integer(BoxScores::Blk))
                    .col(integer(BoxScores::Drb))
                    .col(integer(BoxScores::Orb))
                    .col(integer(BoxScores::Trb))
                    .col(integer(BoxScores::Fg))
                    .col(integer(BoxScores::Fga))
                    .col(double_null(BoxScores::FgPct))
                    .col(integer(BoxScores::ThreeP))
                    .col(integer(BoxScores::ThreePa))
                    .col(double_null(BoxScores::ThreePPct))
                    .col(integer(BoxScores::TwoP))
                    .col(integer(BoxScores::TwoPa))
                    .col(double_null(BoxScores::TwoPPct))
                    .col(integer(BoxScores::Ft))
                    .col(integer(BoxScores::Fta))
                    .col(double_null(BoxScores::FtPct))
                    .col(integer(BoxScores::Stl))
                    .col(integer(BoxScores::Tov))
                    .col(integer(BoxScores::Pf))
                    .col(integer(BoxScores::Pts))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Results::Table)
                    .if_not_exists()
                    .col(pk_auto(Results::Id))
                    .col(integer(Results::Lineup1Score))
                    .col(integer(Results::Lineup2Score))
                    .col(integer(Results::Lineup1BoxScoreId))
                    .col(integer(Results::Lineup2BoxScoreId))
                    .col(integer(Results::Lineup1Player1BoxScoreId))
                    .col(integer(Results::Lineup1Player2BoxScoreId))
                    .col(integer(Results::Lineup1Player3BoxScoreId))
                    .col(integer(Results::Lineup1Player4BoxScoreId))
                    .col(integer(Results::Lineup1Player5BoxScoreId))
                    .col(integer(Results::Lineup2Player1BoxScoreId))
                    .col(integer(Results::Lineup2Player2BoxScoreId))
                    .col(integer(Results::Lineup2Player3BoxScoreId))
                    .col(integer(Results::Lineup2Player4BoxScoreId))
                    .col(integer(Results::Lineup2Player5BoxScoreId))
                    .col(timestamp_with_time_zone(Results::CreatedAt))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Results::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BoxScores::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BoxScores {
    Table,
    Id,
    Ast,
    Blk,
    Drb,
    Orb,
    Trb,
    Fg,
    Fga,
    FgPct,
    ThreeP,
    ThreePa,
    ThreePPct,
    TwoP,
    TwoPa,
    TwoPPct,
    Ft,
    Fta,
    FtPct,
    Stl,
    Tov,
    Pf,
    Pts,
}

#[derive(DeriveIden)]
enum Results {
    Table,
    Id,
    #[sea_orm(iden = "lineup_1_score")]
    Lineup1Score,
    #[sea_orm(iden = "lineup_2_score")]
    Lineup2Score,
    #[sea_orm(iden = "lineup_1_box_score_id")]
    Lineup1BoxScoreId,
    #[sea_orm(iden = "lineup_2_box_score_id")]
    Lineup2BoxScoreId,
    #[sea_orm(iden = "lineup_1_player_1_box_score_id")]
    Lineup1Player1BoxScoreId,
    #[sea_orm(iden = "lineup_1_player_2_box_score_id")]
    Lineup1Player2BoxScoreId,
    #[sea_orm(iden = "lineup_1_player_3_box_score_id")]
    Lineup1Player3BoxScoreId,
    #[sea_orm(iden = "lineup_1_player_4_box_score_id")]
    Lineup1Player4BoxScoreId,
    #[sea_orm(iden = "lineup_1_player_5_box_score_id")]
    Lineup1Player5BoxScoreId,
    #[sea_orm(iden = "lineup_2_player_1_box_score_id")]
    Lineup2Player1BoxScoreId,
    #[sea_orm(iden = "lineup_2_player_2_box_score_id")]
    Lineup2Player2BoxScoreId,
    #[sea_orm(iden = "lineup_2_player_3_box_score_id")]
    Lineup2Player3BoxScoreId,
    #[sea_orm(iden = "lineup_2_player_4_box_score_id")]
    Lineup2Player4BoxScoreId,
    #[sea_orm(iden = "lineup_2_player_5_box_score_id")]
    Lineup2Player5BoxScoreId,
    CreatedAt,
}
