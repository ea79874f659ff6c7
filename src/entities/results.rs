//! `SeaORM` Entity for results table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "results")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub lineup_1_score: i32,
    pub lineup_2_score: i32,
    /// Team-total box scores
    pub lineup_1_box_score_id: i32,
    pub lineup_2_box_score_id: i32,
    /// Per-player box scores, slot order matching the simulation lineups
    pub lineup_1_player_1_box_score_id: i32,
    pub lineup_1_player_2_box_score_id: i32,
    pub lineup_1_player_3_box_score_id: i32,
    pub lineup_1_player_4_box_score_id: i32,
    pub lineup_1_player_5_box_score_id: i32,
    pub lineup_2_player_1_box_score_id: i32,
    pub lineup_2_player_2_box_score_id: i32,
    pub lineup_2_player_3_box_score_id: i32,
    pub lineup_2_player_4_box_score_id: i32,
    pub lineup_2_player_5_box_score_id: i32,
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Player box score ids of one lineup (1 or 2), in slot order
    pub fn player_box_score_ids(&self, lineup: u8) -> [i32; 5] {
        if lineup == 1 {
            [
                self.lineup_1_player_1_box_score_id,
                self.lineup_1_player_2_box_score_id,
                self.lineup_1_player_3_box_score_id,
                self.lineup_1_player_4_box_score_id,
                self.lineup_1_player_5_box_score_id,
            ]
        } else {
            [
                self.lineup_2_player_1_box_score_id,
                self.lineup_2_player_2_box_score_id,
                self.lineup_2_player_3_box_score_id,
                self.lineup_2_player_4_box_score_id,
                self.lineup_2_player_5_box_score_id,
            ]
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::simulations::Entity")]
    Simulation,
}

impl Related<super::simulations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Simulation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
