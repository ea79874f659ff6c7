//! `SeaORM` Entity for team_game_stats table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "team_game_stats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub simulation_id: i32,
    pub team_id: Option<i32>,
    pub lineup: i16,
    pub won: bool,
    pub points_for: i32,
    pub points_against: i32,
    pub trb: i32,
    pub ast: i32,
    pub tov: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
