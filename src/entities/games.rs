//! `SeaORM` Entity for games table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "games")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// See `models::simulation::ContestKind`
    pub contest_kind: String,
    /// See `models::simulation::Visibility`
    pub visibility: String,
    pub team_1_id: Option<i32>,
    pub team_2_id: Option<i32>,
    pub created_at: DateTimeUtc,
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
