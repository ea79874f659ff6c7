//! `SeaORM` Entity for simulations table
//!
//! One row per request to the external simulator. `status` holds a
//! `SimulationStatus` string; `result_id` is set exactly when the status is
//! FINISHED.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "simulations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub game_id: i32,
    /// Simulator-side game id, assigned by a successful submit
    pub handle: Option<String>,
    /// JSON array of exactly five player uuids, slot order preserved
    pub lineup_1: Json,
    pub lineup_2: Json,
    pub status: String,
    pub num_retries: i32,
    pub next_retry_at: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    #[sea_orm(unique)]
    pub result_id: Option<i32>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::games::Entity",
        from = "Column::GameId",
        to = "super::games::Column::Id"
    )]
    Game,
    #[sea_orm(
        belongs_to = "super::results::Entity",
        from = "Column::ResultId",
        to = "super::results::Column::Id"
    )]
    GameResult,
}

impl Related<super::games::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Game.def()
    }
}

impl Related<super::results::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GameResult.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
