//! `SeaORM` Entity for players table
//!
//! Mirrors the simulator's player records. Everything except `team_id` and
//! the aggregate stat columns is overwritten on every player sync.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "players")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub uuid: Uuid,
    /// On-chain token id; `None` for free agents
    #[sea_orm(unique)]
    pub token: Option<i64>,
    /// Owning team, derived from the transfer log
    pub team_id: Option<i32>,
    pub full_name: String,
    pub age: Option<i32>,
    pub star_rating: Option<i32>,
    pub three_pt_rating: Option<i32>,
    pub interior_2pt_rating: Option<i32>,
    pub midrange_2pt_rating: Option<i32>,
    pub ft_rating: Option<i32>,
    pub drb_rating: Option<i32>,
    pub orb_rating: Option<i32>,
    pub ast_rating: Option<i32>,
    pub physicality_rating: Option<i32>,
    pub interior_defense_rating: Option<i32>,
    pub perimeter_defense_rating: Option<i32>,
    pub longevity_rating: Option<i32>,
    pub hustle_rating: Option<i32>,
    pub bball_iq_rating: Option<i32>,
    pub leadership_rating: Option<i32>,
    pub coachability_rating: Option<i32>,
    pub hair: Option<String>,
    pub skin_tone: Option<String>,
    pub jersey: Option<String>,
    pub top_attribute_1: Option<String>,
    pub top_attribute_2: Option<String>,
    pub top_attribute_3: Option<String>,
    pub position_1: Option<String>,
    pub position_2: Option<String>,
    pub games_played: i32,
    pub wins: i32,
    pub losses: i32,
    pub points_avg: Option<f64>,
    pub rebounds_avg: Option<f64>,
    pub assists_avg: Option<f64>,
    /// Set when the player is first seen; later syncs leave it alone
    pub first_synced_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
