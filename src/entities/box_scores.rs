//! `SeaORM` Entity for box_scores table
//!
//! Rows are written once when a result is materialized and never updated.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "box_scores")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub ast: i32,
    pub blk: i32,
    pub drb: i32,
    pub orb: i32,
    pub trb: i32,
    pub fg: i32,
    pub fga: i32,
    pub fg_pct: Option<f64>,
    pub three_p: i32,
    pub three_pa: i32,
    pub three_p_pct: Option<f64>,
    pub two_p: i32,
    pub two_pa: i32,
    pub two_p_pct: Option<f64>,
    pub ft: i32,
    pub fta: i32,
    pub ft_pct: Option<f64>,
    pub stl: i32,
    pub tov: i32,
    pub pf: i32,
    pub pts: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
