//! `SeaORM` Entity for transfer_logs table
//!
//! Append-only. The most recent transfer of a token is the one with the
//! greatest `(block_number, log_index)`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transfer_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub token_id: i64,
    pub from_address: String,
    pub to_address: String,
    pub block_number: i64,
    pub log_index: i32,
    pub tx_hash: String,
    pub created_at: DateTimeUtc,
}

impl Model {
    pub fn ordering_key(&self) -> (i64, i32) {
        (self.block_number, self.log_index)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
