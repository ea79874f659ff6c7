//! Ownership reconciliation
//!
//! `players.team_id` is derived state: the owner of a token is the team of
//! the account its most recent transfer went to. Recomputes diff desired
//! against current ownership and only write rows that actually change.

use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::entities::{
    accounts, players,
    prelude::{Accounts, Players, TransferLogs},
    transfer_logs,
};
use crate::models::transfer::{normalize_address, OwnershipScope, TransferEntry};

const INGEST_CHUNK_SIZE: usize = 1000;

/// A pending owner change for one player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipChange {
    pub player_id: i32,
    pub token: i64,
    pub from_team: Option<i32>,
    pub to_team: Option<i32>,
}

/// Append transfers to the log. Entries already present (same tx hash and
/// log index) are skipped. Returns the number of new rows.
pub async fn ingest_transfers(db: &DatabaseConnection, entries: &[TransferEntry]) -> Result<u64, DbErr> {
    if entries.is_empty() {
        return Ok(0);
    }

    let now = Utc::now();
    let mut inserted = 0;

    for chunk in entries.chunks(INGEST_CHUNK_SIZE) {
        let rows = chunk.iter().map(|entry| {
            let entry = entry.clone().normalized();
            transfer_logs::ActiveModel {
                token_id: Set(entry.token_id),
                from_address: Set(entry.from_address),
                to_address: Set(entry.to_address),
                block_number: Set(entry.block_number),
                log_index: Set(entry.log_index),
                tx_hash: Set(entry.tx_hash),
                created_at: Set(now),
                ..Default::default()
            }
        });

        inserted += TransferLogs::insert_many(rows)
            .on_conflict(
                OnConflict::columns([transfer_logs::Column::TxHash, transfer_logs::Column::LogIndex])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
    }

    info!(received = entries.len(), inserted = inserted, "Ingested transfer logs");
    Ok(inserted)
}

/// Highest block already present in the log
pub async fn highest_ingested_block(db: &DatabaseConnection) -> Result<Option<i64>, DbErr> {
    Ok(TransferLogs::find()
        .order_by_desc(transfer_logs::Column::BlockNumber)
        .one(db)
        .await?
        .map(|t| t.block_number))
}

/// Most recent transfer per token. Within a block the higher log index wins.
pub fn latest_transfers(logs: &[transfer_logs::Model]) -> HashMap<i64, &transfer_logs::Model> {
    let mut latest: HashMap<i64, &transfer_logs::Model> = HashMap::new();
    for log in logs {
        latest
            .entry(log.token_id)
            .and_modify(|current| {
                if log.ordering_key() > current.ordering_key() {
                    *current = log;
                }
            })
            .or_insert(log);
    }
    latest
}

/// Owner changes needed to bring `players` in line with the transfer log.
///
/// `teams_by_wallet` maps lower-cased wallet addresses to the account's
/// team. A token whose latest recipient is not a known account becomes
/// unowned. Tokens without any transfer keep their current owner.
pub fn ownership_changes(
    players: &[players::Model],
    latest: &HashMap<i64, &transfer_logs::Model>,
    teams_by_wallet: &HashMap<String, Option<i32>>,
    scope: &OwnershipScope,
) -> Vec<OwnershipChange> {
    players
        .iter()
        .filter_map(|player| {
            let token = player.token?;
            let transfer = latest.get(&token)?;
            let recipient = normalize_address(&transfer.to_address);

            if let OwnershipScope::Wallet(wallet) = scope {
                if &recipient != wallet {
                    return None;
                }
            }

            let desired = teams_by_wallet.get(&recipient).copied().flatten();
            (desired != player.team_id).then_some(OwnershipChange {
                player_id: player.id,
                token,
                from_team: player.team_id,
                to_team: desired,
            })
        })
        .collect()
}

#[derive(Clone)]
pub struct OwnershipReconciler {
    db: DatabaseConnection,
}

impl OwnershipReconciler {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Recompute owners within `scope`; returns the number of players changed
    pub async fn reconcile(&self, scope: &OwnershipScope) -> Result<usize, DbErr> {
        let logs = TransferLogs::find().all(&self.db).await?;
        let latest = latest_transfers(&logs);

        let teams_by_wallet: HashMap<String, Option<i32>> = Accounts::find()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|a: accounts::Model| (normalize_address(&a.wallet_address), a.team_id))
            .collect();

        let tokens: Vec<i64> = latest.keys().copied().collect();
        let players = if tokens.is_empty() {
            Vec::new()
        } else {
            Players::find()
                .filter(players::Column::Token.is_in(tokens))
                .all(&self.db)
                .await?
        };

        let changes = ownership_changes(&players, &latest, &teams_by_wallet, scope);
        if changes.is_empty() {
            debug!(scope = ?scope, "Ownership already up to date");
            return Ok(0);
        }

        // One UPDATE per destination team
        let mut by_team: BTreeMap<Option<i32>, Vec<i32>> = BTreeMap::new();
        for change in &changes {
            debug!(
                token = change.token,
                from_team = ?change.from_team,
                to_team = ?change.to_team,
                "Player owner changed"
            );
            by_team.entry(change.to_team).or_default().push(change.player_id);
        }

        for (team_id, player_ids) in by_team {
            Players::update_many()
                .col_expr(players::Column::TeamId, Expr::value(team_id))
                .filter(players::Column::Id.is_in(player_ids))
                .exec(&self.db)
                .await?;
        }

        info!(scope = ?scope, changed = changes.len(), "Ownership reconciled");
        Ok(changes.len())
    }
}
