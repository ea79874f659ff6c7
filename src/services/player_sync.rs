//! Player entity sync
//!
//! Mirrors the simulator's player listing into the `players` table. The
//! listing is drained completely, filtered to the configured token range,
//! flattened and upserted by uuid. Ownership (`team_id`) and aggregate stats
//! belong to other writers and are never touched here.

use chrono::{DateTime, Utc};
use sea_orm::{sea_query::OnConflict, DatabaseConnection, EntityTrait, Set};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::entities::{players, prelude::Players};
use crate::error::ReconcileError;
use crate::models::simulator::RawPlayerPayload;
use crate::services::simulator_client::{fetch_all_players, SimulatorClient};

/// Rows per INSERT statement; keeps bind parameters well under Postgres' limit
pub const UPSERT_CHUNK_SIZE: usize = 500;

/// Columns overwritten when a player already exists
const SYNCED_COLUMNS: [players::Column; 27] = [
    players::Column::Token,
    players::Column::FullName,
    players::Column::Age,
    players::Column::StarRating,
    players::Column::ThreePtRating,
    players::Column::Interior2ptRating,
    players::Column::Midrange2ptRating,
    players::Column::FtRating,
    players::Column::DrbRating,
    players::Column::OrbRating,
    players::Column::AstRating,
    players::Column::PhysicalityRating,
    players::Column::InteriorDefenseRating,
    players::Column::PerimeterDefenseRating,
    players::Column::LongevityRating,
    players::Column::HustleRating,
    players::Column::BballIqRating,
    players::Column::LeadershipRating,
    players::Column::CoachabilityRating,
    players::Column::Hair,
    players::Column::SkinTone,
    players::Column::Jersey,
    players::Column::TopAttribute1,
    players::Column::TopAttribute2,
    players::Column::TopAttribute3,
    players::Column::Position1,
    players::Column::Position2,
];

/// Inclusive token bounds; players outside it (or without a token) are skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRange {
    pub min: i64,
    pub max: i64,
}

impl TokenRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, token: Option<i64>) -> bool {
        token.is_some_and(|t| self.min <= t && t <= self.max)
    }
}

impl Default for TokenRange {
    fn default() -> Self {
        Self { min: 0, max: i64::MAX }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PlayerSyncStats {
    pub fetched: usize,
    pub in_range: usize,
    pub rows_written: u64,
}

/// Flatten a listing record into a `players` row
pub fn flatten_player(raw: &RawPlayerPayload, now: DateTime<Utc>) -> players::ActiveModel {
    let attrs = &raw.attributes;
    let visual = &raw.visual_attributes;
    let top = |i: usize| raw.top_attributes.get(i).cloned();
    let position = |i: usize| raw.positions.get(i).cloned();

    players::ActiveModel {
        uuid: Set(raw.uuid),
        token: Set(raw.token),
        team_id: Set(None),
        full_name: Set(raw.full_name.clone()),
        age: Set(raw.age),
        star_rating: Set(raw.star_rating),
        three_pt_rating: Set(attrs.three_pt_rating),
        interior_2pt_rating: Set(attrs.interior_2pt_rating),
        midrange_2pt_rating: Set(attrs.midrange_2pt_rating),
        ft_rating: Set(attrs.ft_rating),
        drb_rating: Set(attrs.drb_rating),
        orb_rating: Set(attrs.orb_rating),
        ast_rating: Set(attrs.ast_rating),
        physicality_rating: Set(attrs.physicality_rating),
        interior_defense_rating: Set(attrs.interior_defense_rating),
        perimeter_defense_rating: Set(attrs.perimeter_defense_rating),
        longevity_rating: Set(attrs.longevity_rating),
        hustle_rating: Set(attrs.hustle_rating),
        bball_iq_rating: Set(attrs.bball_iq_rating),
        leadership_rating: Set(attrs.leadership_rating),
        coachability_rating: Set(attrs.coachability_rating),
        hair: Set(visual.hair.clone()),
        skin_tone: Set(visual.skin_tone.clone()),
        jersey: Set(visual.jersey.clone()),
        top_attribute_1: Set(top(0)),
        top_attribute_2: Set(top(1)),
        top_attribute_3: Set(top(2)),
        position_1: Set(position(0)),
        position_2: Set(position(1)),
        games_played: Set(0),
        wins: Set(0),
        losses: Set(0),
        points_avg: Set(None),
        rebounds_avg: Set(None),
        assists_avg: Set(None),
        first_synced_at: Set(now),
        ..Default::default()
    }
}

/// One entry per uuid, in first-seen order, carrying the last occurrence's
/// data. A listing that shifts while it is paged can repeat a player, and a
/// single upsert statement must not touch the same row twice.
pub fn dedup_by_uuid<'a>(
    players: impl IntoIterator<Item = &'a RawPlayerPayload>,
) -> Vec<&'a RawPlayerPayload> {
    let mut position: HashMap<Uuid, usize> = HashMap::new();
    let mut unique: Vec<&RawPlayerPayload> = Vec::new();

    for player in players {
        match position.get(&player.uuid) {
            Some(&i) => unique[i] = player,
            None => {
                position.insert(player.uuid, unique.len());
                unique.push(player);
            }
        }
    }

    unique
}

/// Upsert flattened players by uuid. Rows must be unique by uuid. Returns
/// rows affected as reported by the database.
pub async fn upsert_players(
    db: &DatabaseConnection,
    rows: Vec<players::ActiveModel>,
) -> Result<u64, ReconcileError> {
    let mut written = 0;
    let mut rows = rows.into_iter().peekable();

    while rows.peek().is_some() {
        let chunk: Vec<_> = rows.by_ref().take(UPSERT_CHUNK_SIZE).collect();
        written += Players::insert_many(chunk)
            .on_conflict(
                OnConflict::column(players::Column::Uuid)
                    .update_columns(SYNCED_COLUMNS)
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
    }

    Ok(written)
}

#[derive(Clone)]
pub struct PlayerSyncService {
    db: DatabaseConnection,
    client: Arc<dyn SimulatorClient>,
    range: TokenRange,
}

impl PlayerSyncService {
    pub fn new(db: DatabaseConnection, client: Arc<dyn SimulatorClient>, range: TokenRange) -> Self {
        Self { db, client, range }
    }

    pub async fn sync(&self) -> Result<PlayerSyncStats, ReconcileError> {
        let listing = fetch_all_players(self.client.as_ref()).await?;
        let fetched = listing.len();

        let now = Utc::now();
        let unique = dedup_by_uuid(listing.iter().filter(|p| self.range.contains(p.token)));
        let rows: Vec<_> = unique.into_iter().map(|p| flatten_player(p, now)).collect();
        let in_range = rows.len();

        debug!(
            fetched = fetched,
            in_range = in_range,
            min_token = self.range.min,
            max_token = self.range.max,
            "Fetched player listing"
        );

        if rows.is_empty() {
            info!(fetched = fetched, "No players in token range, nothing to sync");
            return Ok(PlayerSyncStats {
                fetched,
                in_range,
                rows_written: 0,
            });
        }

        let rows_written = upsert_players(&self.db, rows).await?;
        info!(
            fetched = fetched,
            in_range = in_range,
            rows_written = rows_written,
            "Player sync complete"
        );

        Ok(PlayerSyncStats {
            fetched,
            in_range,
            rows_written,
        })
    }
}
