//! Result materializer
//!
//! Turns the result payload of a FINISHED simulator game into one `results`
//! row and twelve `box_scores` rows, committed atomically together with the
//! simulation's move to FINISHED. Stat side tables are written afterwards,
//! each on a best-effort basis.

use chrono::Utc;
use futures_util::FutureExt;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::{
    box_scores, games, play_by_plays, player_game_stats, players, results, simulations,
    team_game_stats,
    prelude::{Games, PlayByPlays, PlayerGameStats, Players, Simulations, TeamGameStats, Teams},
    teams,
};
use crate::error::ReconcileError;
use crate::models::simulation::{parse_lineup, ContestKind, Lineup, SimulationStatus, LINEUP_SIZE};
use crate::models::simulator::{BoxScoreStats, PlayEvent, RawBoxScore, RawResultPayload, Side};
use crate::services::post_commit::{ActionResult, PostCommitActions, PostCommitReport};
use crate::services::simulator_client::SimulatorClient;

/// Outcome of [`ResultMaterializer::materialize`]
#[derive(Debug, Clone, PartialEq)]
pub enum Materialization {
    /// This call linked the result and moved the simulation to FINISHED
    Committed(simulations::Model),
    AlreadyMaterialized(simulations::Model),
}

impl Materialization {
    pub fn into_simulation(self) -> simulations::Model {
        match self {
            Materialization::Committed(simulation) | Materialization::AlreadyMaterialized(simulation) => simulation,
        }
    }
}

/// Box scores of one lineup; `players[i]` belongs to lineup slot `i`
#[derive(Debug, Clone, Copy)]
pub struct SideBoxScores<'a> {
    pub total: &'a RawBoxScore,
    pub players: [&'a RawBoxScore; LINEUP_SIZE],
}

#[derive(Debug, Clone, Copy)]
pub struct PartitionedBoxScores<'a> {
    pub lineup_1: SideBoxScores<'a>,
    pub lineup_2: SideBoxScores<'a>,
}

impl PartitionedBoxScores<'_> {
    pub fn scores(&self) -> (i32, i32) {
        (self.lineup_1.total.stats.pts, self.lineup_2.total.stats.pts)
    }
}

/// Split the payload's box scores by side and order each side's player
/// entries by lineup slot.
///
/// Anything but exactly one total and five player entries per side, or a
/// player entry that cannot be matched to its lineup slot, is a protocol
/// violation.
pub fn partition_box_scores<'a>(
    payload: &'a RawResultPayload,
    lineup_1: &Lineup,
    lineup_2: &Lineup,
) -> Result<PartitionedBoxScores<'a>, ReconcileError> {
    Ok(PartitionedBoxScores {
        lineup_1: side_box_scores(payload, Side::Challengers, lineup_1)?,
        lineup_2: side_box_scores(payload, Side::Challenged, lineup_2)?,
    })
}

fn side_box_scores<'a>(
    payload: &'a RawResultPayload,
    side: Side,
    lineup: &Lineup,
) -> Result<SideBoxScores<'a>, ReconcileError> {
    let (totals, entries): (Vec<&RawBoxScore>, Vec<&RawBoxScore>) = payload
        .box_scores
        .iter()
        .filter(|b| b.side == side)
        .partition(|b| b.is_team_total());

    if totals.len() != 1 || entries.len() != LINEUP_SIZE {
        return Err(ReconcileError::ProtocolViolation(format!(
            "{:?}: expected 1 total and {} player box scores, got {} and {}",
            side,
            LINEUP_SIZE,
            totals.len(),
            entries.len()
        )));
    }

    let mut by_player: HashMap<Uuid, &RawBoxScore> = HashMap::with_capacity(LINEUP_SIZE);
    for entry in entries {
        let canonical = entry.canonical.as_deref().unwrap_or_default();
        let player_id = payload.players.get(canonical).ok_or_else(|| {
            ReconcileError::ProtocolViolation(format!("no player id for canonical name {:?}", canonical))
        })?;
        if by_player.insert(*player_id, entry).is_some() {
            return Err(ReconcileError::ProtocolViolation(format!(
                "{:?}: player {} has more than one box score",
                side, player_id
            )));
        }
    }

    let mut slots = Vec::with_capacity(LINEUP_SIZE);
    for (slot, player_id) in lineup.iter().enumerate() {
        let entry = by_player.remove(player_id).ok_or_else(|| {
            ReconcileError::ProtocolViolation(format!(
                "{:?}: no box score for slot {} player {}",
                side, slot, player_id
            ))
        })?;
        slots.push(entry);
    }

    let players: [&RawBoxScore; LINEUP_SIZE] = slots
        .try_into()
        .map_err(|_| ReconcileError::ProtocolViolation("lineup slot count mismatch".into()))?;

    Ok(SideBoxScores {
        total: totals[0],
        players,
    })
}

fn box_score_model(stats: &BoxScoreStats) -> box_scores::ActiveModel {
    box_scores::ActiveModel {
        ast: Set(stats.ast),
        blk: Set(stats.blk),
        drb: Set(stats.drb),
        orb: Set(stats.orb),
        trb: Set(stats.trb),
        fg: Set(stats.fg),
        fga: Set(stats.fga),
        fg_pct: Set(stats.fg_pct),
        three_p: Set(stats.three_p),
        three_pa: Set(stats.three_pa),
        three_p_pct: Set(stats.three_p_pct),
        two_p: Set(stats.two_p),
        two_pa: Set(stats.two_pa),
        two_p_pct: Set(stats.two_p_pct),
        ft: Set(stats.ft),
        fta: Set(stats.fta),
        ft_pct: Set(stats.ft_pct),
        stl: Set(stats.stl),
        tov: Set(stats.tov),
        pf: Set(stats.pf),
        pts: Set(stats.pts),
        ..Default::default()
    }
}

async fn insert_box_score<C: ConnectionTrait>(db: &C, raw: &RawBoxScore) -> Result<i32, ReconcileError> {
    Ok(box_score_model(&raw.stats).insert(db).await?.id)
}

async fn insert_player_box_scores<C: ConnectionTrait>(
    db: &C,
    side: &SideBoxScores<'_>,
) -> Result<[i32; LINEUP_SIZE], ReconcileError> {
    let mut ids = [0; LINEUP_SIZE];
    for (slot, raw) in side.players.iter().enumerate() {
        ids[slot] = insert_box_score(db, raw).await?;
    }
    Ok(ids)
}

#[derive(Clone)]
pub struct ResultMaterializer {
    db: DatabaseConnection,
    client: Arc<dyn SimulatorClient>,
}

impl ResultMaterializer {
    pub fn new(db: DatabaseConnection, client: Arc<dyn SimulatorClient>) -> Self {
        Self { db, client }
    }

    /// Materialize a finished game.
    ///
    /// A simulation that already has a result, including one linked by a
    /// concurrent commit, is returned unchanged as
    /// [`Materialization::AlreadyMaterialized`].
    pub async fn materialize(
        &self,
        simulation: &simulations::Model,
        payload: &RawResultPayload,
    ) -> Result<Materialization, ReconcileError> {
        let lineup_1 = parse_lineup(&simulation.lineup_1).map_err(ReconcileError::InvalidLineup)?;
        let lineup_2 = parse_lineup(&simulation.lineup_2).map_err(ReconcileError::InvalidLineup)?;
        let partitioned = partition_box_scores(payload, &lineup_1, &lineup_2)?;

        let Some((finished, result)) = self.commit_result(simulation.id, &partitioned).await? else {
            info!(simulation_id = simulation.id, "Simulation already has a result, skipping");
            let current = Simulations::find_by_id(simulation.id)
                .one(&self.db)
                .await?
                .ok_or(ReconcileError::SimulationNotFound(simulation.id))?;
            return Ok(Materialization::AlreadyMaterialized(current));
        };

        info!(
            simulation_id = finished.id,
            result_id = result.id,
            lineup_1_score = result.lineup_1_score,
            lineup_2_score = result.lineup_2_score,
            "Materialized simulation result"
        );

        let game = match Games::find_by_id(finished.game_id).one(&self.db).await {
            Ok(game) => game,
            Err(e) => {
                warn!(simulation_id = finished.id, error = %e, "Failed to load game for post-commit work");
                None
            }
        };

        let report = self
            .run_post_commit(&finished, &result, game.as_ref(), &partitioned, [&lineup_1, &lineup_2], payload)
            .await;
        if !report.is_clean() {
            warn!(
                simulation_id = finished.id,
                failed = report.failed.len(),
                "Some post-commit actions failed"
            );
        }

        Ok(Materialization::Committed(finished))
    }

    /// The all-or-nothing part: 12 box scores, the result, and the status flip
    async fn commit_result(
        &self,
        simulation_id: i32,
        partitioned: &PartitionedBoxScores<'_>,
    ) -> Result<Option<(simulations::Model, results::Model)>, ReconcileError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let current = Simulations::find_by_id(simulation_id)
            .one(&txn)
            .await?
            .ok_or(ReconcileError::SimulationNotFound(simulation_id))?;
        if current.result_id.is_some() {
            txn.rollback().await?;
            return Ok(None);
        }

        let lineup_1_total = insert_box_score(&txn, partitioned.lineup_1.total).await?;
        let lineup_2_total = insert_box_score(&txn, partitioned.lineup_2.total).await?;
        let [l1p1, l1p2, l1p3, l1p4, l1p5] = insert_player_box_scores(&txn, &partitioned.lineup_1).await?;
        let [l2p1, l2p2, l2p3, l2p4, l2p5] = insert_player_box_scores(&txn, &partitioned.lineup_2).await?;
        let (lineup_1_score, lineup_2_score) = partitioned.scores();

        let result = results::ActiveModel {
            lineup_1_score: Set(lineup_1_score),
            lineup_2_score: Set(lineup_2_score),
            lineup_1_box_score_id: Set(lineup_1_total),
            lineup_2_box_score_id: Set(lineup_2_total),
            lineup_1_player_1_box_score_id: Set(l1p1),
            lineup_1_player_2_box_score_id: Set(l1p2),
            lineup_1_player_3_box_score_id: Set(l1p3),
            lineup_1_player_4_box_score_id: Set(l1p4),
            lineup_1_player_5_box_score_id: Set(l1p5),
            lineup_2_player_1_box_score_id: Set(l2p1),
            lineup_2_player_2_box_score_id: Set(l2p2),
            lineup_2_player_3_box_score_id: Set(l2p3),
            lineup_2_player_4_box_score_id: Set(l2p4),
            lineup_2_player_5_box_score_id: Set(l2p5),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        // Only the first commit may link a result; a concurrent one rolls back
        let linked = Simulations::update_many()
            .col_expr(simulations::Column::ResultId, Expr::value(Some(result.id)))
            .col_expr(simulations::Column::Status, Expr::value(SimulationStatus::Finished.to_string()))
            .col_expr(simulations::Column::UpdatedAt, Expr::value(now))
            .filter(simulations::Column::Id.eq(current.id))
            .filter(simulations::Column::ResultId.is_null())
            .exec(&txn)
            .await?;
        if linked.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(None);
        }

        let finished = Simulations::find_by_id(current.id)
            .one(&txn)
            .await?
            .ok_or(ReconcileError::SimulationNotFound(current.id))?;

        txn.commit().await?;
        Ok(Some((finished, result)))
    }

    async fn run_post_commit(
        &self,
        simulation: &simulations::Model,
        result: &results::Model,
        game: Option<&games::Model>,
        partitioned: &PartitionedBoxScores<'_>,
        lineups: [&Lineup; 2],
        payload: &RawResultPayload,
    ) -> PostCommitReport {
        let player_ids: Vec<Uuid> = lineups.iter().flat_map(|l| l.iter().copied()).collect();
        let team_ids = game.map(|g| [g.team_1_id, g.team_2_id]).unwrap_or([None, None]);
        let counts_toward_record = game
            .and_then(|g| g.contest_kind.parse::<ContestKind>().ok())
            .is_some_and(|kind| kind.counts_toward_record());

        let mut actions = PostCommitActions::new();
        actions.push("player_stats", self.refresh_player_stats(&player_ids).boxed());
        if counts_toward_record {
            actions.push("team_record", self.update_team_record(result, team_ids).boxed());
        }
        actions.push("play_by_play", self.save_play_by_play(simulation.id, &payload.pbp).boxed());
        actions.push(
            "player_game_stats",
            self.insert_player_game_stats(simulation.id, result, partitioned, lineups, team_ids)
                .boxed(),
        );
        actions.push(
            "team_game_stats",
            self.insert_team_game_stats(simulation.id, result, partitioned, team_ids)
                .boxed(),
        );

        actions.run().await
    }

    /// Pull the simulator's aggregate stats for everyone who played
    async fn refresh_player_stats(&self, player_ids: &[Uuid]) -> ActionResult {
        let stats = self.client.fetch_player_stats(player_ids).await?;

        for stat in stats {
            Players::update_many()
                .col_expr(players::Column::GamesPlayed, Expr::value(stat.games_played))
                .col_expr(players::Column::Wins, Expr::value(stat.wins))
                .col_expr(players::Column::Losses, Expr::value(stat.losses))
                .col_expr(players::Column::PointsAvg, Expr::value(stat.points_avg))
                .col_expr(players::Column::ReboundsAvg, Expr::value(stat.rebounds_avg))
                .col_expr(players::Column::AssistsAvg, Expr::value(stat.assists_avg))
                .filter(players::Column::Uuid.eq(stat.uuid))
                .exec(&self.db)
                .await?;
        }

        Ok(())
    }

    async fn update_team_record(&self, result: &results::Model, team_ids: [Option<i32>; 2]) -> ActionResult {
        let (winner, loser) = match result.lineup_1_score.cmp(&result.lineup_2_score) {
            std::cmp::Ordering::Greater => (team_ids[0], team_ids[1]),
            std::cmp::Ordering::Less => (team_ids[1], team_ids[0]),
            std::cmp::Ordering::Equal => {
                warn!(result_id = result.id, "Tied head-to-head result, team records unchanged");
                return Ok(());
            }
        };

        if let Some(winner) = winner {
            Teams::update_many()
                .col_expr(teams::Column::Wins, Expr::col(teams::Column::Wins).add(1))
                .filter(teams::Column::Id.eq(winner))
                .exec(&self.db)
                .await?;
        }
        if let Some(loser) = loser {
            Teams::update_many()
                .col_expr(teams::Column::Losses, Expr::col(teams::Column::Losses).add(1))
                .filter(teams::Column::Id.eq(loser))
                .exec(&self.db)
                .await?;
        }

        Ok(())
    }

    async fn save_play_by_play(&self, simulation_id: i32, events: &[PlayEvent]) -> ActionResult {
        let record = play_by_plays::ActiveModel {
            simulation_id: Set(simulation_id),
            events: Set(serde_json::to_value(events)?),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        PlayByPlays::insert(record).exec_without_returning(&self.db).await?;
        Ok(())
    }

    async fn insert_player_game_stats(
        &self,
        simulation_id: i32,
        result: &results::Model,
        partitioned: &PartitionedBoxScores<'_>,
        lineups: [&Lineup; 2],
        team_ids: [Option<i32>; 2],
    ) -> ActionResult {
        let now = Utc::now();
        let sides = [
            (1i16, &partitioned.lineup_1, result.lineup_1_score > result.lineup_2_score),
            (2i16, &partitioned.lineup_2, result.lineup_2_score > result.lineup_1_score),
        ];

        let mut rows = Vec::with_capacity(2 * LINEUP_SIZE);
        for (lineup, side, won) in sides {
            let index = (lineup - 1) as usize;
            for (slot, raw) in side.players.iter().enumerate() {
                let stats = &raw.stats;
                rows.push(player_game_stats::ActiveModel {
                    simulation_id: Set(simulation_id),
                    player_uuid: Set(lineups[index][slot]),
                    team_id: Set(team_ids[index]),
                    lineup: Set(lineup),
                    won: Set(won),
                    pts: Set(stats.pts),
                    trb: Set(stats.trb),
                    ast: Set(stats.ast),
                    stl: Set(stats.stl),
                    blk: Set(stats.blk),
                    tov: Set(stats.tov),
                    fg: Set(stats.fg),
                    fga: Set(stats.fga),
                    three_p: Set(stats.three_p),
                    three_pa: Set(stats.three_pa),
                    created_at: Set(now),
                    ..Default::default()
                });
            }
        }

        PlayerGameStats::insert_many(rows).exec_without_returning(&self.db).await?;
        Ok(())
    }

    async fn insert_team_game_stats(
        &self,
        simulation_id: i32,
        result: &results::Model,
        partitioned: &PartitionedBoxScores<'_>,
        team_ids: [Option<i32>; 2],
    ) -> ActionResult {
        let now = Utc::now();
        let rows = [
            (1i16, partitioned.lineup_1.total, result.lineup_1_score, result.lineup_2_score),
            (2i16, partitioned.lineup_2.total, result.lineup_2_score, result.lineup_1_score),
        ]
        .into_iter()
        .map(|(lineup, total, points_for, points_against)| team_game_stats::ActiveModel {
            simulation_id: Set(simulation_id),
            team_id: Set(team_ids[(lineup - 1) as usize]),
            lineup: Set(lineup),
            won: Set(points_for > points_against),
            points_for: Set(points_for),
            points_against: Set(points_against),
            trb: Set(total.stats.trb),
            ast: Set(total.stats.ast),
            tov: Set(total.stats.tov),
            created_at: Set(now),
            ..Default::default()
        });

        TeamGameStats::insert_many(rows).exec_without_returning(&self.db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lineup() -> Lineup {
        std::array::from_fn(|_| Uuid::new_v4())
    }

    fn payload(lineup_1: &Lineup, lineup_2: &Lineup) -> RawResultPayload {
        let mut box_scores = vec![
            json!({ "Team": "Challengers", "PTS": 101 }),
            json!({ "Team": "Challenged", "PTS": 99 }),
        ];
        let mut players = serde_json::Map::new();
        // Player entries listed in reverse slot order on purpose
        for (side, lineup) in [("Challengers", lineup_1), ("Challenged", lineup_2)] {
            for (slot, id) in lineup.iter().enumerate().rev() {
                let name = format!("{}-{}", side, slot);
                box_scores.push(json!({ "Team": side, "canonical": name, "PTS": slot * 2 }));
                players.insert(name, json!(id));
            }
        }
        serde_json::from_value(json!({ "box_scores": box_scores, "players": players })).unwrap()
    }

    #[test]
    fn test_partition_orders_players_by_slot() {
        let (l1, l2) = (lineup(), lineup());
        let payload = payload(&l1, &l2);

        let partitioned = partition_box_scores(&payload, &l1, &l2).unwrap();

        assert_eq!(partitioned.scores(), (101, 99));
        for slot in 0..LINEUP_SIZE {
            let expected = format!("Challengers-{}", slot);
            assert_eq!(partitioned.lineup_1.players[slot].canonical.as_deref(), Some(expected.as_str()));
            assert_eq!(partitioned.lineup_2.players[slot].stats.pts, (slot * 2) as i32);
        }
    }

    #[test]
    fn test_partition_rejects_missing_total() {
        let (l1, l2) = (lineup(), lineup());
        let mut payload = payload(&l1, &l2);
        payload.box_scores.retain(|b| !(b.side == Side::Challenged && b.is_team_total()));

        let err = partition_box_scores(&payload, &l1, &l2).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_partition_rejects_extra_player() {
        let (l1, l2) = (lineup(), lineup());
        let mut payload = payload(&l1, &l2);
        let extra = payload.box_scores[2].clone();
        payload.box_scores.push(extra);

        assert!(partition_box_scores(&payload, &l1, &l2).unwrap_err().is_fatal());
    }

    #[test]
    fn test_partition_rejects_player_outside_lineup() {
        let (l1, l2) = (lineup(), lineup());
        let payload = payload(&l1, &l2);
        let mut other = l1;
        other[3] = Uuid::new_v4();

        let err = partition_box_scores(&payload, &other, &l2).unwrap_err();
        assert!(matches!(err, ReconcileError::ProtocolViolation(msg) if msg.contains("slot 3")));
    }

    #[test]
    fn test_partition_rejects_unknown_canonical_name() {
        let (l1, l2) = (lineup(), lineup());
        let mut payload = payload(&l1, &l2);
        payload.players.remove("Challenged-0");

        assert!(partition_box_scores(&payload, &l1, &l2).unwrap_err().is_fatal());
    }
}
