mod common;

use chrono::Duration;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use std::sync::atomic::Ordering;

use swoops_reconciler::entities::simulations;
use swoops_reconciler::entities::prelude::{
    BoxScores, PlayByPlays, PlayerGameStats, Players, Results, Simulations, TeamGameStats, Teams,
};
use swoops_reconciler::error::ReconcileError;
use swoops_reconciler::models::simulation::{
    parse_lineup, ContestKind, SimulationStatus, Visibility,
};
use swoops_reconciler::models::simulator::{RawStatPayload, RemoteGame};
use swoops_reconciler::services::locks::{names, LockManager};
use swoops_reconciler::services::materializer::{Materialization, ResultMaterializer};
use swoops_reconciler::services::reconciler::{MAX_RETRY, SimulationReconciler};

use crate::common::{finished, finished_payload, harness, lineup, now, seed_game, seed_player, seed_simulation, seed_team, Reply};

async fn status_of(db: &sea_orm::DatabaseConnection, id: i32) -> swoops_reconciler::entities::simulations::Model {
    Simulations::find_by_id(id)
        .one(db)
        .await
        .unwrap()
        .expect("simulation should exist")
}

/// Submit, poll to FINISHED and check everything that gets materialized
#[tokio::test]
async fn test_end_to_end_submit_and_materialize() {
    let h = harness().await;
    let mut events = h.events.subscribe();

    let home = seed_team(&h.db, "Home").await;
    let away = seed_team(&h.db, "Away").await;
    let game = seed_game(&h.db, ContestKind::HeadToHead, Visibility::Public, [Some(home.id), Some(away.id)]).await;
    let (l1, l2) = (lineup(), lineup());
    for id in l1.iter().chain(l2.iter()) {
        seed_player(&h.db, *id, None, None).await;
    }
    h.simulator.set_player_stats(vec![RawStatPayload {
        uuid: l1[0],
        games_played: 12,
        wins: 8,
        losses: 4,
        points_avg: Some(17.5),
        rebounds_avg: Some(6.0),
        assists_avg: None,
    }]);

    let created = h.reconciler.create_simulation(game.id, &l1, &l2).await.unwrap();
    assert_eq!(created.status, "NOT_CREATED");
    assert_eq!(created.handle, None);

    let submitted = h.reconciler.submit_simulation(created.id).await.unwrap();
    let handle = submitted.handle.clone().expect("handle assigned on submit");
    assert_eq!(submitted.status, "PENDING");
    assert_eq!(h.simulator.submissions().len(), 1);
    assert!(h.simulator.submissions()[0].published);
    assert_eq!(h.simulator.submissions()[0].lineup_1, l1);

    h.simulator.script(&handle, [finished(&l1, &l2, 101, 96)]);
    let stats = h.reconciler.run_pass_at(now()).await.unwrap();
    assert_eq!(stats.polled, 1);
    assert_eq!(stats.finished, 1);

    let simulation = status_of(&h.db, created.id).await;
    assert_eq!(simulation.status, "FINISHED");
    let result = Results::find_by_id(simulation.result_id.expect("result linked"))
        .one(&h.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.lineup_1_score, 101);
    assert_eq!(result.lineup_2_score, 96);
    assert_eq!(Results::find().count(&h.db).await.unwrap(), 1);
    assert_eq!(BoxScores::find().count(&h.db).await.unwrap(), 12);

    // Slot i of each lineup holds that player's box score
    let total_1 = BoxScores::find_by_id(result.lineup_1_box_score_id).one(&h.db).await.unwrap().unwrap();
    assert_eq!(total_1.pts, 101);
    for (lineup, expected_base) in [(1u8, 10), (2u8, 20)] {
        for (slot, box_score_id) in result.player_box_score_ids(lineup).into_iter().enumerate() {
            let box_score = BoxScores::find_by_id(box_score_id).one(&h.db).await.unwrap().unwrap();
            assert_eq!(box_score.pts, expected_base + slot as i32, "lineup {} slot {}", lineup, slot);
            assert_eq!(box_score.fg_pct, Some(0.444));
        }
    }

    // Best-effort side effects
    let teams = Teams::find().all(&h.db).await.unwrap();
    let home = teams.iter().find(|t| t.id == home.id).unwrap();
    let away = teams.iter().find(|t| t.id == away.id).unwrap();
    assert_eq!((home.wins, home.losses), (1, 0));
    assert_eq!((away.wins, away.losses), (0, 1));
    assert_eq!(PlayByPlays::find().count(&h.db).await.unwrap(), 1);
    assert_eq!(PlayerGameStats::find().count(&h.db).await.unwrap(), 10);
    assert_eq!(TeamGameStats::find().count(&h.db).await.unwrap(), 2);
    let star = Players::find()
        .all(&h.db)
        .await
        .unwrap()
        .into_iter()
        .find(|p| p.uuid == l1[0])
        .unwrap();
    assert_eq!(star.games_played, 12);
    assert_eq!(star.points_avg, Some(17.5));
    assert_eq!(h.completions.count(), 1);

    let event = events.try_recv().expect("event emitted");
    assert_eq!(event.simulation_id, created.id);
    assert_eq!(event.handle.as_deref(), Some(handle.as_str()));
    assert_eq!(event.status, SimulationStatus::Finished);
}

#[tokio::test]
async fn test_repoll_without_remote_change_writes_nothing() {
    let h = harness().await;
    let game = seed_game(&h.db, ContestKind::HeadToHead, Visibility::Public, [None, None]).await;
    let created_at = now() - Duration::minutes(3);
    let sim = seed_simulation(&h.db, game.id, SimulationStatus::Pending, Some("h-1"), created_at).await;
    h.simulator.script("h-1", [Reply::Game(RemoteGame::Started)]);

    let first = h.reconciler.run_pass_at(now()).await.unwrap();
    assert_eq!(first.advanced, 1);
    let after_first = status_of(&h.db, sim.id).await;
    assert_eq!(after_first.status, "STARTED");

    let second = h.reconciler.run_pass_at(now() + Duration::minutes(1)).await.unwrap();
    assert_eq!(second.polled, 1);
    assert_eq!(second.unchanged, 1);
    assert_eq!(status_of(&h.db, sim.id).await, after_first);
    assert_eq!(Results::find().count(&h.db).await.unwrap(), 0);
    assert_eq!(BoxScores::find().count(&h.db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_finished_simulation_is_materialized_once() {
    let h = harness().await;
    let game = seed_game(&h.db, ContestKind::Tournament, Visibility::Hidden, [None, None]).await;
    let sim = seed_simulation(&h.db, game.id, SimulationStatus::Started, Some("h-1"), now()).await;
    let l1 = parse_lineup(&sim.lineup_1).unwrap();
    let l2 = parse_lineup(&sim.lineup_2).unwrap();
    h.simulator.script("h-1", [finished(&l1, &l2, 88, 90)]);

    h.reconciler.run_pass_at(now()).await.unwrap();
    let calls = h.simulator.fetch_calls();
    h.reconciler.run_pass_at(now() + Duration::minutes(10)).await.unwrap();

    assert_eq!(h.simulator.fetch_calls(), calls, "FINISHED is never polled again");
    assert_eq!(Results::find().count(&h.db).await.unwrap(), 1);
    assert_eq!(BoxScores::find().count(&h.db).await.unwrap(), 12);
    let finished = status_of(&h.db, sim.id).await;
    assert_eq!(finished.status, "FINISHED");
    assert!(finished.result_id.is_some());

    // Tournament games neither notify nor touch team records
    assert_eq!(h.completions.count(), 0);
}

#[tokio::test]
async fn test_stale_repoll_of_materialized_game_does_not_notify_again() {
    let h = harness().await;
    let game = seed_game(&h.db, ContestKind::HeadToHead, Visibility::Public, [None, None]).await;
    let sim = seed_simulation(&h.db, game.id, SimulationStatus::Started, Some("h-1"), now()).await;
    let l1 = parse_lineup(&sim.lineup_1).unwrap();
    let l2 = parse_lineup(&sim.lineup_2).unwrap();
    h.simulator.script("h-1", [finished(&l1, &l2, 70, 75)]);

    h.reconciler.run_pass_at(now()).await.unwrap();
    assert_eq!(h.completions.count(), 1);
    let materialized = status_of(&h.db, sim.id).await;

    // A worker that still sees the old status polls it again
    let mut stale: simulations::ActiveModel = materialized.clone().into();
    stale.status = Set(SimulationStatus::Started.to_string());
    stale.update(&h.db).await.unwrap();

    h.reconciler.run_pass_at(now() + Duration::minutes(1)).await.unwrap();

    assert_eq!(h.completions.count(), 1, "completion is announced once");
    assert_eq!(Results::find().count(&h.db).await.unwrap(), 1);
    assert_eq!(BoxScores::find().count(&h.db).await.unwrap(), 12);
    assert_eq!(status_of(&h.db, sim.id).await.result_id, materialized.result_id);
}

#[tokio::test]
async fn test_overlapping_materializations_commit_once() {
    let h = harness().await;
    let game = seed_game(&h.db, ContestKind::HeadToHead, Visibility::Public, [None, None]).await;
    let sim = seed_simulation(&h.db, game.id, SimulationStatus::Started, Some("h-1"), now()).await;
    let l1 = parse_lineup(&sim.lineup_1).unwrap();
    let l2 = parse_lineup(&sim.lineup_2).unwrap();
    let payload = finished_payload(&l1, &l2, 99, 98);

    let first = ResultMaterializer::new(h.db.clone(), h.simulator.clone());
    let second = ResultMaterializer::new(h.db.clone(), h.simulator.clone());
    let (a, b) = tokio::join!(first.materialize(&sim, &payload), second.materialize(&sim, &payload));
    let outcomes = [a.unwrap(), b.unwrap()];

    let committed = outcomes
        .iter()
        .filter(|o| matches!(o, Materialization::Committed(_)))
        .count();
    assert_eq!(committed, 1);
    assert_eq!(Results::find().count(&h.db).await.unwrap(), 1);
    assert_eq!(BoxScores::find().count(&h.db).await.unwrap(), 12);

    let linked = status_of(&h.db, sim.id).await;
    assert_eq!(linked.status, "FINISHED");
    for outcome in outcomes {
        assert_eq!(outcome.into_simulation().result_id, linked.result_id);
    }
}

#[tokio::test]
async fn test_retry_ceiling_then_terminal() {
    let h = harness().await;
    let game = seed_game(&h.db, ContestKind::HeadToHead, Visibility::Public, [None, None]).await;
    let sim = seed_simulation(&h.db, game.id, SimulationStatus::Pending, Some("h-1"), now()).await;
    h.simulator.script("h-1", [Reply::Transport("connection reset".to_string())]);

    let mut at = now();
    for attempt in 1..=MAX_RETRY {
        let stats = h.reconciler.run_pass_at(at).await.unwrap();
        assert_eq!(stats.unchanged, 0, "a failed poll is never counted as unchanged");
        let current = status_of(&h.db, sim.id).await;
        assert_eq!(current.num_retries, attempt);
        assert_eq!(h.simulator.fetch_calls(), attempt as usize);
        assert!(current.error_message.as_deref().unwrap().contains("connection reset"));

        if attempt < MAX_RETRY {
            assert_eq!(current.status, "ERRORED");
            assert_eq!(stats.errored, 1);
        } else {
            assert_eq!(current.status, "TERMINAL_ERROR");
            assert_eq!(stats.terminal, 1);
        }
        at = current.next_retry_at.expect("next retry scheduled");
    }

    // Sixth pass, well after any backoff: no call
    h.reconciler.run_pass_at(at + Duration::hours(1)).await.unwrap();
    assert_eq!(h.simulator.fetch_calls(), MAX_RETRY as usize);
}

#[tokio::test]
async fn test_backoff_blocks_early_polls() {
    let h = harness().await;
    let game = seed_game(&h.db, ContestKind::HeadToHead, Visibility::Public, [None, None]).await;
    let sim = seed_simulation(&h.db, game.id, SimulationStatus::Pending, Some("h-1"), now()).await;
    h.simulator.script(
        "h-1",
        [
            Reply::Transport("timeout".to_string()),
            Reply::Transport("timeout".to_string()),
            Reply::Game(RemoteGame::Started),
        ],
    );

    let t1 = now();
    h.reconciler.run_pass_at(t1).await.unwrap();
    assert_eq!(status_of(&h.db, sim.id).await.next_retry_at, Some(t1 + Duration::minutes(5)));

    h.reconciler.run_pass_at(t1 + Duration::minutes(5) - Duration::seconds(1)).await.unwrap();
    assert_eq!(h.simulator.fetch_calls(), 1, "no poll before the backoff elapses");

    let t2 = t1 + Duration::minutes(5);
    h.reconciler.run_pass_at(t2).await.unwrap();
    assert_eq!(h.simulator.fetch_calls(), 2);
    let after_second = status_of(&h.db, sim.id).await;
    assert_eq!(after_second.num_retries, 2);
    assert_eq!(after_second.next_retry_at, Some(t2 + Duration::minutes(10)));

    h.reconciler.run_pass_at(t2 + Duration::minutes(9)).await.unwrap();
    assert_eq!(h.simulator.fetch_calls(), 2);

    // Recovery keeps the retry count
    h.reconciler.run_pass_at(t2 + Duration::minutes(10)).await.unwrap();
    let recovered = status_of(&h.db, sim.id).await;
    assert_eq!(recovered.status, "STARTED");
    assert_eq!(recovered.num_retries, 2);
}

#[tokio::test]
async fn test_stuck_simulation_times_out() {
    let h = harness().await;
    let game = seed_game(&h.db, ContestKind::HeadToHead, Visibility::Public, [None, None]).await;
    let at = now();
    let stuck = seed_simulation(&h.db, game.id, SimulationStatus::Started, Some("h-old"), at - Duration::hours(8)).await;
    let young = seed_simulation(
        &h.db,
        seed_game(&h.db, ContestKind::HeadToHead, Visibility::Public, [None, None]).await.id,
        SimulationStatus::Started,
        Some("h-young"),
        at - Duration::hours(8) + Duration::minutes(1),
    )
    .await;
    h.simulator.script("h-old", [Reply::Game(RemoteGame::Started)]);
    h.simulator.script("h-young", [Reply::Game(RemoteGame::Started)]);

    let stats = h.reconciler.run_pass_at(at).await.unwrap();
    assert_eq!(stats.timed_out, 1);
    assert_eq!(status_of(&h.db, stuck.id).await.status, "TIMED_OUT");
    assert_eq!(status_of(&h.db, young.id).await.status, "STARTED");

    let calls = h.simulator.fetch_calls();
    h.reconciler.run_pass_at(at + Duration::minutes(1)).await.unwrap();
    // Only the young one is polled again
    assert_eq!(h.simulator.fetch_calls(), calls + 1);
}

#[tokio::test]
async fn test_protocol_violation_is_terminal_and_aborts_pass() {
    let h = harness().await;
    let mut events = h.events.subscribe();
    let at = now();
    let older_game = seed_game(&h.db, ContestKind::HeadToHead, Visibility::Public, [None, None]).await;
    let newer_game = seed_game(&h.db, ContestKind::HeadToHead, Visibility::Public, [None, None]).await;
    let older = seed_simulation(&h.db, older_game.id, SimulationStatus::Pending, Some("h-old"), at - Duration::hours(2)).await;
    let newer = seed_simulation(&h.db, newer_game.id, SimulationStatus::Pending, Some("h-new"), at - Duration::hours(1)).await;
    h.simulator.script("h-new", [Reply::Protocol("Unsupported simulator status: CANCELLED".to_string())]);
    h.simulator.script("h-old", [Reply::Game(RemoteGame::Started)]);

    let err = h.reconciler.run_pass_at(at).await.unwrap_err();
    assert!(matches!(err, ReconcileError::ProtocolViolation(_)));

    let violated = status_of(&h.db, newer.id).await;
    assert_eq!(violated.status, "TERMINAL_ERROR");
    assert_eq!(violated.num_retries, 0, "not counted as a retry");
    assert!(violated.error_message.unwrap().contains("CANCELLED"));

    // Newest first, so the older one was never reached
    assert_eq!(h.simulator.fetch_calls(), 1);
    assert_eq!(status_of(&h.db, older.id).await.status, "PENDING");

    let event = events.try_recv().expect("event emitted on the failure path");
    assert_eq!(event.simulation_id, newer.id);
    assert_eq!(event.status, SimulationStatus::TerminalError);
}

#[tokio::test]
async fn test_malformed_result_commits_nothing() {
    let h = harness().await;
    let game = seed_game(&h.db, ContestKind::HeadToHead, Visibility::Public, [None, None]).await;
    let sim = seed_simulation(&h.db, game.id, SimulationStatus::Started, Some("h-1"), now()).await;
    let l1 = parse_lineup(&sim.lineup_1).unwrap();
    let l2 = parse_lineup(&sim.lineup_2).unwrap();

    let Reply::Game(RemoteGame::Finished(mut payload)) = finished(&l1, &l2, 70, 71) else {
        unreachable!()
    };
    // Drop one player of lineup 2: only 11 box scores
    let dropped = payload.box_scores.iter().rposition(|b| b.canonical.is_some()).unwrap();
    payload.box_scores.remove(dropped);
    h.simulator.script("h-1", [Reply::Game(RemoteGame::Finished(payload))]);

    let err = h.reconciler.run_pass_at(now()).await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(status_of(&h.db, sim.id).await.status, "TERMINAL_ERROR");
    assert_eq!(Results::find().count(&h.db).await.unwrap(), 0);
    assert_eq!(BoxScores::find().count(&h.db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_side_effect_failures_do_not_undo_finish() {
    let h = harness().await;
    let game = seed_game(&h.db, ContestKind::HeadToHeadMatchMake, Visibility::Public, [None, None]).await;
    let sim = seed_simulation(&h.db, game.id, SimulationStatus::Started, Some("h-1"), now()).await;
    let l1 = parse_lineup(&sim.lineup_1).unwrap();
    let l2 = parse_lineup(&sim.lineup_2).unwrap();
    h.simulator.script("h-1", [finished(&l1, &l2, 80, 75)]);
    h.simulator.fail_player_stats(true);
    h.completions.fail.store(true, Ordering::SeqCst);

    let stats = h.reconciler.run_pass_at(now()).await.unwrap();
    assert_eq!(stats.finished, 1);
    assert_eq!(stats.errored, 0);

    let finished = status_of(&h.db, sim.id).await;
    assert_eq!(finished.status, "FINISHED");
    assert_eq!(finished.num_retries, 0);
    assert_eq!(h.simulator.stats_calls(), 1);
    // Match-make games notify even though they do not count toward records
    assert_eq!(h.completions.count(), 1);
    assert_eq!(PlayByPlays::find().count(&h.db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_resubmit_is_a_no_op() {
    let h = harness().await;
    let game = seed_game(&h.db, ContestKind::HeadToHead, Visibility::Hidden, [None, None]).await;
    let created = h.reconciler.create_simulation(game.id, &lineup(), &lineup()).await.unwrap();

    let first = h.reconciler.submit_simulation(created.id).await.unwrap();
    let second = h.reconciler.submit_simulation(created.id).await.unwrap();

    assert_eq!(first.handle, second.handle);
    assert_eq!(h.simulator.submissions().len(), 1);
    assert!(!h.simulator.submissions()[0].published, "hidden games are not published");
}

#[tokio::test]
async fn test_submit_respects_lock_held_elsewhere() {
    let h = harness().await;
    let game = seed_game(&h.db, ContestKind::HeadToHead, Visibility::Public, [None, None]).await;
    let created = h.reconciler.create_simulation(game.id, &lineup(), &lineup()).await.unwrap();

    let other = LockManager::with_holder(h.db.clone(), "other-worker".to_string(), Duration::seconds(600));
    assert!(other.try_acquire(&names::simulation_submit(created.id)).await.unwrap());

    let err = h.reconciler.submit_simulation(created.id).await.unwrap_err();
    assert!(matches!(err, ReconcileError::LockBusy(_)));
    assert!(h.simulator.submissions().is_empty());

    other.release(&names::simulation_submit(created.id)).await.unwrap();
    assert!(h.reconciler.submit_simulation(created.id).await.is_ok());
}

#[tokio::test]
async fn test_failed_submission_is_retried_later() {
    let h = harness().await;
    let game = seed_game(&h.db, ContestKind::HeadToHead, Visibility::Public, [None, None]).await;
    let created = h.reconciler.create_simulation(game.id, &lineup(), &lineup()).await.unwrap();

    h.simulator.fail_submissions(true);
    assert!(matches!(
        h.reconciler.submit_simulation(created.id).await,
        Err(ReconcileError::Simulator(_))
    ));
    assert_eq!(h.reconciler.submit_unsubmitted().await.unwrap(), 0);
    assert_eq!(status_of(&h.db, created.id).await.status, "NOT_CREATED");

    h.simulator.fail_submissions(false);
    assert_eq!(h.reconciler.submit_unsubmitted().await.unwrap(), 1);
    let submitted = status_of(&h.db, created.id).await;
    assert_eq!(submitted.status, "PENDING");
    assert!(submitted.handle.is_some());
}

#[tokio::test]
async fn test_create_simulation_validation() {
    let h = harness().await;
    let game = seed_game(&h.db, ContestKind::HeadToHead, Visibility::Public, [None, None]).await;

    let short = &lineup()[..4];
    assert!(matches!(
        h.reconciler.create_simulation(game.id, short, &lineup()).await,
        Err(ReconcileError::InvalidLineup(_))
    ));
    assert!(matches!(
        h.reconciler.create_simulation(game.id + 100, &lineup(), &lineup()).await,
        Err(ReconcileError::GameNotFound(_))
    ));
    assert_eq!(Simulations::find().count(&h.db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unsubmitted_and_terminal_are_not_polled() {
    let h = harness().await;
    let at = now();
    for (status, handle) in [
        (SimulationStatus::NotCreated, None),
        (SimulationStatus::TerminalError, Some("h-2")),
        (SimulationStatus::TimedOut, Some("h-3")),
    ] {
        let game = seed_game(&h.db, ContestKind::HeadToHead, Visibility::Public, [None, None]).await;
        seed_simulation(&h.db, game.id, status, handle, at).await;
    }

    let reconciler: &SimulationReconciler = &h.reconciler;
    assert!(reconciler.due_simulations(at).await.unwrap().is_empty());
    let stats = reconciler.run_pass_at(at).await.unwrap();
    assert_eq!(stats.polled, 0);
    assert_eq!(h.simulator.fetch_calls(), 0);
}
