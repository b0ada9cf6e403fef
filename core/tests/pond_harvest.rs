use floe_core::{
    state::{PondJobStatus, Season},
    ActionCode, ActionResult, ActionSource, GameConfig, GameEngine, PlayerSpec, SimEvent,
};
use serde_json::json;

mod common;
use common::build_map;

// ── Test helpers ────────────────────────────────────────────────────────────

fn build_engine() -> GameEngine {
    let players = [PlayerSpec::human("p1", "One"), PlayerSpec::human("p2", "Two")];
    GameEngine::with_map(7, GameConfig::default_test(), &players, build_map()).unwrap()
}

fn act(engine: &mut GameEngine, action: serde_json::Value) -> ActionResult {
    engine.apply_action(&action, ActionSource::Player)
}

/// p1 owns the pond and it is winter. p1 has $11, p2 has $12.
fn build_winter_pond() -> GameEngine {
    let mut engine = build_engine();
    let r = act(&mut engine, json!({"type": "tile.buy", "playerId": "p1", "x": 1, "y": 1}));
    assert!(r.ok, "{}", r.message);
    engine.force_season(Season::Winter).unwrap();
    engine
}

fn start(engine: &mut GameEngine, player: &str) -> ActionResult {
    act(engine, json!({"type": "pond.harvest.start", "playerId": player, "x": 1, "y": 1}))
}

fn claim(engine: &mut GameEngine, player: &str, job: &str) -> ActionResult {
    act(engine, json!({"type": "pond.harvest.claim", "playerId": player, "pondJobId": job}))
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn harvest_goes_active_claimable_claimed() {
    let mut engine = build_winter_pond();

    let r = start(&mut engine, "p1");
    assert!(r.ok, "{}", r.message);
    assert_eq!(r.payload.as_ref().unwrap()["pondJobId"], "pond-1");
    assert_eq!(engine.state().player("p1").unwrap().money, 10);
    assert_eq!(engine.state().ponds[0].status, PondJobStatus::Active);
    assert_eq!(engine.state().ponds[0].claim_at_ms, 10_000);

    assert_eq!(claim(&mut engine, "p1", "pond-1").code, ActionCode::NotClaimable);

    engine.tick(9_999).unwrap();
    assert_eq!(engine.state().ponds[0].status, PondJobStatus::Active);

    let events = engine.tick(1).unwrap();
    assert_eq!(engine.state().ponds[0].status, PondJobStatus::Claimable);
    assert!(events
        .iter()
        .any(|e| matches!(e, SimEvent::PondHarvestClaimable { job_id, .. } if job_id == "pond-1")));

    let r = claim(&mut engine, "p1", "pond-1");
    assert!(r.ok, "{}", r.message);
    let job = &engine.state().ponds[0];
    assert_eq!(job.status, PondJobStatus::Claimed);
    assert_eq!(job.claimed_at_ms, Some(10_000));
    assert_eq!(engine.state().player("p1").unwrap().ice, 1);

    assert_eq!(claim(&mut engine, "p1", "pond-1").code, ActionCode::NotClaimable);

    // A claimed job is terminal; the next harvest is a fresh job.
    let r = start(&mut engine, "p1");
    assert!(r.ok, "{}", r.message);
    assert_eq!(r.payload.as_ref().unwrap()["pondJobId"], "pond-2");
    assert_eq!(engine.state().ponds.len(), 2);
}

#[test]
fn claim_at_the_completion_instant_promotes_inline() {
    let mut engine = build_winter_pond();
    start(&mut engine, "p1");

    // Move the clock without running the pipeline.
    let mut state = engine.state().clone();
    state.now_ms = 10_000;
    engine.replace_state(state).unwrap();
    assert_eq!(engine.state().ponds[0].status, PondJobStatus::Active);

    let r = claim(&mut engine, "p1", "pond-1");
    assert!(r.ok, "{}", r.message);
    assert_eq!(engine.state().player("p1").unwrap().ice, 1);
}

#[test]
fn start_is_gated_by_tile_owner_season_and_funds() {
    let mut engine = build_engine();
    act(&mut engine, json!({"type": "tile.buy", "playerId": "p1", "x": 1, "y": 1}));
    act(&mut engine, json!({"type": "tile.buy", "playerId": "p1", "x": 2, "y": 2}));
    assert_eq!(start(&mut engine, "p1").code, ActionCode::WrongSeason);

    engine.force_season(Season::Winter).unwrap();
    let r = act(&mut engine, json!({"type": "pond.harvest.start", "playerId": "p1", "x": 2, "y": 2}));
    assert_eq!(r.code, ActionCode::InvalidTile);
    assert_eq!(start(&mut engine, "p2").code, ActionCode::NotOwner);

    assert!(start(&mut engine, "p1").ok);
    assert_eq!(start(&mut engine, "p1").code, ActionCode::AlreadyActive);
    assert_eq!(engine.state().ponds.len(), 1);
}

#[test]
fn start_without_money_fails() {
    let mut engine = build_winter_pond();
    let mut state = engine.state().clone();
    state.players.get_mut("p1").unwrap().money = 0;
    engine.replace_state(state).unwrap();

    assert_eq!(start(&mut engine, "p1").code, ActionCode::InsufficientFunds);
    assert!(engine.state().ponds.is_empty());
}

#[test]
fn claim_requires_a_known_job_and_its_owner() {
    let mut engine = build_winter_pond();
    assert_eq!(claim(&mut engine, "p1", "pond-99").code, ActionCode::InvalidAction);

    start(&mut engine, "p1");
    engine.tick(10_000).unwrap();
    assert_eq!(claim(&mut engine, "p2", "pond-1").code, ActionCode::NotOwner);
    assert_eq!(engine.state().ponds[0].status, PondJobStatus::Claimable);
}

#[test]
fn open_job_keeps_its_owner_after_a_buyout() {
    let mut engine = build_winter_pond();
    start(&mut engine, "p1");

    let r = act(&mut engine, json!({"type": "tile.buyFromPlayer", "playerId": "p2", "x": 1, "y": 1}));
    assert!(r.ok, "{}", r.message);
    assert_eq!(start(&mut engine, "p2").code, ActionCode::AlreadyActive);

    engine.tick(10_000).unwrap();
    assert_eq!(claim(&mut engine, "p2", "pond-1").code, ActionCode::NotOwner);
    assert!(claim(&mut engine, "p1", "pond-1").ok);
    assert_eq!(engine.state().player("p1").unwrap().ice, 1);

    // The new owner harvests from now on.
    assert!(start(&mut engine, "p2").ok);
}
