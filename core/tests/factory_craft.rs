use floe_core::{
    state::{CraftKind, CraftStatus, TileSource, TileType},
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

fn set_stock(engine: &mut GameEngine, player: &str, money: u64, ice: u64) {
    let mut state = engine.state().clone();
    let p = state.players.get_mut(player).unwrap();
    p.money = money;
    p.ice = ice;
    engine.replace_state(state).unwrap();
}

/// p1 owns a factory at (2,2) with $7 and 8 ice left.
fn build_factory_owner() -> GameEngine {
    let mut engine = build_engine();
    act(&mut engine, json!({"type": "tile.buy", "playerId": "p1", "x": 2, "y": 2}));
    set_stock(&mut engine, "p1", 9, 10);
    let r = act(&mut engine, json!({"type": "tile.buildFactory", "playerId": "p1", "x": 2, "y": 2}));
    assert!(r.ok, "{}", r.message);
    engine
}

fn craft(engine: &mut GameEngine, player: &str, kind: &str) -> ActionResult {
    let tag = format!("structure.factory.{kind}");
    act(engine, json!({"type": tag, "playerId": player, "x": 2, "y": 2}))
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn building_a_factory_converts_the_tile() {
    let engine = build_factory_owner();
    let tile = engine.state().tile(2, 2).unwrap();
    assert_eq!(tile.tile_type, TileType::Factory);
    assert_eq!(tile.source, TileSource::PlayerBuilt);
    let p1 = engine.state().player("p1").unwrap();
    assert_eq!((p1.money, p1.ice), (7, 8));
}

#[test]
fn craft_completes_exactly_at_its_duration() {
    let mut engine = build_factory_owner();
    let r = craft(&mut engine, "p1", "craftRefrigerator");
    assert!(r.ok, "{}", r.message);
    let p1 = engine.state().player("p1").unwrap();
    assert_eq!((p1.money, p1.ice), (5, 6));
    assert_eq!(engine.state().factory_jobs[0].completes_at_ms, 15_000);

    engine.tick(14_999).unwrap();
    assert_eq!(engine.state().factory_jobs[0].status, CraftStatus::Active);
    assert_eq!(engine.state().player("p1").unwrap().refrigerators, 0);

    let events = engine.tick(1).unwrap();
    assert_eq!(engine.state().factory_jobs[0].status, CraftStatus::Complete);
    assert_eq!(engine.state().player("p1").unwrap().refrigerators, 1);
    assert!(events.iter().any(|e| matches!(
        e,
        SimEvent::FactoryCraftCompleted { kind: CraftKind::Refrigerator, at_ms: 15_000, .. }
    )));
}

#[test]
fn a_new_craft_collects_the_previous_output() {
    let mut engine = build_factory_owner();
    craft(&mut engine, "p1", "craftRefrigerator");
    engine.tick(15_000).unwrap();

    let r = craft(&mut engine, "p1", "craftBlueIce");
    assert!(r.ok, "{}", r.message);
    let first = &engine.state().factory_jobs[0];
    assert_eq!(first.status, CraftStatus::Collected);
    assert_eq!(first.collected_at_ms, Some(15_000));

    engine.tick(15_000).unwrap();
    let p1 = engine.state().player("p1").unwrap();
    assert_eq!(p1.blue_ice, 1);
    assert_eq!(p1.refrigerators, 1);
}

#[test]
fn busy_factory_rejects_a_second_craft() {
    let mut engine = build_factory_owner();
    assert!(craft(&mut engine, "p1", "craftBlueIce").ok);
    assert_eq!(craft(&mut engine, "p1", "craftRefrigerator").code, ActionCode::AlreadyActive);
    assert_eq!(engine.state().factory_jobs.len(), 1);
}

#[test]
fn craft_checks_tile_owner_and_stock() {
    let mut engine = build_factory_owner();
    act(&mut engine, json!({"type": "tile.buy", "playerId": "p1", "x": 3, "y": 3}));
    let r = act(&mut engine, json!({"type": "structure.factory.craftBlueIce", "playerId": "p1", "x": 3, "y": 3}));
    assert_eq!(r.code, ActionCode::InvalidTile);

    assert_eq!(craft(&mut engine, "p2", "craftBlueIce").code, ActionCode::NotOwner);

    set_stock(&mut engine, "p1", 10, 1);
    assert_eq!(craft(&mut engine, "p1", "craftBlueIce").code, ActionCode::InsufficientIce);
    set_stock(&mut engine, "p1", 1, 10);
    assert_eq!(craft(&mut engine, "p1", "craftBlueIce").code, ActionCode::InsufficientFunds);
    assert!(engine.state().factory_jobs.is_empty());
}

#[test]
fn build_rules() {
    let mut engine = build_engine();
    set_stock(&mut engine, "p1", 20, 10);

    let r = act(&mut engine, json!({"type": "tile.buildFactory", "playerId": "p1", "x": 3, "y": 3}));
    assert_eq!(r.code, ActionCode::NotOwner);

    act(&mut engine, json!({"type": "tile.buy", "playerId": "p1", "x": 1, "y": 1}));
    let r = act(&mut engine, json!({"type": "tile.buildFactory", "playerId": "p1", "x": 1, "y": 1}));
    assert_eq!(r.code, ActionCode::InvalidTile);

    act(&mut engine, json!({"type": "tile.buy", "playerId": "p1", "x": 3, "y": 3}));
    let r = act(&mut engine, json!({"type": "tile.buildManMadePond", "playerId": "p1", "x": 3, "y": 3}));
    assert!(r.ok, "{}", r.message);
    let tile = engine.state().tile(3, 3).unwrap();
    assert_eq!(tile.tile_type, TileType::Pond);
    assert_eq!(tile.source, TileSource::PlayerBuilt);
    let p1 = engine.state().player("p1").unwrap();
    // 20 - 2 tiles - 2 build, 10 - 1 ice.
    assert_eq!((p1.money, p1.ice), (16, 9));

    act(&mut engine, json!({"type": "tile.buy", "playerId": "p1", "x": 4, "y": 3}));
    set_stock(&mut engine, "p1", 20, 1);
    let r = act(&mut engine, json!({"type": "tile.buildFactory", "playerId": "p1", "x": 4, "y": 3}));
    assert_eq!(r.code, ActionCode::InsufficientIce);
    assert_eq!(engine.state().tile(4, 3).unwrap().tile_type, TileType::Grass);
}

#[test]
fn output_goes_to_the_job_owner_after_a_buyout() {
    let mut engine = build_factory_owner();
    craft(&mut engine, "p1", "craftRefrigerator");
    let r = act(&mut engine, json!({"type": "tile.buyFromPlayer", "playerId": "p2", "x": 2, "y": 2}));
    assert!(r.ok, "{}", r.message);

    engine.tick(15_000).unwrap();
    assert_eq!(engine.state().player("p1").unwrap().refrigerators, 1);
    assert_eq!(engine.state().player("p2").unwrap().refrigerators, 0);
}
