use floe_core::{
    ActionCode, ActionResult, ActionSource, GameConfig, GameEngine, PlayerSpec,
};
use serde_json::json;

mod common;
use common::build_map;

// ── Test helpers ────────────────────────────────────────────────────────────

fn build_engine(players: &[PlayerSpec]) -> GameEngine {
    GameEngine::with_map(7, GameConfig::default_test(), players, build_map()).unwrap()
}

fn two_players() -> GameEngine {
    build_engine(&[PlayerSpec::human("p1", "One"), PlayerSpec::human("p2", "Two")])
}

fn act(engine: &mut GameEngine, action: serde_json::Value) -> ActionResult {
    engine.apply_action(&action, ActionSource::Player)
}

fn money(engine: &GameEngine, id: &str) -> u64 {
    engine.state().player(id).unwrap().money
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn buy_and_buyout_round_trip() {
    let mut engine = two_players();

    let r = act(&mut engine, json!({"type": "tile.buy", "playerId": "p1", "x": 2, "y": 2}));
    assert!(r.ok, "{}", r.message);
    assert_eq!(money(&engine, "p1"), 9);
    let tile = engine.state().tile(2, 2).unwrap();
    assert_eq!(tile.owner_id.as_deref(), Some("p1"));
    assert_eq!(tile.current_price, 1);

    // Buyout: price = 1 + fee 1. Seller gets the old price, the fee is destroyed.
    let r = act(&mut engine, json!({"type": "tile.buyFromPlayer", "playerId": "p2", "x": 2, "y": 2}));
    assert!(r.ok, "{}", r.message);
    assert_eq!(money(&engine, "p2"), 8);
    assert_eq!(money(&engine, "p1"), 10);
    assert_eq!(engine.state().tile(2, 2).unwrap().current_price, 2);
    assert_eq!(engine.state().tile(2, 2).unwrap().owner_id.as_deref(), Some("p2"));

    let r = act(&mut engine, json!({"type": "tile.buyFromPlayer", "playerId": "p1", "x": 2, "y": 2}));
    assert!(r.ok, "{}", r.message);
    assert_eq!(money(&engine, "p1"), 7);
    assert_eq!(money(&engine, "p2"), 10);
    assert_eq!(engine.state().tile(2, 2).unwrap().current_price, 3);
}

#[test]
fn buyout_price_strictly_increases() {
    let mut engine = two_players();
    act(&mut engine, json!({"type": "tile.buy", "playerId": "p1", "x": 3, "y": 3}));
    let mut last = engine.state().tile(3, 3).unwrap().current_price;
    for buyer in ["p2", "p1", "p2", "p1"] {
        let r = act(&mut engine, json!({"type": "tile.buyFromPlayer", "playerId": buyer, "x": 3, "y": 3}));
        assert!(r.ok, "{}", r.message);
        let price = engine.state().tile(3, 3).unwrap().current_price;
        assert!(price > last, "price went from {last} to {price}");
        last = price;
    }
}

#[test]
fn void_and_out_of_bounds_tiles_are_rejected_without_mutation() {
    let mut engine = two_players();
    let before = engine.state().clone();

    for (x, y) in [(0, 0), (7, 3), (-1, 2), (100, 100)] {
        let r = act(&mut engine, json!({"type": "tile.buy", "playerId": "p1", "x": x, "y": y}));
        assert_eq!(r.code, ActionCode::InvalidTile, "({x}, {y})");
    }
    assert_eq!(engine.state().players, before.players);
    assert_eq!(engine.state().tiles, before.tiles);
}

#[test]
fn ownership_rules_for_plain_buy() {
    let mut engine = two_players();
    act(&mut engine, json!({"type": "tile.buy", "playerId": "p1", "x": 2, "y": 2}));

    let r = act(&mut engine, json!({"type": "tile.buy", "playerId": "p1", "x": 2, "y": 2}));
    assert_eq!(r.code, ActionCode::AlreadyOwner);

    // Owned by someone else: a buyout is a different action.
    let r = act(&mut engine, json!({"type": "tile.buy", "playerId": "p2", "x": 2, "y": 2}));
    assert_eq!(r.code, ActionCode::InvalidTile);

    let r = act(&mut engine, json!({"type": "tile.buyFromPlayer", "playerId": "p2", "x": 3, "y": 3}));
    assert_eq!(r.code, ActionCode::InvalidTile);
}

#[test]
fn insufficient_funds_leaves_state_untouched() {
    let mut engine = two_players();
    let mut state = engine.state().clone();
    state.players.get_mut("p1").unwrap().money = 0;
    engine.replace_state(state).unwrap();

    let r = act(&mut engine, json!({"type": "tile.buy", "playerId": "p1", "x": 2, "y": 2}));
    assert_eq!(r.code, ActionCode::InsufficientFunds);
    assert!(engine.state().tile(2, 2).unwrap().owner_id.is_none());
    assert_eq!(money(&engine, "p1"), 0);
}

#[test]
fn teammates_share_land() {
    let mut engine = build_engine(&[
        PlayerSpec::human("p1", "One").on_team("north"),
        PlayerSpec::human("p2", "Two").on_team("north"),
        PlayerSpec::human("p3", "Three"),
    ]);
    act(&mut engine, json!({"type": "tile.buy", "playerId": "p1", "x": 2, "y": 2}));

    let r = act(&mut engine, json!({"type": "tile.buyFromPlayer", "playerId": "p2", "x": 2, "y": 2}));
    assert_eq!(r.code, ActionCode::AlreadyOwner);
    let r = act(&mut engine, json!({"type": "tile.buy", "playerId": "p2", "x": 2, "y": 2}));
    assert_eq!(r.code, ActionCode::AlreadyOwner);

    // A teammate may build on shared land.
    let mut state = engine.state().clone();
    state.players.get_mut("p2").unwrap().ice = 2;
    engine.replace_state(state).unwrap();
    let r = act(&mut engine, json!({"type": "tile.buildFactory", "playerId": "p2", "x": 2, "y": 2}));
    assert!(r.ok, "{}", r.message);
}

#[test]
fn net_worth_counts_cash_stock_and_land() {
    let mut engine = two_players();
    act(&mut engine, json!({"type": "tile.buy", "playerId": "p1", "x": 2, "y": 2}));
    let mut state = engine.state().clone();
    {
        let p2 = state.players.get_mut("p2").unwrap();
        p2.ice = 3;
        p2.blue_ice = 1;
        p2.refrigerators = 1;
    }
    engine.replace_state(state).unwrap();

    let worth = engine.net_worth();
    // 9 cash + price 1 + premium 1.
    assert_eq!(worth["p1"], 11);
    // 10 cash + 3 ice x2 + 1 blue x8 + 1 fridge x6.
    assert_eq!(worth["p2"], 30);
}

#[test]
fn every_flip_pays_income() {
    let mut engine = two_players();
    engine.tick(60_000).unwrap();
    assert_eq!(money(&engine, "p1"), 12);
    assert_eq!(money(&engine, "p2"), 12);
    engine.tick(60_000).unwrap();
    assert_eq!(money(&engine, "p1"), 14);
}
