use floe_core::{
    state::MatchEndReason,
    ActionCode, ActionResult, ActionSource, GameConfig, GameEngine, PlayerSpec, SimEvent,
};
use serde_json::json;

mod common;
use common::build_map;

// ── Test helpers ────────────────────────────────────────────────────────────

fn build_config(overtime: bool) -> GameConfig {
    let mut config = GameConfig::default_test();
    config.match_rules.duration_ms = 100_000;
    config.match_rules.overtime_enabled = overtime;
    config.match_rules.overtime_duration_ms = 60_000;
    config
}

fn build_engine(config: GameConfig, players: &[PlayerSpec]) -> GameEngine {
    GameEngine::with_map(7, config, players, build_map()).unwrap()
}

fn duel(overtime: bool) -> GameEngine {
    build_engine(
        build_config(overtime),
        &[PlayerSpec::human("p1", "One"), PlayerSpec::human("p2", "Two")],
    )
}

fn set_money(engine: &mut GameEngine, player: &str, money: u64) {
    let mut state = engine.state().clone();
    state.players.get_mut(player).unwrap().money = money;
    engine.replace_state(state).unwrap();
}

fn act(engine: &mut GameEngine, action: serde_json::Value) -> ActionResult {
    engine.apply_action(&action, ActionSource::Player)
}

// ── Time limit ──────────────────────────────────────────────────────────────

#[test]
fn richest_player_wins_at_the_time_limit() {
    let mut engine = duel(true);
    set_money(&mut engine, "p1", 20);

    engine.tick(99_999).unwrap();
    assert!(!engine.state().match_state.ended);

    let events = engine.tick(1).unwrap();
    let m = &engine.state().match_state;
    assert!(m.ended);
    assert_eq!(m.winner_id.as_deref(), Some("p1"));
    assert_eq!(m.end_reason, Some(MatchEndReason::TimeLimit));
    assert!(events.iter().any(|e| matches!(e, SimEvent::MatchEnded { .. })));
}

#[test]
fn gameplay_stops_after_the_end_but_the_camera_does_not() {
    let mut engine = duel(true);
    set_money(&mut engine, "p1", 20);
    engine.tick(100_000).unwrap();

    let r = act(&mut engine, json!({"type": "tile.buy", "playerId": "p2", "x": 2, "y": 2}));
    assert_eq!(r.code, ActionCode::MatchEnded);
    let r = act(&mut engine, json!({"type": "camera.move", "playerId": "p2", "x": 3, "y": 3}));
    assert!(r.ok, "{}", r.message);

    // The world is frozen: no more flips or income.
    let flips = engine.state().season.season_flip_count;
    engine.tick(200_000).unwrap();
    assert_eq!(engine.state().season.season_flip_count, flips);
    assert_eq!(engine.state().player("p2").unwrap().money, 12);
}

#[test]
fn a_tie_goes_to_overtime_then_a_draw() {
    let mut engine = duel(true);

    let events = engine.tick(100_000).unwrap();
    let m = &engine.state().match_state;
    assert!(!m.ended);
    assert!(m.overtime);
    assert_eq!(m.duration_ms, 160_000);
    assert!(events
        .iter()
        .any(|e| matches!(e, SimEvent::OvertimeStarted { new_duration_ms: 160_000, .. })));

    engine.tick(60_000).unwrap();
    let m = &engine.state().match_state;
    assert!(m.ended);
    assert_eq!(m.winner_id, None);
    assert_eq!(m.end_reason, Some(MatchEndReason::Draw));
}

#[test]
fn overtime_can_break_the_tie() {
    let mut engine = duel(true);
    engine.tick(100_000).unwrap();
    assert!(engine.state().match_state.overtime);

    // Spending a dollar in overtime hands the lead to p2.
    assert!(act(&mut engine, json!({"type": "tile.buy", "playerId": "p1", "x": 2, "y": 2})).ok);
    engine.tick(60_000).unwrap();
    assert_eq!(engine.state().match_state.winner_id.as_deref(), Some("p2"));
    assert_eq!(engine.state().match_state.end_reason, Some(MatchEndReason::TimeLimit));
}

#[test]
fn a_tie_without_overtime_is_a_draw() {
    let mut engine = duel(false);
    engine.tick(100_000).unwrap();
    let m = &engine.state().match_state;
    assert!(m.ended);
    assert!(!m.overtime);
    assert_eq!(m.end_reason, Some(MatchEndReason::Draw));
}

#[test]
fn teams_are_ranked_by_pooled_cash() {
    let mut engine = build_engine(
        build_config(true),
        &[
            PlayerSpec::human("p1", "One").on_team("a"),
            PlayerSpec::human("p2", "Two"),
            PlayerSpec::human("p3", "Three").on_team("a"),
        ],
    );
    set_money(&mut engine, "p2", 15);
    engine.tick(100_000).unwrap();
    // Team a: 12 + 12 beats p2's 17; the first member is named winner.
    assert_eq!(engine.state().match_state.winner_id.as_deref(), Some("p1"));
}

// ── Forfeit ─────────────────────────────────────────────────────────────────

#[test]
fn forfeit_ends_the_match_once() {
    let mut engine = duel(true);
    let r = act(&mut engine, json!({"type": "player.forfeit", "playerId": "p1"}));
    assert!(r.ok, "{}", r.message);
    assert_eq!(r.payload.as_ref().unwrap()["winnerId"], "p2");

    let m = engine.state().match_state.clone();
    assert!(m.ended);
    assert_eq!(m.end_reason, Some(MatchEndReason::Forfeit));

    let players = engine.state().players.clone();
    let r = act(&mut engine, json!({"type": "player.forfeit", "playerId": "p2"}));
    assert_eq!(r.code, ActionCode::MatchEnded);
    assert_eq!(engine.state().match_state, m);
    assert_eq!(engine.state().players, players);
}

#[test]
fn forfeit_hands_the_win_to_the_richest_other_team() {
    let mut engine = build_engine(
        build_config(true),
        &[
            PlayerSpec::human("p1", "One"),
            PlayerSpec::human("p2", "Two"),
            PlayerSpec::human("p3", "Three"),
        ],
    );
    set_money(&mut engine, "p3", 30);
    assert!(act(&mut engine, json!({"type": "player.forfeit", "playerId": "p1"})).ok);
    assert_eq!(engine.state().match_state.winner_id.as_deref(), Some("p3"));
}
