//! THE MOST IMPORTANT TEST IN THE PROJECT.
//!
//! Two engines, same seed, same operations.
//! They must produce byte-identical state and event logs.
//! Any divergence is a blocker. Do not merge until fixed.

use floe_core::{
    config::BotMode, state::PondJobStatus, store::SimStore, GameAction, GameConfig, GameEngine,
    PlayerSpec,
};
use std::collections::BTreeSet;

const RUN_MS: u64 = 300_000;

fn bot_config() -> GameConfig {
    let mut config = GameConfig::default();
    config.bots.mode = BotMode::Internal;
    config
}

fn players() -> Vec<PlayerSpec> {
    vec![
        PlayerSpec::bot("bot-a", "North"),
        PlayerSpec::bot("bot-b", "South"),
        PlayerSpec::bot("bot-c", "East").on_team("east"),
    ]
}

fn build_engine(seed: u64) -> GameEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = SimStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    let run_id = format!("det-test-{seed}");
    store
        .insert_run(&run_id, seed, "0.1.0-test", "1970-01-01T00:00:00Z")
        .expect("insert run");
    let mut engine = GameEngine::new(seed, bot_config(), &players()).expect("engine");
    engine.attach_store(store, run_id).expect("attach store");
    engine
}

fn run_in_steps(engine: &mut GameEngine, total: u64, step: u64) {
    let mut elapsed = 0;
    while elapsed < total {
        let delta = step.min(total - elapsed);
        engine.tick(delta).expect("tick");
        elapsed += delta;
    }
}

fn collect_event_log(engine: &GameEngine) -> Vec<String> {
    let store = engine.store().expect("store attached");
    let run_id = engine.run_id().expect("run id");
    store
        .events_for_run(run_id)
        .expect("read events")
        .into_iter()
        .map(|e| format!("{}|{}|{}", e.at_ms, e.subsystem, e.payload))
        .collect()
}

fn state_json(engine: &GameEngine) -> String {
    serde_json::to_string(engine.state()).expect("serialize state")
}

#[test]
fn same_seed_produces_identical_event_logs() {
    const SEED: u64 = 0xDEAD_BEEF_CAFE_1234;

    let mut engine_a = build_engine(SEED);
    let mut engine_b = build_engine(SEED);

    run_in_steps(&mut engine_a, RUN_MS, 250);
    run_in_steps(&mut engine_b, RUN_MS, 250);

    let log_a = collect_event_log(&engine_a);
    let log_b = collect_event_log(&engine_b);

    assert_eq!(
        log_a.len(), log_b.len(),
        "Event log lengths differ: {} vs {}",
        log_a.len(), log_b.len()
    );
    for (i, (a, b)) in log_a.iter().zip(log_b.iter()).enumerate() {
        assert_eq!(a, b, "Event log diverged at entry {i}:\n  A: {a}\n  B: {b}");
    }
    assert_eq!(state_json(&engine_a), state_json(&engine_b));
}

#[test]
fn bots_actually_play() {
    let mut engine = build_engine(7);
    run_in_steps(&mut engine, RUN_MS, 250);
    let store = engine.store().unwrap();
    let run_id = engine.run_id().unwrap();
    assert!(store.event_count(run_id, "bot_action_executed").unwrap() > 0);
    assert!(engine.state().tiles.iter().any(|t| t.owner_id.is_some()));
}

#[test]
fn bot_candidates_stay_well_formed_throughout_a_match() {
    let mut engine = build_engine(11);
    let bot_ids: Vec<String> = engine.state().bots.keys().cloned().collect();
    let mut elapsed = 0;
    while elapsed < RUN_MS {
        engine.tick(250).expect("tick");
        elapsed += 250;
        let state = engine.state();
        for bot_id in &bot_ids {
            let candidates = engine.candidate_bot_actions(bot_id);
            let keys: BTreeSet<String> = candidates.iter().map(GameAction::dedup_key).collect();
            assert_eq!(keys.len(), candidates.len(), "duplicate candidate for {bot_id} at {elapsed}");
            assert!(candidates.iter().all(|a| a.player_id() == bot_id.as_str()));

            for job in state.ponds.iter().filter(|j| j.owner_id == *bot_id) {
                let ready = job.status == PondJobStatus::Claimable
                    || (job.status == PondJobStatus::Active && state.now_ms >= job.claim_at_ms);
                if ready {
                    assert!(
                        candidates.iter().any(|a| matches!(
                            a,
                            GameAction::PondHarvestClaim { pond_job_id, .. } if *pond_job_id == job.id
                        )),
                        "{bot_id} is missing the claim for {} at {elapsed}",
                        job.id
                    );
                }
            }
        }
    }
}

#[test]
fn step_size_does_not_change_the_outcome() {
    const SEED: u64 = 2024;

    let mut fine = build_engine(SEED);
    let mut coarse = build_engine(SEED);

    run_in_steps(&mut fine, RUN_MS, 100);
    run_in_steps(&mut coarse, RUN_MS, 7_919);

    assert_eq!(fine.now_ms(), coarse.now_ms());
    assert_eq!(state_json(&fine), state_json(&coarse));
}

#[test]
fn different_seeds_produce_different_maps() {
    let engine_a = build_engine(42);
    let engine_b = build_engine(99);

    let any_different = engine_a
        .state()
        .tiles
        .iter()
        .zip(engine_b.state().tiles.iter())
        .any(|(a, b)| a.tile_type != b.tile_type);
    assert!(any_different, "Different seeds produced identical maps; seed is not being used");
}
