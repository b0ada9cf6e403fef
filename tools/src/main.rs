//! sim-runner: headless match runner for Floe Market.
//!
//! Usage:
//!   sim-runner --seed 12345 --duration-ms 600000 --step-ms 250 --db run.db
//!   sim-runner --seed 12345 --config match.json --ipc-mode

use anyhow::{Context, Result};
use floe_core::{
    config::BotMode,
    event::ActionLogKind,
    state::{Controller, Season},
    store::SimStore,
    types::{Amount, PlayerId, TimeMs},
    ActionResult, ActionSource, GameConfig, GameEngine, PlayerSpec,
};
use std::collections::BTreeMap;
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Tick {
        delta_ms: TimeMs,
    },
    Action {
        action: serde_json::Value,
        #[serde(default = "default_source")]
        source: ActionSource,
    },
    Quit,
}

fn default_source() -> ActionSource {
    ActionSource::Player
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayerView {
    id: PlayerId,
    name: String,
    controller: Controller,
    money: Amount,
    ice: Amount,
    blue_ice: Amount,
    refrigerators: Amount,
    tiles_owned: usize,
    net_worth: Amount,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct UiState {
    now_ms: TimeMs,
    season: Season,
    season_flip_count: u64,
    transition_progress: f64,
    paused: bool,
    ended: bool,
    winner_id: Option<PlayerId>,
    players: Vec<PlayerView>,
    last_action_seq: Option<u64>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionReply {
    result: ActionResult,
    state: UiState,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let step_ms = parse_arg(&args, "--step-ms", 250u64).max(1);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");

    let mut config = match flag_value(&args, "--config") {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    if !ipc_mode {
        // Headless matches are bot-vs-bot; nobody outside proposes actions.
        config.bots.mode = BotMode::Internal;
    }
    let duration_ms = parse_arg(&args, "--duration-ms", default_run_length(&config));

    if !ipc_mode {
        println!("Floe Market: sim-runner");
        println!("  seed:      {seed}");
        println!("  duration:  {duration_ms} ms");
        println!("  step:      {step_ms} ms");
        println!("  db:        {db}");
        println!();
    }

    let store = if db == ":memory:" {
        SimStore::in_memory()?
    } else {
        SimStore::open(db).with_context(|| format!("opening run database {db}"))?
    };
    store.migrate()?;

    let run_id = uuid::Uuid::new_v4().to_string();
    let started_at = chrono::Utc::now().to_rfc3339();
    store.insert_run(&run_id, seed, env!("CARGO_PKG_VERSION"), &started_at)?;

    let players = if ipc_mode {
        vec![PlayerSpec::human("p1", "Player"), PlayerSpec::bot("bot-1", "Floe Bot")]
    } else {
        vec![PlayerSpec::bot("bot-a", "North Bot"), PlayerSpec::bot("bot-b", "South Bot")]
    };
    let mut engine = GameEngine::new(seed, config, &players).context("building the match")?;
    engine.attach_store(store, run_id.clone())?;
    log::info!("t=0 runner: run {run_id} started (seed {seed})");

    if ipc_mode {
        run_ipc_loop(&mut engine)?;
    } else {
        run_headless(&mut engine, duration_ms, step_ms)?;
        print_summary(&engine, &run_id)?;
    }

    let winner = engine.state().match_state.winner_id.clone();
    if let Some(store) = engine.store() {
        store.finish_run(&run_id, engine.now_ms(), winner.as_deref())?;
    }
    Ok(())
}

/// Long enough to cover the match and a possible overtime.
fn default_run_length(config: &GameConfig) -> TimeMs {
    config.match_rules.duration_ms + config.match_rules.overtime_duration_ms
}

fn run_headless(engine: &mut GameEngine, duration_ms: TimeMs, step_ms: TimeMs) -> Result<()> {
    let mut elapsed = 0;
    while elapsed < duration_ms && !engine.state().match_state.ended {
        let step = step_ms.min(duration_ms - elapsed);
        engine.tick(step)?;
        elapsed += step;
    }
    Ok(())
}

fn run_ipc_loop(engine: &mut GameEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Tick { delta_ms } => {
                engine.tick(delta_ms)?;
                writeln!(stdout, "{}", serde_json::to_string(&build_ui_state(engine))?)?;
            }
            IpcCommand::GetState => {
                writeln!(stdout, "{}", serde_json::to_string(&build_ui_state(engine))?)?;
            }
            IpcCommand::Action { action, source } => {
                let result = engine.apply_action(&action, source);
                let reply = ActionReply { result, state: build_ui_state(engine) };
                writeln!(stdout, "{}", serde_json::to_string(&reply)?)?;
            }
        }
        stdout.flush()?;
    }
    Ok(())
}

fn build_ui_state(engine: &GameEngine) -> UiState {
    let state = engine.state();
    let worth = engine.net_worth();
    let players = state
        .player_order
        .iter()
        .filter_map(|id| state.player(id))
        .map(|p| PlayerView {
            id: p.id.clone(),
            name: p.name.clone(),
            controller: p.controller,
            money: p.money,
            ice: p.ice,
            blue_ice: p.blue_ice,
            refrigerators: p.refrigerators,
            tiles_owned: state
                .tiles
                .iter()
                .filter(|t| t.owner_id.as_deref() == Some(p.id.as_str()))
                .count(),
            net_worth: worth.get(&p.id).copied().unwrap_or(0),
        })
        .collect();

    UiState {
        now_ms: state.now_ms,
        season: state.season.logic_season,
        season_flip_count: state.season.season_flip_count,
        transition_progress: state.season.transition_progress,
        paused: state.match_state.paused,
        ended: state.match_state.ended,
        winner_id: state.match_state.winner_id.clone(),
        players,
        last_action_seq: state.action_log.last().map(|e| e.seq),
    }
}

fn print_summary(engine: &GameEngine, run_id: &str) -> Result<()> {
    let state = engine.state();
    let worth: BTreeMap<PlayerId, Amount> = engine.net_worth();

    println!("=== RUN SUMMARY ===");
    println!("  run_id:        {run_id}");
    println!("  final time:    {} ms", state.now_ms);
    println!("  season flips:  {}", state.season.season_flip_count);
    println!("  pond harvests: {}", state.ponds.len());
    println!("  factory jobs:  {}", state.factory_jobs.len());
    if let Some(store) = engine.store() {
        let actions = store.action_log_for_run(run_id)?;
        let accepted = actions.iter().filter(|a| a.kind == ActionLogKind::Accepted).count();
        println!("  actions:       {} ({accepted} accepted)", actions.len());
    }

    println!();
    println!("=== STANDINGS ===");
    for id in &state.player_order {
        let Some(p) = state.player(id) else { continue };
        println!(
            "  {:<10} | ${:>4} | ice {:>3} | blue {:>3} | fridges {:>2} | worth ${}",
            p.id,
            p.money,
            p.ice,
            p.blue_ice,
            p.refrigerators,
            worth.get(id).copied().unwrap_or(0)
        );
    }
    println!();
    match (&state.match_state.end_reason, &state.match_state.winner_id) {
        (Some(reason), Some(winner)) => println!("  result: {winner} wins ({reason:?})"),
        (Some(reason), None) => println!("  result: no winner ({reason:?})"),
        (None, _) => println!("  result: match still running"),
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    flag_value(args, flag)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
