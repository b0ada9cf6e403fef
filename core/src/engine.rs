//! The simulation engine: the heart of Floe Market.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Season subsystem     (clock, flips, transition)
//!   2. Economy subsystem    (flip income, melt)
//!   3. Structure subsystem  (train year)
//!   4. Pond subsystem       (harvest promotion)
//!   5. Factory subsystem    (craft completion)
//!   6. Win subsystem        (match clock)
//!   then, in internal bot mode, the bot decision loop.
//!
//! RULES:
//!   - Subsystems execute in registration order at every time boundary.
//!   - Each subsystem sees the events emitted earlier in the same pass.
//!   - No subsystem calls another subsystem's functions directly.
//!   - Actions enter only through `apply_action` / `apply`.
//!   - A large delta is split at every deadline so effects stay in
//!     chronological order.

use crate::{
    action::{ActionSource, GameAction},
    bot_subsystem::{enumerate_candidate_bot_actions, next_bot_deadline, tick_bots},
    config::{BotMode, GameConfig},
    economy_subsystem::{buy_owned_tile, buy_unowned_tile, compute_net_worth, EconomySubsystem},
    error::{SimError, SimResult},
    event::{ActionLogEntry, ActionLogKind, EventLogEntry, SimEvent},
    factory_subsystem::{start_factory_craft, FactorySubsystem},
    init::{create_initial_state, validate_state, PlayerSpec},
    map::{GeneratedMap, MapGenerator, StandardMapGenerator},
    pond_subsystem::{claim_pond_harvest, start_pond_harvest, PondSubsystem},
    result::{invalid_tile, unknown_player, ActionCode, ActionResult},
    season_subsystem::{cast_skip_summer_vote, force_season_flip, SeasonSubsystem},
    snapshot::GameSnapshot,
    state::{CameraPosition, Controller, CraftKind, GameState, Season},
    store::SimStore,
    structure_subsystem::{
        build_structure, sell_annual_shipment, sell_at_house, BuildKind, IceGrade, StructureSubsystem,
    },
    subsystem::TickSubsystem,
    types::{Amount, PlayerId, RunId, TimeMs},
    win_subsystem::{forfeit_match, WinSubsystem},
};
use serde_json::json;
use std::collections::BTreeMap;

/// Events of one pass, tagged with the component that emitted them.
type TaggedEvents = Vec<(&'static str, SimEvent)>;

struct Recorder {
    store: SimStore,
    run_id: RunId,
    /// Highest action-log seq already written.
    persisted_seq: u64,
}

pub struct GameEngine {
    state: GameState,
    config: GameConfig,
    subsystems: Vec<Box<dyn TickSubsystem>>,
    recorder: Option<Recorder>,
}

impl GameEngine {
    /// Build a match on the default generated map.
    pub fn new(seed: u64, config: GameConfig, players: &[PlayerSpec]) -> SimResult<Self> {
        let map = StandardMapGenerator.generate(seed, &config.map)?;
        Self::with_map(seed, config, players, map)
    }

    /// Build a fully wired engine on a caller-supplied map.
    pub fn with_map(
        seed: u64,
        config: GameConfig,
        players: &[PlayerSpec],
        map: GeneratedMap,
    ) -> SimResult<Self> {
        let state = create_initial_state(seed, &config, players, map)?;
        let mut engine = Self {
            state,
            config,
            subsystems: Vec::new(),
            recorder: None,
        };
        // EXECUTION ORDER: fixed, documented, never reordered.
        engine.register(Box::new(SeasonSubsystem));
        engine.register(Box::new(EconomySubsystem));
        engine.register(Box::new(StructureSubsystem));
        engine.register(Box::new(PondSubsystem));
        engine.register(Box::new(FactorySubsystem));
        engine.register(Box::new(WinSubsystem));
        Ok(engine)
    }

    fn register(&mut self, subsystem: Box<dyn TickSubsystem>) {
        self.subsystems.push(subsystem);
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn now_ms(&self) -> TimeMs {
        self.state.now_ms
    }

    pub fn subsystem_names(&self) -> Vec<&'static str> {
        self.subsystems.iter().map(|s| s.name()).collect()
    }

    // ── Recorder ───────────────────────────────────────────────

    /// Persist this match into `store` from now on. The store must be
    /// migrated and hold a `run` row for `run_id`.
    pub fn attach_store(&mut self, store: SimStore, run_id: RunId) -> SimResult<()> {
        self.recorder = Some(Recorder { store, run_id, persisted_seq: 0 });
        self.flush_action_log()?;
        self.save_snapshot()
    }

    pub fn store(&self) -> Option<&SimStore> {
        self.recorder.as_ref().map(|r| &r.store)
    }

    pub fn run_id(&self) -> Option<&str> {
        self.recorder.as_ref().map(|r| r.run_id.as_str())
    }

    // ── Actions ────────────────────────────────────────────────

    /// The single entry point for untrusted input.
    pub fn apply_action(&mut self, raw: &serde_json::Value, source: ActionSource) -> ActionResult {
        match GameAction::parse(raw) {
            Ok(action) => self.settle(&action, source),
            Err(reason) => self.reject_invalid(raw.clone(), source, reason),
        }
    }

    /// Typed entry point; runs the same checks as `apply_action`.
    pub fn apply(&mut self, action: GameAction, source: ActionSource) -> ActionResult {
        match action.validate() {
            Ok(()) => self.settle(&action, source),
            Err(reason) => {
                let raw = serde_json::to_value(&action).unwrap_or(serde_json::Value::Null);
                self.reject_invalid(raw, source, reason)
            }
        }
    }

    fn reject_invalid(&mut self, raw: serde_json::Value, source: ActionSource, reason: String) -> ActionResult {
        let now = self.state.now_ms;
        log::warn!("t={now} dispatcher: invalid {} action: {reason}", source.as_str());
        let text = |key: &str, default: &str| {
            raw.get(key)
                .and_then(serde_json::Value::as_str)
                .unwrap_or(default)
                .to_string()
        };
        let entry = ActionLogEntry {
            seq: 0,
            at_ms: now,
            kind: ActionLogKind::Invalid,
            source,
            player_id: text("playerId", ""),
            action_type: text("type", "unknown"),
            code: ActionCode::InvalidAction,
            message: reason.clone(),
            payload: raw,
        };
        self.state.action_log.push(entry);
        self.persist_quietly(Vec::new());
        ActionResult::fail(ActionCode::InvalidAction, reason)
    }

    fn settle(&mut self, action: &GameAction, source: ActionSource) -> ActionResult {
        let (result, side_events) = dispatch(&mut self.state, &self.config, action, source);
        let tagged: TaggedEvents = side_events.into_iter().map(|e| ("dispatcher", e)).collect();
        self.persist_quietly(tagged);
        result
    }

    /// Side effects of an action go through the pipeline exactly like
    /// their time-driven counterparts. Recorder failures must not turn
    /// an applied action into an error, so they are only logged.
    fn persist_quietly(&mut self, side_events: TaggedEvents) {
        let outcome = if side_events.is_empty() {
            self.flush_action_log()
        } else {
            self.run_pass(side_events, false).map(|_| ())
        };
        if let Err(e) = outcome {
            log::warn!("t={} engine: recorder write failed: {e}", self.state.now_ms);
        }
    }

    // ── Time ───────────────────────────────────────────────────

    /// Advance the match by `delta_ms`, stopping at every deadline on the way.
    pub fn tick(&mut self, delta_ms: TimeMs) -> SimResult<Vec<SimEvent>> {
        if delta_ms == 0 || self.state.match_state.paused {
            return Ok(Vec::new());
        }
        let start = self.state.now_ms;
        let target = start
            .checked_add(delta_ms)
            .ok_or(SimError::ClockOverflow { now_ms: start, delta_ms })?;

        let mut events = Vec::new();
        loop {
            let next = self
                .next_boundary()
                .filter(|t| *t < target)
                .unwrap_or(target);
            self.state.now_ms = next;
            events.extend(self.run_pass(Vec::new(), true)?);
            if next >= target {
                break;
            }
        }
        Ok(events)
    }

    /// Earliest pending deadline strictly after now.
    fn next_boundary(&self) -> Option<TimeMs> {
        if self.state.match_state.ended {
            return None;
        }
        let subsystems = self
            .subsystems
            .iter()
            .filter_map(|s| s.next_deadline(&self.state, &self.config));
        let bots = match self.config.bots.mode {
            BotMode::Internal => next_bot_deadline(&self.state),
            BotMode::External => None,
        };
        subsystems.chain(bots).filter(|t| *t > self.state.now_ms).min()
    }

    /// Run the full pipeline once at `state.now_ms`, seeded with `seed`.
    fn run_pass(&mut self, seed: TaggedEvents, with_bots: bool) -> SimResult<Vec<SimEvent>> {
        let mut bus: Vec<SimEvent> = seed.iter().map(|(_, e)| e.clone()).collect();
        let mut tagged = seed;

        if !self.state.match_state.ended {
            for subsystem in &self.subsystems {
                let new_events = subsystem.update(&mut self.state, &self.config, &bus)?;
                tagged.extend(new_events.iter().cloned().map(|e| (subsystem.name(), e)));
                bus.extend(new_events);
            }
        }

        let mut reactions = TaggedEvents::new();
        if with_bots && self.config.bots.mode == BotMode::Internal && !self.state.match_state.ended {
            let config = &self.config;
            let bot_events = tick_bots(&mut self.state, config, &mut |state, action| {
                dispatch(state, config, action, ActionSource::Bot)
            });
            for event in bot_events {
                if matches!(event, SimEvent::SeasonFlipped { .. }) {
                    reactions.push(("bot", event));
                } else {
                    tagged.push(("bot", event.clone()));
                    bus.push(event);
                }
            }
        }

        self.record(&tagged)?;
        if !reactions.is_empty() {
            bus.extend(self.run_pass(reactions, false)?);
        }
        Ok(bus)
    }

    // ── Persistence ────────────────────────────────────────────

    fn record(&mut self, tagged: &[(&'static str, SimEvent)]) -> SimResult<()> {
        let Some(recorder) = &self.recorder else {
            return Ok(());
        };
        for (subsystem, event) in tagged {
            let entry = EventLogEntry {
                id: None,
                run_id: recorder.run_id.clone(),
                at_ms: event.at_ms(),
                subsystem: subsystem.to_string(),
                event_type: event.type_name().to_string(),
                payload: serde_json::to_string(event)?,
            };
            recorder.store.append_event(&entry)?;
        }
        self.flush_action_log()?;
        if tagged.iter().any(|(_, e)| matches!(e, SimEvent::SeasonFlipped { .. })) {
            self.save_snapshot()?;
        }
        Ok(())
    }

    fn flush_action_log(&mut self) -> SimResult<()> {
        let Some(recorder) = &mut self.recorder else {
            return Ok(());
        };
        for entry in self.state.action_log.since(recorder.persisted_seq) {
            recorder.store.append_action(&recorder.run_id, entry)?;
            recorder.persisted_seq = entry.seq;
        }
        Ok(())
    }

    fn save_snapshot(&self) -> SimResult<()> {
        let Some(recorder) = &self.recorder else {
            return Ok(());
        };
        let json = self.snapshot().to_json()?;
        recorder
            .store
            .save_snapshot(&recorder.run_id, self.state.now_ms, &json)?;
        log::debug!("t={} engine: snapshot saved", self.state.now_ms);
        Ok(())
    }

    // ── Match control ──────────────────────────────────────────

    /// Jump to `to` immediately. Income, melt and the train year react
    /// exactly as for a natural flip.
    pub fn force_season(&mut self, to: Season) -> SimResult<Vec<SimEvent>> {
        match force_season_flip(&mut self.state, to) {
            Some(event) => self.run_pass(vec![("engine", event)], false),
            None => Ok(Vec::new()),
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.state.match_state.paused = paused;
    }

    /// Returns false for an unknown player. With `pause_on_disconnect`,
    /// the match is paused while any human is disconnected.
    pub fn set_player_connected(&mut self, player_id: &str, connected: bool) -> bool {
        let Some(player) = self.state.player_mut(player_id) else {
            return false;
        };
        player.connected = connected;
        if self.config.match_rules.pause_on_disconnect {
            let any_human_away = self
                .state
                .players
                .values()
                .any(|p| p.controller == Controller::Human && !p.connected);
            self.state.match_state.paused = any_human_away;
        }
        true
    }

    pub fn set_player_ready(&mut self, player_id: &str, ready: bool) -> bool {
        match self.state.player_mut(player_id) {
            Some(player) => {
                player.ready = ready;
                true
            }
            None => false,
        }
    }

    pub fn all_ready(&self) -> bool {
        self.state.players.values().all(|p| p.ready)
    }

    // ── Views ──────────────────────────────────────────────────

    pub fn net_worth(&self) -> BTreeMap<PlayerId, Amount> {
        compute_net_worth(&self.state, &self.config)
    }

    pub fn candidate_bot_actions(&self, bot_id: &str) -> Vec<GameAction> {
        enumerate_candidate_bot_actions(&self.state, &self.config, bot_id, self.config.bots.max_candidate_actions)
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            run_id: self.run_id().map(str::to_string),
            now_ms: self.state.now_ms,
            state: self.state.clone(),
        }
    }

    /// The only rehydration path. An invalid state is rejected and the
    /// engine keeps the one it had.
    pub fn replace_state(&mut self, state: GameState) -> SimResult<()> {
        validate_state(&state)?;
        self.state = state;
        if let Some(recorder) = &mut self.recorder {
            // A rewound log would reuse seqs the recorder already holds.
            recorder.persisted_seq = recorder
                .persisted_seq
                .max(self.state.action_log.last().map_or(0, |e| e.seq));
            self.state.action_log.resume_after(recorder.persisted_seq);
        }
        Ok(())
    }
}

/// Validate and apply one action. Returns the result plus any events the
/// action caused (a forced season flip, a forfeit) for the engine to run
/// through the pipeline. Records exactly one action-log entry.
fn dispatch(
    state: &mut GameState,
    config: &GameConfig,
    action: &GameAction,
    source: ActionSource,
) -> (ActionResult, Vec<SimEvent>) {
    let (result, events) = guarded(state, config, action, source);

    let now = state.now_ms;
    if result.ok && source == ActionSource::Bot && config.bots.mode == BotMode::External {
        if let Some(bot) = state.bots.get_mut(action.player_id()) {
            bot.next_allowed_at_ms = now + config.bots.external_cadence_ms;
        }
    }
    let kind = if result.ok { ActionLogKind::Accepted } else { ActionLogKind::Rejected };
    log::debug!(
        "t={now} dispatcher: {} {} by {} -> {}",
        source.as_str(),
        action.type_name(),
        action.player_id(),
        result.code.as_str()
    );
    state.action_log.push(ActionLogEntry {
        seq: 0,
        at_ms: now,
        kind,
        source,
        player_id: action.player_id().to_string(),
        action_type: action.type_name().to_string(),
        code: result.code,
        message: result.message.clone(),
        payload: serde_json::to_value(action).unwrap_or(serde_json::Value::Null),
    });
    (result, events)
}

fn guarded(
    state: &mut GameState,
    config: &GameConfig,
    action: &GameAction,
    source: ActionSource,
) -> (ActionResult, Vec<SimEvent>) {
    let player_id = action.player_id();
    let now = state.now_ms;

    if source == ActionSource::Bot {
        let is_bot = state
            .player(player_id)
            .is_some_and(|p| p.controller == Controller::Bot);
        if !is_bot {
            return (
                ActionResult::fail(ActionCode::InvalidPlayer, format!("{player_id} is not a bot")),
                vec![],
            );
        }
        if config.bots.mode == BotMode::External {
            let next_allowed = state.bots.get(player_id).map_or(0, |b| b.next_allowed_at_ms);
            if now < next_allowed {
                return (
                    ActionResult::fail(
                        ActionCode::LimitReached,
                        format!("{player_id} may act again at {next_allowed}"),
                    ),
                    vec![],
                );
            }
        }
    }
    if state.player(player_id).is_none() {
        return (unknown_player(player_id), vec![]);
    }
    if state.match_state.ended && action.is_gameplay() {
        return (ActionResult::fail(ActionCode::MatchEnded, "the match is over"), vec![]);
    }

    let pid = player_id;
    let result = match action {
        GameAction::TileBuy { x, y, .. } => buy_unowned_tile(state, config, pid, *x, *y),
        GameAction::TileBuyFromPlayer { x, y, .. } => buy_owned_tile(state, config, pid, *x, *y),
        GameAction::BuildFactory { x, y, .. } => {
            build_structure(state, config, pid, *x, *y, BuildKind::Factory)
        }
        GameAction::BuildManMadePond { x, y, .. } => {
            build_structure(state, config, pid, *x, *y, BuildKind::ManMadePond)
        }
        GameAction::PondHarvestStart { x, y, .. } => start_pond_harvest(state, config, pid, *x, *y),
        GameAction::PondHarvestClaim { pond_job_id, .. } => claim_pond_harvest(state, pid, pond_job_id),
        GameAction::SellIce { x, y, quantity, .. } => {
            sell_at_house(state, config, pid, *x, *y, *quantity, IceGrade::Regular)
        }
        GameAction::SellBlueIce { x, y, quantity, .. } => {
            sell_at_house(state, config, pid, *x, *y, *quantity, IceGrade::Blue)
        }
        GameAction::CraftRefrigerator { x, y, .. } => {
            start_factory_craft(state, config, pid, *x, *y, CraftKind::Refrigerator)
        }
        GameAction::CraftBlueIce { x, y, .. } => {
            start_factory_craft(state, config, pid, *x, *y, CraftKind::BlueIce)
        }
        GameAction::SellAnnualShipment { x, y, .. } => sell_annual_shipment(state, config, pid, *x, *y),
        GameAction::SkipSummerVote { .. } => {
            let (result, event) = cast_skip_summer_vote(state, pid);
            return (result, event.into_iter().collect());
        }
        GameAction::Forfeit { .. } => {
            let Some(event) = forfeit_match(state, pid, now) else {
                return (ActionResult::fail(ActionCode::MatchEnded, "the match is over"), vec![]);
            };
            let winner = state.match_state.winner_id.clone();
            return (
                ActionResult::ok_with(format!("{pid} forfeited"), json!({ "winnerId": winner })),
                vec![event],
            );
        }
        GameAction::CameraMove { x, y, .. } => move_camera(state, pid, *x, *y),
        GameAction::TileSelect { x, y, .. } => select_tile(state, pid, *x, *y),
    };
    (result, vec![])
}

fn move_camera(state: &mut GameState, player_id: &str, x: i32, y: i32) -> ActionResult {
    let max_x = state.width.saturating_sub(1) as i32;
    let max_y = state.height.saturating_sub(1) as i32;
    let pos = CameraPosition { x: x.clamp(0, max_x), y: y.clamp(0, max_y) };
    state.cameras.insert(player_id.to_string(), pos);
    ActionResult::ok_with("camera moved", json!({ "x": pos.x, "y": pos.y }))
}

fn select_tile(state: &mut GameState, player_id: &str, x: i32, y: i32) -> ActionResult {
    if state.interactable_tile(x, y).is_none() {
        return invalid_tile(x, y);
    }
    state
        .selections
        .insert(player_id.to_string(), Some(CameraPosition { x, y }));
    ActionResult::ok_with("tile selected", json!({ "x": x, "y": y }))
}
