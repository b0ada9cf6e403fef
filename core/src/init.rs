//! Match construction: (seed, config, players, map) -> GameState.

use crate::{
    config::GameConfig,
    error::{SimError, SimResult},
    map::{validate_map, GeneratedMap},
    rng::deterministic_jitter,
    state::{
        ActionLog, BotControllerState, Controller, GameState, MatchState, PlayerState,
        SeasonState, TrainSales,
    },
    types::{PlayerId, TeamId},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A seat in the match as supplied by the lobby.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerSpec {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub controller: Controller,
    #[serde(default)]
    pub team_id: Option<TeamId>,
}

impl PlayerSpec {
    pub fn human(id: &str, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: "#4a90d9".into(),
            controller: Controller::Human,
            team_id: None,
        }
    }

    pub fn bot(id: &str, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: "#d94a4a".into(),
            controller: Controller::Bot,
            team_id: None,
        }
    }

    pub fn on_team(mut self, team_id: &str) -> Self {
        self.team_id = Some(team_id.into());
        self
    }
}

pub fn create_initial_state(
    seed: u64,
    config: &GameConfig,
    players: &[PlayerSpec],
    map: GeneratedMap,
) -> SimResult<GameState> {
    config.validate()?;
    validate_map(&map, config.map.min_special_distance)?;
    if players.is_empty() {
        return Err(SimError::invalid_state("a match needs at least one player"));
    }
    let mut seen = HashSet::new();
    for spec in players {
        if spec.id.trim().is_empty() {
            return Err(SimError::invalid_state("player id must not be empty"));
        }
        if !seen.insert(spec.id.as_str()) {
            return Err(SimError::invalid_state(format!("duplicate player id {}", spec.id)));
        }
    }

    let economy = &config.economy;
    let timing = &config.timing;

    let mut player_map = BTreeMap::new();
    let mut team_by_player_id = BTreeMap::new();
    let mut bots = BTreeMap::new();
    let mut used_by_player_id = BTreeMap::new();
    for spec in players {
        player_map.insert(
            spec.id.clone(),
            PlayerState {
                id: spec.id.clone(),
                name: spec.name.clone(),
                color: spec.color.clone(),
                controller: spec.controller,
                money: economy.starting_money,
                ice: economy.starting_ice,
                blue_ice: 0,
                refrigerators: 0,
                connected: true,
                ready: spec.controller == Controller::Bot,
            },
        );
        team_by_player_id.insert(
            spec.id.clone(),
            spec.team_id.clone().unwrap_or_else(|| spec.id.clone()),
        );
        used_by_player_id.insert(spec.id.clone(), None);
        if spec.controller == Controller::Bot {
            let first_decision = config.bots.decision_interval_ms
                + deterministic_jitter(0, &spec.id, config.bots.jitter_max_ms);
            bots.insert(
                spec.id.clone(),
                BotControllerState {
                    player_id: spec.id.clone(),
                    next_decision_at_ms: first_decision,
                    pending_action: None,
                    next_allowed_at_ms: 0,
                },
            );
        }
    }

    let starting_season = timing.starting_season;
    let state = GameState {
        seed,
        now_ms: 0,
        width: map.width,
        height: map.height,
        tiles: map.tiles,
        special_points: map.special_points,
        players: player_map,
        player_order: players.iter().map(|p| p.id.clone()).collect(),
        team_by_player_id,
        bots,
        season: SeasonState {
            logic_season: starting_season,
            cycle_start_ms: 0,
            cycle_duration_ms: timing.season_cycle_duration_ms,
            transition_duration_ms: timing.season_transition_duration_ms,
            transition_progress: 0.0,
            transition_keyframe_index: 0,
            visual_from_season: starting_season,
            visual_to_season: starting_season,
            season_flip_count: 0,
        },
        ponds: Vec::new(),
        factory_jobs: Vec::new(),
        train_sales: TrainSales {
            current_year: 0,
            used_by_player_id,
        },
        summer_skip_votes_by_player_id: BTreeMap::new(),
        match_state: MatchState {
            started_at_ms: 0,
            duration_ms: config.match_rules.duration_ms,
            paused: false,
            ended: false,
            winner_id: None,
            overtime: false,
            end_reason: None,
        },
        cameras: BTreeMap::new(),
        selections: BTreeMap::new(),
        next_job_seq: 0,
        action_log: ActionLog::new(config.log.action_log_capacity),
    };

    log::info!(
        "init: seed={seed} players={} grid={}x{}",
        state.player_order.len(),
        state.width,
        state.height
    );
    Ok(state)
}

/// Check the invariants a rehydrated state must hold on entry.
pub fn validate_state(state: &GameState) -> SimResult<()> {
    let expected = state.width as usize * state.height as usize;
    if state.tiles.len() != expected {
        return Err(SimError::invalid_state(format!(
            "expected {expected} tiles, got {}",
            state.tiles.len()
        )));
    }
    let map = GeneratedMap {
        width: state.width,
        height: state.height,
        tiles: state.tiles.clone(),
        special_points: Vec::new(),
    };
    validate_map(&map, 0).map_err(|e| SimError::invalid_state(e.to_string()))?;

    if state.player_order.len() != state.players.len()
        || state.player_order.iter().any(|id| !state.players.contains_key(id))
    {
        return Err(SimError::invalid_state("player_order does not match players"));
    }
    for (id, bot) in &state.bots {
        let is_bot = state
            .players
            .get(id)
            .is_some_and(|p| p.controller == Controller::Bot);
        if !is_bot || bot.player_id != *id {
            return Err(SimError::invalid_state(format!("bot entry {id} is not a BOT player")));
        }
    }
    for tile in &state.tiles {
        if let Some(owner) = &tile.owner_id {
            if !state.players.contains_key(owner) {
                return Err(SimError::invalid_state(format!(
                    "tile ({}, {}) owned by unknown player {owner}",
                    tile.x, tile.y
                )));
            }
        }
    }
    for (i, job) in state.ponds.iter().enumerate() {
        let duplicate = job.is_open()
            && state.ponds[i + 1..]
                .iter()
                .any(|o| o.is_open() && o.pond_x == job.pond_x && o.pond_y == job.pond_y);
        if duplicate {
            return Err(SimError::invalid_state(format!(
                "more than one open harvest on pond ({}, {})",
                job.pond_x, job.pond_y
            )));
        }
    }
    for (i, job) in state.factory_jobs.iter().enumerate() {
        let duplicate = job.status == crate::state::CraftStatus::Active
            && state.factory_jobs[i + 1..].iter().any(|o| {
                o.status == crate::state::CraftStatus::Active && o.x == job.x && o.y == job.y
            });
        if duplicate {
            return Err(SimError::invalid_state(format!(
                "more than one active craft on factory ({}, {})",
                job.x, job.y
            )));
        }
    }
    let progress = state.season.transition_progress;
    if !(0.0..=1.0).contains(&progress) || state.season.transition_keyframe_index > 8 {
        return Err(SimError::invalid_state("season transition out of range"));
    }
    if state.season.cycle_duration_ms == 0 {
        return Err(SimError::invalid_state("season cycle duration is zero"));
    }
    Ok(())
}
