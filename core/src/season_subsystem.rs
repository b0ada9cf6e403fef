//! Season clock subsystem.
//!
//! The logic season flips every `cycle_duration_ms`. Flips are counted
//! from the cycle start, never from "now", so a large time jump keeps the
//! cycle phase: the loop below flips once per elapsed cycle.
//!
//! The trailing `transition_duration_ms` of each cycle drives the visual
//! blend towards the upcoming season (progress 0 -> 1, 9 keyframes).
//!
//! Tick role: first subsystem of every pass. Emits SeasonFlipped, which
//! the economy and structure subsystems react to.

use crate::{
    config::GameConfig,
    error::SimResult,
    event::SimEvent,
    result::{unknown_player, ActionCode, ActionResult},
    state::{Controller, GameState, Season},
    subsystem::TickSubsystem,
    types::TimeMs,
};
use serde_json::json;

pub const TRANSITION_KEYFRAMES: u8 = 8;

fn flip(state: &mut GameState, at_ms: TimeMs, forced: bool) -> SimEvent {
    let from = state.season.logic_season;
    let to = from.other();
    state.season.logic_season = to;
    state.season.season_flip_count += 1;
    state.summer_skip_votes_by_player_id.clear();
    log::debug!(
        "t={at_ms} season: {from:?} -> {to:?} (flip {}{})",
        state.season.season_flip_count,
        if forced { ", forced" } else { "" }
    );
    SimEvent::SeasonFlipped {
        at_ms,
        from,
        to,
        flip_count: state.season.season_flip_count,
        forced,
    }
}

/// Flip once per fully elapsed cycle, then refresh the visual transition.
pub fn update_season_clock(state: &mut GameState, now: TimeMs) -> Vec<SimEvent> {
    let mut events = Vec::new();
    if state.season.cycle_duration_ms == 0 {
        return events;
    }
    while now >= state.season.next_flip_at_ms() {
        let at_ms = state.season.next_flip_at_ms();
        state.season.cycle_start_ms = at_ms;
        events.push(flip(state, at_ms, false));
    }
    refresh_transition(state, now);
    events
}

pub fn refresh_transition(state: &mut GameState, now: TimeMs) {
    let season = &mut state.season;
    let elapsed = now.saturating_sub(season.cycle_start_ms);
    let window = season.transition_duration_ms.min(season.cycle_duration_ms);
    let window_start = season.cycle_duration_ms - window;

    let progress = if window == 0 || elapsed < window_start {
        0.0
    } else {
        ((elapsed - window_start) as f64 / window as f64).clamp(0.0, 1.0)
    };
    season.transition_progress = progress;
    season.transition_keyframe_index =
        ((progress * f64::from(TRANSITION_KEYFRAMES)).round() as u8).min(TRANSITION_KEYFRAMES);
    season.visual_from_season = season.logic_season;
    season.visual_to_season = if progress > 0.0 {
        season.logic_season.other()
    } else {
        season.logic_season
    };
}

/// Jump straight to `to`, restarting the cycle at `now`.
/// Returns None when already in `to`.
pub fn force_season_flip(state: &mut GameState, to: Season) -> Option<SimEvent> {
    if state.season.logic_season == to {
        return None;
    }
    let now = state.now_ms;
    state.season.cycle_start_ms = now;
    let event = flip(state, now, true);
    refresh_transition(state, now);
    Some(event)
}

/// Record a vote to end summer early. When every connected human has
/// voted, winter starts immediately. Bots never vote and never block.
pub fn cast_skip_summer_vote(state: &mut GameState, player_id: &str) -> (ActionResult, Option<SimEvent>) {
    if state.player(player_id).is_none() {
        return (unknown_player(player_id), None);
    }
    if state.season.logic_season != Season::Summer {
        return (
            ActionResult::fail(ActionCode::WrongSeason, "summer can only be skipped during summer"),
            None,
        );
    }
    if state.summer_skip_votes_by_player_id.get(player_id).copied() == Some(true) {
        return (
            ActionResult::fail(ActionCode::AlreadyActive, "you already voted to skip summer"),
            None,
        );
    }
    state
        .summer_skip_votes_by_player_id
        .insert(player_id.to_string(), true);

    let humans: Vec<&str> = state
        .player_order
        .iter()
        .filter(|id| {
            state
                .player(id)
                .is_some_and(|p| p.controller == Controller::Human && p.connected)
        })
        .map(String::as_str)
        .collect();
    let electorate: Vec<&str> = if humans.is_empty() {
        state.player_order.iter().map(String::as_str).collect()
    } else {
        humans
    };
    let votes = electorate
        .iter()
        .filter(|id| state.summer_skip_votes_by_player_id.get(**id).copied() == Some(true))
        .count();
    let needed = electorate.len();

    if votes < needed {
        return (
            ActionResult::ok_with(
                format!("vote recorded ({votes}/{needed})"),
                json!({ "votes": votes, "needed": needed, "skipped": false }),
            ),
            None,
        );
    }
    let event = force_season_flip(state, Season::Winter);
    (
        ActionResult::ok_with(
            "summer skipped",
            json!({ "votes": votes, "needed": needed, "skipped": true }),
        ),
        event,
    )
}

pub struct SeasonSubsystem;

impl TickSubsystem for SeasonSubsystem {
    fn name(&self) -> &'static str { "season" }

    fn update(
        &self,
        state: &mut GameState,
        _config: &GameConfig,
        _events_in: &[SimEvent],
    ) -> SimResult<Vec<SimEvent>> {
        let now = state.now_ms;
        Ok(update_season_clock(state, now))
    }

    fn next_deadline(&self, state: &GameState, _config: &GameConfig) -> Option<TimeMs> {
        Some(state.season.next_flip_at_ms()).filter(|t| *t > state.now_ms)
    }
}
