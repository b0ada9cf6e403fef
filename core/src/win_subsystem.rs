//! Win condition subsystem: match clock, tie-break overtime, forfeit.
//!
//! Teams are ranked by the total cash of their members. Net worth is a
//! scoreboard figure only; it never decides the match.
//!
//! Tick role: last subsystem of every pass, so it judges the economy after
//! every other subsystem has settled for this instant.

use crate::{
    config::GameConfig,
    error::SimResult,
    event::SimEvent,
    state::{GameState, MatchEndReason},
    subsystem::TickSubsystem,
    types::{Amount, PlayerId, TeamId, TimeMs},
};

/// Team cash totals in first-appearance order.
fn team_money(state: &GameState) -> Vec<(TeamId, PlayerId, Amount)> {
    state
        .teams()
        .into_iter()
        .filter_map(|(team, members)| {
            let total = members
                .iter()
                .filter_map(|id| state.player(id))
                .map(|p| p.money)
                .sum();
            let first = members.first()?.clone();
            Some((team, first, total))
        })
        .collect()
}

fn end_match(
    state: &mut GameState,
    now: TimeMs,
    winner_id: Option<PlayerId>,
    reason: MatchEndReason,
) -> SimEvent {
    state.match_state.ended = true;
    state.match_state.winner_id = winner_id.clone();
    state.match_state.end_reason = Some(reason);
    log::info!(
        "t={now} win: match ended ({reason:?}), winner {}",
        winner_id.as_deref().unwrap_or("none")
    );
    SimEvent::MatchEnded { at_ms: now, winner_id, reason }
}

pub fn evaluate_time_win(state: &mut GameState, config: &GameConfig, now: TimeMs) -> Vec<SimEvent> {
    let m = &state.match_state;
    if m.ended || now.saturating_sub(m.started_at_ms) < m.duration_ms {
        return vec![];
    }

    let standings = team_money(state);
    let top = standings.iter().map(|(_, _, money)| *money).max().unwrap_or(0);
    let leaders: Vec<&(TeamId, PlayerId, Amount)> =
        standings.iter().filter(|(_, _, money)| *money == top).collect();

    if let [(_, first_member, _)] = leaders.as_slice() {
        let winner = first_member.clone();
        return vec![end_match(state, now, Some(winner), MatchEndReason::TimeLimit)];
    }

    let rules = &config.match_rules;
    if rules.overtime_enabled && !state.match_state.overtime {
        state.match_state.overtime = true;
        state.match_state.duration_ms += rules.overtime_duration_ms;
        let new_duration_ms = state.match_state.duration_ms;
        log::info!("t={now} win: tied at ${top}, overtime until {}", state.match_state.deadline_ms());
        return vec![SimEvent::OvertimeStarted { at_ms: now, new_duration_ms }];
    }
    vec![end_match(state, now, None, MatchEndReason::Draw)]
}

/// End the match against `loser_id`. The richest other team wins, the
/// earliest team on a cash tie. Returns None when the match already ended.
pub fn forfeit_match(state: &mut GameState, loser_id: &str, now: TimeMs) -> Option<SimEvent> {
    if state.match_state.ended {
        return None;
    }
    let loser_team = state.team_of(loser_id).to_string();
    let mut best: Option<(PlayerId, Amount)> = None;
    for (team, first_member, money) in team_money(state) {
        if team == loser_team {
            continue;
        }
        if best.as_ref().is_none_or(|(_, best_money)| money > *best_money) {
            best = Some((first_member, money));
        }
    }
    let winner = best.map(|(id, _)| id);
    Some(end_match(state, now, winner, MatchEndReason::Forfeit))
}

pub struct WinSubsystem;

impl TickSubsystem for WinSubsystem {
    fn name(&self) -> &'static str { "win" }

    fn update(
        &self,
        state: &mut GameState,
        config: &GameConfig,
        _events_in: &[SimEvent],
    ) -> SimResult<Vec<SimEvent>> {
        let now = state.now_ms;
        Ok(evaluate_time_win(state, config, now))
    }

    fn next_deadline(&self, state: &GameState, _config: &GameConfig) -> Option<TimeMs> {
        let deadline = state.match_state.deadline_ms();
        (!state.match_state.ended && deadline > state.now_ms).then_some(deadline)
    }
}
