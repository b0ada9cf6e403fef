//! Pond harvest subsystem.
//!
//! Job lifecycle: ACTIVE -> CLAIMABLE -> CLAIMED (terminal).
//! A pond carries at most one open (non-CLAIMED) job; a claimed job is
//! never reused, the next harvest is a fresh job.

use crate::{
    config::GameConfig,
    error::SimResult,
    event::SimEvent,
    result::{invalid_tile, unknown_player, ActionCode, ActionResult},
    state::{GameState, PondHarvestJob, PondJobStatus, Season, TileType},
    subsystem::TickSubsystem,
    types::TimeMs,
};
use serde_json::json;

pub fn start_pond_harvest(
    state: &mut GameState,
    config: &GameConfig,
    player_id: &str,
    x: i32,
    y: i32,
) -> ActionResult {
    let Some(tile) = state.interactable_tile(x, y) else {
        return invalid_tile(x, y);
    };
    if tile.tile_type != TileType::Pond {
        return ActionResult::fail(ActionCode::InvalidTile, format!("({x}, {y}) is not a pond"));
    }
    if !state.owned_by_team(tile, player_id) {
        return ActionResult::fail(ActionCode::NotOwner, format!("you do not own the pond at ({x}, {y})"));
    }
    if state.season.logic_season != Season::Winter {
        return ActionResult::fail(ActionCode::WrongSeason, "ponds can only be harvested in winter");
    }
    if let Some(job) = state.open_pond_job_at(x, y) {
        return ActionResult::fail(
            ActionCode::AlreadyActive,
            format!("pond ({x}, {y}) already has harvest {}", job.id),
        );
    }
    let cost = config.economy.pond_harvest_cost;
    let Some(player) = state.player(player_id) else {
        return unknown_player(player_id);
    };
    if player.money < cost {
        return ActionResult::fail(
            ActionCode::InsufficientFunds,
            format!("harvest costs ${cost}, you have ${}", player.money),
        );
    }

    if let Some(player) = state.player_mut(player_id) {
        player.money -= cost;
    }
    let now = state.now_ms;
    let id = state.next_job_id("pond");
    let claim_at_ms = now + config.timing.pond_harvest_duration_ms;
    state.ponds.push(PondHarvestJob {
        id: id.clone(),
        pond_x: x,
        pond_y: y,
        owner_id: player_id.to_string(),
        status: PondJobStatus::Active,
        created_at_ms: now,
        claim_at_ms,
        claimed_at_ms: None,
        yield_ice: config.economy.pond_harvest_yield,
    });
    ActionResult::ok_with(
        format!("harvest {id} started"),
        json!({ "pondJobId": id, "claimAtMs": claim_at_ms }),
    )
}

pub fn claim_pond_harvest(state: &mut GameState, player_id: &str, job_id: &str) -> ActionResult {
    if state.players.get(player_id).is_none() {
        return unknown_player(player_id);
    }
    let now = state.now_ms;
    let Some(job) = state.ponds.iter_mut().find(|j| j.id == job_id) else {
        return ActionResult::fail(ActionCode::InvalidAction, format!("unknown pond job {job_id}"));
    };
    if job.owner_id != player_id {
        return ActionResult::fail(ActionCode::NotOwner, format!("{job_id} belongs to {}", job.owner_id));
    }
    // A claim landing in the same tick as completion must not lose the race.
    if job.status == PondJobStatus::Active && now >= job.claim_at_ms {
        job.status = PondJobStatus::Claimable;
    }
    if job.status != PondJobStatus::Claimable {
        return ActionResult::fail(
            ActionCode::NotClaimable,
            format!("{job_id} is {:?}, claimable at {}", job.status, job.claim_at_ms),
        );
    }

    job.status = PondJobStatus::Claimed;
    job.claimed_at_ms = Some(now);
    let granted = job.yield_ice;
    if let Some(player) = state.players.get_mut(player_id) {
        player.ice += granted;
    }
    ActionResult::ok_with(
        format!("claimed {granted} ice from {job_id}"),
        json!({ "pondJobId": job_id, "ice": granted }),
    )
}

/// Promote every ACTIVE job whose claim time has arrived.
pub fn promote_claimable(state: &mut GameState, now: TimeMs) -> Vec<SimEvent> {
    let mut events = Vec::new();
    for job in state.ponds.iter_mut() {
        if job.status == PondJobStatus::Active && now >= job.claim_at_ms {
            job.status = PondJobStatus::Claimable;
            events.push(SimEvent::PondHarvestClaimable {
                at_ms: now,
                job_id: job.id.clone(),
                owner_id: job.owner_id.clone(),
            });
        }
    }
    events
}

pub struct PondSubsystem;

impl TickSubsystem for PondSubsystem {
    fn name(&self) -> &'static str { "pond" }

    fn update(
        &self,
        state: &mut GameState,
        _config: &GameConfig,
        _events_in: &[SimEvent],
    ) -> SimResult<Vec<SimEvent>> {
        let now = state.now_ms;
        Ok(promote_claimable(state, now))
    }

    fn next_deadline(&self, state: &GameState, _config: &GameConfig) -> Option<TimeMs> {
        state
            .ponds
            .iter()
            .filter(|j| j.status == PondJobStatus::Active && j.claim_at_ms > state.now_ms)
            .map(|j| j.claim_at_ms)
            .min()
    }
}
