//! Factory craft subsystem.
//!
//! Job lifecycle: ACTIVE -> COMPLETE -> COLLECTED.
//! The tick that reaches `completes_at_ms` grants the output to the job
//! owner immediately, so COMPLETE already means "delivered". COLLECTED is
//! bookkeeping, set when the next craft starts on the same factory.

use crate::{
    config::GameConfig,
    error::SimResult,
    event::SimEvent,
    result::{invalid_tile, unknown_player, ActionCode, ActionResult},
    state::{CraftKind, CraftStatus, FactoryCraftJob, GameState, TileType},
    subsystem::TickSubsystem,
    types::TimeMs,
};
use serde_json::json;

pub fn start_factory_craft(
    state: &mut GameState,
    config: &GameConfig,
    player_id: &str,
    x: i32,
    y: i32,
    kind: CraftKind,
) -> ActionResult {
    let Some(tile) = state.interactable_tile(x, y) else {
        return invalid_tile(x, y);
    };
    if tile.tile_type != TileType::Factory {
        return ActionResult::fail(ActionCode::InvalidTile, format!("({x}, {y}) is not a factory"));
    }
    if !state.owned_by_team(tile, player_id) {
        return ActionResult::fail(ActionCode::NotOwner, format!("you do not own the factory at ({x}, {y})"));
    }
    if let Some(job) = state.active_craft_at(x, y) {
        return ActionResult::fail(
            ActionCode::AlreadyActive,
            format!("factory ({x}, {y}) is busy with {}", job.id),
        );
    }
    let money_cost = config.economy.factory_craft_money_cost;
    let ice_cost = config.economy.factory_craft_ice_cost;
    let Some(player) = state.player(player_id) else {
        return unknown_player(player_id);
    };
    if player.money < money_cost {
        return ActionResult::fail(
            ActionCode::InsufficientFunds,
            format!("crafting costs ${money_cost}, you have ${}", player.money),
        );
    }
    if player.ice < ice_cost {
        return ActionResult::fail(
            ActionCode::InsufficientIce,
            format!("crafting needs {ice_cost} ice, you have {}", player.ice),
        );
    }

    if let Some(player) = state.player_mut(player_id) {
        player.money -= money_cost;
        player.ice -= ice_cost;
    }
    let now = state.now_ms;
    for job in state.factory_jobs.iter_mut() {
        if job.x == x && job.y == y && job.status == CraftStatus::Complete {
            job.status = CraftStatus::Collected;
            job.collected_at_ms = Some(now);
        }
    }
    let id = state.next_job_id("craft");
    let completes_at_ms = now + config.timing.factory_craft_duration_ms;
    state.factory_jobs.push(FactoryCraftJob {
        id: id.clone(),
        owner_id: player_id.to_string(),
        x,
        y,
        kind,
        status: CraftStatus::Active,
        started_at_ms: now,
        completes_at_ms,
        collected_at_ms: None,
    });
    ActionResult::ok_with(
        format!("{kind:?} craft {id} started"),
        json!({ "jobId": id, "completesAtMs": completes_at_ms }),
    )
}

/// Complete every ACTIVE job whose time has come and deliver its output.
pub fn complete_due_crafts(state: &mut GameState, now: TimeMs) -> Vec<SimEvent> {
    let mut events = Vec::new();
    for job in state.factory_jobs.iter_mut() {
        if job.status != CraftStatus::Active || now < job.completes_at_ms {
            continue;
        }
        job.status = CraftStatus::Complete;
        if let Some(owner) = state.players.get_mut(&job.owner_id) {
            match job.kind {
                CraftKind::Refrigerator => owner.refrigerators += 1,
                CraftKind::BlueIce => owner.blue_ice += 1,
            }
        }
        log::debug!("t={now} factory: {} delivered {:?} to {}", job.id, job.kind, job.owner_id);
        events.push(SimEvent::FactoryCraftCompleted {
            at_ms: now,
            job_id: job.id.clone(),
            owner_id: job.owner_id.clone(),
            kind: job.kind,
        });
    }
    events
}

pub struct FactorySubsystem;

impl TickSubsystem for FactorySubsystem {
    fn name(&self) -> &'static str { "factory" }

    fn update(
        &self,
        state: &mut GameState,
        _config: &GameConfig,
        _events_in: &[SimEvent],
    ) -> SimResult<Vec<SimEvent>> {
        let now = state.now_ms;
        Ok(complete_due_crafts(state, now))
    }

    fn next_deadline(&self, state: &GameState, _config: &GameConfig) -> Option<TimeMs> {
        state
            .factory_jobs
            .iter()
            .filter(|j| j.status == CraftStatus::Active && j.completes_at_ms > state.now_ms)
            .map(|j| j.completes_at_ms)
            .min()
    }
}
