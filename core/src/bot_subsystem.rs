//! Bot subsystem: candidate enumeration, heuristic scoring, scheduling.
//!
//! Bots play by the same rules as humans: every chosen action goes
//! through the normal dispatcher and can be rejected like any other.
//! Enumeration only pre-filters obviously unaffordable options so the
//! list stays short.
//!
//! Pacing: in internal mode a bot decides every `decision_interval_ms`,
//! then waits `reaction_delay_ms` plus a deterministic jitter before the
//! action executes. External mode never reaches this module's tick loop.

use crate::{
    action::GameAction,
    config::GameConfig,
    event::SimEvent,
    result::ActionResult,
    rng::deterministic_jitter,
    state::{GameState, PendingBotAction, PondJobStatus, Season, TileState, TileType},
    types::{PlayerId, TimeMs},
};
use std::collections::BTreeSet;

/// Relative worth of holding a tile of each type.
fn tile_value(tile_type: TileType) -> i64 {
    match tile_type {
        TileType::Train => 400,
        TileType::House => 320,
        TileType::Pond => 260,
        TileType::Factory => 200,
        TileType::Forest => 120,
        TileType::Grass => 100,
        TileType::Void => 0,
    }
}

fn is_strategic(tile_type: TileType) -> bool {
    matches!(tile_type, TileType::Train | TileType::House | TileType::Pond)
}

const NEIGHBOURS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

pub fn enumerate_candidate_bot_actions(
    state: &GameState,
    config: &GameConfig,
    bot_id: &str,
    max: usize,
) -> Vec<GameAction> {
    let Some(bot) = state.player(bot_id) else {
        return vec![];
    };
    let economy = &config.economy;
    let pid = || bot_id.to_string();
    let now = state.now_ms;
    let mut out: Vec<GameAction> = Vec::new();

    for job in &state.ponds {
        let ready = job.status == PondJobStatus::Claimable
            || (job.status == PondJobStatus::Active && now >= job.claim_at_ms);
        if ready && job.owner_id == bot_id {
            out.push(GameAction::PondHarvestClaim { player_id: pid(), pond_job_id: job.id.clone() });
        }
    }

    let owned: Vec<&TileState> = state.team_tiles(bot_id).collect();
    for tile in &owned {
        let (x, y) = (tile.x, tile.y);
        match tile.tile_type {
            TileType::Pond => {
                if state.season.logic_season == Season::Winter
                    && state.open_pond_job_at(x, y).is_none()
                    && bot.money >= economy.pond_harvest_cost
                {
                    out.push(GameAction::PondHarvestStart { player_id: pid(), x, y });
                }
            }
            TileType::House => {
                if state.season.logic_season == Season::Summer {
                    if bot.ice > 0 {
                        out.push(GameAction::SellIce { player_id: pid(), x, y, quantity: bot.ice });
                    }
                    if bot.blue_ice > 0 {
                        out.push(GameAction::SellBlueIce { player_id: pid(), x, y, quantity: bot.blue_ice });
                    }
                }
            }
            TileType::Train => {
                if !state.train_sales.used_this_year(bot_id) && bot.ice >= economy.train_shipment_ice_cost {
                    out.push(GameAction::SellAnnualShipment { player_id: pid(), x, y });
                }
            }
            TileType::Factory => {
                if state.active_craft_at(x, y).is_none()
                    && bot.money >= economy.factory_craft_money_cost
                    && bot.ice >= economy.factory_craft_ice_cost
                {
                    out.push(GameAction::CraftRefrigerator { player_id: pid(), x, y });
                    out.push(GameAction::CraftBlueIce { player_id: pid(), x, y });
                }
            }
            TileType::Grass | TileType::Forest => {
                if bot.money >= economy.build_factory_money_cost && bot.ice >= economy.build_factory_ice_cost {
                    out.push(GameAction::BuildFactory { player_id: pid(), x, y });
                }
                if bot.money >= economy.build_pond_money_cost && bot.ice >= economy.build_pond_ice_cost {
                    out.push(GameAction::BuildManMadePond { player_id: pid(), x, y });
                }
            }
            TileType::Void => {}
        }
    }

    // Expansion: the frontier around owned land plus every strategic tile.
    let mut targets: Vec<&TileState> = Vec::new();
    for tile in &owned {
        for (dx, dy) in NEIGHBOURS {
            if let Some(n) = state.interactable_tile(tile.x + dx, tile.y + dy) {
                targets.push(n);
            }
        }
    }
    targets.extend(state.tiles.iter().filter(|t| is_strategic(t.tile_type)));
    let before_expansion = out.len();
    for tile in targets {
        if let Some(action) = acquisition_for(state, config, bot_id, tile) {
            out.push(action);
        }
    }
    if out.len() == before_expansion && bot.money >= economy.buy_unowned_tile_cost {
        if let Some(tile) = state
            .tiles
            .iter()
            .find(|t| t.tile_type != TileType::Void && t.owner_id.is_none())
        {
            out.push(GameAction::TileBuy { player_id: pid(), x: tile.x, y: tile.y });
        }
    }

    let mut seen = BTreeSet::new();
    out.retain(|a| a.player_id() == bot_id && seen.insert(a.dedup_key()));

    let mut scored: Vec<(i64, GameAction)> = out
        .into_iter()
        .map(|a| (score_bot_action(state, config, bot_id, &a), a))
        .collect();
    scored.sort_by_key(|(score, _)| std::cmp::Reverse(*score));
    scored.truncate(max);
    scored.into_iter().map(|(_, a)| a).collect()
}

fn acquisition_for(
    state: &GameState,
    config: &GameConfig,
    bot_id: &str,
    tile: &TileState,
) -> Option<GameAction> {
    if tile.tile_type == TileType::Void || state.owned_by_team(tile, bot_id) {
        return None;
    }
    let money = state.player(bot_id)?.money;
    let (x, y) = (tile.x, tile.y);
    match &tile.owner_id {
        None => (money >= config.economy.buy_unowned_tile_cost)
            .then(|| GameAction::TileBuy { player_id: bot_id.to_string(), x, y }),
        Some(_) => (money >= tile.current_price + config.economy.buyout_transfer_fee)
            .then(|| GameAction::TileBuyFromPlayer { player_id: bot_id.to_string(), x, y }),
    }
}

fn owns_type(state: &GameState, bot_id: &str, tile_type: TileType) -> bool {
    state.team_tiles(bot_id).any(|t| t.tile_type == tile_type)
}

pub fn score_bot_action(state: &GameState, config: &GameConfig, bot_id: &str, action: &GameAction) -> i64 {
    let economy = &config.economy;
    let Some(bot) = state.player(bot_id) else {
        return i64::MIN;
    };
    let money = bot.money as i64;
    let tile_type_at = |x: i32, y: i32| state.tile(x, y).map(|t| t.tile_type).unwrap_or(TileType::Void);

    match action {
        GameAction::PondHarvestClaim { .. } => 1_000,
        GameAction::PondHarvestStart { .. } => 800,
        GameAction::SellAnnualShipment { .. } => 500 + (20 - money).max(0) * 10,
        GameAction::SellBlueIce { quantity, .. } => 450 + 10 * *quantity as i64,
        GameAction::SellIce { quantity, .. } => 300 + 5 * *quantity as i64,
        GameAction::TileBuy { x, y, .. } => {
            tile_value(tile_type_at(*x, *y)) - economy.buy_unowned_tile_cost as i64 * 10
        }
        GameAction::TileBuyFromPlayer { x, y, .. } => {
            let price = state
                .tile(*x, *y)
                .map(|t| t.current_price + economy.buyout_transfer_fee)
                .unwrap_or(0);
            tile_value(tile_type_at(*x, *y)) - price as i64 * 15
        }
        GameAction::BuildFactory { .. } => {
            if owns_type(state, bot_id, TileType::Factory) { 120 } else { 350 }
        }
        GameAction::BuildManMadePond { .. } => {
            if owns_type(state, bot_id, TileType::Pond) { 110 } else { 330 }
        }
        GameAction::CraftRefrigerator { .. } => {
            let capacity = bot.refrigerators * economy.refrigerator_storage_per_unit;
            let exposed = bot.ice.saturating_sub(capacity) as i64;
            let until_flip = state.season.next_flip_at_ms().saturating_sub(state.now_ms);
            let melt_soon = state.season.logic_season == Season::Winter
                && until_flip <= config.timing.factory_craft_duration_ms + config.bots.decision_interval_ms;
            150 + if melt_soon { exposed * 40 } else { 0 }
        }
        GameAction::CraftBlueIce { .. } => 200,
        GameAction::SkipSummerVote { .. }
        | GameAction::Forfeit { .. }
        | GameAction::CameraMove { .. }
        | GameAction::TileSelect { .. } => 0,
    }
}

pub fn choose_heuristic_bot_action(state: &GameState, config: &GameConfig, bot_id: &str) -> Option<GameAction> {
    enumerate_candidate_bot_actions(state, config, bot_id, config.bots.max_candidate_actions)
        .into_iter()
        .next()
}

/// Earliest future instant at which some bot has work to do.
pub fn next_bot_deadline(state: &GameState) -> Option<TimeMs> {
    state
        .bots
        .values()
        .map(|b| match &b.pending_action {
            Some(pending) => pending.execute_at_ms,
            None => b.next_decision_at_ms,
        })
        .filter(|t| *t > state.now_ms)
        .min()
}

/// Run the internal decision loop for every bot at the current instant.
/// `dispatch` is the engine's action entry point; events it returns
/// (a forced flip, say) are passed back to the caller unchanged.
///
/// An action whose `execute_at_ms` is already reached when it is planned
/// runs in the same pass, so a zero reaction delay does not depend on
/// how the caller slices time.
pub fn tick_bots(
    state: &mut GameState,
    config: &GameConfig,
    dispatch: &mut dyn FnMut(&mut GameState, &GameAction) -> (ActionResult, Vec<SimEvent>),
) -> Vec<SimEvent> {
    let now = state.now_ms;
    let mut events = Vec::new();
    let bot_ids: Vec<PlayerId> = state.bots.keys().cloned().collect();

    for bot_id in bot_ids {
        if state.match_state.ended {
            break;
        }
        let Some(bot) = state.bots.get(&bot_id) else { continue };

        if bot.pending_action.is_none() && now >= bot.next_decision_at_ms {
            plan_bot_action(state, config, &bot_id, &mut events);
        }
        execute_due_bot_action(state, config, &bot_id, dispatch, &mut events);
    }
    events
}

fn plan_bot_action(state: &mut GameState, config: &GameConfig, bot_id: &str, events: &mut Vec<SimEvent>) {
    let now = state.now_ms;
    match choose_heuristic_bot_action(state, config, bot_id) {
        Some(action) => {
            let execute_at_ms = now
                + config.bots.reaction_delay_ms
                + deterministic_jitter(now, bot_id, config.bots.jitter_max_ms);
            log::debug!("t={now} bot: {bot_id} plans {} at {execute_at_ms}", action.type_name());
            events.push(SimEvent::BotActionScheduled {
                at_ms: now,
                player_id: bot_id.to_string(),
                action_type: action.type_name().to_string(),
                execute_at_ms,
            });
            if let Some(bot) = state.bots.get_mut(bot_id) {
                bot.pending_action = Some(PendingBotAction { action, execute_at_ms });
            }
        }
        None => {
            if let Some(bot) = state.bots.get_mut(bot_id) {
                bot.next_decision_at_ms = now + config.bots.decision_interval_ms;
            }
        }
    }
}

fn execute_due_bot_action(
    state: &mut GameState,
    config: &GameConfig,
    bot_id: &str,
    dispatch: &mut dyn FnMut(&mut GameState, &GameAction) -> (ActionResult, Vec<SimEvent>),
    events: &mut Vec<SimEvent>,
) {
    let now = state.now_ms;
    let due = state
        .bots
        .get(bot_id)
        .and_then(|b| b.pending_action.as_ref())
        .is_some_and(|p| now >= p.execute_at_ms);
    if !due {
        return;
    }
    let Some(pending) = state.bots.get_mut(bot_id).and_then(|b| b.pending_action.take()) else {
        return;
    };
    let (result, side_events) = dispatch(state, &pending.action);
    if let Some(bot) = state.bots.get_mut(bot_id) {
        bot.next_decision_at_ms = now + config.bots.decision_interval_ms;
    }
    log::debug!(
        "t={now} bot: {bot_id} executed {} -> {}",
        pending.action.type_name(),
        result.code.as_str()
    );
    events.push(SimEvent::BotActionExecuted {
        at_ms: now,
        player_id: bot_id.to_string(),
        action_type: pending.action.type_name().to_string(),
        code: result.code,
    });
    events.extend(side_events);
}
