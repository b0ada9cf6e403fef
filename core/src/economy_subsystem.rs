//! Economy subsystem: land, season income, melt and net worth.
//!
//! Action handlers validate everything before they touch the state:
//! a rejected purchase leaves every field exactly as it was.
//!
//! Tick role: reacts to SeasonFlipped. Every flip pays the flip income;
//! a WINTER -> SUMMER flip also melts unrefrigerated ice.

use crate::{
    config::GameConfig,
    error::SimResult,
    event::SimEvent,
    result::{invalid_tile, unknown_player, ActionCode, ActionResult},
    state::{GameState, Season, TileType},
    subsystem::TickSubsystem,
    types::{Amount, PlayerId, TimeMs},
};
use serde_json::json;
use std::collections::BTreeMap;

pub fn buy_unowned_tile(
    state: &mut GameState,
    config: &GameConfig,
    player_id: &str,
    x: i32,
    y: i32,
) -> ActionResult {
    let cost = config.economy.buy_unowned_tile_cost;
    let Some(tile) = state.interactable_tile(x, y) else {
        return invalid_tile(x, y);
    };
    if state.owned_by_team(tile, player_id) {
        return ActionResult::fail(ActionCode::AlreadyOwner, format!("({x}, {y}) is already yours"));
    }
    if let Some(owner) = &tile.owner_id {
        return ActionResult::fail(
            ActionCode::InvalidTile,
            format!("({x}, {y}) belongs to {owner}; use a buyout"),
        );
    }
    let Some(player) = state.player(player_id) else {
        return unknown_player(player_id);
    };
    if player.money < cost {
        return ActionResult::fail(
            ActionCode::InsufficientFunds,
            format!("tile costs ${cost}, you have ${}", player.money),
        );
    }

    if let Some(player) = state.player_mut(player_id) {
        player.money -= cost;
    }
    if let Some(tile) = state.tile_mut(x, y) {
        tile.owner_id = Some(player_id.to_string());
        tile.current_price = cost;
    }
    ActionResult::ok_with(
        format!("bought ({x}, {y}) for ${cost}"),
        json!({ "x": x, "y": y, "price": cost }),
    )
}

/// Buyout of a tile owned by another team. The seller gets the current
/// price back; the transfer fee is destroyed; the price only ever rises.
pub fn buy_owned_tile(
    state: &mut GameState,
    config: &GameConfig,
    player_id: &str,
    x: i32,
    y: i32,
) -> ActionResult {
    let Some(tile) = state.interactable_tile(x, y) else {
        return invalid_tile(x, y);
    };
    let Some(seller_id) = tile.owner_id.clone() else {
        return ActionResult::fail(ActionCode::InvalidTile, format!("({x}, {y}) is unowned; buy it instead"));
    };
    if state.are_teammates(&seller_id, player_id) {
        return ActionResult::fail(ActionCode::AlreadyOwner, format!("({x}, {y}) is already yours"));
    }
    let seller_price = tile.current_price;
    let price = seller_price + config.economy.buyout_transfer_fee;
    let Some(buyer) = state.player(player_id) else {
        return unknown_player(player_id);
    };
    if buyer.money < price {
        return ActionResult::fail(
            ActionCode::InsufficientFunds,
            format!("buyout costs ${price}, you have ${}", buyer.money),
        );
    }

    if let Some(buyer) = state.player_mut(player_id) {
        buyer.money -= price;
    }
    if let Some(seller) = state.player_mut(&seller_id) {
        seller.money += seller_price;
    }
    if let Some(tile) = state.tile_mut(x, y) {
        tile.owner_id = Some(player_id.to_string());
        tile.current_price = price;
    }
    ActionResult::ok_with(
        format!("bought ({x}, {y}) from {seller_id} for ${price}"),
        json!({ "x": x, "y": y, "price": price, "sellerId": seller_id, "sellerReceived": seller_price }),
    )
}

/// True if the tile is open land owned by the actor or a teammate.
pub fn can_build_on_tile(state: &GameState, player_id: &str, x: i32, y: i32) -> bool {
    state
        .interactable_tile(x, y)
        .is_some_and(|t| t.tile_type.is_buildable() && state.owned_by_team(t, player_id))
}

pub fn pay_season_income(state: &mut GameState, config: &GameConfig, at_ms: TimeMs) -> Vec<SimEvent> {
    let amount = config.economy.season_flip_income;
    if amount == 0 {
        return vec![];
    }
    let mut events = Vec::new();
    for player_id in state.player_order.clone() {
        if let Some(player) = state.player_mut(&player_id) {
            player.money += amount;
            events.push(SimEvent::SeasonIncomePaid { at_ms, player_id, amount });
        }
    }
    events
}

/// Ice beyond refrigerated capacity loses `melt_percent` (rounded down).
/// Refrigerated ice and blue ice are immune.
pub fn apply_winter_to_summer_melt(
    state: &mut GameState,
    config: &GameConfig,
    at_ms: TimeMs,
) -> Vec<SimEvent> {
    let economy = &config.economy;
    let mut events = Vec::new();
    for player_id in state.player_order.clone() {
        let Some(player) = state.player_mut(&player_id) else { continue };
        let capacity = player.refrigerators * economy.refrigerator_storage_per_unit;
        let unrefrigerated = player.ice.saturating_sub(capacity);
        let lost = unrefrigerated * Amount::from(economy.melt_percent) / 100;
        if lost == 0 {
            continue;
        }
        player.ice -= lost;
        log::debug!("t={at_ms} economy: {player_id} lost {lost} ice to the melt");
        events.push(SimEvent::IceMelted {
            at_ms,
            player_id,
            lost,
            remaining: player.ice,
        });
    }
    events
}

/// Net worth per player: cash, valued stock, and owned land at its last
/// price plus a flat per-tile premium.
pub fn compute_net_worth(state: &GameState, config: &GameConfig) -> BTreeMap<PlayerId, Amount> {
    let economy = &config.economy;
    let premium = economy.land_control_premium();
    let mut worth: BTreeMap<PlayerId, Amount> = state
        .players
        .values()
        .map(|p| {
            let value = p.money
                + p.ice * economy.regular_ice_value
                + p.blue_ice * economy.blue_ice_value
                + p.refrigerators * economy.refrigerator_value;
            (p.id.clone(), value)
        })
        .collect();
    for tile in &state.tiles {
        if tile.tile_type == TileType::Void {
            continue;
        }
        if let Some(total) = tile.owner_id.as_ref().and_then(|o| worth.get_mut(o)) {
            *total += tile.current_price + premium;
        }
    }
    worth
}

pub struct EconomySubsystem;

impl TickSubsystem for EconomySubsystem {
    fn name(&self) -> &'static str { "economy" }

    fn update(
        &self,
        state: &mut GameState,
        config: &GameConfig,
        events_in: &[SimEvent],
    ) -> SimResult<Vec<SimEvent>> {
        let mut events = Vec::new();
        for event in events_in {
            if let SimEvent::SeasonFlipped { at_ms, from, to, .. } = event {
                events.extend(pay_season_income(state, config, *at_ms));
                if *from == Season::Winter && *to == Season::Summer {
                    events.extend(apply_winter_to_summer_melt(state, config, *at_ms));
                }
            }
        }
        Ok(events)
    }
}
