//! Structure subsystem: building on land, house sales, train shipments.
//!
//! Houses buy ice only in SUMMER. The train depot takes one shipment per
//! player per year, where a year is two season flips.
//!
//! Tick role: reacts to SeasonFlipped by advancing the train year.

use crate::{
    config::GameConfig,
    economy_subsystem::can_build_on_tile,
    error::SimResult,
    event::SimEvent,
    result::{invalid_tile, unknown_player, ActionCode, ActionResult},
    state::{GameState, Season, TileSource, TileType},
    subsystem::TickSubsystem,
    types::Amount,
};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    Factory,
    ManMadePond,
}

impl BuildKind {
    fn tile_type(&self) -> TileType {
        match self {
            Self::Factory => TileType::Factory,
            Self::ManMadePond => TileType::Pond,
        }
    }

    fn costs(&self, config: &GameConfig) -> (Amount, Amount) {
        let e = &config.economy;
        match self {
            Self::Factory => (e.build_factory_money_cost, e.build_factory_ice_cost),
            Self::ManMadePond => (e.build_pond_money_cost, e.build_pond_ice_cost),
        }
    }
}

pub fn build_structure(
    state: &mut GameState,
    config: &GameConfig,
    player_id: &str,
    x: i32,
    y: i32,
    kind: BuildKind,
) -> ActionResult {
    let Some(tile) = state.interactable_tile(x, y) else {
        return invalid_tile(x, y);
    };
    if !state.owned_by_team(tile, player_id) {
        return ActionResult::fail(ActionCode::NotOwner, format!("you do not own ({x}, {y})"));
    }
    if !can_build_on_tile(state, player_id, x, y) {
        return ActionResult::fail(
            ActionCode::InvalidTile,
            format!("cannot build on {:?} at ({x}, {y})", tile.tile_type),
        );
    }
    let (money_cost, ice_cost) = kind.costs(config);
    let Some(player) = state.player(player_id) else {
        return unknown_player(player_id);
    };
    if player.money < money_cost {
        return ActionResult::fail(
            ActionCode::InsufficientFunds,
            format!("building costs ${money_cost}, you have ${}", player.money),
        );
    }
    if player.ice < ice_cost {
        return ActionResult::fail(
            ActionCode::InsufficientIce,
            format!("building needs {ice_cost} ice, you have {}", player.ice),
        );
    }

    if let Some(player) = state.player_mut(player_id) {
        player.money -= money_cost;
        player.ice -= ice_cost;
    }
    if let Some(tile) = state.tile_mut(x, y) {
        tile.tile_type = kind.tile_type();
        tile.source = TileSource::PlayerBuilt;
    }
    ActionResult::ok_with(
        format!("built {kind:?} at ({x}, {y})"),
        json!({ "x": x, "y": y, "tileType": kind.tile_type() }),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceGrade {
    Regular,
    Blue,
}

/// Sell ice at an owned house. SUMMER only.
pub fn sell_at_house(
    state: &mut GameState,
    config: &GameConfig,
    player_id: &str,
    x: i32,
    y: i32,
    quantity: Amount,
    grade: IceGrade,
) -> ActionResult {
    if quantity == 0 {
        return ActionResult::fail(ActionCode::InvalidAction, "quantity must be > 0");
    }
    let Some(tile) = state.interactable_tile(x, y) else {
        return invalid_tile(x, y);
    };
    if tile.tile_type != TileType::House {
        return ActionResult::fail(ActionCode::InvalidTile, format!("({x}, {y}) is not a house"));
    }
    if !state.owned_by_team(tile, player_id) {
        return ActionResult::fail(ActionCode::NotOwner, format!("you do not own the house at ({x}, {y})"));
    }
    if state.season.logic_season != Season::Summer {
        return ActionResult::fail(ActionCode::WrongSeason, "houses only buy ice in summer");
    }
    let Some(player) = state.player(player_id) else {
        return unknown_player(player_id);
    };
    let (held, unit_price) = match grade {
        IceGrade::Regular => (player.ice, config.economy.sell_ice_price),
        IceGrade::Blue => (player.blue_ice, config.economy.sell_blue_ice_price),
    };
    if held < quantity {
        return ActionResult::fail(
            ActionCode::InsufficientIce,
            format!("selling {quantity} but holding {held}"),
        );
    }

    let revenue = quantity * unit_price;
    if let Some(player) = state.player_mut(player_id) {
        match grade {
            IceGrade::Regular => player.ice -= quantity,
            IceGrade::Blue => player.blue_ice -= quantity,
        }
        player.money += revenue;
    }
    ActionResult::ok_with(
        format!("sold {quantity} {grade:?} ice for ${revenue}"),
        json!({ "quantity": quantity, "revenue": revenue }),
    )
}

/// The once-a-year train shipment: a fixed bundle of ice for a fixed payout.
pub fn sell_annual_shipment(
    state: &mut GameState,
    config: &GameConfig,
    player_id: &str,
    x: i32,
    y: i32,
) -> ActionResult {
    let Some(tile) = state.interactable_tile(x, y) else {
        return invalid_tile(x, y);
    };
    if tile.tile_type != TileType::Train {
        return ActionResult::fail(ActionCode::InvalidTile, format!("({x}, {y}) is not a train depot"));
    }
    if !state.owned_by_team(tile, player_id) {
        return ActionResult::fail(ActionCode::NotOwner, format!("you do not own the depot at ({x}, {y})"));
    }
    if state.train_sales.used_this_year(player_id) {
        return ActionResult::fail(
            ActionCode::LimitReached,
            format!("already shipped in year {}", state.train_sales.current_year),
        );
    }
    let ice_cost = config.economy.train_shipment_ice_cost;
    let payout = config.economy.train_shipment_payout;
    let Some(player) = state.player(player_id) else {
        return unknown_player(player_id);
    };
    if player.ice < ice_cost {
        return ActionResult::fail(
            ActionCode::InsufficientIce,
            format!("shipment needs {ice_cost} ice, you have {}", player.ice),
        );
    }

    if let Some(player) = state.player_mut(player_id) {
        player.ice -= ice_cost;
        player.money += payout;
    }
    let year = state.train_sales.current_year;
    state
        .train_sales
        .used_by_player_id
        .insert(player_id.to_string(), Some(year));
    ActionResult::ok_with(
        format!("shipped {ice_cost} ice for ${payout}"),
        json!({ "year": year, "payout": payout }),
    )
}

pub struct StructureSubsystem;

impl TickSubsystem for StructureSubsystem {
    fn name(&self) -> &'static str { "structure" }

    fn update(
        &self,
        state: &mut GameState,
        _config: &GameConfig,
        events_in: &[SimEvent],
    ) -> SimResult<Vec<SimEvent>> {
        let mut events = Vec::new();
        for event in events_in {
            if let SimEvent::SeasonFlipped { at_ms, flip_count, .. } = event {
                let year = flip_count / 2;
                if year != state.train_sales.current_year {
                    state.train_sales.current_year = year;
                    log::debug!("t={at_ms} structure: train year {year}");
                    events.push(SimEvent::TrainYearAdvanced { at_ms: *at_ms, year });
                }
            }
        }
        Ok(events)
    }
}
