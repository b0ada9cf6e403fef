//! The action protocol: the only way outside code mutates a match.
//!
//! RULE: Every variant carries `player_id`. The dispatcher in engine.rs
//! matches this enum exhaustively, so adding a variant is a compile error
//! everywhere it still has to be handled.
//!
//! Wire form: `{"type": "tile.buy", "playerId": "p1", "x": 3, "y": 4}`.

use crate::types::{JobId, PlayerId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameAction {
    // ── Land ──────────────────────────────────────
    #[serde(rename = "tile.buy", rename_all = "camelCase")]
    TileBuy { player_id: PlayerId, x: i32, y: i32 },
    #[serde(rename = "tile.buyFromPlayer", rename_all = "camelCase")]
    TileBuyFromPlayer { player_id: PlayerId, x: i32, y: i32 },
    #[serde(rename = "tile.buildFactory", rename_all = "camelCase")]
    BuildFactory { player_id: PlayerId, x: i32, y: i32 },
    #[serde(rename = "tile.buildManMadePond", rename_all = "camelCase")]
    BuildManMadePond { player_id: PlayerId, x: i32, y: i32 },

    // ── Ponds ─────────────────────────────────────
    #[serde(rename = "pond.harvest.start", rename_all = "camelCase")]
    PondHarvestStart { player_id: PlayerId, x: i32, y: i32 },
    #[serde(rename = "pond.harvest.claim", rename_all = "camelCase")]
    PondHarvestClaim { player_id: PlayerId, pond_job_id: JobId },

    // ── Structures ────────────────────────────────
    #[serde(rename = "structure.house.sellIce", rename_all = "camelCase")]
    SellIce { player_id: PlayerId, x: i32, y: i32, quantity: u64 },
    #[serde(rename = "structure.house.sellBlueIce", rename_all = "camelCase")]
    SellBlueIce { player_id: PlayerId, x: i32, y: i32, quantity: u64 },
    #[serde(rename = "structure.factory.craftRefrigerator", rename_all = "camelCase")]
    CraftRefrigerator { player_id: PlayerId, x: i32, y: i32 },
    #[serde(rename = "structure.factory.craftBlueIce", rename_all = "camelCase")]
    CraftBlueIce { player_id: PlayerId, x: i32, y: i32 },
    #[serde(rename = "structure.train.sellAnnualShipment", rename_all = "camelCase")]
    SellAnnualShipment { player_id: PlayerId, x: i32, y: i32 },

    // ── Match ─────────────────────────────────────
    #[serde(rename = "season.skipSummerVote", rename_all = "camelCase")]
    SkipSummerVote { player_id: PlayerId },
    #[serde(rename = "player.forfeit", rename_all = "camelCase")]
    Forfeit { player_id: PlayerId },

    // ── Presentation bookkeeping ──────────────────
    #[serde(rename = "camera.move", rename_all = "camelCase")]
    CameraMove { player_id: PlayerId, x: i32, y: i32 },
    #[serde(rename = "tile.select", rename_all = "camelCase")]
    TileSelect { player_id: PlayerId, x: i32, y: i32 },
}

/// Who submitted an action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionSource {
    Player,
    Bot,
}

impl ActionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "PLAYER",
            Self::Bot => "BOT",
        }
    }
}

impl GameAction {
    /// Schema validation of a raw payload. Structural errors, an empty
    /// `playerId` and zero quantities are all schema failures.
    pub fn parse(raw: &serde_json::Value) -> Result<Self, String> {
        let action: GameAction =
            serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;
        action.validate()?;
        Ok(action)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.player_id().trim().is_empty() {
            return Err("playerId must not be empty".into());
        }
        match self {
            Self::SellIce { quantity, .. } | Self::SellBlueIce { quantity, .. } if *quantity == 0 => {
                Err("quantity must be > 0".into())
            }
            Self::PondHarvestClaim { pond_job_id, .. } if pond_job_id.is_empty() => {
                Err("pondJobId must not be empty".into())
            }
            _ => Ok(()),
        }
    }

    pub fn player_id(&self) -> &str {
        match self {
            Self::TileBuy { player_id, .. }
            | Self::TileBuyFromPlayer { player_id, .. }
            | Self::BuildFactory { player_id, .. }
            | Self::BuildManMadePond { player_id, .. }
            | Self::PondHarvestStart { player_id, .. }
            | Self::PondHarvestClaim { player_id, .. }
            | Self::SellIce { player_id, .. }
            | Self::SellBlueIce { player_id, .. }
            | Self::CraftRefrigerator { player_id, .. }
            | Self::CraftBlueIce { player_id, .. }
            | Self::SellAnnualShipment { player_id, .. }
            | Self::SkipSummerVote { player_id }
            | Self::Forfeit { player_id }
            | Self::CameraMove { player_id, .. }
            | Self::TileSelect { player_id, .. } => player_id,
        }
    }

    /// The wire tag, e.g. `"tile.buy"`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::TileBuy { .. } => "tile.buy",
            Self::TileBuyFromPlayer { .. } => "tile.buyFromPlayer",
            Self::BuildFactory { .. } => "tile.buildFactory",
            Self::BuildManMadePond { .. } => "tile.buildManMadePond",
            Self::PondHarvestStart { .. } => "pond.harvest.start",
            Self::PondHarvestClaim { .. } => "pond.harvest.claim",
            Self::SellIce { .. } => "structure.house.sellIce",
            Self::SellBlueIce { .. } => "structure.house.sellBlueIce",
            Self::CraftRefrigerator { .. } => "structure.factory.craftRefrigerator",
            Self::CraftBlueIce { .. } => "structure.factory.craftBlueIce",
            Self::SellAnnualShipment { .. } => "structure.train.sellAnnualShipment",
            Self::SkipSummerVote { .. } => "season.skipSummerVote",
            Self::Forfeit { .. } => "player.forfeit",
            Self::CameraMove { .. } => "camera.move",
            Self::TileSelect { .. } => "tile.select",
        }
    }

    /// Camera and selection stay usable after the match has ended.
    pub fn is_gameplay(&self) -> bool {
        !matches!(self, Self::CameraMove { .. } | Self::TileSelect { .. })
    }

    /// Stable serialized form, used to deduplicate bot candidates.
    pub fn dedup_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}
