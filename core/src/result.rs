//! The result protocol returned by every action.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionCode {
    Ok,
    InvalidPlayer,
    InvalidTile,
    NotOwner,
    AlreadyOwner,
    InsufficientFunds,
    InsufficientIce,
    InvalidAction,
    WrongSeason,
    AlreadyActive,
    NotClaimable,
    LimitReached,
    MatchEnded,
}

impl ActionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::InvalidPlayer => "INVALID_PLAYER",
            Self::InvalidTile => "INVALID_TILE",
            Self::NotOwner => "NOT_OWNER",
            Self::AlreadyOwner => "ALREADY_OWNER",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::InsufficientIce => "INSUFFICIENT_ICE",
            Self::InvalidAction => "INVALID_ACTION",
            Self::WrongSeason => "WRONG_SEASON",
            Self::AlreadyActive => "ALREADY_ACTIVE",
            Self::NotClaimable => "NOT_CLAIMABLE",
            Self::LimitReached => "LIMIT_REACHED",
            Self::MatchEnded => "MATCH_ENDED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionResult {
    pub ok: bool,
    pub code: ActionCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            code: ActionCode::Ok,
            message: message.into(),
            payload: None,
        }
    }

    pub fn ok_with(message: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            payload: Some(payload),
            ..Self::ok(message)
        }
    }

    pub fn fail(code: ActionCode, message: impl Into<String>) -> Self {
        debug_assert!(code != ActionCode::Ok, "fail() called with OK");
        Self {
            ok: false,
            code,
            message: message.into(),
            payload: None,
        }
    }
}

pub(crate) fn invalid_tile(x: i32, y: i32) -> ActionResult {
    ActionResult::fail(
        ActionCode::InvalidTile,
        format!("({x}, {y}) is outside the playable grid"),
    )
}

pub(crate) fn unknown_player(player_id: &str) -> ActionResult {
    ActionResult::fail(ActionCode::InvalidPlayer, format!("unknown player {player_id}"))
}
