//! Snapshot serialization: full match state to/from JSON.
//!
//! With a recorder attached, a snapshot is taken at every season flip.
//! It captures everything needed to resume the match through
//! `GameEngine::replace_state` without replaying from time 0.

use crate::{
    error::SimResult,
    state::GameState,
    types::{RunId, TimeMs},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameSnapshot {
    pub run_id: Option<RunId>,
    pub now_ms: TimeMs,
    pub state: GameState,
}

impl GameSnapshot {
    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
