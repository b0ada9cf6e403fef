//! The event bus: all inter-subsystem communication.
//!
//! RULE: Subsystems communicate ONLY through events.
//! A subsystem may never call another subsystem's functions directly.
//! Each tick pass hands every subsystem the events emitted before it.

use crate::{
    action::ActionSource,
    result::ActionCode,
    state::{CraftKind, MatchEndReason, Season},
    types::{Amount, JobId, PlayerId, RunId, TimeMs},
};
use serde::{Deserialize, Serialize};

/// Every time-driven fact produced during simulation.
/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Season events ──────────────────────────────
    SeasonFlipped {
        at_ms: TimeMs,
        from: Season,
        to: Season,
        flip_count: u64,
        /// True for a vote-driven flip rather than the cycle clock.
        forced: bool,
    },
    SeasonIncomePaid {
        at_ms: TimeMs,
        player_id: PlayerId,
        amount: Amount,
    },
    IceMelted {
        at_ms: TimeMs,
        player_id: PlayerId,
        lost: Amount,
        remaining: Amount,
    },
    TrainYearAdvanced {
        at_ms: TimeMs,
        year: u64,
    },

    // ── Job events ─────────────────────────────────
    PondHarvestClaimable {
        at_ms: TimeMs,
        job_id: JobId,
        owner_id: PlayerId,
    },
    FactoryCraftCompleted {
        at_ms: TimeMs,
        job_id: JobId,
        owner_id: PlayerId,
        kind: CraftKind,
    },

    // ── Match events ───────────────────────────────
    OvertimeStarted {
        at_ms: TimeMs,
        new_duration_ms: TimeMs,
    },
    MatchEnded {
        at_ms: TimeMs,
        winner_id: Option<PlayerId>,
        reason: MatchEndReason,
    },

    // ── Bot events ─────────────────────────────────
    BotActionScheduled {
        at_ms: TimeMs,
        player_id: PlayerId,
        action_type: String,
        execute_at_ms: TimeMs,
    },
    BotActionExecuted {
        at_ms: TimeMs,
        player_id: PlayerId,
        action_type: String,
        code: ActionCode,
    },
}

impl SimEvent {
    /// Stable name used for the event_type column in event_log.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SeasonFlipped { .. } => "season_flipped",
            Self::SeasonIncomePaid { .. } => "season_income_paid",
            Self::IceMelted { .. } => "ice_melted",
            Self::TrainYearAdvanced { .. } => "train_year_advanced",
            Self::PondHarvestClaimable { .. } => "pond_harvest_claimable",
            Self::FactoryCraftCompleted { .. } => "factory_craft_completed",
            Self::OvertimeStarted { .. } => "overtime_started",
            Self::MatchEnded { .. } => "match_ended",
            Self::BotActionScheduled { .. } => "bot_action_scheduled",
            Self::BotActionExecuted { .. } => "bot_action_executed",
        }
    }

    pub fn at_ms(&self) -> TimeMs {
        match self {
            Self::SeasonFlipped { at_ms, .. }
            | Self::SeasonIncomePaid { at_ms, .. }
            | Self::IceMelted { at_ms, .. }
            | Self::TrainYearAdvanced { at_ms, .. }
            | Self::PondHarvestClaimable { at_ms, .. }
            | Self::FactoryCraftCompleted { at_ms, .. }
            | Self::OvertimeStarted { at_ms, .. }
            | Self::MatchEnded { at_ms, .. }
            | Self::BotActionScheduled { at_ms, .. }
            | Self::BotActionExecuted { at_ms, .. } => *at_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionLogKind {
    #[serde(rename = "action.accepted")]
    Accepted,
    #[serde(rename = "action.rejected")]
    Rejected,
    /// Schema failure, kept apart from rule rejections.
    #[serde(rename = "action.invalid")]
    Invalid,
}

impl ActionLogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "action.accepted",
            Self::Rejected => "action.rejected",
            Self::Invalid => "action.invalid",
        }
    }
}

/// One record of the in-state action ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionLogEntry {
    /// Assigned by `ActionLog::push`.
    pub seq: u64,
    pub at_ms: TimeMs,
    pub kind: ActionLogKind,
    pub source: ActionSource,
    /// Empty when the payload did not even carry a player id.
    pub player_id: PlayerId,
    /// Wire tag, or `"unknown"` for unparseable payloads.
    pub action_type: String,
    pub code: ActionCode,
    pub message: String,
    /// The raw action payload as submitted.
    pub payload: serde_json::Value,
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub run_id: RunId,
    pub at_ms: TimeMs,
    pub subsystem: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized SimEvent
}
