//! The game state aggregate.
//!
//! RULE: The engine exclusively owns the single `GameState`.
//! Subsystems receive it by `&mut` for the duration of one call and
//! never keep a copy or alias across calls.
//!
//! All keyed collections are BTreeMaps so iteration, serialization
//! and replays are deterministic.

use crate::{
    action::GameAction,
    event::ActionLogEntry,
    map::SpecialPoint,
    types::{Amount, JobId, PlayerId, TeamId, TimeMs},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

// ── Tiles ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TileType {
    Grass,
    Forest,
    Pond,
    House,
    Factory,
    Train,
    Void,
}

impl TileType {
    /// Structures can only be built on open land.
    pub fn is_buildable(&self) -> bool {
        matches!(self, Self::Grass | Self::Forest)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TileSource {
    MapGenerated,
    PlayerBuilt,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TileState {
    pub x: i32,
    pub y: i32,
    pub tile_type: TileType,
    pub source: TileSource,
    pub owner_id: Option<PlayerId>,
    /// Last price paid for the tile. 0 while unowned.
    pub current_price: Amount,
}

// ── Players ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Controller {
    Human,
    Bot,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerState {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub controller: Controller,
    pub money: Amount,
    pub ice: Amount,
    pub blue_ice: Amount,
    pub refrigerators: Amount,
    pub connected: bool,
    pub ready: bool,
}

// ── Bots ───────────────────────────────────────────────────────────

/// An action chosen by the heuristic, waiting for its reaction delay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingBotAction {
    pub action: GameAction,
    pub execute_at_ms: TimeMs,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotControllerState {
    pub player_id: PlayerId,
    pub next_decision_at_ms: TimeMs,
    pub pending_action: Option<PendingBotAction>,
    /// External-mode cadence gate.
    pub next_allowed_at_ms: TimeMs,
}

// ── Seasons ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Season {
    Summer,
    Winter,
}

impl Season {
    pub fn other(&self) -> Self {
        match self {
            Self::Summer => Self::Winter,
            Self::Winter => Self::Summer,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeasonState {
    pub logic_season: Season,
    pub cycle_start_ms: TimeMs,
    pub cycle_duration_ms: TimeMs,
    pub transition_duration_ms: TimeMs,
    /// 0 outside the trailing transition window, 0..=1 inside it.
    pub transition_progress: f64,
    /// `round(transition_progress * 8)`, for frame lookup.
    pub transition_keyframe_index: u8,
    pub visual_from_season: Season,
    pub visual_to_season: Season,
    pub season_flip_count: u64,
}

impl SeasonState {
    pub fn next_flip_at_ms(&self) -> TimeMs {
        self.cycle_start_ms.saturating_add(self.cycle_duration_ms)
    }
}

// ── Jobs ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PondJobStatus {
    Active,
    Claimable,
    Claimed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PondHarvestJob {
    pub id: JobId,
    pub pond_x: i32,
    pub pond_y: i32,
    pub owner_id: PlayerId,
    pub status: PondJobStatus,
    pub created_at_ms: TimeMs,
    pub claim_at_ms: TimeMs,
    pub claimed_at_ms: Option<TimeMs>,
    pub yield_ice: Amount,
}

impl PondHarvestJob {
    /// Open jobs block a new harvest on the same pond.
    pub fn is_open(&self) -> bool {
        self.status != PondJobStatus::Claimed
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CraftKind {
    Refrigerator,
    BlueIce,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CraftStatus {
    Active,
    Complete,
    Collected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactoryCraftJob {
    pub id: JobId,
    pub owner_id: PlayerId,
    pub x: i32,
    pub y: i32,
    pub kind: CraftKind,
    pub status: CraftStatus,
    pub started_at_ms: TimeMs,
    pub completes_at_ms: TimeMs,
    pub collected_at_ms: Option<TimeMs>,
}

// ── Train and match ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrainSales {
    /// `season_flip_count / 2`.
    pub current_year: u64,
    pub used_by_player_id: BTreeMap<PlayerId, Option<u64>>,
}

impl TrainSales {
    pub fn used_this_year(&self, player_id: &str) -> bool {
        self.used_by_player_id.get(player_id).copied().flatten() == Some(self.current_year)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchEndReason {
    TimeLimit,
    Draw,
    Forfeit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchState {
    pub started_at_ms: TimeMs,
    pub duration_ms: TimeMs,
    pub paused: bool,
    pub ended: bool,
    pub winner_id: Option<PlayerId>,
    pub overtime: bool,
    pub end_reason: Option<MatchEndReason>,
}

impl MatchState {
    pub fn deadline_ms(&self) -> TimeMs {
        self.started_at_ms.saturating_add(self.duration_ms)
    }
}

// ── Action log ─────────────────────────────────────────────────────

/// Bounded ring buffer of action records. Oldest entries are evicted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionLog {
    capacity: usize,
    next_seq: u64,
    entries: VecDeque<ActionLogEntry>,
}

impl ActionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_seq: 1,
            entries: VecDeque::new(),
        }
    }

    /// Assigns the entry its sequence number and appends it.
    pub fn push(&mut self, mut entry: ActionLogEntry) {
        entry.seq = self.next_seq;
        self.next_seq += 1;
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Make the next pushed entry take a seq above `seq`. Never lowers it.
    pub fn resume_after(&mut self, seq: u64) {
        self.next_seq = self.next_seq.max(seq.saturating_add(1));
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn entries(&self) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter()
    }

    /// Entries with `seq > after`, oldest first.
    pub fn since(&self, after: u64) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter().filter(move |e| e.seq > after)
    }

    pub fn last(&self) -> Option<&ActionLogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ── Aggregate ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CameraPosition {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameState {
    pub seed: u64,
    pub now_ms: TimeMs,
    pub width: u32,
    pub height: u32,
    /// Row-major, `width * height` entries.
    pub tiles: Vec<TileState>,
    pub special_points: Vec<SpecialPoint>,
    pub players: BTreeMap<PlayerId, PlayerState>,
    pub player_order: Vec<PlayerId>,
    pub team_by_player_id: BTreeMap<PlayerId, TeamId>,
    pub bots: BTreeMap<PlayerId, BotControllerState>,
    pub season: SeasonState,
    pub ponds: Vec<PondHarvestJob>,
    pub factory_jobs: Vec<FactoryCraftJob>,
    pub train_sales: TrainSales,
    pub summer_skip_votes_by_player_id: BTreeMap<PlayerId, bool>,
    pub match_state: MatchState,
    pub cameras: BTreeMap<PlayerId, CameraPosition>,
    pub selections: BTreeMap<PlayerId, Option<CameraPosition>>,
    pub next_job_seq: u64,
    pub action_log: ActionLog,
}

impl GameState {
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    pub fn tile_index(&self, x: i32, y: i32) -> Option<usize> {
        if !self.in_bounds(x, y) {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn tile(&self, x: i32, y: i32) -> Option<&TileState> {
        self.tile_index(x, y).map(|i| &self.tiles[i])
    }

    pub fn tile_mut(&mut self, x: i32, y: i32) -> Option<&mut TileState> {
        let i = self.tile_index(x, y)?;
        Some(&mut self.tiles[i])
    }

    /// An in-bounds, non-VOID tile: the only kind an action may target.
    pub fn interactable_tile(&self, x: i32, y: i32) -> Option<&TileState> {
        self.tile(x, y).filter(|t| t.tile_type != TileType::Void)
    }

    pub fn player(&self, id: &str) -> Option<&PlayerState> {
        self.players.get(id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut PlayerState> {
        self.players.get_mut(id)
    }

    pub fn team_of<'a>(&'a self, player_id: &'a str) -> &'a str {
        self.team_by_player_id
            .get(player_id)
            .map(String::as_str)
            .unwrap_or(player_id)
    }

    pub fn are_teammates(&self, a: &str, b: &str) -> bool {
        a == b || self.team_of(a) == self.team_of(b)
    }

    /// True when the tile is owned by `player_id` or a teammate.
    pub fn owned_by_team(&self, tile: &TileState, player_id: &str) -> bool {
        tile.owner_id
            .as_deref()
            .is_some_and(|owner| self.are_teammates(owner, player_id))
    }

    /// Teams in first-appearance order of `player_order`, with members.
    pub fn teams(&self) -> Vec<(TeamId, Vec<PlayerId>)> {
        let mut teams: Vec<(TeamId, Vec<PlayerId>)> = Vec::new();
        for player_id in &self.player_order {
            let team = self.team_of(player_id).to_string();
            match teams.iter_mut().find(|(t, _)| *t == team) {
                Some((_, members)) => members.push(player_id.clone()),
                None => teams.push((team, vec![player_id.clone()])),
            }
        }
        teams
    }

    pub fn open_pond_job_at(&self, x: i32, y: i32) -> Option<&PondHarvestJob> {
        self.ponds
            .iter()
            .find(|j| j.pond_x == x && j.pond_y == y && j.is_open())
    }

    pub fn active_craft_at(&self, x: i32, y: i32) -> Option<&FactoryCraftJob> {
        self.factory_jobs
            .iter()
            .find(|j| j.x == x && j.y == y && j.status == CraftStatus::Active)
    }

    /// Allocate the next deterministic job id, e.g. `pond-3`.
    pub fn next_job_id(&mut self, prefix: &str) -> JobId {
        self.next_job_seq += 1;
        format!("{prefix}-{}", self.next_job_seq)
    }

    /// Tiles owned by the player or a teammate, row-major.
    pub fn team_tiles<'a>(&'a self, player_id: &'a str) -> impl Iterator<Item = &'a TileState> + 'a {
        self.tiles
            .iter()
            .filter(move |t| t.tile_type != TileType::Void && self.owned_by_team(t, player_id))
    }
}
