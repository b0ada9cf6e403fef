//! Tunable match parameters.
//!
//! RULE: Config is owned by the caller and never mutated by the core.
//! The engine clones it once at construction.

use crate::{
    error::{SimError, SimResult},
    types::{Amount, TimeMs},
};
use serde::{Deserialize, Serialize};

// ── Economy ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EconomyConfig {
    pub starting_money: Amount,
    pub starting_ice: Amount,
    pub buy_unowned_tile_cost: Amount,
    /// Destroyed on every buyout, never paid to the seller.
    pub buyout_transfer_fee: Amount,
    /// Paid to every player on every season flip.
    pub season_flip_income: Amount,
    pub pond_harvest_cost: Amount,
    pub pond_harvest_yield: Amount,
    pub sell_ice_price: Amount,
    pub sell_blue_ice_price: Amount,
    pub build_factory_money_cost: Amount,
    pub build_factory_ice_cost: Amount,
    pub build_pond_money_cost: Amount,
    pub build_pond_ice_cost: Amount,
    pub factory_craft_money_cost: Amount,
    pub factory_craft_ice_cost: Amount,
    pub train_shipment_ice_cost: Amount,
    pub train_shipment_payout: Amount,
    /// Ice units one refrigerator protects from the summer melt.
    pub refrigerator_storage_per_unit: Amount,
    /// Share of unrefrigerated ice lost on a winter -> summer flip.
    pub melt_percent: u32,
    pub regular_ice_value: Amount,
    pub blue_ice_value: Amount,
    pub refrigerator_value: Amount,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_money: 10,
            starting_ice: 0,
            buy_unowned_tile_cost: 1,
            buyout_transfer_fee: 1,
            season_flip_income: 2,
            pond_harvest_cost: 1,
            pond_harvest_yield: 1,
            sell_ice_price: 2,
            sell_blue_ice_price: 8,
            build_factory_money_cost: 2,
            build_factory_ice_cost: 2,
            build_pond_money_cost: 2,
            build_pond_ice_cost: 1,
            factory_craft_money_cost: 2,
            factory_craft_ice_cost: 2,
            train_shipment_ice_cost: 3,
            train_shipment_payout: 9,
            refrigerator_storage_per_unit: 2,
            melt_percent: 50,
            regular_ice_value: 2,
            blue_ice_value: 8,
            refrigerator_value: 6,
        }
    }
}

impl EconomyConfig {
    /// Per-tile premium added to net worth for every owned tile.
    pub fn land_control_premium(&self) -> Amount {
        self.buy_unowned_tile_cost.max(1)
    }
}

// ── Timing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub season_cycle_duration_ms: TimeMs,
    /// Trailing window of each cycle used for the visual season blend.
    pub season_transition_duration_ms: TimeMs,
    pub pond_harvest_duration_ms: TimeMs,
    pub factory_craft_duration_ms: TimeMs,
    pub starting_season: crate::state::Season,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            season_cycle_duration_ms: 60_000,
            season_transition_duration_ms: 5_000,
            pond_harvest_duration_ms: 10_000,
            factory_craft_duration_ms: 15_000,
            starting_season: crate::state::Season::Summer,
        }
    }
}

// ── Map ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    /// Full grid width including the VOID border ring.
    pub width: u32,
    /// Full grid height including the VOID border ring.
    pub height: u32,
    pub natural_ponds: u32,
    pub houses: u32,
    pub train_depots: u32,
    pub forest_percent: u32,
    /// Minimum Manhattan distance between any two special tiles.
    pub min_special_distance: u32,
    /// Random placement attempts per special tile before the scan fallback.
    pub placement_attempts: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 16,
            height: 12,
            natural_ponds: 3,
            houses: 2,
            train_depots: 1,
            forest_percent: 25,
            min_special_distance: 3,
            placement_attempts: 64,
        }
    }
}

// ── Match ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchConfig {
    pub duration_ms: TimeMs,
    pub overtime_enabled: bool,
    pub overtime_duration_ms: TimeMs,
    /// Pause the match while any human player is disconnected.
    pub pause_on_disconnect: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            duration_ms: 600_000,
            overtime_enabled: true,
            overtime_duration_ms: 60_000,
            pause_on_disconnect: true,
        }
    }
}

// ── Bots ───────────────────────────────────────────────────────────

/// Who decides bot actions. The two pacing mechanisms never run together.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BotMode {
    /// The engine runs the heuristic loop inside `tick`.
    Internal,
    /// An outside process proposes actions; the engine only throttles them.
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BotConfig {
    pub mode: BotMode,
    pub decision_interval_ms: TimeMs,
    pub reaction_delay_ms: TimeMs,
    pub jitter_max_ms: TimeMs,
    pub external_cadence_ms: TimeMs,
    pub max_candidate_actions: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            mode: BotMode::Internal,
            decision_interval_ms: 2_500,
            reaction_delay_ms: 600,
            jitter_max_ms: 400,
            external_cadence_ms: 2_000,
            max_candidate_actions: 24,
        }
    }
}

// ── Observability ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub action_log_capacity: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { action_log_capacity: 500 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    pub economy: EconomyConfig,
    pub timing: TimingConfig,
    pub map: MapConfig,
    #[serde(rename = "match")]
    pub match_rules: MatchConfig,
    pub bots: BotConfig,
    pub log: LogConfig,
}

impl GameConfig {
    /// Load a JSON config file. Missing sections and fields fall back
    /// to their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: GameConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Config with hardcoded defaults for use in tests.
    /// Bots in tests are driven explicitly, so the cadence is external.
    pub fn default_test() -> Self {
        let mut config = Self::default();
        config.bots.mode = BotMode::External;
        config
    }

    pub fn validate(&self) -> SimResult<()> {
        let t = &self.timing;
        if t.season_cycle_duration_ms == 0 {
            return Err(SimError::invalid_config("season_cycle_duration_ms must be > 0"));
        }
        if t.season_transition_duration_ms > t.season_cycle_duration_ms {
            return Err(SimError::invalid_config(
                "season_transition_duration_ms exceeds the cycle duration",
            ));
        }
        if t.pond_harvest_duration_ms == 0 || t.factory_craft_duration_ms == 0 {
            return Err(SimError::invalid_config("job durations must be > 0"));
        }
        if self.bots.decision_interval_ms == 0 {
            return Err(SimError::invalid_config("bots.decision_interval_ms must be > 0"));
        }
        if self.match_rules.overtime_enabled && self.match_rules.overtime_duration_ms == 0 {
            return Err(SimError::invalid_config(
                "overtime_duration_ms must be > 0 when overtime is enabled",
            ));
        }
        if self.map.width < 3 || self.map.height < 3 {
            return Err(SimError::invalid_config("map must be at least 3x3 to hold a border ring"));
        }
        let interior = u64::from(self.map.width - 2) * u64::from(self.map.height - 2);
        let specials = u64::from(self.map.natural_ponds + self.map.houses + self.map.train_depots);
        if specials > interior {
            return Err(SimError::invalid_config(format!(
                "{specials} special tiles do not fit in {interior} interior tiles"
            )));
        }
        if self.economy.melt_percent > 100 {
            return Err(SimError::invalid_config("melt_percent must be <= 100"));
        }
        if self.log.action_log_capacity == 0 {
            return Err(SimError::invalid_config("action_log_capacity must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, content: &str) -> String {
        let path = std::env::temp_dir().join(format!("floe-config-{}-{name}.json", std::process::id()));
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn defaults_are_valid() {
        assert!(GameConfig::default().validate().is_ok());
        assert_eq!(GameConfig::default_test().bots.mode, BotMode::External);
    }

    #[test]
    fn json_uses_the_match_section_name() {
        let mut config = GameConfig::default();
        config.match_rules.duration_ms = 42_000;
        config.bots.mode = BotMode::External;
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["match"]["duration_ms"], 42_000);
        assert_eq!(json["bots"]["mode"], "external");
        let back: GameConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let path = write_temp(
            "partial",
            r#"{"economy": {"starting_money": 25}, "match": {"duration_ms": 1000}, "bots": {"mode": "external"}}"#,
        );
        let config = GameConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.economy.starting_money, 25);
        assert_eq!(config.economy.season_flip_income, 2);
        assert_eq!(config.match_rules.duration_ms, 1000);
        assert!(config.match_rules.overtime_enabled);
        assert_eq!(config.bots.mode, BotMode::External);
        assert_eq!(config.timing, TimingConfig::default());
    }

    #[test]
    fn load_reports_unreadable_and_invalid_files() {
        let err = GameConfig::load("/nonexistent/floe.json").unwrap_err();
        assert!(err.to_string().contains("Cannot read"));

        let path = write_temp("garbage", "{ not json");
        let err = GameConfig::load(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(err.to_string().contains("Cannot parse"));

        let path = write_temp("bad", r#"{"economy": {"melt_percent": 150}}"#);
        let err = GameConfig::load(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(err.to_string().contains("melt_percent"));
    }

    #[test]
    fn validate_rejects_impossible_timing_and_maps() {
        let mut config = GameConfig::default();
        config.timing.season_transition_duration_ms = config.timing.season_cycle_duration_ms + 1;
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig { .. })));

        let mut config = GameConfig::default();
        config.map.width = 4;
        config.map.height = 4;
        config.map.natural_ponds = 5;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.match_rules.overtime_duration_ms = 0;
        assert!(config.validate().is_err());
        config.match_rules.overtime_enabled = false;
        assert!(config.validate().is_ok());
    }
}
