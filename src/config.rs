//! Configuration loading from TOML.
//!
//! Reads `config.toml` (or the path in `DELIBERATION_CONFIG`) and
//! deserializes into strongly-typed sections. Every section has defaults,
//! so an empty file is a valid configuration.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::debate::DebateConfig;
use crate::deliberation::{OrchestratorConfig, RateLimitConfig};
use crate::risk::{
    AssetParams, AssetTable, RiskLimits, SimulationConfig, SimulationSeed, StrategyValidator,
};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "DELIBERATION_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub simulation: SimulationSection,
    pub limits: RiskLimits,
    pub debate: DebateConfig,
    pub orchestrator: OrchestratorConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
    /// Extra or overriding entries for the asset parameter table.
    pub assets: BTreeMap<String, AssetParams>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulationSection {
    pub paths: usize,
    pub horizon_days: usize,
    /// Fixed seed; the built-in default seed is used when absent.
    pub seed: Option<u64>,
    /// Draw a fresh seed per run instead. Overrides `seed`.
    pub entropy: bool,
    pub risk_free_rate: f64,
    /// Parameters for symbols missing from the asset table. Without it
    /// unknown symbols are rejected.
    pub fallback_asset: Option<AssetParams>,
}

impl Default for SimulationSection {
    fn default() -> Self {
        let sim = SimulationConfig::default();
        Self {
            paths: sim.paths,
            horizon_days: sim.horizon_days,
            seed: None,
            entropy: false,
            risk_free_rate: sim.risk_free_rate,
            fallback_asset: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Path from `DELIBERATION_CONFIG`, falling back to `config.toml`.
    pub fn default_path() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Invalid TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.simulation.paths == 0 {
            bail!("simulation.paths must be positive");
        }
        if self.simulation.horizon_days == 0 {
            bail!("simulation.horizon_days must be positive");
        }
        if self.debate.max_rounds == 0 {
            bail!("debate.max_rounds must be at least 1");
        }
        let l = &self.limits;
        for (name, value) in [
            ("limits.max_var_95", l.max_var_95),
            ("limits.max_position", l.max_position),
            ("limits.max_drawdown", l.max_drawdown),
            ("limits.max_stress_loss", l.max_stress_loss),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                bail!("{name} must be within (0, 1], got {value}");
            }
        }
        if !(0.0..=1.0).contains(&l.drawdown_warning_ratio) {
            bail!("limits.drawdown_warning_ratio must be within [0, 1]");
        }
        let threshold = self.orchestrator.material_change_threshold;
        if !(threshold >= 0.0 && threshold < 1.0) {
            bail!("orchestrator.material_change_threshold must be within [0, 1)");
        }
        if self.rate_limit.max_sessions == 0 || self.rate_limit.window_secs == 0 {
            bail!("rate_limit.window_secs and rate_limit.max_sessions must be positive");
        }
        Ok(())
    }

    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            paths: self.simulation.paths,
            horizon_days: self.simulation.horizon_days,
            risk_free_rate: self.simulation.risk_free_rate,
        }
    }

    pub fn seed(&self) -> SimulationSeed {
        match (self.simulation.entropy, self.simulation.seed) {
            (true, _) => SimulationSeed::Entropy,
            (false, Some(seed)) => SimulationSeed::Fixed(seed),
            (false, None) => SimulationSeed::default(),
        }
    }

    /// Built-in asset table with `[assets.*]` entries applied on top.
    pub fn asset_table(&self) -> Result<AssetTable> {
        let mut table = AssetTable::default();
        for (symbol, params) in &self.assets {
            table
                .insert(symbol, *params)
                .with_context(|| format!("Invalid [assets.{symbol}] entry"))?;
        }
        Ok(table)
    }

    pub fn build_validator(&self) -> Result<StrategyValidator> {
        let validator =
            StrategyValidator::new(self.asset_table()?, self.simulation_config(), self.seed());
        Ok(match self.simulation.fallback_asset {
            Some(params) => validator.with_fallback_asset(params),
            None => validator,
        })
    }
}
