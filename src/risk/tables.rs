//! Fixed parameter tables for the risk engine.
//!
//! Annualised return/volatility per asset, named historical stress
//! scenarios, and a long-run reference correlation table. The tables can
//! be extended or overridden from `[assets.*]` config entries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EngineError, Result};
use crate::types::{normalize_symbol, CorrelationMatrix, CASH};

/// Trading days per year used to convert annual figures to daily.
pub const TRADING_DAYS: f64 = 252.0;

// ---------------------------------------------------------------------------
// Asset parameters
// ---------------------------------------------------------------------------

/// Annualised return and volatility for one asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetParams {
    pub annual_return: f64,
    pub annual_volatility: f64,
}

impl AssetParams {
    pub const fn new(annual_return: f64, annual_volatility: f64) -> Self {
        Self {
            annual_return,
            annual_volatility,
        }
    }

    pub fn daily_return(&self) -> f64 {
        self.annual_return / TRADING_DAYS
    }

    pub fn daily_volatility(&self) -> f64 {
        self.annual_volatility / TRADING_DAYS.sqrt()
    }

    fn validate(&self, symbol: &str) -> Result<()> {
        if !self.annual_return.is_finite()
            || !self.annual_volatility.is_finite()
            || self.annual_volatility < 0.0
        {
            return Err(EngineError::InputValidation(format!(
                "invalid parameters for {symbol}: return={} volatility={}",
                self.annual_return, self.annual_volatility
            )));
        }
        Ok(())
    }
}

const DEFAULT_ASSETS: &[(&str, AssetParams)] = &[
    (CASH, AssetParams::new(0.04, 0.0)),
    ("SPY", AssetParams::new(0.10, 0.18)),
    ("VTI", AssetParams::new(0.10, 0.17)),
    ("QQQ", AssetParams::new(0.12, 0.24)),
    ("IWM", AssetParams::new(0.09, 0.22)),
    ("EFA", AssetParams::new(0.07, 0.17)),
    ("VEA", AssetParams::new(0.07, 0.17)),
    ("VWO", AssetParams::new(0.08, 0.22)),
    ("TLT", AssetParams::new(0.04, 0.15)),
    ("IEF", AssetParams::new(0.035, 0.08)),
    ("AGG", AssetParams::new(0.035, 0.05)),
    ("BND", AssetParams::new(0.035, 0.05)),
    ("LQD", AssetParams::new(0.045, 0.08)),
    ("HYG", AssetParams::new(0.05, 0.09)),
    ("GLD", AssetParams::new(0.05, 0.15)),
    ("VNQ", AssetParams::new(0.08, 0.22)),
    ("DBC", AssetParams::new(0.04, 0.18)),
];

/// Per-asset parameter lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetTable {
    params: BTreeMap<String, AssetParams>,
}

impl Default for AssetTable {
    fn default() -> Self {
        Self {
            params: DEFAULT_ASSETS
                .iter()
                .map(|(s, p)| (s.to_string(), *p))
                .collect(),
        }
    }
}

impl AssetTable {
    pub fn empty() -> Self {
        Self {
            params: BTreeMap::new(),
        }
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, symbol: &str, params: AssetParams) -> Result<()> {
        let symbol = normalize_symbol(symbol);
        params.validate(&symbol)?;
        self.params.insert(symbol, params);
        Ok(())
    }

    pub fn get(&self, symbol: &str) -> Option<&AssetParams> {
        self.params.get(&normalize_symbol(symbol))
    }

    /// Lookup that fails with `UnknownAsset` for missing symbols.
    pub fn require(&self, symbol: &str) -> Result<&AssetParams> {
        self.get(symbol)
            .ok_or_else(|| EngineError::UnknownAsset(normalize_symbol(symbol)))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.get(symbol).is_some()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Stress scenarios
// ---------------------------------------------------------------------------

/// A named historical shock: per-asset total return over the episode.
#[derive(Debug, Clone, PartialEq)]
pub struct StressScenario {
    pub name: String,
    pub shocks: BTreeMap<String, f64>,
    pub duration_days: u32,
    pub volatility_multiplier: f64,
}

impl StressScenario {
    pub fn new(name: &str, duration_days: u32, volatility_multiplier: f64) -> Self {
        Self {
            name: name.to_string(),
            shocks: BTreeMap::new(),
            duration_days,
            volatility_multiplier,
        }
    }

    pub fn shock(mut self, symbol: &str, asset_return: f64) -> Self {
        self.shocks.insert(normalize_symbol(symbol), asset_return);
        self
    }

    /// Shock for a symbol; assets the scenario doesn't cover are unaffected.
    pub fn return_for(&self, symbol: &str) -> f64 {
        self.shocks
            .get(&normalize_symbol(symbol))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Built-in historical scenarios.
pub fn default_scenarios() -> Vec<StressScenario> {
    vec![
        StressScenario::new("2008 Financial Crisis", 517, 3.0)
            .shock("SPY", -0.37)
            .shock("VTI", -0.37)
            .shock("QQQ", -0.42)
            .shock("IWM", -0.34)
            .shock("EFA", -0.43)
            .shock("VEA", -0.43)
            .shock("VWO", -0.53)
            .shock("TLT", 0.14)
            .shock("IEF", 0.10)
            .shock("AGG", 0.05)
            .shock("BND", 0.05)
            .shock("LQD", -0.05)
            .shock("HYG", -0.26)
            .shock("GLD", 0.05)
            .shock("VNQ", -0.38)
            .shock("DBC", -0.36),
        StressScenario::new("2020 COVID Crash", 33, 4.0)
            .shock("SPY", -0.34)
            .shock("VTI", -0.35)
            .shock("QQQ", -0.28)
            .shock("IWM", -0.41)
            .shock("EFA", -0.33)
            .shock("VEA", -0.33)
            .shock("VWO", -0.31)
            .shock("TLT", 0.21)
            .shock("IEF", 0.08)
            .shock("AGG", 0.01)
            .shock("BND", 0.01)
            .shock("LQD", -0.13)
            .shock("HYG", -0.20)
            .shock("GLD", -0.03)
            .shock("VNQ", -0.42)
            .shock("DBC", -0.25),
        StressScenario::new("2022 Rate Shock", 282, 1.5)
            .shock("SPY", -0.25)
            .shock("VTI", -0.26)
            .shock("QQQ", -0.35)
            .shock("IWM", -0.27)
            .shock("EFA", -0.27)
            .shock("VEA", -0.27)
            .shock("VWO", -0.29)
            .shock("TLT", -0.31)
            .shock("IEF", -0.15)
            .shock("AGG", -0.17)
            .shock("BND", -0.17)
            .shock("LQD", -0.22)
            .shock("HYG", -0.15)
            .shock("GLD", -0.01)
            .shock("VNQ", -0.30)
            .shock("DBC", 0.19),
        StressScenario::new("2000 Dot-com Bust", 929, 1.8)
            .shock("SPY", -0.49)
            .shock("VTI", -0.47)
            .shock("QQQ", -0.83)
            .shock("IWM", -0.37)
            .shock("EFA", -0.48)
            .shock("VEA", -0.48)
            .shock("TLT", 0.20)
            .shock("IEF", 0.18)
            .shock("AGG", 0.15)
            .shock("BND", 0.15)
            .shock("GLD", 0.12)
            .shock("VNQ", 0.10),
        StressScenario::new("2013 Taper Tantrum", 76, 1.3)
            .shock("SPY", -0.06)
            .shock("VTI", -0.06)
            .shock("QQQ", -0.05)
            .shock("VWO", -0.17)
            .shock("TLT", -0.13)
            .shock("IEF", -0.06)
            .shock("AGG", -0.04)
            .shock("BND", -0.04)
            .shock("LQD", -0.07)
            .shock("HYG", -0.05)
            .shock("GLD", -0.25)
            .shock("VNQ", -0.15),
    ]
}

// ---------------------------------------------------------------------------
// Reference correlations
// ---------------------------------------------------------------------------

const REFERENCE_CORRELATIONS: &[(&str, &str, f64)] = &[
    ("SPY", "VTI", 0.99),
    ("SPY", "QQQ", 0.92),
    ("SPY", "IWM", 0.86),
    ("SPY", "EFA", 0.84),
    ("SPY", "VEA", 0.84),
    ("SPY", "VWO", 0.74),
    ("SPY", "TLT", -0.30),
    ("SPY", "IEF", -0.25),
    ("SPY", "AGG", 0.05),
    ("SPY", "BND", 0.05),
    ("SPY", "LQD", 0.25),
    ("SPY", "HYG", 0.72),
    ("SPY", "GLD", 0.05),
    ("SPY", "VNQ", 0.75),
    ("SPY", "DBC", 0.45),
    ("QQQ", "VTI", 0.93),
    ("QQQ", "IWM", 0.80),
    ("QQQ", "TLT", -0.25),
    ("EFA", "VEA", 0.99),
    ("EFA", "VWO", 0.85),
    ("VEA", "VWO", 0.85),
    ("TLT", "IEF", 0.92),
    ("TLT", "AGG", 0.80),
    ("TLT", "BND", 0.80),
    ("AGG", "BND", 0.98),
    ("AGG", "IEF", 0.90),
    ("AGG", "LQD", 0.82),
    ("LQD", "HYG", 0.55),
    ("TLT", "GLD", 0.20),
    ("GLD", "DBC", 0.35),
    ("VNQ", "IWM", 0.78),
];

/// Long-run reference correlations for the built-in assets.
///
/// These are static estimates, not derived from any return series.
pub fn reference_correlations() -> CorrelationMatrix {
    let mut matrix = CorrelationMatrix::new();
    for (a, b, rho) in REFERENCE_CORRELATIONS {
        // Table entries are compile-time constants within [-1, 1].
        let _ = matrix.set(a, b, *rho);
    }
    matrix
}
