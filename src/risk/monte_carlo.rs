//! Monte Carlo path simulation.
//!
//! Simulates `paths` independent portfolio value paths over
//! `horizon_days` trading days. Each day draws one standard normal per
//! held asset, combines the asset returns by allocation weight and
//! compounds the path value while tracking its peak-to-trough drawdown.
//!
//! Runs are fully determined by (allocation, asset table, config, seed).

use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rand_pcg::Pcg64;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::tables::{AssetTable, TRADING_DAYS};
use crate::error::{EngineError, Result};
use crate::types::{Allocation, SimulationResult};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub paths: usize,
    pub horizon_days: usize,
    /// Annual risk-free rate subtracted in the Sharpe estimate.
    pub risk_free_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            paths: 10_000,
            horizon_days: 252,
            risk_free_rate: 0.0,
        }
    }
}

/// Seed selection. Entropy is opt-in; the chosen seed is always reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationSeed {
    Fixed(u64),
    Entropy,
}

impl Default for SimulationSeed {
    fn default() -> Self {
        SimulationSeed::Fixed(42)
    }
}

impl SimulationSeed {
    pub fn resolve(&self) -> u64 {
        match self {
            SimulationSeed::Fixed(seed) => *seed,
            SimulationSeed::Entropy => rand::random(),
        }
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Daily drift/volatility of one held asset, scaled by its weight.
struct Leg {
    weight: f64,
    daily_return: f64,
    daily_volatility: f64,
}

#[derive(Debug, Clone)]
pub struct MonteCarloSimulator {
    assets: AssetTable,
    config: SimulationConfig,
}

impl MonteCarloSimulator {
    pub fn new(assets: AssetTable, config: SimulationConfig) -> Self {
        Self { assets, config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run the simulation with an explicit seed.
    pub fn simulate(
        &self,
        allocation: &Allocation,
        portfolio_value: Decimal,
        seed: u64,
    ) -> Result<SimulationResult> {
        let SimulationConfig {
            paths,
            horizon_days,
            risk_free_rate,
        } = self.config;

        if paths == 0 || horizon_days == 0 {
            return Err(EngineError::InputValidation(format!(
                "simulation needs at least one path and one day (paths={paths}, days={horizon_days})"
            )));
        }
        let start = portfolio_value
            .to_f64()
            .filter(|v| v.is_finite() && *v > 0.0)
            .ok_or_else(|| {
                EngineError::InputValidation(format!(
                    "portfolio value must be positive, got {portfolio_value}"
                ))
            })?;

        let legs = self.legs(allocation)?;
        let mut rng = Pcg64::seed_from_u64(seed);
        let mut returns = Vec::with_capacity(paths);
        let mut drawdowns = Vec::with_capacity(paths);

        for path in 0..paths {
            let mut value = start;
            let mut peak = start;
            let mut max_drawdown = 0.0_f64;

            for _ in 0..horizon_days {
                let mut daily = 0.0_f64;
                for leg in &legs {
                    let shock = if leg.daily_volatility > 0.0 {
                        let z: f64 = StandardNormal.sample(&mut rng);
                        leg.daily_volatility * z
                    } else {
                        0.0
                    };
                    daily += leg.weight * (leg.daily_return + shock);
                }
                if !daily.is_finite() {
                    return Err(EngineError::SimulationFailure(format!(
                        "path {path} drew a non-finite daily return"
                    )));
                }

                value = (value * (1.0 + daily)).max(0.0);
                if value > peak {
                    peak = value;
                }
                if peak > 0.0 {
                    max_drawdown = max_drawdown.max((peak - value) / peak);
                }
            }

            let path_return = value / start - 1.0;
            if !path_return.is_finite() || !max_drawdown.is_finite() {
                return Err(EngineError::SimulationFailure(format!(
                    "path {path} produced a non-finite value (return={path_return}, drawdown={max_drawdown})"
                )));
            }
            returns.push(path_return);
            drawdowns.push(max_drawdown);
        }

        let result = summarize(
            returns,
            drawdowns,
            risk_free_rate * horizon_days as f64 / TRADING_DAYS,
            horizon_days,
            seed,
        )?;

        info!(
            paths,
            horizon_days,
            seed,
            mean = format!("{:.2}%", result.mean_return * 100.0),
            p5 = format!("{:.2}%", result.percentile_5 * 100.0),
            median_drawdown = format!("{:.2}%", result.max_drawdown_median * 100.0),
            sharpe = format!("{:.2}", result.sharpe_estimate),
            "Monte Carlo simulation complete"
        );

        Ok(result)
    }

    fn legs(&self, allocation: &Allocation) -> Result<Vec<Leg>> {
        let mut legs = Vec::new();
        for (symbol, weight) in allocation.held() {
            let params = self.assets.require(symbol)?;
            debug!(
                symbol,
                weight,
                annual_return = params.annual_return,
                annual_volatility = params.annual_volatility,
                "Simulation leg"
            );
            legs.push(Leg {
                weight,
                daily_return: params.daily_return(),
                daily_volatility: params.daily_volatility(),
            });
        }
        Ok(legs)
    }
}

/// Below this the return spread is summation noise (e.g. all-cash paths).
const MIN_RETURN_STDEV: f64 = 1e-12;

/// Nearest-rank percentile of an ascending-sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let idx = (q * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn summarize(
    mut returns: Vec<f64>,
    mut drawdowns: Vec<f64>,
    horizon_risk_free: f64,
    horizon_days: usize,
    seed: u64,
) -> Result<SimulationResult> {
    let n = returns.len();
    let count = n as f64;

    let mean = returns.iter().sum::<f64>() / count;
    let variance = if n > 1 {
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (count - 1.0)
    } else {
        0.0
    };
    let stdev = variance.sqrt();
    let sharpe = if stdev > MIN_RETURN_STDEV {
        (mean - horizon_risk_free) / stdev
    } else {
        0.0
    };

    let fraction_below = |threshold: f64| returns.iter().filter(|r| **r < threshold).count() as f64 / count;
    let probability_of_loss = fraction_below(0.0);
    let probability_loss_10 = fraction_below(-0.10);
    let probability_loss_20 = fraction_below(-0.20);

    returns.sort_by(f64::total_cmp);
    drawdowns.sort_by(f64::total_cmp);

    let result = SimulationResult {
        mean_return: mean,
        median_return: percentile(&returns, 0.5),
        percentile_5: percentile(&returns, 0.05),
        percentile_95: percentile(&returns, 0.95),
        worst_return: returns[0],
        best_return: returns[n - 1],
        max_drawdown_worst: drawdowns[n - 1],
        max_drawdown_median: percentile(&drawdowns, 0.5),
        probability_of_loss,
        probability_loss_10,
        probability_loss_20,
        sharpe_estimate: sharpe,
        paths: n,
        horizon_days,
        seed,
    };

    if !result.mean_return.is_finite() || !result.sharpe_estimate.is_finite() {
        return Err(EngineError::SimulationFailure(
            "summary statistics are not finite".into(),
        ));
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
