//! Strategy validation against configurable risk limits.
//!
//! Runs VaR, stress test, concentration, correlation and Monte Carlo for a
//! proposed allocation, then applies ordered limit checks. Hard
//! violations reject the allocation; soft ones downgrade it to a warning.
//! Every triggered reason is appended to the assessment.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::metrics::RiskMetricsEngine;
use super::monte_carlo::{MonteCarloSimulator, SimulationConfig, SimulationSeed};
use super::tables::{AssetParams, AssetTable};
use crate::error::{EngineError, Result};
use crate::types::{
    Allocation, PortfolioContext, RiskAssessment, SimulationResult, StressReport, Verdict,
    WEIGHT_EPSILON,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Risk limits (defaults match the conservative house policy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Maximum one-day VaR95 as a fraction of portfolio value.
    pub max_var_95: f64,
    /// Maximum weight of any single non-cash position.
    pub max_position: f64,
    /// Maximum median simulated drawdown.
    pub max_drawdown: f64,
    /// Fraction of `max_drawdown` at which a warning is raised.
    pub drawdown_warning_ratio: f64,
    pub min_sharpe: f64,
    /// Reject if any stress scenario loses more than this fraction.
    pub max_stress_loss: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_var_95: 0.05,
            max_position: 0.25,
            max_drawdown: 0.20,
            drawdown_warning_ratio: 0.8,
            min_sharpe: 0.5,
            max_stress_loss: 0.30,
        }
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Pure function of its inputs: no state survives a `validate` call.
#[derive(Debug, Clone)]
pub struct StrategyValidator {
    metrics: RiskMetricsEngine,
    simulator: MonteCarloSimulator,
    seed: SimulationSeed,
    /// Parameters used for symbols missing from the asset table.
    fallback_asset: Option<AssetParams>,
}

impl Default for StrategyValidator {
    fn default() -> Self {
        Self::new(
            AssetTable::default(),
            SimulationConfig::default(),
            SimulationSeed::default(),
        )
    }
}

impl StrategyValidator {
    pub fn new(assets: AssetTable, simulation: SimulationConfig, seed: SimulationSeed) -> Self {
        Self {
            metrics: RiskMetricsEngine::new(assets.clone()),
            simulator: MonteCarloSimulator::new(assets, simulation),
            seed,
            fallback_asset: None,
        }
    }

    pub fn with_fallback_asset(mut self, params: AssetParams) -> Self {
        self.fallback_asset = Some(params);
        self
    }

    pub fn with_metrics(mut self, metrics: RiskMetricsEngine) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &RiskMetricsEngine {
        &self.metrics
    }

    /// Validate an allocation and produce an immutable assessment.
    ///
    /// Fails only on input problems (unknown assets without a fallback).
    /// A simulation failure yields a conservative rejected assessment
    /// with `simulation_failed` set.
    pub fn validate(
        &self,
        allocation: &Allocation,
        portfolio: &PortfolioContext,
        limits: &RiskLimits,
    ) -> Result<RiskAssessment> {
        let owned;
        let (metrics, simulator) = match self.extended_for(allocation)? {
            Some(extended) => {
                owned = extended;
                (&owned.metrics, &owned.simulator)
            }
            None => (&self.metrics, &self.simulator),
        };

        let value = portfolio.total_value;
        let var = metrics.value_at_risk(allocation, value, portfolio.regime)?;
        let stress = metrics.stress_test(allocation, value);
        let concentration = RiskMetricsEngine::concentration(allocation);
        let correlation = metrics.correlation_risk(allocation, portfolio.correlations.as_ref());

        let simulation = match simulator.simulate(allocation, value, self.seed.resolve()) {
            Ok(sim) => Some(sim),
            Err(EngineError::SimulationFailure(msg)) => {
                warn!(error = %msg, "Simulation failed, using conservative assessment");
                let mut reasons = vec![format!(
                    "Monte Carlo simulation failed ({msg}); treating allocation as unsafe"
                )];
                reasons.extend(Self::hard_violations(allocation, var.var_95, &stress, limits));
                return Ok(RiskAssessment {
                    var,
                    stress,
                    concentration,
                    correlation,
                    simulation: None,
                    risk_score: 1.0,
                    verdict: Verdict::Rejected,
                    reasons,
                    simulation_failed: true,
                    assessed_at: Utc::now(),
                });
            }
            Err(other) => return Err(other),
        };

        let hard = Self::hard_violations(allocation, var.var_95, &stress, limits);
        let soft = simulation
            .as_ref()
            .map(|sim| Self::soft_violations(sim, limits))
            .unwrap_or_default();

        let verdict = if !hard.is_empty() {
            Verdict::Rejected
        } else if !soft.is_empty() {
            Verdict::Warning
        } else {
            Verdict::Approved
        };

        let drawdown = simulation.as_ref().map_or(1.0, |s| s.max_drawdown_median);
        let risk_score = RiskMetricsEngine::composite_score(
            var.var_95,
            drawdown,
            correlation.score,
            concentration.max_position,
        );

        let mut reasons = hard;
        reasons.extend(soft);

        info!(
            verdict = %verdict,
            var_95 = format!("{:.2}%", var.var_95 * 100.0),
            max_position = format!("{:.1}%", concentration.max_position * 100.0),
            risk_score = format!("{:.3}", risk_score),
            reasons = reasons.len(),
            "Allocation validated"
        );

        Ok(RiskAssessment {
            var,
            stress,
            concentration,
            correlation,
            simulation,
            risk_score,
            verdict,
            reasons,
            simulation_failed: false,
            assessed_at: Utc::now(),
        })
    }

    /// Copy of this validator whose tables cover every held symbol of
    /// `allocation`, or `None` if no extension is needed.
    fn extended_for(&self, allocation: &Allocation) -> Result<Option<StrategyValidator>> {
        let missing: Vec<&str> = allocation
            .held()
            .map(|(s, _)| s)
            .filter(|s| !self.metrics.assets().contains(s))
            .collect();
        if missing.is_empty() {
            return Ok(None);
        }
        let Some(fallback) = self.fallback_asset else {
            return Err(EngineError::UnknownAsset(missing.join(", ")));
        };

        let mut assets = self.metrics.assets().clone();
        for symbol in &missing {
            warn!(symbol, "No parameters for asset, using fallback");
            assets.insert(symbol, fallback)?;
        }
        let scenarios = self.metrics.scenarios().to_vec();
        Ok(Some(StrategyValidator {
            metrics: RiskMetricsEngine::new(assets.clone()).with_scenarios(scenarios),
            simulator: MonteCarloSimulator::new(assets, self.simulator.config().clone()),
            seed: self.seed,
            fallback_asset: self.fallback_asset,
        }))
    }

    fn hard_violations(
        allocation: &Allocation,
        var_95: f64,
        stress: &StressReport,
        limits: &RiskLimits,
    ) -> Vec<String> {
        let mut reasons = Vec::new();

        if var_95 > limits.max_var_95 {
            reasons.push(format!(
                "VaR95 of {:.2}% exceeds limit of {:.2}%",
                var_95 * 100.0,
                limits.max_var_95 * 100.0
            ));
        }

        for (symbol, weight) in allocation.risky() {
            if weight > limits.max_position + WEIGHT_EPSILON {
                reasons.push(format!(
                    "Position limit exceeded: {symbol} at {:.1}% (limit {:.1}%)",
                    weight * 100.0,
                    limits.max_position * 100.0
                ));
            }
        }

        for result in &stress.results {
            if result.portfolio_return < -limits.max_stress_loss {
                reasons.push(format!(
                    "Stress scenario '{}' loss of {:.1}% breaches -{:.1}% floor",
                    result.scenario,
                    result.portfolio_return * 100.0,
                    limits.max_stress_loss * 100.0
                ));
            }
        }

        reasons
    }

    fn soft_violations(sim: &SimulationResult, limits: &RiskLimits) -> Vec<String> {
        let mut reasons = Vec::new();

        let drawdown = sim.max_drawdown_median;
        if drawdown > limits.max_drawdown {
            reasons.push(format!(
                "Median max drawdown of {:.1}% exceeds the {:.1}% limit",
                drawdown * 100.0,
                limits.max_drawdown * 100.0
            ));
        } else if drawdown >= limits.max_drawdown * limits.drawdown_warning_ratio {
            reasons.push(format!(
                "Median max drawdown of {:.1}% is near the {:.1}% limit",
                drawdown * 100.0,
                limits.max_drawdown * 100.0
            ));
        }

        if sim.sharpe_estimate < limits.min_sharpe {
            reasons.push(format!(
                "Sharpe estimate {:.2} below minimum {:.2}",
                sim.sharpe_estimate, limits.min_sharpe
            ));
        }

        reasons
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
