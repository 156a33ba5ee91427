//! Parametric risk metrics.
//!
//! VaR/CVaR under a normal-tail, independent-asset model, historical
//! stress replay, concentration and correlation analysis, and the
//! composite risk score.

use rust_decimal::prelude::*;
use tracing::debug;

use super::tables::{default_scenarios, reference_correlations, AssetTable, StressScenario};
use crate::error::Result;
use crate::types::{
    Allocation, ConcentrationLevel, ConcentrationMetrics, CorrelatedPair, CorrelationMatrix,
    CorrelationReport, CorrelationSource, MarketRegime, StressReport, StressResult,
    StressSeverity, VarMetrics, WEIGHT_EPSILON,
};

/// One-sided normal quantile at 95%.
pub const Z_95: f64 = 1.645;
/// One-sided normal quantile at 99%.
pub const Z_99: f64 = 2.326;
/// Expected shortfall multiplier at 95% for a normal tail.
pub const CVAR_95_FACTOR: f64 = 2.063;

/// Pairs above this correlation are flagged.
pub const CORRELATION_FLAG_THRESHOLD: f64 = 0.85;

pub const HIGH_CONCENTRATION: f64 = 0.40;
pub const MEDIUM_CONCENTRATION: f64 = 0.25;

mod score {
    pub const VAR_WEIGHT: f64 = 0.35;
    pub const DRAWDOWN_WEIGHT: f64 = 0.35;
    pub const CORRELATION_WEIGHT: f64 = 0.15;
    pub const CONCENTRATION_WEIGHT: f64 = 0.15;

    pub const VAR_SCALE: f64 = 0.05;
    pub const DRAWDOWN_SCALE: f64 = 0.30;
    pub const CONCENTRATION_SCALE: f64 = 0.40;
}

/// Stateless calculator over fixed parameter tables.
#[derive(Debug, Clone)]
pub struct RiskMetricsEngine {
    assets: AssetTable,
    scenarios: Vec<StressScenario>,
    reference: CorrelationMatrix,
}

impl Default for RiskMetricsEngine {
    fn default() -> Self {
        Self::new(AssetTable::default())
    }
}

impl RiskMetricsEngine {
    pub fn new(assets: AssetTable) -> Self {
        Self {
            assets,
            scenarios: default_scenarios(),
            reference: reference_correlations(),
        }
    }

    pub fn with_scenarios(mut self, scenarios: Vec<StressScenario>) -> Self {
        self.scenarios = scenarios;
        self
    }

    pub fn assets(&self) -> &AssetTable {
        &self.assets
    }

    pub fn scenarios(&self) -> &[StressScenario] {
        &self.scenarios
    }

    /// Daily VaR/CVaR for an allocation.
    ///
    /// σ = sqrt(Σ (wᵢ·σᵢ)²) × regime multiplier, assuming independent
    /// assets. Fails with `UnknownAsset` if a held symbol has no parameters.
    pub fn value_at_risk(
        &self,
        allocation: &Allocation,
        portfolio_value: Decimal,
        regime: MarketRegime,
    ) -> Result<VarMetrics> {
        let mut variance = 0.0_f64;
        for (symbol, weight) in allocation.held() {
            let params = self.assets.require(symbol)?;
            let contribution = weight * params.daily_volatility();
            variance += contribution * contribution;
        }
        let volatility = variance.sqrt() * regime.multiplier();

        let var_95 = Z_95 * volatility;
        let var_99 = Z_99 * volatility;
        let cvar_95 = CVAR_95_FACTOR * volatility;

        debug!(
            regime = %regime,
            volatility = format!("{:.4}%", volatility * 100.0),
            var_95 = format!("{:.3}%", var_95 * 100.0),
            "VaR computed"
        );

        Ok(VarMetrics {
            volatility,
            var_95,
            var_99,
            cvar_95,
            var_95_amount: amount(portfolio_value, var_95),
            var_99_amount: amount(portfolio_value, var_99),
            cvar_95_amount: amount(portfolio_value, cvar_95),
            regime,
        })
    }

    /// Replay every historical scenario against the allocation.
    pub fn stress_test(&self, allocation: &Allocation, portfolio_value: Decimal) -> StressReport {
        let mut results = Vec::with_capacity(self.scenarios.len());
        let mut worst: Option<(f64, &str)> = None;

        for scenario in &self.scenarios {
            let portfolio_return: f64 = allocation
                .iter()
                .map(|(symbol, weight)| weight * scenario.return_for(symbol))
                .sum();

            if worst.map_or(true, |(r, _)| portfolio_return < r) {
                worst = Some((portfolio_return, scenario.name.as_str()));
            }

            results.push(StressResult {
                scenario: scenario.name.clone(),
                portfolio_return,
                loss: amount(portfolio_value, -portfolio_return),
                duration_days: scenario.duration_days,
                volatility_multiplier: scenario.volatility_multiplier,
                severity: StressSeverity::from_return(portfolio_return),
            });
        }

        StressReport {
            results,
            worst_scenario: worst.map(|(_, name)| name.to_string()),
        }
    }

    /// Position concentration over risky (non-cash) holdings.
    pub fn concentration(allocation: &Allocation) -> ConcentrationMetrics {
        let mut risky: Vec<(&str, f64)> = allocation.risky().collect();
        risky.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });

        let max_position = risky.first().map_or(0.0, |(_, w)| *w);
        let top3 = risky.iter().take(3).map(|(_, w)| w).sum();
        let herfindahl = risky.iter().map(|(_, w)| w * w).sum::<f64>().clamp(0.0, 1.0);

        let level = if max_position > HIGH_CONCENTRATION + WEIGHT_EPSILON {
            ConcentrationLevel::High
        } else if max_position > MEDIUM_CONCENTRATION + WEIGHT_EPSILON {
            ConcentrationLevel::Medium
        } else {
            ConcentrationLevel::Low
        };

        ConcentrationMetrics {
            max_position,
            max_symbol: risky.first().map(|(s, _)| s.to_string()),
            top3,
            herfindahl,
            level,
        }
    }

    /// Correlation matrix over risky holdings with flagged pairs.
    ///
    /// Uses `observed` when supplied; otherwise falls back to the built-in
    /// reference table and tags the report accordingly. Pairs missing from
    /// the chosen matrix count as uncorrelated.
    pub fn correlation_risk(
        &self,
        allocation: &Allocation,
        observed: Option<&CorrelationMatrix>,
    ) -> CorrelationReport {
        let (matrix, source) = match observed {
            Some(m) => (m, CorrelationSource::Observed),
            None => (&self.reference, CorrelationSource::Reference),
        };

        let holdings: Vec<(&str, f64)> = allocation.risky().collect();
        let n = holdings.len();
        let mut rows = vec![vec![0.0; n]; n];
        let mut flagged = Vec::new();
        let mut weighted_sum = 0.0_f64;
        let mut weight_total = 0.0_f64;

        for i in 0..n {
            rows[i][i] = 1.0;
            for j in (i + 1)..n {
                let (a, wa) = holdings[i];
                let (b, wb) = holdings[j];
                let rho = matrix.get(a, b).unwrap_or(0.0);
                rows[i][j] = rho;
                rows[j][i] = rho;

                if rho > CORRELATION_FLAG_THRESHOLD {
                    flagged.push(CorrelatedPair {
                        a: a.to_string(),
                        b: b.to_string(),
                        correlation: rho,
                    });
                }
                weighted_sum += wa * wb * rho;
                weight_total += wa * wb;
            }
        }

        let score = if weight_total > 0.0 {
            (weighted_sum / weight_total).clamp(0.0, 1.0)
        } else {
            0.0
        };

        CorrelationReport {
            symbols: holdings.iter().map(|(s, _)| s.to_string()).collect(),
            matrix: rows,
            flagged,
            score,
            source,
        }
    }

    /// Weighted composite of normalised risk metrics, in [0, 1].
    pub fn composite_score(var_95: f64, drawdown: f64, correlation: f64, concentration: f64) -> f64 {
        let norm = |value: f64, scale: f64| {
            if value.is_finite() {
                (value / scale).clamp(0.0, 1.0)
            } else {
                1.0
            }
        };

        let total = score::VAR_WEIGHT * norm(var_95, score::VAR_SCALE)
            + score::DRAWDOWN_WEIGHT * norm(drawdown, score::DRAWDOWN_SCALE)
            + score::CORRELATION_WEIGHT * norm(correlation, 1.0)
            + score::CONCENTRATION_WEIGHT * norm(concentration, score::CONCENTRATION_SCALE);
        total.clamp(0.0, 1.0)
    }
}

/// Fraction of portfolio value as currency, rounded to cents.
fn amount(portfolio_value: Decimal, fraction: f64) -> Decimal {
    Decimal::from_f64(fraction)
        .map(|f| (portfolio_value * f).round_dp(2))
        .unwrap_or(Decimal::ZERO)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
