//! Shared types for the deliberation engine.
//!
//! These types form the data model used across the risk, debate and
//! deliberation modules. Numeric engine outputs are plain values that are
//! created once per call and never mutated afterwards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{EngineError, Result};

/// Reserved pseudo-symbol for uninvested cash.
pub const CASH: &str = "cash";

/// Allowed deviation of an allocation's weight sum from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 0.05;

/// Float noise below which a weight sum counts as 1.0 and a weight
/// counts as sitting on a limit.
pub const WEIGHT_EPSILON: f64 = 1e-9;

/// Canonical form of an asset symbol: upper-case, except `cash`.
pub fn normalize_symbol(symbol: &str) -> String {
    let trimmed = symbol.trim();
    if trimmed.eq_ignore_ascii_case(CASH) {
        CASH.to_string()
    } else {
        trimmed.to_uppercase()
    }
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// Target portfolio weights keyed by asset symbol.
///
/// Always sums to 1.0 (within `WEIGHT_EPSILON`) once constructed.
/// Construction rejects weight sums outside `1.0 ± WEIGHT_TOLERANCE`;
/// callers that want to rescale arbitrary weights must opt in via
/// [`Allocation::renormalized`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct Allocation {
    weights: BTreeMap<String, f64>,
}

impl Allocation {
    /// Validate and build an allocation from symbol/weight pairs.
    pub fn new<S, I>(weights: I) -> Result<Self>
    where
        S: AsRef<str>,
        I: IntoIterator<Item = (S, f64)>,
    {
        let weights = Self::collect_weights(weights)?;
        let total: f64 = weights.values().sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(EngineError::InputValidation(format!(
                "allocation weights sum to {total:.4}, outside 1.0 ± {WEIGHT_TOLERANCE}"
            )));
        }
        Ok(Self::scaled(weights, total))
    }

    /// Build an allocation by rescaling any positive weight vector to 1.0.
    pub fn renormalized<S, I>(weights: I) -> Result<Self>
    where
        S: AsRef<str>,
        I: IntoIterator<Item = (S, f64)>,
    {
        let weights = Self::collect_weights(weights)?;
        let total: f64 = weights.values().sum();
        if total <= 0.0 {
            return Err(EngineError::InputValidation(
                "cannot renormalise an allocation with zero total weight".into(),
            ));
        }
        Ok(Self::scaled(weights, total))
    }

    /// 100% cash.
    pub fn all_cash() -> Self {
        let mut weights = BTreeMap::new();
        weights.insert(CASH.to_string(), 1.0);
        Self { weights }
    }

    /// Derive current weights from position market values.
    pub fn from_positions(positions: &BTreeMap<String, Decimal>) -> Result<Self> {
        use rust_decimal::prelude::ToPrimitive;

        let pairs: Vec<(String, f64)> = positions
            .iter()
            .map(|(symbol, value)| (symbol.clone(), value.to_f64().unwrap_or(0.0)))
            .collect();
        Self::renormalized(pairs)
    }

    fn collect_weights<S, I>(weights: I) -> Result<BTreeMap<String, f64>>
    where
        S: AsRef<str>,
        I: IntoIterator<Item = (S, f64)>,
    {
        let mut out = BTreeMap::new();
        for (symbol, weight) in weights {
            let symbol = normalize_symbol(symbol.as_ref());
            if symbol.is_empty() {
                return Err(EngineError::InputValidation("empty asset symbol".into()));
            }
            if !weight.is_finite() || weight < 0.0 {
                return Err(EngineError::InputValidation(format!(
                    "weight for {symbol} must be a non-negative finite number, got {weight}"
                )));
            }
            if out.insert(symbol.clone(), weight).is_some() {
                return Err(EngineError::InputValidation(format!(
                    "duplicate asset symbol: {symbol}"
                )));
            }
        }
        if out.is_empty() {
            return Err(EngineError::InputValidation("allocation is empty".into()));
        }
        Ok(out)
    }

    fn scaled(mut weights: BTreeMap<String, f64>, total: f64) -> Self {
        // Dividing by e.g. 1.0000000000000002 would nudge weights off
        // their stated values.
        if (total - 1.0).abs() <= WEIGHT_EPSILON {
            return Self { weights };
        }
        for w in weights.values_mut() {
            *w /= total;
        }
        Self { weights }
    }

    /// Weight for a symbol (0.0 when not held).
    pub fn weight(&self, symbol: &str) -> f64 {
        self.weights
            .get(&normalize_symbol(symbol))
            .copied()
            .unwrap_or(0.0)
    }

    /// Iterate symbol/weight pairs in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(s, w)| (s.as_str(), *w))
    }

    /// Holdings with a positive weight, cash included.
    pub fn held(&self) -> impl Iterator<Item = (&str, f64)> {
        self.iter().filter(|(_, w)| *w > 0.0)
    }

    /// Non-cash holdings with a positive weight.
    pub fn risky(&self) -> impl Iterator<Item = (&str, f64)> {
        self.held().filter(|(s, _)| *s != CASH)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Largest absolute weight change against another allocation,
    /// treating symbols missing on either side as zero.
    pub fn max_weight_change(&self, other: &Allocation) -> f64 {
        self.weights
            .keys()
            .chain(other.weights.keys())
            .map(|s| (self.weight(s) - other.weight(s)).abs())
            .fold(0.0, f64::max)
    }

    /// Whether any single weight moved by more than `threshold`.
    pub fn differs_materially(&self, other: &Allocation, threshold: f64) -> bool {
        self.max_weight_change(other) > threshold
    }
}

impl TryFrom<BTreeMap<String, f64>> for Allocation {
    type Error = EngineError;

    fn try_from(value: BTreeMap<String, f64>) -> Result<Self> {
        Allocation::new(value)
    }
}

impl From<Allocation> for BTreeMap<String, f64> {
    fn from(value: Allocation) -> Self {
        value.weights
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .weights
            .iter()
            .map(|(s, w)| format!("{s} {:.1}%", w * 100.0))
            .collect();
        write!(f, "{}", parts.join(" | "))
    }
}

// ---------------------------------------------------------------------------
// Market context
// ---------------------------------------------------------------------------

/// Market condition tag used to scale volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    #[default]
    Normal,
    Volatile,
    Crisis,
}

impl MarketRegime {
    pub const ALL: &'static [MarketRegime] = &[
        MarketRegime::Normal,
        MarketRegime::Volatile,
        MarketRegime::Crisis,
    ];

    /// Volatility multiplier applied by the VaR model.
    pub fn multiplier(&self) -> f64 {
        match self {
            MarketRegime::Normal => 1.0,
            MarketRegime::Volatile => 1.5,
            MarketRegime::Crisis => 2.5,
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketRegime::Normal => write!(f, "normal"),
            MarketRegime::Volatile => write!(f, "volatile"),
            MarketRegime::Crisis => write!(f, "crisis"),
        }
    }
}

impl std::str::FromStr for MarketRegime {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(MarketRegime::Normal),
            "volatile" => Ok(MarketRegime::Volatile),
            "crisis" => Ok(MarketRegime::Crisis),
            other => Err(EngineError::InputValidation(format!(
                "unknown market regime: {other}"
            ))),
        }
    }
}

/// Structured market summary supplied by the market provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketReport {
    pub regime: MarketRegime,
    pub summary: String,
    /// Free-form numeric indicators (e.g. "vix" → 18.2).
    #[serde(default)]
    pub indicators: BTreeMap<String, f64>,
    pub as_of: DateTime<Utc>,
    pub source: String,
}

impl MarketReport {
    /// Report used when no market data has ever been obtained.
    pub fn neutral_default() -> Self {
        Self {
            regime: MarketRegime::Normal,
            summary: "No market data available; assuming a normal regime.".into(),
            indicators: BTreeMap::new(),
            as_of: Utc::now(),
            source: "default".into(),
        }
    }
}

/// Pairwise correlations supplied by the caller (e.g. from return history).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationMatrix {
    pairs: BTreeMap<(String, String), f64>,
}

impl CorrelationMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: &str, b: &str) -> (String, String) {
        let (a, b) = (normalize_symbol(a), normalize_symbol(b));
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Set the correlation for a pair; must lie in [-1, 1].
    pub fn set(&mut self, a: &str, b: &str, rho: f64) -> Result<()> {
        if !rho.is_finite() || !(-1.0..=1.0).contains(&rho) {
            return Err(EngineError::InputValidation(format!(
                "correlation for {a}/{b} must be in [-1, 1], got {rho}"
            )));
        }
        self.pairs.insert(Self::key(a, b), rho);
        Ok(())
    }

    pub fn with(mut self, a: &str, b: &str, rho: f64) -> Result<Self> {
        self.set(a, b, rho)?;
        Ok(self)
    }

    /// Correlation for a pair; 1.0 on the diagonal, `None` if unknown.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        if normalize_symbol(a) == normalize_symbol(b) {
            return Some(1.0);
        }
        self.pairs.get(&Self::key(a, b)).copied()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Portfolio the allocation is being proposed for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioContext {
    pub total_value: Decimal,
    /// Current market value per symbol.
    #[serde(default)]
    pub positions: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub regime: MarketRegime,
    #[serde(skip)]
    pub correlations: Option<CorrelationMatrix>,
}

impl PortfolioContext {
    pub fn new(total_value: Decimal, regime: MarketRegime) -> Result<Self> {
        if total_value <= Decimal::ZERO {
            return Err(EngineError::InputValidation(format!(
                "portfolio value must be positive, got {total_value}"
            )));
        }
        Ok(Self {
            total_value,
            positions: BTreeMap::new(),
            regime,
            correlations: None,
        })
    }

    pub fn with_position(mut self, symbol: &str, value: Decimal) -> Self {
        self.positions.insert(normalize_symbol(symbol), value);
        self
    }

    pub fn with_correlations(mut self, correlations: CorrelationMatrix) -> Self {
        self.correlations = Some(correlations);
        self
    }

    /// Allocation implied by current positions, if any are held.
    pub fn current_allocation(&self) -> Option<Allocation> {
        if self.positions.is_empty() {
            return None;
        }
        Allocation::from_positions(&self.positions).ok()
    }
}

/// Investor risk appetite passed to the strategy provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTolerance {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestorProfile {
    pub risk_tolerance: RiskTolerance,
    pub horizon_years: u32,
}

impl Default for InvestorProfile {
    fn default() -> Self {
        Self {
            risk_tolerance: RiskTolerance::Moderate,
            horizon_years: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Risk outputs
// ---------------------------------------------------------------------------

/// Approval verdict of the strategy validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    Warning,
    Rejected,
}

impl Verdict {
    /// Approved and warning verdicts may be acted on.
    pub fn is_approvable(&self) -> bool {
        !matches!(self, Verdict::Rejected)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Approved => write!(f, "approved"),
            Verdict::Warning => write!(f, "warning"),
            Verdict::Rejected => write!(f, "rejected"),
        }
    }
}

/// Parametric one-day VaR figures (fractions of portfolio value).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VarMetrics {
    /// Regime-adjusted daily portfolio volatility.
    pub volatility: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub cvar_95: f64,
    pub var_95_amount: Decimal,
    pub var_99_amount: Decimal,
    pub cvar_95_amount: Decimal,
    pub regime: MarketRegime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressSeverity {
    Low,
    Moderate,
    High,
    Severe,
}

impl StressSeverity {
    pub fn from_return(portfolio_return: f64) -> Self {
        if portfolio_return <= -0.30 {
            StressSeverity::Severe
        } else if portfolio_return <= -0.20 {
            StressSeverity::High
        } else if portfolio_return <= -0.10 {
            StressSeverity::Moderate
        } else {
            StressSeverity::Low
        }
    }
}

impl fmt::Display for StressSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StressSeverity::Low => write!(f, "low"),
            StressSeverity::Moderate => write!(f, "moderate"),
            StressSeverity::High => write!(f, "high"),
            StressSeverity::Severe => write!(f, "severe"),
        }
    }
}

/// Outcome of replaying one historical scenario against an allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressResult {
    pub scenario: String,
    pub portfolio_return: f64,
    /// Currency loss (positive number for losses, negative for gains).
    pub loss: Decimal,
    pub duration_days: u32,
    pub volatility_multiplier: f64,
    pub severity: StressSeverity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StressReport {
    pub results: Vec<StressResult>,
    pub worst_scenario: Option<String>,
}

impl StressReport {
    pub fn worst(&self) -> Option<&StressResult> {
        let name = self.worst_scenario.as_deref()?;
        self.results.iter().find(|r| r.scenario == name)
    }

    pub fn get(&self, scenario: &str) -> Option<&StressResult> {
        self.results.iter().find(|r| r.scenario == scenario)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationLevel {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationMetrics {
    pub max_position: f64,
    pub max_symbol: Option<String>,
    pub top3: f64,
    /// Σw² over risky holdings, in [0, 1].
    pub herfindahl: f64,
    pub level: ConcentrationLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationSource {
    /// Caller-supplied matrix.
    Observed,
    /// Built-in long-run reference table, not derived from live data.
    #[default]
    Reference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedPair {
    pub a: String,
    pub b: String,
    pub correlation: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub symbols: Vec<String>,
    /// Row-major matrix aligned with `symbols`.
    pub matrix: Vec<Vec<f64>>,
    pub flagged: Vec<CorrelatedPair>,
    /// Weighted mean pairwise correlation of risky holdings, in [0, 1].
    pub score: f64,
    pub source: CorrelationSource,
}

/// Distributional statistics from one Monte Carlo run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub mean_return: f64,
    pub median_return: f64,
    pub percentile_5: f64,
    pub percentile_95: f64,
    pub worst_return: f64,
    pub best_return: f64,
    /// Largest per-path maximum drawdown.
    pub max_drawdown_worst: f64,
    pub max_drawdown_median: f64,
    pub probability_of_loss: f64,
    pub probability_loss_10: f64,
    pub probability_loss_20: f64,
    pub sharpe_estimate: f64,
    pub paths: usize,
    pub horizon_days: usize,
    pub seed: u64,
}

/// Complete validation output for one allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub var: VarMetrics,
    pub stress: StressReport,
    pub concentration: ConcentrationMetrics,
    pub correlation: CorrelationReport,
    pub simulation: Option<SimulationResult>,
    /// Composite risk score in [0, 1].
    pub risk_score: f64,
    pub verdict: Verdict,
    pub reasons: Vec<String>,
    /// Set when the Monte Carlo run failed and conservative values were used.
    pub simulation_failed: bool,
    pub assessed_at: DateTime<Utc>,
}

impl RiskAssessment {
    /// Rejection for an allocation that could not be assessed at all.
    pub fn rejected_input(reason: impl Into<String>, regime: MarketRegime) -> Self {
        Self {
            var: VarMetrics {
                regime,
                ..VarMetrics::default()
            },
            stress: StressReport::default(),
            concentration: ConcentrationMetrics::default(),
            correlation: CorrelationReport::default(),
            simulation: None,
            risk_score: 1.0,
            verdict: Verdict::Rejected,
            reasons: vec![reason.into()],
            simulation_failed: false,
            assessed_at: Utc::now(),
        }
    }

    pub fn var_95(&self) -> f64 {
        self.var.var_95
    }

    pub fn is_approvable(&self) -> bool {
        self.verdict.is_approvable()
    }
}

impl fmt::Display for RiskAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | VaR95={:.2}% CVaR95={:.2}% score={:.2} max_pos={:.1}%",
            self.verdict,
            self.var.var_95 * 100.0,
            self.var.cvar_95 * 100.0,
            self.risk_score,
            self.concentration.max_position * 100.0,
        )?;
        if !self.reasons.is_empty() {
            write!(f, " [{}]", self.reasons.join("; "))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
