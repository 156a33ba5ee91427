//! Deterministic collaborators.
//!
//! These stand in for model-backed services: the binary runs against them
//! and the integration tests use them as a baseline. Every answer is a
//! pure function of the inputs.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::fmt::Write as _;

use super::{
    DecisionApprover, DecisionSummary, MarketProvider, NarrativeGenerator, PositionDraft,
    PositionProvider, RoundBrief, StrategyProvider,
};
use crate::debate::{DebateRound, Participant, Stance};
use crate::types::{
    Allocation, InvestorProfile, MarketRegime, MarketReport, PortfolioContext, RiskTolerance,
    Verdict, CASH,
};

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// Always reports the same market view.
#[derive(Debug, Clone)]
pub struct StaticMarketProvider {
    report: MarketReport,
}

impl StaticMarketProvider {
    pub fn new(report: MarketReport) -> Self {
        Self { report }
    }

    pub fn with_regime(regime: MarketRegime) -> Self {
        let mut report = MarketReport::neutral_default();
        report.regime = regime;
        report.summary = format!("Static market view: {regime} regime.");
        report.source = "static".into();
        Self { report }
    }
}

#[async_trait]
impl MarketProvider for StaticMarketProvider {
    async fn scan(&self) -> Result<MarketReport> {
        let mut report = self.report.clone();
        report.as_of = chrono::Utc::now();
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Model portfolios by risk tolerance, de-risked in stressed regimes and
/// whenever the risk participant objected in the last round.
#[derive(Debug, Clone)]
pub struct RuleBasedStrategist {
    /// Share of risky weight kept when de-risking.
    pub derisk_keep: f64,
}

impl Default for RuleBasedStrategist {
    fn default() -> Self {
        Self { derisk_keep: 0.8 }
    }
}

impl RuleBasedStrategist {
    fn template(tolerance: RiskTolerance) -> &'static [(&'static str, f64)] {
        match tolerance {
            RiskTolerance::Conservative => &[
                ("VTI", 0.20),
                ("EFA", 0.10),
                ("AGG", 0.25),
                ("TLT", 0.15),
                ("GLD", 0.10),
                (CASH, 0.20),
            ],
            RiskTolerance::Moderate => &[
                ("VTI", 0.25),
                ("EFA", 0.15),
                ("VWO", 0.05),
                ("AGG", 0.20),
                ("TLT", 0.10),
                ("GLD", 0.10),
                ("VNQ", 0.05),
                (CASH, 0.10),
            ],
            RiskTolerance::Aggressive => &[
                ("VTI", 0.25),
                ("QQQ", 0.20),
                ("EFA", 0.15),
                ("VWO", 0.10),
                ("IWM", 0.10),
                ("AGG", 0.10),
                ("GLD", 0.05),
                (CASH, 0.05),
            ],
        }
    }
}

/// Move `1 - keep` of every risky weight into cash.
pub fn derisk(allocation: &Allocation, keep: f64) -> crate::error::Result<Allocation> {
    let keep = keep.clamp(0.0, 1.0);
    let mut pairs: Vec<(String, f64)> = allocation
        .risky()
        .map(|(symbol, weight)| (symbol.to_string(), weight * keep))
        .collect();
    let risky: f64 = pairs.iter().map(|(_, w)| w).sum();
    pairs.push((CASH.to_string(), (1.0 - risky).max(0.0)));
    Allocation::new(pairs)
}

#[async_trait]
impl StrategyProvider for RuleBasedStrategist {
    async fn propose(
        &self,
        market: &MarketReport,
        _portfolio: &PortfolioContext,
        profile: &InvestorProfile,
    ) -> Result<Allocation> {
        let base = Allocation::new(Self::template(profile.risk_tolerance).iter().copied())?;
        let keep = match market.regime {
            MarketRegime::Normal => return Ok(base),
            MarketRegime::Volatile => 0.9,
            MarketRegime::Crisis => 0.75,
        };
        Ok(derisk(&base, keep)?)
    }

    async fn revise(&self, allocation: &Allocation, transcript: &[DebateRound]) -> Result<Allocation> {
        let objected = transcript
            .last()
            .and_then(|round| round.position_of(Participant::Risk))
            .map(|p| p.stance == Stance::Disagree)
            .unwrap_or(false);
        if objected {
            Ok(derisk(allocation, self.derisk_keep)?)
        } else {
            Ok(allocation.clone())
        }
    }
}

// ---------------------------------------------------------------------------
// Debate panel
// ---------------------------------------------------------------------------

/// Derives each role's stance from the validator verdict and market regime.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedPanel;

impl RuleBasedPanel {
    fn risk(brief: &RoundBrief) -> PositionDraft {
        let a = &brief.assessment;
        match a.verdict {
            Verdict::Approved => PositionDraft::new(
                Stance::Agree,
                (1.0 - a.risk_score).clamp(0.5, 1.0),
                format!("All limits satisfied (risk score {:.2}).", a.risk_score),
            ),
            Verdict::Warning => PositionDraft::new(
                Stance::Neutral,
                0.6,
                format!("Soft limits breached: {}", a.reasons.join("; ")),
            ),
            Verdict::Rejected => PositionDraft::new(
                Stance::Disagree,
                0.9,
                format!("Hard limits breached: {}", a.reasons.join("; ")),
            ),
        }
    }

    fn strategy(brief: &RoundBrief) -> PositionDraft {
        if brief.assessment.is_approvable() {
            PositionDraft::new(
                Stance::Agree,
                0.75,
                format!("Proposal {} fits the investor profile.", brief.allocation),
            )
        } else {
            PositionDraft::new(
                Stance::Neutral,
                0.5,
                "Proposal needs revision before it can be defended.",
            )
        }
    }

    fn market(brief: &RoundBrief) -> PositionDraft {
        let score = brief.assessment.risk_score;
        match brief.market.regime {
            MarketRegime::Normal => {
                PositionDraft::new(Stance::Agree, 0.6, "Normal regime supports deployment.")
            }
            MarketRegime::Volatile if brief.assessment.verdict == Verdict::Approved => {
                PositionDraft::new(Stance::Agree, 0.5, "Volatile regime, but risk is contained.")
            }
            MarketRegime::Volatile => {
                PositionDraft::new(Stance::Neutral, 0.5, "Volatile regime; waiting for clarity.")
            }
            MarketRegime::Crisis if score < 0.3 => {
                PositionDraft::new(Stance::Neutral, 0.6, "Crisis regime, defensive allocation.")
            }
            MarketRegime::Crisis => {
                PositionDraft::new(Stance::Disagree, 0.7, "Crisis regime; exposure too high.")
            }
        }
    }

    fn explainer(brief: &RoundBrief) -> PositionDraft {
        let stance = if brief.assessment.is_approvable() {
            Stance::Agree
        } else {
            Stance::Disagree
        };
        PositionDraft::new(
            stance,
            0.4,
            format!("Validator verdict is {}.", brief.assessment.verdict),
        )
    }
}

#[async_trait]
impl PositionProvider for RuleBasedPanel {
    async fn deliberate(&self, participant: Participant, brief: &RoundBrief) -> Result<PositionDraft> {
        let mut draft = match participant {
            Participant::Risk => Self::risk(brief),
            Participant::Strategy => Self::strategy(brief),
            Participant::Market => Self::market(brief),
            Participant::Explainer => Self::explainer(brief),
        };
        if !brief.context.is_empty() {
            let _ = write!(
                draft.reasoning,
                " (considered {} user note(s))",
                brief.context.len()
            );
        }
        Ok(draft)
    }
}

// ---------------------------------------------------------------------------
// Narrative and approval
// ---------------------------------------------------------------------------

/// Renders a plain-text decision brief.
#[derive(Debug, Clone, Default)]
pub struct TemplateNarrator;

#[async_trait]
impl NarrativeGenerator for TemplateNarrator {
    async fn explain(&self, summary: &DecisionSummary) -> Result<String> {
        let mut out = format!(
            "Decision for session {}: {}\n",
            summary.session_id,
            if summary.verdict.is_approvable() {
                "deploy"
            } else {
                "hold"
            }
        );
        for (symbol, weight) in summary.allocation.iter() {
            let _ = writeln!(out, "  {symbol:<6} {:>6.1}%", weight * 100.0);
        }
        out.push_str(&summary.fallback_narrative());
        Ok(out)
    }
}

/// Approves approvable verdicts whose composite score stays under a cap.
#[derive(Debug, Clone)]
pub struct ScoreThresholdApprover {
    pub max_risk_score: f64,
}

#[async_trait]
impl DecisionApprover for ScoreThresholdApprover {
    async fn approve(&self, summary: &DecisionSummary) -> Result<bool> {
        if !summary.risk_score.is_finite() {
            bail!("risk score is not a finite number");
        }
        Ok(summary.verdict.is_approvable() && summary.risk_score <= self.max_risk_score)
    }
}
