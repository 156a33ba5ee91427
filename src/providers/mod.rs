//! External collaborator contracts.
//!
//! The engine never produces market views, allocation proposals or prose
//! itself. It consumes already-typed structures through these traits and
//! treats every call as fallible and potentially slow.

pub mod rule_based;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::debate::{ConsensusDecision, DebateRound, Participant, Position, Stance};
use crate::types::{
    Allocation, InvestorProfile, MarketReport, PortfolioContext, RiskAssessment, Verdict,
};

/// Source of market context.
#[async_trait]
pub trait MarketProvider: Send + Sync {
    async fn scan(&self) -> Result<MarketReport>;
}

/// Produces and revises allocation proposals.
#[async_trait]
pub trait StrategyProvider: Send + Sync {
    async fn propose(
        &self,
        market: &MarketReport,
        portfolio: &PortfolioContext,
        profile: &InvestorProfile,
    ) -> Result<Allocation>;

    /// Revise an allocation in light of the debate transcript.
    async fn revise(&self, allocation: &Allocation, transcript: &[DebateRound]) -> Result<Allocation>;
}

/// Speaks for a participant during a debate round.
#[async_trait]
pub trait PositionProvider: Send + Sync {
    async fn deliberate(&self, participant: Participant, brief: &RoundBrief) -> Result<PositionDraft>;
}

/// Free-text explanation of a decision. Best effort only.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn explain(&self, summary: &DecisionSummary) -> Result<String>;
}

/// Final sign-off on a decision (e.g. a human in the loop).
#[async_trait]
pub trait DecisionApprover: Send + Sync {
    async fn approve(&self, summary: &DecisionSummary) -> Result<bool>;
}

/// Everything a speaker sees when asked for a position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundBrief {
    pub session_id: Uuid,
    pub round: u32,
    pub topic: String,
    /// User interjections and other material for this round.
    pub context: Vec<String>,
    pub allocation: Allocation,
    pub assessment: RiskAssessment,
    pub market: MarketReport,
    /// Positions already recorded this round, in speaking order.
    pub prior_positions: Vec<Position>,
}

/// A speaker's answer before it is recorded into the round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionDraft {
    pub stance: Stance,
    pub confidence: f64,
    pub reasoning: String,
}

impl PositionDraft {
    pub fn new(stance: Stance, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            stance,
            confidence,
            reasoning: reasoning.into(),
        }
    }

    /// Stand-in for a speaker that failed to answer.
    pub fn abstain(reason: impl Into<String>) -> Self {
        Self::new(Stance::Abstain, 0.0, reason)
    }
}

/// Structured decision handed to the narrative generator and approver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionSummary {
    pub session_id: Uuid,
    pub allocation: Allocation,
    pub verdict: Verdict,
    pub risk_score: f64,
    pub var_95: f64,
    pub reasons: Vec<String>,
    pub consensus_reached: bool,
    pub decision: ConsensusDecision,
    pub round_count: u32,
    pub revised: bool,
    pub decided_at: DateTime<Utc>,
}

impl DecisionSummary {
    /// Deterministic text used when no narrative could be generated.
    pub fn fallback_narrative(&self) -> String {
        let mut text = format!(
            "Allocation {} was {} by the risk validator (VaR95 {:.2}%, risk score {:.2}). \
             The debate {} after {} round(s) with decision '{}'.",
            self.allocation,
            self.verdict,
            self.var_95 * 100.0,
            self.risk_score,
            if self.consensus_reached {
                "reached consensus"
            } else {
                "did not reach consensus"
            },
            self.round_count,
            self.decision,
        );
        if self.revised {
            text.push_str(" The allocation was revised during synthesis.");
        }
        if !self.reasons.is_empty() {
            text.push_str(" Findings: ");
            text.push_str(&self.reasons.join("; "));
            text.push('.');
        }
        text
    }
}
