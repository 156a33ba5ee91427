//! Confidence-weighted consensus over a round's positions.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::participant::{Position, Stance};

/// Dominant-stance share required for consensus.
pub const CONSENSUS_THRESHOLD: f64 = 0.66;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusDecision {
    Approve,
    Reject,
    Tie,
}

impl ConsensusDecision {
    pub fn from_stance(stance: Stance) -> Self {
        match stance {
            Stance::Agree => ConsensusDecision::Approve,
            Stance::Disagree => ConsensusDecision::Reject,
            Stance::Neutral | Stance::Abstain => ConsensusDecision::Tie,
        }
    }
}

impl fmt::Display for ConsensusDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusDecision::Approve => write!(f, "approve"),
            ConsensusDecision::Reject => write!(f, "reject"),
            ConsensusDecision::Tie => write!(f, "tie"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Consensus {
    pub agree_fraction: f64,
    pub disagree_fraction: f64,
    /// Share of the dominant stance.
    pub level: f64,
    pub reached: bool,
    pub decision: ConsensusDecision,
    /// Total confidence weight across all positions.
    pub total_weight: f64,
}

impl Consensus {
    /// Weigh each position by its confidence. Neutral and abstain count
    /// toward the denominator only.
    pub fn compute(positions: &[Position]) -> Self {
        let mut agree = 0.0_f64;
        let mut disagree = 0.0_f64;
        let mut total = 0.0_f64;

        for p in positions {
            let w = p.confidence;
            total += w;
            match p.stance {
                Stance::Agree => agree += w,
                Stance::Disagree => disagree += w,
                Stance::Neutral | Stance::Abstain => {}
            }
        }

        if total <= 0.0 {
            return Self {
                agree_fraction: 0.0,
                disagree_fraction: 0.0,
                level: 0.0,
                reached: false,
                decision: ConsensusDecision::Tie,
                total_weight: 0.0,
            };
        }

        let agree_fraction = agree / total;
        let disagree_fraction = disagree / total;
        let level = agree_fraction.max(disagree_fraction);
        let decision = if agree > disagree {
            ConsensusDecision::Approve
        } else if disagree > agree {
            ConsensusDecision::Reject
        } else {
            ConsensusDecision::Tie
        };

        Self {
            agree_fraction,
            disagree_fraction,
            level,
            reached: level >= CONSENSUS_THRESHOLD,
            decision,
            total_weight: total,
        }
    }
}

impl fmt::Display for Consensus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (level {:.0}%, agree {:.0}% / disagree {:.0}%{})",
            self.decision,
            self.level * 100.0,
            self.agree_fraction * 100.0,
            self.disagree_fraction * 100.0,
            if self.reached { ", reached" } else { ", not reached" }
        )
    }
}
