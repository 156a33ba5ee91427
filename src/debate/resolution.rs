//! Conflict resolution when a debate ends without consensus.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::consensus::ConsensusDecision;
use super::participant::{Participant, Position, Stance};
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Highest-confidence position wins.
    Confidence,
    /// Highest-ranked participant wins.
    Hierarchy,
    /// Any disagreement wins.
    #[default]
    RiskAverse,
    /// Plain vote count, ties broken by hierarchy.
    Majority,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionStrategy::Confidence => write!(f, "confidence"),
            ResolutionStrategy::Hierarchy => write!(f, "hierarchy"),
            ResolutionStrategy::RiskAverse => write!(f, "risk_averse"),
            ResolutionStrategy::Majority => write!(f, "majority"),
        }
    }
}

impl std::str::FromStr for ResolutionStrategy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "confidence" => Ok(ResolutionStrategy::Confidence),
            "hierarchy" => Ok(ResolutionStrategy::Hierarchy),
            "risk_averse" => Ok(ResolutionStrategy::RiskAverse),
            "majority" => Ok(ResolutionStrategy::Majority),
            other => Err(EngineError::InputValidation(format!(
                "unknown conflict resolution strategy: {other}"
            ))),
        }
    }
}

/// Forced outcome of a deadlocked debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub strategy: ResolutionStrategy,
    pub stance: Stance,
    pub decision: ConsensusDecision,
    /// Participant whose position carried; `None` if nobody voted.
    pub winner: Option<Participant>,
}

impl Resolution {
    fn from_position(strategy: ResolutionStrategy, position: &Position) -> Self {
        Self {
            strategy,
            stance: position.stance,
            decision: ConsensusDecision::from_stance(position.stance),
            winner: Some(position.participant),
        }
    }
}

/// Resolve a set of positions with the given strategy. Abstentions are
/// ignored; with no votes at all the result is a tie.
pub fn resolve(positions: &[Position], strategy: ResolutionStrategy) -> Resolution {
    let voting: Vec<&Position> = positions
        .iter()
        .filter(|p| p.stance != Stance::Abstain)
        .collect();

    let winner = match strategy {
        ResolutionStrategy::Confidence => most_confident(&voting),
        ResolutionStrategy::Hierarchy => highest_ranked(&voting),
        ResolutionStrategy::RiskAverse => {
            let dissent: Vec<&Position> = voting
                .iter()
                .copied()
                .filter(|p| p.stance == Stance::Disagree)
                .collect();
            if dissent.is_empty() {
                most_confident(&voting)
            } else {
                most_confident(&dissent)
            }
        }
        ResolutionStrategy::Majority => majority(&voting),
    };

    match winner {
        Some(position) => Resolution::from_position(strategy, position),
        None => Resolution {
            strategy,
            stance: Stance::Abstain,
            decision: ConsensusDecision::Tie,
            winner: None,
        },
    }
}

/// Hierarchy order for tie-breaks: the higher-ranked participant sorts first.
fn by_rank(a: &Position, b: &Position) -> Ordering {
    a.participant.rank().cmp(&b.participant.rank())
}

fn most_confident<'a>(positions: &[&'a Position]) -> Option<&'a Position> {
    positions.iter().copied().min_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| by_rank(a, b))
    })
}

fn highest_ranked<'a>(positions: &[&'a Position]) -> Option<&'a Position> {
    positions.iter().copied().min_by(|a, b| by_rank(a, b))
}

fn majority<'a>(positions: &[&'a Position]) -> Option<&'a Position> {
    let count = |stance: Stance| positions.iter().filter(|p| p.stance == stance).count();
    let top = [Stance::Agree, Stance::Disagree, Stance::Neutral]
        .into_iter()
        .map(count)
        .max()?;
    if top == 0 {
        return None;
    }
    // Among stances sharing the top count, the highest-ranked holder decides.
    let leaders: Vec<&'a Position> = positions
        .iter()
        .copied()
        .filter(|p| count(p.stance) == top)
        .collect();
    highest_ranked(&leaders)
}
