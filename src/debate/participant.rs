//! Debate participants and their positions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EngineError;

/// Closed set of deliberation roles.
///
/// Declaration order is the tie-break hierarchy: risk > strategy >
/// market > explainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Participant {
    Risk,
    Strategy,
    Market,
    Explainer,
}

impl Participant {
    /// All roles in hierarchy order.
    pub const ALL: &'static [Participant] = &[
        Participant::Risk,
        Participant::Strategy,
        Participant::Market,
        Participant::Explainer,
    ];

    /// Lower ranks take precedence.
    pub fn rank(&self) -> u8 {
        match self {
            Participant::Risk => 0,
            Participant::Strategy => 1,
            Participant::Market => 2,
            Participant::Explainer => 3,
        }
    }

    /// Whether `self` outranks `other` in the hierarchy.
    pub fn outranks(&self, other: &Participant) -> bool {
        self.rank() < other.rank()
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Participant::Risk => write!(f, "risk"),
            Participant::Strategy => write!(f, "strategy"),
            Participant::Market => write!(f, "market"),
            Participant::Explainer => write!(f, "explainer"),
        }
    }
}

/// Parse a role identifier (case-insensitive). Unknown names are rejected.
impl std::str::FromStr for Participant {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "risk" | "risk_analyst" | "risk_manager" => Ok(Participant::Risk),
            "strategy" | "strategist" => Ok(Participant::Strategy),
            "market" | "market_analyst" => Ok(Participant::Market),
            "explainer" => Ok(Participant::Explainer),
            _ => Err(EngineError::UnknownParticipant(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Agree,
    Disagree,
    Neutral,
    Abstain,
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stance::Agree => write!(f, "agree"),
            Stance::Disagree => write!(f, "disagree"),
            Stance::Neutral => write!(f, "neutral"),
            Stance::Abstain => write!(f, "abstain"),
        }
    }
}

impl std::str::FromStr for Stance {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "agree" => Ok(Stance::Agree),
            "disagree" => Ok(Stance::Disagree),
            "neutral" => Ok(Stance::Neutral),
            "abstain" => Ok(Stance::Abstain),
            other => Err(EngineError::InputValidation(format!("unknown stance: {other}"))),
        }
    }
}

/// One participant's position within a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub participant: Participant,
    pub stance: Stance,
    /// Self-reported confidence in [0, 1].
    pub confidence: f64,
    /// Opaque to the engine.
    pub reasoning: String,
    pub recorded_at: DateTime<Utc>,
}

impl Position {
    pub fn new(participant: Participant, stance: Stance, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            participant,
            stance,
            confidence,
            reasoning: reasoning.into(),
            recorded_at: Utc::now(),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({:.0}%)",
            self.participant,
            self.stance,
            self.confidence * 100.0
        )
    }
}
