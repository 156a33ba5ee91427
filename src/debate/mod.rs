//! Multi-round debate state machine.
//!
//! A round is opened with a topic, collects at most one position per
//! participant, and is then finalized into the transcript with its
//! consensus. When rounds run out without consensus, a conflict
//! resolution strategy forces a decision.

pub mod consensus;
pub mod participant;
pub mod resolution;

pub use consensus::{Consensus, ConsensusDecision, CONSENSUS_THRESHOLD};
pub use participant::{Participant, Position, Stance};
pub use resolution::{Resolution, ResolutionStrategy};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebateConfig {
    /// Rounds allowed before conflict resolution is forced.
    pub max_rounds: u32,
    pub conflict_strategy: ResolutionStrategy,
    /// Finalized rounds kept in the transcript; older ones are evicted.
    pub transcript_retention: usize,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            conflict_strategy: ResolutionStrategy::RiskAverse,
            transcript_retention: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateRound {
    pub number: u32,
    pub topic: String,
    /// Extra material supplied for this round (e.g. user interjections).
    pub context: Vec<String>,
    /// Positions in speaking order.
    pub positions: Vec<Position>,
    /// Set when the round is finalized.
    pub consensus: Option<Consensus>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl DebateRound {
    fn open(number: u32, topic: String) -> Self {
        Self {
            number,
            topic,
            context: Vec::new(),
            positions: Vec::new(),
            consensus: None,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    pub fn position_of(&self, participant: Participant) -> Option<&Position> {
        self.positions.iter().find(|p| p.participant == participant)
    }

    pub fn is_finalized(&self) -> bool {
        self.closed_at.is_some()
    }

    pub fn consensus_reached(&self) -> bool {
        self.consensus.map(|c| c.reached).unwrap_or(false)
    }
}

#[derive(Debug)]
pub struct DebateEngine {
    config: DebateConfig,
    transcript: VecDeque<DebateRound>,
    active: Option<DebateRound>,
    rounds_started: u32,
    evicted: usize,
}

impl DebateEngine {
    pub fn new(config: DebateConfig) -> Self {
        Self {
            config,
            transcript: VecDeque::new(),
            active: None,
            rounds_started: 0,
            evicted: 0,
        }
    }

    pub fn config(&self) -> &DebateConfig {
        &self.config
    }

    /// Open a new round. Fails if a round is already open.
    pub fn start_round(&mut self, topic: impl Into<String>) -> Result<u32> {
        if let Some(open) = &self.active {
            return Err(EngineError::SessionState(format!(
                "round {} is still open",
                open.number
            )));
        }
        self.rounds_started += 1;
        let round = DebateRound::open(self.rounds_started, topic.into());
        debug!(round = round.number, topic = %round.topic, "Debate round opened");
        self.active = Some(round);
        Ok(self.rounds_started)
    }

    /// Attach context to the open round.
    pub fn add_context(&mut self, note: impl Into<String>) -> Result<()> {
        let round = self.active_mut()?;
        round.context.push(note.into());
        Ok(())
    }

    /// Record one participant's position in the open round.
    pub fn record_position(
        &mut self,
        participant: Participant,
        stance: Stance,
        reasoning: impl Into<String>,
        confidence: f64,
    ) -> Result<()> {
        let round = self.active_mut()?;

        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(EngineError::InputValidation(format!(
                "confidence for {participant} must be within [0, 1], got {confidence}"
            )));
        }
        if round.position_of(participant).is_some() {
            return Err(EngineError::InputValidation(format!(
                "{participant} has already spoken in round {}",
                round.number
            )));
        }

        debug!(
            round = round.number,
            participant = %participant,
            stance = %stance,
            confidence,
            "Position recorded"
        );
        round
            .positions
            .push(Position::new(participant, stance, confidence, reasoning));
        Ok(())
    }

    /// Same as [`record_position`](Self::record_position) but takes a raw
    /// role identifier, rejecting unknown names.
    pub fn record_position_named(
        &mut self,
        participant: &str,
        stance: Stance,
        reasoning: impl Into<String>,
        confidence: f64,
    ) -> Result<()> {
        let participant: Participant = participant.parse()?;
        self.record_position(participant, stance, reasoning, confidence)
    }

    /// Consensus over the open round's positions so far.
    pub fn check_consensus(&self) -> Result<Consensus> {
        let round = self.active.as_ref().ok_or_else(no_active_round)?;
        Ok(Consensus::compute(&round.positions))
    }

    /// Close the open round, freeze its consensus and append it to the
    /// transcript.
    pub fn finalize_round(&mut self) -> Result<&DebateRound> {
        let mut round = self.active.take().ok_or_else(no_active_round)?;
        let consensus = Consensus::compute(&round.positions);
        round.consensus = Some(consensus);
        round.closed_at = Some(Utc::now());

        info!(
            round = round.number,
            positions = round.positions.len(),
            level = consensus.level,
            reached = consensus.reached,
            decision = %consensus.decision,
            "Debate round finalized"
        );

        self.transcript.push_back(round);
        while self.transcript.len() > self.config.transcript_retention.max(1) {
            self.transcript.pop_front();
            self.evicted += 1;
        }
        self.transcript.back().ok_or_else(no_active_round)
    }

    /// Force a decision from a set of positions.
    pub fn resolve_conflict(positions: &[Position], strategy: ResolutionStrategy) -> Resolution {
        resolution::resolve(positions, strategy)
    }

    /// Resolve the latest finalized round with the given strategy.
    pub fn resolve_latest(&self, strategy: ResolutionStrategy) -> Result<Resolution> {
        let round = self.transcript.back().ok_or_else(|| {
            EngineError::SessionState("no finalized round to resolve".into())
        })?;
        let resolution = Self::resolve_conflict(&round.positions, strategy);
        info!(
            round = round.number,
            strategy = %strategy,
            decision = %resolution.decision,
            winner = ?resolution.winner,
            "Conflict resolved"
        );
        Ok(resolution)
    }

    /// Finalized rounds still retained, oldest first.
    pub fn transcript(&self) -> Vec<DebateRound> {
        self.transcript.iter().cloned().collect()
    }

    pub fn rounds(&self) -> impl Iterator<Item = &DebateRound> {
        self.transcript.iter()
    }

    pub fn latest(&self) -> Option<&DebateRound> {
        self.transcript.back()
    }

    pub fn active_round(&self) -> Option<&DebateRound> {
        self.active.as_ref()
    }

    /// Rounds finalized over the engine's lifetime, evicted ones included.
    pub fn rounds_completed(&self) -> u32 {
        (self.transcript.len() + self.evicted) as u32
    }

    pub fn max_rounds_reached(&self) -> bool {
        self.rounds_completed() >= self.config.max_rounds
    }

    pub fn evicted_rounds(&self) -> usize {
        self.evicted
    }

    fn active_mut(&mut self) -> Result<&mut DebateRound> {
        self.active.as_mut().ok_or_else(no_active_round)
    }
}

fn no_active_round() -> EngineError {
    EngineError::SessionState("no debate round is open".into())
}
