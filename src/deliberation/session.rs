//! Per-request session state and its external control surface.
//!
//! A [`DeliberationSession`] is owned by exactly one driver and mutated only
//! through the orchestrator. Observers hold a [`SessionHandle`], which sees
//! published [`SessionStatus`] snapshots and can queue control signals that
//! the driver consumes at its next checkpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{watch, Notify};
use uuid::Uuid;

use crate::debate::{
    ConsensusDecision, DebateConfig, DebateEngine, DebateRound, Participant, Resolution,
    ResolutionStrategy,
};
use crate::error::{EngineError, Result};
use crate::types::{
    Allocation, InvestorProfile, MarketReport, PortfolioContext, RiskAssessment, Verdict,
};

// ---------------------------------------------------------------------------
// Phases and requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    InitialAnalysis,
    Deliberation,
    Synthesis,
    Terminal(Outcome),
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Terminal(_))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::InitialAnalysis => write!(f, "initial_analysis"),
            Phase::Deliberation => write!(f, "deliberation"),
            Phase::Synthesis => write!(f, "synthesis"),
            Phase::Terminal(Outcome::Approved) => write!(f, "terminal(approved)"),
            Phase::Terminal(Outcome::Rejected) => write!(f, "terminal(rejected)"),
        }
    }
}

/// Input for one deliberation.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub portfolio: PortfolioContext,
    pub profile: InvestorProfile,
    /// Debate topic; defaults to a description of the proposal.
    pub topic: Option<String>,
}

impl AnalysisRequest {
    pub fn new(portfolio: PortfolioContext) -> Self {
        Self {
            portfolio,
            profile: InvestorProfile::default(),
            topic: None,
        }
    }

    pub fn with_profile(mut self, profile: InvestorProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Decision output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusSummary {
    /// Whether the final round reached consensus on its own.
    pub reached: bool,
    pub decision: ConsensusDecision,
    pub level: f64,
    /// Strategy used when the debate had to be forced.
    pub resolved_by: Option<ResolutionStrategy>,
    pub winner: Option<Participant>,
}

impl ConsensusSummary {
    pub(crate) fn from_round(round: Option<&DebateRound>, resolution: Option<&Resolution>) -> Self {
        let consensus = round.and_then(|r| r.consensus);
        let reached = consensus.map(|c| c.reached).unwrap_or(false);
        let level = consensus.map(|c| c.level).unwrap_or(0.0);
        match resolution {
            Some(res) if !reached => Self {
                reached,
                decision: res.decision,
                level,
                resolved_by: Some(res.strategy),
                winner: res.winner,
            },
            _ => Self {
                reached,
                decision: consensus
                    .map(|c| c.decision)
                    .unwrap_or(ConsensusDecision::Tie),
                level,
                resolved_by: None,
                winner: None,
            },
        }
    }
}

/// Terminal artifact of a session, handed to persistence and UI layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub session_id: Uuid,
    pub actor: String,
    pub allocation: Allocation,
    pub assessment: RiskAssessment,
    pub consensus: ConsensusSummary,
    /// External approval, or the risk verdict when no approver answered.
    pub approved: bool,
    pub outcome: Outcome,
    pub round_count: u32,
    /// Whether synthesis replaced the originally proposed allocation.
    pub revised: bool,
    pub narrative: String,
    pub decided_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Status and control
// ---------------------------------------------------------------------------

/// Consistent read-only view of a session, published between transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub phase: Phase,
    pub round_count: u32,
    pub interrupted: bool,
    pub finalize_requested: bool,
    pub paused: bool,
    pub verdict: Option<Verdict>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ControlState {
    messages: Vec<String>,
    finalize: bool,
    paused: bool,
    cancelled: bool,
}

/// Signals queued by observers and drained by the driver.
#[derive(Debug, Default)]
pub(crate) struct SessionControl {
    state: Mutex<ControlState>,
    resumed: Notify,
}

impl SessionControl {
    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Take queued interjections and the finalize flag.
    pub(crate) fn drain(&self) -> (Vec<String>, bool) {
        let mut state = self.lock();
        let messages = std::mem::take(&mut state.messages);
        let finalize = std::mem::take(&mut state.finalize);
        (messages, finalize)
    }

    /// Block until the session is resumed or cancelled.
    pub(crate) async fn wait_while_paused(&self) {
        loop {
            let notified = self.resumed.notified();
            {
                let state = self.lock();
                if !state.paused || state.cancelled {
                    return;
                }
            }
            notified.await;
        }
    }
}

/// Cloneable observer/controller for a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    control: Arc<SessionControl>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Latest published snapshot.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Receiver for status updates.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Queue a user message for the next debate round.
    pub fn interject(&self, message: impl Into<String>) {
        self.control.lock().messages.push(message.into());
    }

    /// Skip remaining rounds and go straight to synthesis.
    pub fn request_finalize(&self) {
        self.control.lock().finalize = true;
    }

    /// Defer further transitions until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.control.lock().paused = true;
    }

    pub fn resume(&self) {
        self.control.lock().paused = false;
        self.control.resumed.notify_waiters();
    }

    /// Tear the session down. Results of in-flight calls are discarded.
    pub fn cancel(&self) {
        self.control.lock().cancelled = true;
        self.control.resumed.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.control.is_cancelled()
    }

    /// Wait until the session reaches a terminal phase. Returns the last
    /// status seen if the driver goes away first.
    pub async fn wait_terminal(&self) -> SessionStatus {
        let mut rx = self.status.clone();
        loop {
            let status = rx.borrow_and_update().clone();
            if status.phase.is_terminal() {
                return status;
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct DeliberationSession {
    id: Uuid,
    actor: String,
    pub(crate) request: AnalysisRequest,
    pub(crate) phase: Phase,
    pub(crate) debate: DebateEngine,
    pub(crate) market: Option<MarketReport>,
    pub(crate) allocation: Option<Allocation>,
    pub(crate) assessment: Option<RiskAssessment>,
    /// Interjections received so far, in arrival order.
    pub(crate) interjections: Vec<String>,
    pub(crate) interrupted: bool,
    pub(crate) finalize_requested: bool,
    pub(crate) resolution: Option<Resolution>,
    pub(crate) record: Option<DecisionRecord>,
    control: Arc<SessionControl>,
    status_tx: watch::Sender<SessionStatus>,
    created_at: DateTime<Utc>,
}

impl DeliberationSession {
    pub(crate) fn new(actor: &str, request: AnalysisRequest, debate: DebateConfig) -> Self {
        let id = Uuid::new_v4();
        let (status_tx, _) = watch::channel(SessionStatus {
            session_id: id,
            phase: Phase::InitialAnalysis,
            round_count: 0,
            interrupted: false,
            finalize_requested: false,
            paused: false,
            verdict: None,
            updated_at: Utc::now(),
        });
        Self {
            id,
            actor: actor.to_string(),
            request,
            phase: Phase::InitialAnalysis,
            debate: DebateEngine::new(debate),
            market: None,
            allocation: None,
            assessment: None,
            interjections: Vec::new(),
            interrupted: false,
            finalize_requested: false,
            resolution: None,
            record: None,
            control: Arc::new(SessionControl::default()),
            status_tx,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn request(&self) -> &AnalysisRequest {
        &self.request
    }

    pub fn market(&self) -> Option<&MarketReport> {
        self.market.as_ref()
    }

    /// Most recent allocation and its assessment.
    pub fn allocation(&self) -> Option<&Allocation> {
        self.allocation.as_ref()
    }

    pub fn assessment(&self) -> Option<&RiskAssessment> {
        self.assessment.as_ref()
    }

    pub fn rounds(&self) -> Vec<DebateRound> {
        self.debate.transcript()
    }

    pub fn round_count(&self) -> u32 {
        self.debate.rounds_completed()
    }

    pub fn interjections(&self) -> &[String] {
        &self.interjections
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    pub fn record(&self) -> Option<&DecisionRecord> {
        self.record.as_ref()
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.id,
            control: Arc::clone(&self.control),
            status: self.status_tx.subscribe(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.snapshot()
    }

    pub(crate) fn control(&self) -> &SessionControl {
        &self.control
    }

    /// Fail if the session was torn down.
    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.control.is_cancelled() {
            Err(EngineError::SessionCancelled(self.id))
        } else {
            Ok(())
        }
    }

    pub(crate) fn publish(&self) {
        self.status_tx.send_replace(self.snapshot());
    }

    fn snapshot(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.id,
            phase: self.phase,
            round_count: self.debate.rounds_completed(),
            interrupted: self.interrupted,
            finalize_requested: self.finalize_requested,
            paused: self.control.is_paused(),
            verdict: self.assessment.as_ref().map(|a| a.verdict),
            updated_at: Utc::now(),
        }
    }
}
