//! Deliberation orchestrator: initial analysis → debate rounds →
//! synthesis → terminal decision.
//!
//! The orchestrator is stateless per session apart from the market cache,
//! the rate limiter, the bounded decision log and a few counters, so one
//! instance can drive any number of sessions concurrently.

pub mod rate_limit;
pub mod session;

pub use rate_limit::{RateLimitConfig, SlidingWindowLimiter};
pub use session::{
    AnalysisRequest, ConsensusSummary, DecisionRecord, DeliberationSession, Outcome, Phase,
    SessionHandle, SessionStatus,
};

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::debate::{ConsensusDecision, DebateConfig, Participant, Stance};
use crate::error::{EngineError, Result};
use crate::providers::{
    DecisionApprover, DecisionSummary, MarketProvider, NarrativeGenerator, PositionDraft,
    PositionProvider, RoundBrief, StrategyProvider,
};
use crate::risk::{RiskLimits, StrategyValidator};
use crate::types::{Allocation, MarketReport, PortfolioContext, RiskAssessment, Verdict};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Upper bound on any single collaborator call.
    pub collaborator_timeout_ms: u64,
    /// Largest single-weight change that still counts as "the same" allocation.
    pub material_change_threshold: f64,
    /// Decision records kept in memory.
    pub decision_log_retention: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            collaborator_timeout_ms: 5_000,
            material_change_threshold: 0.01,
            decision_log_retention: 256,
        }
    }
}

/// External services the orchestrator consults.
#[derive(Clone)]
pub struct Collaborators {
    pub market: Arc<dyn MarketProvider>,
    pub strategy: Arc<dyn StrategyProvider>,
    pub panel: Arc<dyn PositionProvider>,
    pub narrator: Arc<dyn NarrativeGenerator>,
    /// Without an approver the risk verdict decides.
    pub approver: Option<Arc<dyn DecisionApprover>>,
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Counters {
    sessions_opened: AtomicU64,
    sessions_completed: AtomicU64,
    sessions_cancelled: AtomicU64,
    rounds_run: AtomicU64,
    fallbacks: AtomicU64,
}

/// Point-in-time copy of the process-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStats {
    pub sessions_opened: u64,
    pub sessions_completed: u64,
    pub sessions_cancelled: u64,
    pub rounds_run: u64,
    /// Collaborator failures or timeouts that were replaced by a fallback.
    pub fallbacks: u64,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct DeliberationOrchestrator {
    config: OrchestratorConfig,
    debate: DebateConfig,
    limits: RiskLimits,
    validator: Arc<StrategyValidator>,
    collaborators: Collaborators,
    limiter: SlidingWindowLimiter,
    market_cache: Mutex<Option<MarketReport>>,
    decisions: Mutex<VecDeque<DecisionRecord>>,
    counters: Counters,
}

impl DeliberationOrchestrator {
    pub fn new(validator: StrategyValidator, collaborators: Collaborators) -> Self {
        Self {
            config: OrchestratorConfig::default(),
            debate: DebateConfig::default(),
            limits: RiskLimits::default(),
            validator: Arc::new(validator),
            collaborators,
            limiter: SlidingWindowLimiter::new(&RateLimitConfig::default()),
            market_cache: Mutex::new(None),
            decisions: Mutex::new(VecDeque::new()),
            counters: Counters::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_debate(mut self, debate: DebateConfig) -> Self {
        self.debate = debate;
        self
    }

    pub fn with_limits(mut self, limits: RiskLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_rate_limit(mut self, config: &RateLimitConfig) -> Self {
        self.limiter = SlidingWindowLimiter::new(config);
        self
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    // -- Session lifecycle -------------------------------------------------

    /// Create a session for `actor`, subject to the per-actor rate limit.
    pub fn open_session(&self, actor: &str, request: AnalysisRequest) -> Result<DeliberationSession> {
        self.limiter.check(actor)?;
        let session = DeliberationSession::new(actor, request, self.debate.clone());
        self.counters.sessions_opened.fetch_add(1, Ordering::Relaxed);
        info!(session_id = %session.id(), actor, "Session opened");
        Ok(session)
    }

    /// Open a session and drive it to completion on a background task.
    pub fn spawn_session(
        self: &Arc<Self>,
        actor: &str,
        request: AnalysisRequest,
    ) -> Result<(SessionHandle, JoinHandle<Result<DecisionRecord>>)> {
        let mut session = self.open_session(actor, request)?;
        let handle = session.handle();
        let this = Arc::clone(self);
        let task = tokio::spawn(async move { this.run(&mut session).await });
        Ok((handle, task))
    }

    /// Advance until the session is terminal and return its decision.
    pub async fn run(&self, session: &mut DeliberationSession) -> Result<DecisionRecord> {
        while !session.phase().is_terminal() {
            self.advance(session).await?;
        }
        session
            .record()
            .cloned()
            .ok_or_else(|| EngineError::SessionState("terminal session has no decision".into()))
    }

    /// Perform exactly one phase step.
    ///
    /// Waits while the session is paused. Advancing a terminal session is
    /// a contract violation.
    pub async fn advance(&self, session: &mut DeliberationSession) -> Result<Phase> {
        if session.phase().is_terminal() {
            return Err(EngineError::SessionState(format!(
                "session {} is already {}",
                session.id(),
                session.phase()
            )));
        }

        if session.control().is_paused() {
            debug!(session_id = %session.id(), "Session paused; deferring transition");
            session.publish();
        }
        session.control().wait_while_paused().await;

        let step = match session.phase() {
            Phase::InitialAnalysis => self.initial_analysis(session).await,
            Phase::Deliberation => self.deliberation_round(session).await,
            Phase::Synthesis => self.synthesize(session).await,
            Phase::Terminal(_) => Err(EngineError::SessionState("terminal".into())),
        };

        let next = match step {
            Ok(next) => next,
            Err(e) => {
                if matches!(e, EngineError::SessionCancelled(_)) {
                    self.counters.sessions_cancelled.fetch_add(1, Ordering::Relaxed);
                    warn!(session_id = %session.id(), "Session torn down; results discarded");
                }
                session.publish();
                return Err(e);
            }
        };

        if next != session.phase() {
            info!(
                session_id = %session.id(),
                from = %session.phase(),
                to = %next,
                "Phase transition"
            );
        }
        session.phase = next;
        session.publish();
        Ok(next)
    }

    // -- Phases ------------------------------------------------------------

    async fn initial_analysis(&self, session: &mut DeliberationSession) -> Result<Phase> {
        let session_id = session.id();
        session.ensure_live()?;
        let market = self.scan_market(session_id).await;
        session.ensure_live()?;

        // The more severe of the caller's and the market's regime applies.
        let portfolio = &mut session.request.portfolio;
        if market.regime.multiplier() > portfolio.regime.multiplier() {
            debug!(
                %session_id,
                from = %portfolio.regime,
                to = %market.regime,
                "Escalating regime from market report"
            );
            portfolio.regime = market.regime;
        }

        let proposal = match self
            .call(
                "strategy",
                self.collaborators.strategy.propose(
                    &market,
                    &session.request.portfolio,
                    &session.request.profile,
                ),
            )
            .await
        {
            Ok(allocation) => allocation,
            Err(e) => {
                self.note_fallback("strategy", &e);
                session
                    .request
                    .portfolio
                    .current_allocation()
                    .unwrap_or_else(Allocation::all_cash)
            }
        };
        session.ensure_live()?;

        let assessment = self.assess(&proposal, &session.request.portfolio).await;
        session.ensure_live()?;

        info!(
            session_id = %session.id(),
            allocation = %proposal,
            verdict = %assessment.verdict,
            var95 = format!("{:.2}%", assessment.var_95() * 100.0),
            score = format!("{:.2}", assessment.risk_score),
            "Initial analysis complete"
        );

        session.market = Some(market);
        session.allocation = Some(proposal);
        session.assessment = Some(assessment);
        Ok(Phase::Deliberation)
    }

    async fn deliberation_round(&self, session: &mut DeliberationSession) -> Result<Phase> {
        let (messages, finalize) = session.control().drain();
        if !messages.is_empty() {
            info!(
                session_id = %session.id(),
                messages = messages.len(),
                "User interjection queued for next round"
            );
            session.interrupted = true;
            session.interjections.extend(messages.iter().cloned());
        }
        if finalize {
            info!(session_id = %session.id(), "Finalize requested; skipping to synthesis");
            session.finalize_requested = true;
            return Ok(Phase::Synthesis);
        }
        if session.debate.max_rounds_reached() {
            return Ok(Phase::Synthesis);
        }

        let allocation = session.allocation.clone().ok_or_else(missing_analysis)?;
        let assessment = session.assessment.clone().ok_or_else(missing_analysis)?;
        let market = session.market.clone().ok_or_else(missing_analysis)?;
        let topic = session
            .request
            .topic
            .clone()
            .unwrap_or_else(|| format!("Deploy allocation {allocation}"));

        let round = session.debate.start_round(topic.clone())?;
        for message in &messages {
            session.debate.add_context(message.clone())?;
        }

        let mut brief = RoundBrief {
            session_id: session.id(),
            round,
            topic,
            context: messages,
            allocation,
            assessment,
            market,
            prior_positions: Vec::new(),
        };

        for participant in speaking_order(round) {
            let draft = match self
                .call(
                    "position",
                    self.collaborators.panel.deliberate(participant, &brief),
                )
                .await
            {
                Ok(draft) => draft,
                Err(e) => {
                    self.note_fallback("position", &e);
                    PositionDraft::abstain(format!("No position: {e}"))
                }
            };
            session.ensure_live()?;

            if let Err(e) = session.debate.record_position(
                participant,
                draft.stance,
                draft.reasoning.clone(),
                draft.confidence,
            ) {
                warn!(
                    session_id = %session.id(),
                    participant = %participant,
                    error = %e,
                    "Invalid position; recording abstention"
                );
                session.debate.record_position(
                    participant,
                    Stance::Abstain,
                    format!("Invalid position: {e}"),
                    0.0,
                )?;
            }
            if let Some(position) = session
                .debate
                .active_round()
                .and_then(|r| r.position_of(participant))
            {
                brief.prior_positions.push(position.clone());
            }
        }

        let reached = session.debate.finalize_round()?.consensus_reached();
        self.counters.rounds_run.fetch_add(1, Ordering::Relaxed);

        if reached {
            return Ok(Phase::Synthesis);
        }
        if session.debate.max_rounds_reached() {
            let strategy = session.debate.config().conflict_strategy;
            session.resolution = Some(session.debate.resolve_latest(strategy)?);
            return Ok(Phase::Synthesis);
        }
        Ok(Phase::Deliberation)
    }

    async fn synthesize(&self, session: &mut DeliberationSession) -> Result<Phase> {
        let original = session.allocation.clone().ok_or_else(missing_analysis)?;
        let original_assessment = session.assessment.clone().ok_or_else(missing_analysis)?;
        let transcript = session.debate.transcript();

        let candidate = match self
            .call(
                "strategy",
                self.collaborators.strategy.revise(&original, &transcript),
            )
            .await
        {
            Ok(allocation) => allocation,
            Err(e) => {
                self.note_fallback("strategy", &e);
                original.clone()
            }
        };
        session.ensure_live()?;

        let (allocation, assessment, revised) = if candidate
            .differs_materially(&original, self.config.material_change_threshold)
        {
            let fresh = self.assess(&candidate, &session.request.portfolio).await;
            session.ensure_live()?;
            if fresh.verdict == Verdict::Rejected && original_assessment.verdict != Verdict::Rejected {
                info!(
                    session_id = %session.id(),
                    revised = %candidate,
                    "Revised allocation rejected; keeping original"
                );
                (original, original_assessment, false)
            } else {
                info!(
                    session_id = %session.id(),
                    revised = %candidate,
                    verdict = %fresh.verdict,
                    "Revised allocation accepted"
                );
                (candidate, fresh, true)
            }
        } else {
            debug!(session_id = %session.id(), "Revision not material; keeping original");
            (original, original_assessment, false)
        };

        // A debate cut short by finalize still needs a forced decision.
        if session.resolution.is_none()
            && session
                .debate
                .latest()
                .map(|r| !r.consensus_reached())
                .unwrap_or(false)
        {
            let strategy = session.debate.config().conflict_strategy;
            session.resolution = Some(session.debate.resolve_latest(strategy)?);
        }
        let consensus =
            ConsensusSummary::from_round(session.debate.latest(), session.resolution.as_ref());

        let summary = DecisionSummary {
            session_id: session.id(),
            allocation: allocation.clone(),
            verdict: assessment.verdict,
            risk_score: assessment.risk_score,
            var_95: assessment.var_95(),
            reasons: assessment.reasons.clone(),
            consensus_reached: consensus.reached,
            decision: consensus.decision,
            round_count: session.round_count(),
            revised,
            decided_at: chrono::Utc::now(),
        };

        let approved = self.approval(&summary).await;
        session.ensure_live()?;

        let narrative = match self
            .call("narrative", self.collaborators.narrator.explain(&summary))
            .await
        {
            Ok(text) => text,
            Err(e) => {
                self.note_fallback("narrative", &e);
                summary.fallback_narrative()
            }
        };
        session.ensure_live()?;

        let outcome = if approved
            && assessment.is_approvable()
            && consensus.decision != ConsensusDecision::Reject
        {
            Outcome::Approved
        } else {
            Outcome::Rejected
        };

        let record = DecisionRecord {
            session_id: session.id(),
            actor: session.actor().to_string(),
            allocation: allocation.clone(),
            assessment: assessment.clone(),
            consensus,
            approved,
            outcome,
            round_count: session.round_count(),
            revised,
            narrative,
            decided_at: summary.decided_at,
        };

        info!(
            session_id = %record.session_id,
            outcome = ?record.outcome,
            approved = record.approved,
            verdict = %record.assessment.verdict,
            decision = %record.consensus.decision,
            rounds = record.round_count,
            revised = record.revised,
            "Decision reached"
        );

        self.log_decision(record.clone());
        self.counters.sessions_completed.fetch_add(1, Ordering::Relaxed);

        session.allocation = Some(allocation);
        session.assessment = Some(assessment);
        session.record = Some(record);
        Ok(Phase::Terminal(outcome))
    }

    // -- Collaborator helpers ------------------------------------------------

    /// Await a collaborator call with the configured timeout.
    async fn call<T, F>(&self, collaborator: &'static str, fut: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let timeout_ms = self.config.collaborator_timeout_ms;
        match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::ExternalTimeout {
                collaborator,
                timeout_ms,
            }
            .into()),
        }
    }

    fn note_fallback(&self, collaborator: &'static str, error: &anyhow::Error) {
        self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
        warn!(collaborator, error = %error, "Collaborator failed; using fallback");
    }

    /// Scan the market, falling back to the last good report or a neutral
    /// default.
    async fn scan_market(&self, session_id: Uuid) -> MarketReport {
        match self.call("market", self.collaborators.market.scan()).await {
            Ok(report) => {
                *self.market_cache.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(report.clone());
                debug!(%session_id, regime = %report.regime, "Market scanned");
                report
            }
            Err(e) => {
                self.note_fallback("market", &e);
                self.market_cache
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone()
                    .unwrap_or_else(MarketReport::neutral_default)
            }
        }
    }

    async fn approval(&self, summary: &DecisionSummary) -> bool {
        let default = summary.verdict.is_approvable();
        let Some(approver) = &self.collaborators.approver else {
            return default;
        };
        match self.call("approver", approver.approve(summary)).await {
            Ok(approved) => approved,
            Err(e) => {
                self.note_fallback("approver", &e);
                default
            }
        }
    }

    /// Run the validator on a blocking thread. Input problems become a
    /// rejected assessment instead of an error.
    async fn assess(&self, allocation: &Allocation, portfolio: &PortfolioContext) -> RiskAssessment {
        let validator = Arc::clone(&self.validator);
        let limits = self.limits.clone();
        let allocation = allocation.clone();
        let portfolio = portfolio.clone();
        let regime = portfolio.regime;

        let joined = tokio::task::spawn_blocking(move || {
            validator.validate(&allocation, &portfolio, &limits)
        })
        .await;

        match joined {
            Ok(Ok(assessment)) => assessment,
            Ok(Err(e)) => {
                warn!(error = %e, "Allocation could not be assessed; rejecting");
                RiskAssessment::rejected_input(format!("Allocation could not be assessed: {e}"), regime)
            }
            Err(e) => {
                error!(error = %e, "Risk validation task failed");
                RiskAssessment::rejected_input(format!("Risk validation task failed: {e}"), regime)
            }
        }
    }

    // -- Decision log --------------------------------------------------------

    fn log_decision(&self, record: DecisionRecord) {
        let mut log = self.decisions.lock().unwrap_or_else(PoisonError::into_inner);
        log.push_back(record);
        while log.len() > self.config.decision_log_retention.max(1) {
            log.pop_front();
        }
    }

    /// Most recent decisions, oldest first.
    pub fn recent_decisions(&self) -> Vec<DecisionRecord> {
        self.decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn decision(&self, session_id: Uuid) -> Option<DecisionRecord> {
        self.decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| r.session_id == session_id)
            .cloned()
    }

    pub fn stats(&self) -> OrchestratorStats {
        let c = &self.counters;
        OrchestratorStats {
            sessions_opened: c.sessions_opened.load(Ordering::Relaxed),
            sessions_completed: c.sessions_completed.load(Ordering::Relaxed),
            sessions_cancelled: c.sessions_cancelled.load(Ordering::Relaxed),
            rounds_run: c.rounds_run.load(Ordering::Relaxed),
            fallbacks: c.fallbacks.load(Ordering::Relaxed),
        }
    }
}

/// Fixed role order rotated by one seat each round.
pub fn speaking_order(round: u32) -> Vec<Participant> {
    let mut order = Participant::ALL.to_vec();
    if !order.is_empty() {
        let shift = (round.saturating_sub(1) as usize) % order.len();
        order.rotate_left(shift);
    }
    order
}

fn missing_analysis() -> EngineError {
    EngineError::SessionState("initial analysis has not produced an allocation".into())
}
