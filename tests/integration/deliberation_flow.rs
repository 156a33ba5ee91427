//! End-to-end deliberation sessions against in-memory collaborators.

use anyhow::anyhow;
use async_trait::async_trait;
use futures::future::join_all;
use mockall::mock;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

use deliberation_engine::debate::{ConsensusDecision, DebateConfig, Participant, ResolutionStrategy};
use deliberation_engine::deliberation::{
    AnalysisRequest, Collaborators, DeliberationOrchestrator, OrchestratorConfig, Outcome, Phase,
    RateLimitConfig,
};
use deliberation_engine::error::EngineError;
use deliberation_engine::providers::rule_based::{
    RuleBasedPanel, RuleBasedStrategist, StaticMarketProvider, TemplateNarrator,
};
use deliberation_engine::providers::{
    DecisionApprover, DecisionSummary, MarketProvider, NarrativeGenerator, PositionProvider,
    StrategyProvider,
};
use deliberation_engine::risk::{
    AssetTable, RiskLimits, SimulationConfig, SimulationSeed, StrategyValidator,
};
use deliberation_engine::types::{Allocation, MarketRegime, PortfolioContext, Verdict, CASH};

use crate::mock_collaborators::{FixedStrategy, FlakyMarket, ScriptedPanel};

mock! {
    pub Narrator {}
    #[async_trait]
    impl NarrativeGenerator for Narrator {
        async fn explain(&self, summary: &DecisionSummary) -> anyhow::Result<String>;
    }
}

mock! {
    pub Approver {}
    #[async_trait]
    impl DecisionApprover for Approver {
        async fn approve(&self, summary: &DecisionSummary) -> anyhow::Result<bool>;
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_validator() -> StrategyValidator {
    StrategyValidator::new(
        AssetTable::default(),
        SimulationConfig {
            paths: 400,
            horizon_days: 126,
            risk_free_rate: 0.0,
        },
        SimulationSeed::Fixed(42),
    )
}

fn make_orchestrator(
    market: Arc<dyn MarketProvider>,
    strategy: Arc<dyn StrategyProvider>,
    panel: Arc<dyn PositionProvider>,
) -> DeliberationOrchestrator {
    DeliberationOrchestrator::new(
        make_validator(),
        Collaborators {
            market,
            strategy,
            panel,
            narrator: Arc::new(TemplateNarrator),
            approver: None,
        },
    )
}

/// Limits under which an all-cash allocation is approved outright.
fn lenient() -> RiskLimits {
    RiskLimits {
        min_sharpe: -100.0,
        ..RiskLimits::default()
    }
}

fn make_request() -> AnalysisRequest {
    AnalysisRequest::new(PortfolioContext::new(dec!(500000), MarketRegime::Normal).unwrap())
}

fn cash_strategy() -> Arc<FixedStrategy> {
    Arc::new(FixedStrategy::new(Allocation::all_cash()))
}

// ---------------------------------------------------------------------------
// Happy path and forced decisions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unanimous_panel_approves_in_one_round() {
    let orchestrator = make_orchestrator(
        Arc::new(FlakyMarket::new(MarketRegime::Normal)),
        cash_strategy(),
        Arc::new(ScriptedPanel::unanimous()),
    )
    .with_limits(lenient());

    let mut session = assert_ok!(orchestrator.open_session("alice", make_request()));
    let record = assert_ok!(orchestrator.run(&mut session).await);

    assert_eq!(record.assessment.verdict, Verdict::Approved);
    assert!(record.consensus.reached);
    assert_eq!(record.consensus.decision, ConsensusDecision::Approve);
    assert_eq!(record.consensus.level, 1.0);
    assert_eq!(record.consensus.resolved_by, None);
    assert_eq!(record.round_count, 1);
    assert!(record.approved);
    assert!(!record.revised);
    assert_eq!(record.outcome, Outcome::Approved);
    assert_eq!(session.phase(), Phase::Terminal(Outcome::Approved));
    assert_eq!(session.handle().status().phase, Phase::Terminal(Outcome::Approved));
}

#[tokio::test]
async fn test_deadlock_is_resolved_risk_averse_after_max_rounds() {
    let strategy = cash_strategy();
    let orchestrator = make_orchestrator(
        Arc::new(FlakyMarket::new(MarketRegime::Normal)),
        strategy.clone(),
        Arc::new(ScriptedPanel::deadlocked()),
    )
    .with_limits(lenient());

    let mut session = assert_ok!(orchestrator.open_session("alice", make_request()));
    let record = assert_ok!(orchestrator.run(&mut session).await);

    assert_eq!(record.round_count, 3);
    assert!(!record.consensus.reached);
    assert_eq!(record.consensus.resolved_by, Some(ResolutionStrategy::RiskAverse));
    assert_eq!(record.consensus.decision, ConsensusDecision::Reject);
    assert_eq!(record.consensus.winner, Some(Participant::Risk));
    // The validator alone would approve; the forced debate outcome does not.
    assert!(record.approved);
    assert_eq!(record.outcome, Outcome::Rejected);

    let rounds = session.rounds();
    assert_eq!(rounds.len(), 3);
    let last = rounds[2].consensus.unwrap();
    assert!((last.agree_fraction - 1.0 / 1.9).abs() < 1e-9);
    assert!((last.disagree_fraction - 0.9 / 1.9).abs() < 1e-9);

    assert_eq!(strategy.revise_calls(), 1);
    assert_eq!(strategy.transcripts_seen(), vec![3]);
    // The unscripted explainer failed every round.
    assert!(orchestrator.stats().fallbacks >= 3);
}

#[tokio::test]
async fn test_conflict_strategy_comes_from_debate_config() {
    let orchestrator = make_orchestrator(
        Arc::new(FlakyMarket::new(MarketRegime::Normal)),
        cash_strategy(),
        Arc::new(ScriptedPanel::deadlocked()),
    )
    .with_limits(lenient())
    .with_debate(DebateConfig {
        max_rounds: 2,
        conflict_strategy: ResolutionStrategy::Majority,
        ..DebateConfig::default()
    });

    let mut session = assert_ok!(orchestrator.open_session("alice", make_request()));
    let record = assert_ok!(orchestrator.run(&mut session).await);

    assert_eq!(record.round_count, 2);
    assert_eq!(record.consensus.resolved_by, Some(ResolutionStrategy::Majority));
    assert_eq!(record.consensus.decision, ConsensusDecision::Approve);
    assert_eq!(record.outcome, Outcome::Approved);
}

#[tokio::test]
async fn test_rejected_allocation_carries_reasons() {
    let orchestrator = make_orchestrator(
        Arc::new(StaticMarketProvider::with_regime(MarketRegime::Normal)),
        Arc::new(FixedStrategy::new(Allocation::new([("QQQ", 1.0)]).unwrap())),
        Arc::new(RuleBasedPanel),
    );

    let mut session = assert_ok!(orchestrator.open_session("alice", make_request()));
    let record = assert_ok!(orchestrator.run(&mut session).await);

    assert_eq!(record.assessment.verdict, Verdict::Rejected);
    assert!(record
        .assessment
        .reasons
        .iter()
        .any(|r| r.contains("Position limit exceeded: QQQ")));
    assert!(!record.approved);
    assert_eq!(record.outcome, Outcome::Rejected);
    assert_eq!(record.consensus.decision, ConsensusDecision::Reject);
}

#[tokio::test]
async fn test_unknown_asset_is_rejected_not_fatal() {
    let orchestrator = make_orchestrator(
        Arc::new(FlakyMarket::new(MarketRegime::Normal)),
        Arc::new(FixedStrategy::new(Allocation::new([("DOGE", 1.0)]).unwrap())),
        Arc::new(RuleBasedPanel),
    );

    let mut session = assert_ok!(orchestrator.open_session("alice", make_request()));
    let record = assert_ok!(orchestrator.run(&mut session).await);

    assert_eq!(record.assessment.verdict, Verdict::Rejected);
    assert!(record.assessment.reasons[0].contains("DOGE"));
    assert_eq!(record.outcome, Outcome::Rejected);
}

// ---------------------------------------------------------------------------
// Collaborator failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_market_failure_uses_cached_report() {
    let market = Arc::new(FlakyMarket::new(MarketRegime::Crisis));
    let orchestrator = make_orchestrator(
        market.clone(),
        cash_strategy(),
        Arc::new(ScriptedPanel::unanimous()),
    );

    let mut first = assert_ok!(orchestrator.open_session("alice", make_request()));
    assert_ok!(orchestrator.run(&mut first).await);

    market.set_error("feed down");
    let mut second = assert_ok!(orchestrator.open_session("alice", make_request()));
    assert_ok!(orchestrator.run(&mut second).await);

    assert_eq!(market.calls(), 2);
    let report = second.market().unwrap();
    assert_eq!(report.source, "flaky");
    assert_eq!(report.regime, MarketRegime::Crisis);
    // The crisis view escalates the caller's normal regime.
    assert_eq!(second.request().portfolio.regime, MarketRegime::Crisis);
    assert_eq!(orchestrator.stats().fallbacks, 1);
}

#[tokio::test]
async fn test_market_failure_without_cache_uses_default() {
    let orchestrator = make_orchestrator(
        Arc::new(FlakyMarket::failing("no feed")),
        cash_strategy(),
        Arc::new(ScriptedPanel::unanimous()),
    );

    let mut session = assert_ok!(orchestrator.open_session("alice", make_request()));
    assert_ok!(orchestrator.run(&mut session).await);

    let report = session.market().unwrap();
    assert_eq!(report.source, "default");
    assert_eq!(report.regime, MarketRegime::Normal);
}

#[tokio::test]
async fn test_strategy_timeout_keeps_current_positions() {
    let strategy = Arc::new(
        FixedStrategy::new(Allocation::new([("QQQ", 1.0)]).unwrap())
            .with_delay(Duration::from_millis(500)),
    );
    let orchestrator = make_orchestrator(
        Arc::new(FlakyMarket::new(MarketRegime::Normal)),
        strategy,
        Arc::new(ScriptedPanel::unanimous()),
    )
    .with_config(OrchestratorConfig {
        collaborator_timeout_ms: 50,
        ..OrchestratorConfig::default()
    });

    let portfolio = PortfolioContext::new(dec!(500000), MarketRegime::Normal)
        .unwrap()
        .with_position("SPY", dec!(300000))
        .with_position("AGG", dec!(200000));
    let mut session = assert_ok!(orchestrator.open_session("alice", AnalysisRequest::new(portfolio)));
    let record = assert_ok!(orchestrator.run(&mut session).await);

    assert!((record.allocation.weight("SPY") - 0.6).abs() < 1e-9);
    assert!((record.allocation.weight("AGG") - 0.4).abs() < 1e-9);
    assert_eq!(record.allocation.weight("QQQ"), 0.0);
    assert!(!record.revised);
    // Both propose and revise timed out.
    assert_eq!(orchestrator.stats().fallbacks, 2);
}

#[tokio::test]
async fn test_strategy_timeout_without_positions_holds_cash() {
    let strategy = Arc::new(
        FixedStrategy::new(Allocation::new([("QQQ", 1.0)]).unwrap())
            .with_delay(Duration::from_millis(500)),
    );
    let orchestrator = make_orchestrator(
        Arc::new(FlakyMarket::new(MarketRegime::Normal)),
        strategy,
        Arc::new(ScriptedPanel::unanimous()),
    )
    .with_config(OrchestratorConfig {
        collaborator_timeout_ms: 50,
        ..OrchestratorConfig::default()
    });

    let mut session = assert_ok!(orchestrator.open_session("alice", make_request()));
    let record = assert_ok!(orchestrator.run(&mut session).await);
    assert_eq!(record.allocation, Allocation::all_cash());
}

#[tokio::test]
async fn test_narrative_failure_uses_template() {
    let mut narrator = MockNarrator::new();
    narrator
        .expect_explain()
        .times(1)
        .returning(|_| Err(anyhow!("model offline")));

    let orchestrator = DeliberationOrchestrator::new(
        make_validator(),
        Collaborators {
            market: Arc::new(FlakyMarket::new(MarketRegime::Normal)),
            strategy: cash_strategy(),
            panel: Arc::new(ScriptedPanel::unanimous()),
            narrator: Arc::new(narrator),
            approver: None,
        },
    );

    let mut session = assert_ok!(orchestrator.open_session("alice", make_request()));
    let record = assert_ok!(orchestrator.run(&mut session).await);
    assert!(record.narrative.contains("by the risk validator"));
    assert!(record.narrative.contains("reached consensus"));
}

#[tokio::test]
async fn test_external_approver_decides() {
    let mut approver = MockApprover::new();
    approver
        .expect_approve()
        .withf(|summary| summary.consensus_reached && summary.verdict == Verdict::Approved)
        .times(1)
        .returning(|_| Ok(false));

    let orchestrator = DeliberationOrchestrator::new(
        make_validator(),
        Collaborators {
            market: Arc::new(FlakyMarket::new(MarketRegime::Normal)),
            strategy: cash_strategy(),
            panel: Arc::new(ScriptedPanel::unanimous()),
            narrator: Arc::new(TemplateNarrator),
            approver: Some(Arc::new(approver)),
        },
    )
    .with_limits(lenient());

    let mut session = assert_ok!(orchestrator.open_session("alice", make_request()));
    let record = assert_ok!(orchestrator.run(&mut session).await);
    assert!(!record.approved);
    assert_eq!(record.outcome, Outcome::Rejected);
}

#[tokio::test]
async fn test_approver_failure_defaults_to_verdict() {
    let mut approver = MockApprover::new();
    approver
        .expect_approve()
        .times(1)
        .returning(|_| Err(anyhow!("approval service unavailable")));

    let orchestrator = DeliberationOrchestrator::new(
        make_validator(),
        Collaborators {
            market: Arc::new(FlakyMarket::new(MarketRegime::Normal)),
            strategy: cash_strategy(),
            panel: Arc::new(ScriptedPanel::unanimous()),
            narrator: Arc::new(TemplateNarrator),
            approver: Some(Arc::new(approver)),
        },
    )
    .with_limits(lenient());

    let mut session = assert_ok!(orchestrator.open_session("alice", make_request()));
    let record = assert_ok!(orchestrator.run(&mut session).await);
    assert!(record.approved);
    assert_eq!(record.outcome, Outcome::Approved);
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_material_revision_is_revalidated_and_accepted() {
    let revision = Allocation::new([(CASH, 0.5), ("AGG", 0.25), ("IEF", 0.25)]).unwrap();
    let orchestrator = make_orchestrator(
        Arc::new(FlakyMarket::new(MarketRegime::Normal)),
        Arc::new(FixedStrategy::new(Allocation::all_cash()).with_revision(revision.clone())),
        Arc::new(ScriptedPanel::unanimous()),
    );

    let mut session = assert_ok!(orchestrator.open_session("alice", make_request()));
    let record = assert_ok!(orchestrator.run(&mut session).await);

    assert!(record.revised);
    assert_eq!(record.allocation, revision);
    assert_ne!(record.assessment.verdict, Verdict::Rejected);
    assert!(record.assessment.simulation.is_some());
    assert_eq!(session.allocation(), Some(&revision));
}

#[tokio::test]
async fn test_rejected_revision_keeps_original() {
    let orchestrator = make_orchestrator(
        Arc::new(FlakyMarket::new(MarketRegime::Normal)),
        Arc::new(
            FixedStrategy::new(Allocation::all_cash())
                .with_revision(Allocation::new([("QQQ", 1.0)]).unwrap()),
        ),
        Arc::new(ScriptedPanel::unanimous()),
    );

    let mut session = assert_ok!(orchestrator.open_session("alice", make_request()));
    let record = assert_ok!(orchestrator.run(&mut session).await);

    assert!(!record.revised);
    assert_eq!(record.allocation, Allocation::all_cash());
    assert_ne!(record.assessment.verdict, Verdict::Rejected);
}

#[tokio::test]
async fn test_immaterial_revision_is_ignored() {
    let nudge = Allocation::new([(CASH, 0.995), ("AGG", 0.005)]).unwrap();
    let orchestrator = make_orchestrator(
        Arc::new(FlakyMarket::new(MarketRegime::Normal)),
        Arc::new(FixedStrategy::new(Allocation::all_cash()).with_revision(nudge)),
        Arc::new(ScriptedPanel::unanimous()),
    );

    let mut session = assert_ok!(orchestrator.open_session("alice", make_request()));
    let record = assert_ok!(orchestrator.run(&mut session).await);

    assert!(!record.revised);
    assert_eq!(record.allocation, Allocation::all_cash());
}

// ---------------------------------------------------------------------------
// Interjection, pause and cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_interjection_is_context_for_next_round() {
    let panel = Arc::new(ScriptedPanel::deadlocked());
    let orchestrator = make_orchestrator(
        Arc::new(FlakyMarket::new(MarketRegime::Normal)),
        cash_strategy(),
        panel.clone(),
    );

    let mut session = assert_ok!(orchestrator.open_session("alice", make_request()));
    let handle = session.handle();
    assert_eq!(assert_ok!(orchestrator.advance(&mut session).await), Phase::Deliberation);

    handle.interject("Keep at least 20% in cash");
    assert_eq!(assert_ok!(orchestrator.advance(&mut session).await), Phase::Deliberation);
    assert_eq!(assert_ok!(orchestrator.advance(&mut session).await), Phase::Deliberation);

    let rounds = session.rounds();
    assert_eq!(rounds[0].context, vec!["Keep at least 20% in cash".to_string()]);
    assert!(rounds[1].context.is_empty());
    assert!(session.is_interrupted());
    assert!(handle.status().interrupted);
    assert_eq!(handle.status().round_count, 2);

    let briefs = panel.briefs();
    assert_eq!(briefs.len(), 8);
    // Round 1 opens with risk, round 2 with strategy.
    assert_eq!(briefs[0].0, Participant::Risk);
    assert_eq!(briefs[4].0, Participant::Strategy);
    assert!(briefs[..4].iter().all(|(_, b)| b.context.len() == 1));
    assert_eq!(briefs[1].1.prior_positions.len(), 1);
    assert_eq!(briefs[1].1.prior_positions[0].participant, Participant::Risk);
}

#[tokio::test]
async fn test_finalize_skips_remaining_rounds() {
    let orchestrator = make_orchestrator(
        Arc::new(FlakyMarket::new(MarketRegime::Normal)),
        cash_strategy(),
        Arc::new(ScriptedPanel::deadlocked()),
    );

    let mut session = assert_ok!(orchestrator.open_session("alice", make_request()));
    let handle = session.handle();
    assert_ok!(orchestrator.advance(&mut session).await);
    assert_ok!(orchestrator.advance(&mut session).await);

    handle.interject("Wrap it up");
    handle.request_finalize();
    assert_eq!(assert_ok!(orchestrator.advance(&mut session).await), Phase::Synthesis);

    let record = assert_ok!(orchestrator.run(&mut session).await);
    assert_eq!(record.round_count, 1);
    // The single deadlocked round is still forced to a decision.
    assert_eq!(record.consensus.resolved_by, Some(ResolutionStrategy::RiskAverse));
    assert_eq!(session.interjections(), &["Wrap it up".to_string()]);
}

#[tokio::test]
async fn test_pause_defers_transitions_until_resume() {
    let orchestrator = Arc::new(make_orchestrator(
        Arc::new(FlakyMarket::new(MarketRegime::Normal)),
        cash_strategy(),
        Arc::new(ScriptedPanel::deadlocked()),
    ));

    let mut session = assert_ok!(orchestrator.open_session("alice", make_request()));
    let handle = session.handle();
    handle.pause();

    let task = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move {
            let phase = orchestrator.advance(&mut session).await;
            (phase, session)
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!task.is_finished());
    let status = handle.status();
    assert!(status.paused);
    assert_eq!(status.phase, Phase::InitialAnalysis);

    // Signals sent while paused are queued, not dropped.
    handle.interject("Consider gold");
    handle.resume();

    let (phase, mut session) = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("resume should unblock the session")
        .unwrap();
    assert_eq!(assert_ok!(phase), Phase::Deliberation);

    assert_ok!(orchestrator.advance(&mut session).await);
    assert_eq!(session.rounds()[0].context, vec!["Consider gold".to_string()]);
}

#[tokio::test]
async fn test_cancel_discards_in_flight_result() {
    let gate = Arc::new(Notify::new());
    let strategy = Arc::new(FixedStrategy::new(Allocation::all_cash()).gated(gate.clone()));
    let entered = strategy.entered();
    let orchestrator = Arc::new(make_orchestrator(
        Arc::new(FlakyMarket::new(MarketRegime::Normal)),
        strategy,
        Arc::new(ScriptedPanel::unanimous()),
    ));

    let (handle, task) = assert_ok!(orchestrator.spawn_session("alice", make_request()));
    tokio::time::timeout(Duration::from_secs(5), entered.notified())
        .await
        .expect("proposal call should start");

    handle.cancel();
    gate.notify_one();

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("session should stop")
        .unwrap();
    assert_eq!(assert_err!(result), EngineError::SessionCancelled(handle.id()));
    assert!(handle.is_cancelled());
    assert_eq!(handle.status().phase, Phase::InitialAnalysis);
    assert_eq!(handle.status().verdict, None);
    assert_eq!(orchestrator.stats().sessions_cancelled, 1);
    assert!(orchestrator.recent_decisions().is_empty());
}

#[tokio::test]
async fn test_advancing_terminal_session_is_state_error() {
    let orchestrator = make_orchestrator(
        Arc::new(FlakyMarket::new(MarketRegime::Normal)),
        cash_strategy(),
        Arc::new(ScriptedPanel::unanimous()),
    );
    let mut session = assert_ok!(orchestrator.open_session("alice", make_request()));
    assert_ok!(orchestrator.run(&mut session).await);

    let err = assert_err!(orchestrator.advance(&mut session).await);
    assert!(matches!(err, EngineError::SessionState(_)));
}

// ---------------------------------------------------------------------------
// Concurrency and rate limiting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_rate_limit_is_per_actor() {
    let orchestrator = make_orchestrator(
        Arc::new(FlakyMarket::new(MarketRegime::Normal)),
        cash_strategy(),
        Arc::new(ScriptedPanel::unanimous()),
    )
    .with_rate_limit(&RateLimitConfig {
        window_secs: 60,
        max_sessions: 2,
    });

    assert_ok!(orchestrator.open_session("alice", make_request()));
    assert_ok!(orchestrator.open_session("alice", make_request()));
    let err = assert_err!(orchestrator.open_session("alice", make_request()));
    assert!(matches!(err, EngineError::RateLimited { ref actor, .. } if actor == "alice"));
    assert_ok!(orchestrator.open_session("bob", make_request()));
    assert_eq!(orchestrator.stats().sessions_opened, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sessions_are_independent() {
    let orchestrator = Arc::new(make_orchestrator(
        Arc::new(StaticMarketProvider::with_regime(MarketRegime::Volatile)),
        Arc::new(RuleBasedStrategist::default()),
        Arc::new(RuleBasedPanel),
    ));

    let mut handles = Vec::new();
    let mut tasks = Vec::new();
    for i in 0..6 {
        let (handle, task) =
            assert_ok!(orchestrator.spawn_session(&format!("actor-{i}"), make_request()));
        handles.push(handle);
        tasks.push(task);
    }

    let records: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let ids: HashSet<_> = records.iter().map(|r| r.session_id).collect();
    assert_eq!(ids.len(), 6);
    for handle in &handles {
        assert!(handle.wait_terminal().await.phase.is_terminal());
    }
    // Identical inputs and a fixed seed give identical decisions.
    assert!(records
        .iter()
        .all(|r| r.assessment.risk_score == records[0].assessment.risk_score));
    assert_eq!(orchestrator.recent_decisions().len(), 6);
    assert_eq!(orchestrator.stats().sessions_completed, 6);
}
