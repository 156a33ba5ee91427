//! Cross-module properties of the risk engine and the consensus rules.

use rust_decimal_macros::dec;

use deliberation_engine::debate::resolution::resolve;
use deliberation_engine::debate::{
    Consensus, ConsensusDecision, Participant, Position, ResolutionStrategy, Stance,
};
use deliberation_engine::risk::{
    AssetTable, MonteCarloSimulator, RiskLimits, RiskMetricsEngine, SimulationConfig,
    SimulationSeed, StrategyValidator, StressScenario,
};
use deliberation_engine::types::{
    Allocation, CorrelationMatrix, CorrelationSource, MarketRegime, PortfolioContext, Verdict, CASH,
};

fn balanced() -> Allocation {
    Allocation::new([("SPY", 0.25), ("VTI", 0.20), ("AGG", 0.25), ("GLD", 0.10), (CASH, 0.20)])
        .unwrap()
}

fn small_config() -> SimulationConfig {
    SimulationConfig {
        paths: 500,
        horizon_days: 126,
        risk_free_rate: 0.0,
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[test]
fn test_var_grows_with_regime_severity() {
    let engine = RiskMetricsEngine::new(AssetTable::default());
    let alloc = balanced();

    let vars: Vec<f64> = MarketRegime::ALL
        .iter()
        .map(|r| engine.value_at_risk(&alloc, dec!(100000), *r).unwrap().var_95)
        .collect();
    assert!(vars.windows(2).all(|w| w[0] < w[1]), "{vars:?}");
}

#[test]
fn test_var_ordering_within_one_report() {
    let engine = RiskMetricsEngine::new(AssetTable::default());
    let var = engine
        .value_at_risk(&balanced(), dec!(250000), MarketRegime::Volatile)
        .unwrap();
    assert!(var.var_95 < var.var_99);
    assert!(var.var_95 < var.cvar_95);
    assert!(var.var_95_amount < var.var_99_amount);
}

#[test]
fn test_all_cash_has_no_market_risk() {
    let engine = RiskMetricsEngine::new(AssetTable::default());
    let var = engine
        .value_at_risk(&Allocation::all_cash(), dec!(100000), MarketRegime::Crisis)
        .unwrap();
    assert_eq!(var.var_95, 0.0);

    let stress = engine.stress_test(&Allocation::all_cash(), dec!(100000));
    assert!(stress.results.iter().all(|r| r.portfolio_return == 0.0));
}

#[test]
fn test_stress_return_is_weighted_shock() {
    let engine = RiskMetricsEngine::new(AssetTable::default()).with_scenarios(vec![
        StressScenario::new("Rate shock", 120, 1.8)
            .shock("SPY", -0.20)
            .shock("AGG", -0.13),
    ]);
    let alloc = Allocation::new([("SPY", 0.6), ("AGG", 0.4)]).unwrap();

    let report = engine.stress_test(&alloc, dec!(100000));
    let result = report.get("Rate shock").unwrap();
    assert!((result.portfolio_return + 0.172).abs() < 1e-9);
    assert_eq!(result.loss, dec!(17200.00));
    assert_eq!(report.worst_scenario.as_deref(), Some("Rate shock"));
}

#[test]
fn test_composite_score_is_bounded() {
    let inputs = [
        (0.0, 0.0, 0.0, 0.0),
        (0.01, 0.1, 0.5, 0.2),
        (10.0, 10.0, 10.0, 10.0),
        (-1.0, -1.0, -1.0, -1.0),
        (f64::NAN, f64::INFINITY, f64::NAN, f64::NEG_INFINITY),
    ];
    for (var, dd, corr, conc) in inputs {
        let score = RiskMetricsEngine::composite_score(var, dd, corr, conc);
        assert!((0.0..=1.0).contains(&score), "score {score} for {var},{dd},{corr},{conc}");
    }
    assert_eq!(RiskMetricsEngine::composite_score(f64::NAN, f64::NAN, f64::NAN, f64::NAN), 1.0);
}

#[test]
fn test_reference_correlation_matrix_shape() {
    let engine = RiskMetricsEngine::new(AssetTable::default());
    let report = engine.correlation_risk(&balanced(), None);

    assert_eq!(report.source, CorrelationSource::Reference);
    let n = report.symbols.len();
    assert_eq!(n, 4);
    for i in 0..n {
        assert_eq!(report.matrix[i][i], 1.0);
        for j in 0..n {
            assert_eq!(report.matrix[i][j], report.matrix[j][i]);
        }
    }
    assert!(report
        .flagged
        .iter()
        .any(|p| (p.a == "SPY" && p.b == "VTI") || (p.a == "VTI" && p.b == "SPY")));
}

#[test]
fn test_observed_correlations_take_precedence() {
    let engine = RiskMetricsEngine::new(AssetTable::default());
    let observed = CorrelationMatrix::new().with("SPY", "VTI", 0.10).unwrap();
    let report = engine.correlation_risk(&balanced(), Some(&observed));

    assert_eq!(report.source, CorrelationSource::Observed);
    assert!(report.flagged.is_empty());
}

// ---------------------------------------------------------------------------
// Simulation and validation
// ---------------------------------------------------------------------------

#[test]
fn test_simulation_is_reproducible_per_seed() {
    let sim = MonteCarloSimulator::new(AssetTable::default(), small_config());
    let a = sim.simulate(&balanced(), dec!(100000), 9).unwrap();
    let b = sim.simulate(&balanced(), dec!(100000), 9).unwrap();
    let c = sim.simulate(&balanced(), dec!(100000), 10).unwrap();

    assert_eq!(a, b);
    assert_ne!(a.mean_return, c.mean_return);
    assert_eq!(a.seed, 9);
    assert!(a.worst_return <= a.median_return && a.median_return <= a.best_return);
    assert!((0.0..=1.0).contains(&a.probability_of_loss));
}

#[test]
fn test_validator_rejects_oversized_position() {
    let validator =
        StrategyValidator::new(AssetTable::default(), small_config(), SimulationSeed::Fixed(1));
    let portfolio = PortfolioContext::new(dec!(100000), MarketRegime::Normal).unwrap();
    let alloc = Allocation::new([("SPY", 0.5), ("AGG", 0.25), (CASH, 0.25)]).unwrap();

    let assessment = validator
        .validate(&alloc, &portfolio, &RiskLimits::default())
        .unwrap();
    assert_eq!(assessment.verdict, Verdict::Rejected);
    assert!(assessment.reasons.iter().any(|r| r.contains("SPY")));
    assert!((0.0..=1.0).contains(&assessment.risk_score));
}

#[test]
fn test_position_at_limit_is_not_a_violation() {
    let validator =
        StrategyValidator::new(AssetTable::default(), small_config(), SimulationSeed::Fixed(1));
    let portfolio = PortfolioContext::new(dec!(100000), MarketRegime::Normal).unwrap();
    let alloc = Allocation::new([(CASH, 0.5), ("AGG", 0.25), ("IEF", 0.25)]).unwrap();

    let assessment = validator
        .validate(&alloc, &portfolio, &RiskLimits::default())
        .unwrap();
    assert!(!assessment.reasons.iter().any(|r| r.contains("Position limit")));
    assert_ne!(assessment.verdict, Verdict::Rejected);
}

#[test]
fn test_unknown_asset_is_an_input_error() {
    let validator =
        StrategyValidator::new(AssetTable::default(), small_config(), SimulationSeed::Fixed(1));
    let portfolio = PortfolioContext::new(dec!(100000), MarketRegime::Normal).unwrap();
    let alloc = Allocation::new([("DOGE", 1.0)]).unwrap();

    let err = validator
        .validate(&alloc, &portfolio, &RiskLimits::default())
        .unwrap_err();
    assert!(err.is_input_error());
}

// ---------------------------------------------------------------------------
// Consensus
// ---------------------------------------------------------------------------

fn pos(participant: Participant, stance: Stance, confidence: f64) -> Position {
    Position::new(participant, stance, confidence, "test")
}

#[test]
fn test_consensus_threshold_boundary() {
    // 2 / 3 sits just above the 0.66 threshold.
    let positions = vec![
        pos(Participant::Risk, Stance::Agree, 1.0),
        pos(Participant::Strategy, Stance::Agree, 1.0),
        pos(Participant::Market, Stance::Neutral, 1.0),
    ];
    let consensus = Consensus::compute(&positions);
    assert!(consensus.reached);
    assert_eq!(consensus.decision, ConsensusDecision::Approve);

    let positions = vec![
        pos(Participant::Risk, Stance::Agree, 0.65),
        pos(Participant::Strategy, Stance::Neutral, 0.35),
    ];
    assert!(!Consensus::compute(&positions).reached);
}

#[test]
fn test_strategies_disagree_on_the_same_deadlock() {
    let positions = vec![
        pos(Participant::Strategy, Stance::Agree, 0.5),
        pos(Participant::Market, Stance::Agree, 0.5),
        pos(Participant::Risk, Stance::Disagree, 0.9),
        pos(Participant::Explainer, Stance::Abstain, 0.0),
    ];

    let by_confidence = resolve(&positions, ResolutionStrategy::Confidence);
    assert_eq!(by_confidence.winner, Some(Participant::Risk));
    assert_eq!(by_confidence.decision, ConsensusDecision::Reject);

    let by_majority = resolve(&positions, ResolutionStrategy::Majority);
    assert_eq!(by_majority.stance, Stance::Agree);
    assert_eq!(by_majority.decision, ConsensusDecision::Approve);
    assert_eq!(by_majority.winner, Some(Participant::Strategy));

    let by_rank = resolve(&positions, ResolutionStrategy::Hierarchy);
    assert_eq!(by_rank.winner, Some(Participant::Risk));

    let risk_averse = resolve(&positions, ResolutionStrategy::RiskAverse);
    assert_eq!(risk_averse.decision, ConsensusDecision::Reject);
}

#[test]
fn test_resolution_with_only_abstentions_is_a_tie() {
    let positions = vec![pos(Participant::Explainer, Stance::Abstain, 0.0)];
    for strategy in [
        ResolutionStrategy::Confidence,
        ResolutionStrategy::Hierarchy,
        ResolutionStrategy::RiskAverse,
        ResolutionStrategy::Majority,
    ] {
        let resolution = resolve(&positions, strategy);
        assert_eq!(resolution.decision, ConsensusDecision::Tie);
        assert_eq!(resolution.winner, None);
    }
}
