//! Deliberation engine entry point.
//!
//! Loads configuration, initialises structured logging, and runs one
//! deliberation session per investor profile concurrently against the
//! rule-based collaborators. Each decision record is printed as JSON.

use anyhow::{Context, Result};
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{error, info, warn};

use deliberation_engine::config::AppConfig;
use deliberation_engine::deliberation::{
    AnalysisRequest, Collaborators, DecisionRecord, DeliberationOrchestrator,
};
use deliberation_engine::providers::rule_based::{
    RuleBasedPanel, RuleBasedStrategist, StaticMarketProvider, TemplateNarrator,
};
use deliberation_engine::types::{InvestorProfile, MarketRegime, PortfolioContext, RiskTolerance};

const PORTFOLIO_VALUE_ENV: &str = "DELIBERATION_PORTFOLIO_VALUE";
const REGIME_ENV: &str = "DELIBERATION_REGIME";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = AppConfig::default_path();
    let cfg = AppConfig::load_or_default(&config_path)?;

    init_logging(&cfg);

    info!(
        config = %config_path,
        paths = cfg.simulation.paths,
        horizon_days = cfg.simulation.horizon_days,
        max_rounds = cfg.debate.max_rounds,
        conflict_strategy = %cfg.debate.conflict_strategy,
        "Deliberation engine starting up"
    );

    let portfolio_value: Decimal = match std::env::var(PORTFOLIO_VALUE_ENV) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{PORTFOLIO_VALUE_ENV} is not a decimal: {raw}"))?,
        Err(_) => dec!(1000000),
    };
    let regime: MarketRegime = match std::env::var(REGIME_ENV) {
        Ok(raw) => raw.parse()?,
        Err(_) => MarketRegime::Normal,
    };

    // -- Initialise components -------------------------------------------

    let collaborators = Collaborators {
        market: Arc::new(StaticMarketProvider::with_regime(regime)),
        strategy: Arc::new(RuleBasedStrategist::default()),
        panel: Arc::new(RuleBasedPanel),
        narrator: Arc::new(TemplateNarrator),
        approver: None,
    };

    let orchestrator = Arc::new(
        DeliberationOrchestrator::new(cfg.build_validator()?, collaborators)
            .with_config(cfg.orchestrator.clone())
            .with_debate(cfg.debate.clone())
            .with_limits(cfg.limits.clone())
            .with_rate_limit(&cfg.rate_limit),
    );

    // -- Run one session per profile -------------------------------------

    let mut tasks = Vec::new();
    for tolerance in [
        RiskTolerance::Conservative,
        RiskTolerance::Moderate,
        RiskTolerance::Aggressive,
    ] {
        let portfolio = PortfolioContext::new(portfolio_value, regime)?;
        let request = AnalysisRequest::new(portfolio).with_profile(InvestorProfile {
            risk_tolerance: tolerance,
            ..InvestorProfile::default()
        });
        let (handle, task) = orchestrator.spawn_session("cli", request)?;
        info!(session_id = %handle.id(), tolerance = ?tolerance, "Session spawned");
        tasks.push((handle, task));
    }

    let handles: Vec<_> = tasks.iter().map(|(h, _)| h.clone()).collect();
    let runs = join_all(tasks.into_iter().map(|(_, task)| task));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let results = tokio::select! {
        results = runs => results,
        _ = &mut shutdown => {
            warn!("Shutdown signal received; cancelling sessions");
            for handle in &handles {
                handle.cancel();
            }
            return Ok(());
        }
    };

    let mut decisions: Vec<DecisionRecord> = Vec::new();
    for result in results {
        match result {
            Ok(Ok(record)) => decisions.push(record),
            Ok(Err(e)) => error!(error = %e, "Session failed"),
            Err(e) => error!(error = %e, "Session task panicked"),
        }
    }

    for record in &decisions {
        println!("{}", serde_json::to_string_pretty(record)?);
    }

    let stats = orchestrator.stats();
    info!(
        opened = stats.sessions_opened,
        completed = stats.sessions_completed,
        rounds = stats.rounds_run,
        fallbacks = stats.fallbacks,
        "Deliberation engine shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging(cfg: &AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_filter = cfg
        .logging
        .filter
        .clone()
        .unwrap_or_else(|| "deliberation_engine=info".to_string());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json_logging = cfg.logging.json || std::env::var("DELIBERATION_LOG_JSON").is_ok();

    // Logs go to stderr so stdout carries only decision records.
    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
