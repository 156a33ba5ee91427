//! Quantitative risk engine: parametric metrics, Monte Carlo simulation
//! and limit-based strategy validation.
//!
//! Everything in this module is synchronous and CPU-bound; async callers
//! should run it on a blocking thread.

pub mod metrics;
pub mod monte_carlo;
pub mod tables;
pub mod validator;

pub use metrics::RiskMetricsEngine;
pub use monte_carlo::{MonteCarloSimulator, SimulationConfig, SimulationSeed};
pub use tables::{AssetParams, AssetTable, StressScenario};
pub use validator::{RiskLimits, StrategyValidator};
