//! Deliberation & risk validation engine.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod debate;
pub mod deliberation;
pub mod error;
pub mod providers;
pub mod risk;
pub mod types;
