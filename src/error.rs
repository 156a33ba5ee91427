//! Error taxonomy for the deliberation engine.
//!
//! Input problems are recoverable at the boundary, simulation failures are
//! local to one call, collaborator timeouts trigger fallbacks, and session
//! state errors are contract violations by the driver.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    // =============================
    // Boundary validation
    // =============================
    #[error("Invalid input: {0}")]
    InputValidation(String),

    #[error("Unknown asset symbol: {0}")]
    UnknownAsset(String),

    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    // =============================
    // Numeric engine
    // =============================
    #[error("Simulation failure: {0}")]
    SimulationFailure(String),

    // =============================
    // External collaborators
    // =============================
    #[error("External collaborator `{collaborator}` timed out after {timeout_ms}ms")]
    ExternalTimeout {
        collaborator: &'static str,
        timeout_ms: u64,
    },

    // =============================
    // Session lifecycle
    // =============================
    #[error("Session state error: {0}")]
    SessionState(String),

    #[error("Session {0} was cancelled")]
    SessionCancelled(Uuid),

    #[error("Rate limit exceeded for actor `{actor}` (retry in {retry_after_ms}ms)")]
    RateLimited { actor: String, retry_after_ms: u64 },
}

impl EngineError {
    /// Whether this error is recoverable by normalising or rejecting input.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            EngineError::InputValidation(_)
                | EngineError::UnknownAsset(_)
                | EngineError::UnknownParticipant(_)
        )
    }
}
