//! Manager error types.

use engine_core::EngineError;
use model::Diagnostic;
use thiserror::Error;

/// Errors surfaced by a manager.
///
/// Warning and informational diagnostics never become a `ManagerError`; they
/// are absorbed where they are classified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    /// Setup failed; the manager never became usable.
    #[error("{manager} failed to start: {source}")]
    Startup {
        /// Manager name.
        manager: String,
        /// Engine failure that aborted setup.
        #[source]
        source: EngineError,
    },

    /// The engine rejected an order placement or cancellation.
    #[error("submission failed: {0}")]
    Submission(#[from] EngineError),

    /// Error-severity diagnostic that the manager cannot absorb.
    #[error("gateway error for id {id}: code {code} - {message}")]
    Diagnostic {
        /// Request or order id the diagnostic referred to.
        id: i64,
        /// Gateway message code.
        code: i64,
        /// Gateway message text.
        message: String,
    },

    /// Reply kind the manager has no merge rule for.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// The control loop is no longer running.
    #[error("manager is closed")]
    Closed,
}

impl ManagerError {
    /// Build a startup error.
    pub fn startup(manager: impl Into<String>, source: EngineError) -> Self {
        Self::Startup {
            manager: manager.into(),
            source,
        }
    }

    /// Check if this error stops the control loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Diagnostic { .. } | Self::UnexpectedReply(_))
    }
}

impl From<&Diagnostic> for ManagerError {
    fn from(d: &Diagnostic) -> Self {
        Self::Diagnostic {
            id: d.id,
            code: d.code,
            message: d.message.clone(),
        }
    }
}
