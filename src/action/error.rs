//! Action error types.

use thiserror::Error;

use crate::action::failure::ActionFailure;
use crate::transaction::EngineError;

/// Result type for action operations.
pub type ActionResult<T> = Result<T, ActionError>;

/// Everything that can stop an action.
#[derive(Debug, Error)]
pub enum ActionError {
    /// Expected failure travelling up to the outermost call.
    #[error(transparent)]
    Failure(#[from] ActionFailure),

    /// Soft violation escalated by strict mode.
    #[error("{0}")]
    Violation(String),

    /// The transaction engine failed.
    #[error("transaction error: {0}")]
    Engine(#[from] EngineError),

    /// Any error raised by application code in a body or hook.
    #[error("application error: {0}")]
    Application(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ActionError {
    /// Wrap an application error.
    pub fn application<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Application(Box::new(error))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ActionError::Failure(_))
    }

    pub fn is_violation(&self) -> bool {
        matches!(self, ActionError::Violation(_))
    }

    /// The expected failure carried by this error, if any.
    pub fn into_failure(self) -> Option<ActionFailure> {
        match self {
            ActionError::Failure(failure) => Some(failure),
            _ => None,
        }
    }
}
