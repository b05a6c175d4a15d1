//! Transaction engine error types.

use thiserror::Error;

use crate::transaction::isolation::IsolationLevel;

/// Result type for transaction engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by a [`TransactionEngine`](super::TransactionEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not open a physical transaction.
    #[error("failed to begin {isolation} transaction: {reason}")]
    Begin {
        isolation: IsolationLevel,
        reason: String,
    },

    /// Commit was refused; the transaction is gone.
    #[error("failed to commit transaction {tx_id}: {reason}")]
    Commit { tx_id: String, reason: String },

    /// Rollback failed.
    #[error("failed to roll back transaction {tx_id}: {reason}")]
    Rollback { tx_id: String, reason: String },

    /// The handle does not belong to an active transaction.
    #[error("transaction not found: {0}")]
    NotFound(String),

    /// Backend specific failure.
    #[error("transaction engine error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    /// Wrap a backend error (driver, pool...).
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(error))
    }
}
