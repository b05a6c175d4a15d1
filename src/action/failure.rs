//! The expected-failure signal.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Deliberate business failure raised by an action.
///
/// Unwinds the call tree and rolls the transaction back, then comes out of
/// the outermost call as a value. Two failures are equal when their reasons
/// are equal.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("action failed: {reason}")]
pub struct ActionFailure {
    reason: Value,
}

impl ActionFailure {
    pub fn new(reason: impl Into<Value>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Caller-defined reason payload.
    pub fn reason(&self) -> &Value {
        &self.reason
    }

    /// Reason as a string, when it is one.
    pub fn reason_str(&self) -> Option<&str> {
        self.reason.as_str()
    }

    pub fn into_reason(self) -> Value {
        self.reason
    }
}
