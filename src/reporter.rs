//! Violation reporting.
//!
//! Soft violations (isolation mismatches, calls from restricted phases,
//! return-type mismatches...) go through an [`ErrorReporter`]. The message is
//! always recorded by the sink; in strict mode the report also fails with
//! [`ActionError::Violation`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::action::{ActionError, ActionResult};
use crate::config::Configuration;

/// Destination for violation messages.
pub trait ViolationSink: Send + Sync {
    fn record(&self, message: &str);
}

/// Sink that logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ViolationSink for TracingSink {
    fn record(&self, message: &str) {
        tracing::warn!(violation = %message, "action violation reported");
    }
}

/// Sink that keeps every message in memory.
///
/// Useful in tests that assert on what was reported.
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a reporter backed by a fresh configuration and a memory sink.
    pub fn reporter(raise_errors: bool) -> (ErrorReporter, Arc<MemorySink>) {
        let config = Arc::new(Configuration::default());
        config.set_raise_errors(raise_errors);
        let sink = Arc::new(MemorySink::new());
        (ErrorReporter::with_sink(config, sink.clone()), sink)
    }

    /// All messages recorded so far, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl ViolationSink for MemorySink {
    fn record(&self, message: &str) {
        tracing::warn!(violation = %message, "action violation reported");
        self.messages.lock().push(message.to_string());
    }
}

/// Records violations and decides whether they are fatal.
#[derive(Clone)]
pub struct ErrorReporter {
    config: Arc<Configuration>,
    sink: Arc<dyn ViolationSink>,
}

impl ErrorReporter {
    /// Reporter logging through `tracing`.
    pub fn new(config: Arc<Configuration>) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    pub fn with_sink(config: Arc<Configuration>, sink: Arc<dyn ViolationSink>) -> Self {
        Self { config, sink }
    }

    /// Reporter bound to the process-wide configuration.
    pub fn global() -> Self {
        Self::new(Configuration::global())
    }

    pub fn config(&self) -> &Arc<Configuration> {
        &self.config
    }

    /// Record `message`; fail with it when strict mode is on.
    pub fn report(&self, message: impl Into<String>) -> ActionResult<()> {
        let message = message.into();
        self.sink.record(&message);

        if self.config.raise_errors() {
            return Err(ActionError::Violation(message));
        }
        Ok(())
    }
}

impl fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("raise_errors", &self.config.raise_errors())
            .finish()
    }
}
