//! Process-wide configuration.
//!
//! Two settings drive the whole crate: whether soft violations escalate to
//! errors (`raise_errors`) and which isolation level an action gets when it
//! does not declare one. Both can be changed at runtime.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::action::ActionResult;
use crate::reporter::{ErrorReporter, TracingSink, ViolationSink};
use crate::transaction::{IsolationLevel, IsolationLevelValidator};

/// Environment variable that turns strict mode on or off.
pub const RAISE_ERRORS_ENV: &str = "TXN_ACTIONS_RAISE_ERRORS";
/// Environment variable holding the default isolation level.
pub const ISOLATION_LEVEL_ENV: &str = "TXN_ACTIONS_ISOLATION_LEVEL";

/// Snapshot of the configuration values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Escalate soft violations to errors.
    pub raise_errors: bool,
    /// Isolation level for actions that do not declare one.
    pub isolation_level: IsolationLevel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Strict while developing and testing, lenient in release builds.
            raise_errors: cfg!(debug_assertions),
            isolation_level: IsolationLevel::ReadCommitted,
        }
    }
}

/// Shared, runtime-mutable configuration.
#[derive(Debug, Default)]
pub struct Configuration {
    settings: RwLock<Settings>,
}

impl Configuration {
    /// Create a configuration from explicit settings.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    /// The process-wide configuration.
    pub fn global() -> Arc<Configuration> {
        static GLOBAL: OnceLock<Arc<Configuration>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(Configuration::default()))
            .clone()
    }

    /// Build a configuration from `TXN_ACTIONS_*` environment variables.
    ///
    /// Missing variables fall back to the defaults. Unrecognised values are
    /// reported through `tracing` and ignored.
    pub fn from_env() -> ActionResult<Arc<Configuration>> {
        Self::from_env_with_sink(Arc::new(TracingSink))
    }

    /// Like [`Configuration::from_env`], reporting bad values to `sink`.
    pub fn from_env_with_sink(sink: Arc<dyn ViolationSink>) -> ActionResult<Arc<Configuration>> {
        let raise_errors = std::env::var(RAISE_ERRORS_ENV).ok();
        let isolation_level = std::env::var(ISOLATION_LEVEL_ENV).ok();
        Self::from_values(raise_errors.as_deref(), isolation_level.as_deref(), sink)
    }

    fn from_values(
        raise_errors: Option<&str>,
        isolation_level: Option<&str>,
        sink: Arc<dyn ViolationSink>,
    ) -> ActionResult<Arc<Configuration>> {
        let config = Arc::new(Configuration::default());
        let reporter = ErrorReporter::with_sink(config.clone(), sink);

        if let Some(value) = raise_errors {
            match parse_flag(value) {
                Some(flag) => config.set_raise_errors(flag),
                None => reporter.report(format!("invalid value {} for {}", value, RAISE_ERRORS_ENV))?,
            }
        }

        if let Some(name) = isolation_level {
            if let Some(level) =
                IsolationLevelValidator::validate_name(&reporter, name, ISOLATION_LEVEL_ENV, true)?
            {
                config.set_isolation_level(level);
            }
        }
        Ok(config)
    }

    /// Current values.
    pub fn settings(&self) -> Settings {
        *self.settings.read()
    }

    /// Whether soft violations escalate to errors.
    pub fn raise_errors(&self) -> bool {
        self.settings.read().raise_errors
    }

    pub fn set_raise_errors(&self, raise_errors: bool) {
        self.settings.write().raise_errors = raise_errors;
    }

    /// Default isolation level for actions.
    pub fn isolation_level(&self) -> IsolationLevel {
        self.settings.read().isolation_level
    }

    /// Change the default isolation level. Serializable is allowed here.
    pub fn set_isolation_level(&self, level: IsolationLevel) {
        self.settings.write().isolation_level = level;
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
