//! Transaction isolation levels and the rules for nesting them.
//!
//! Four levels are recognised, ordered by the guarantees they give:
//! - ReadUncommitted < ReadCommitted < RepeatableRead
//! - Serializable: reserved for the process-wide default
//!
//! A nested action may run inside an open transaction only when it asks for
//! the same or a weaker guarantee than the transaction already has.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::ActionResult;
use crate::reporter::ErrorReporter;

/// Transaction isolation level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Read Uncommitted isolation.
    ///
    /// Reads may observe rows written by transactions that have not
    /// committed yet.
    ReadUncommitted,

    /// Read Committed isolation.
    ///
    /// Each read sees the most recently committed data at the time of the read.
    /// Different reads within the same transaction might see different
    /// data if another transaction commits in between.
    #[default]
    ReadCommitted,

    /// Repeatable Read isolation.
    ///
    /// All reads within a transaction see a consistent snapshot of the database
    /// as of the transaction's start time.
    RepeatableRead,

    /// Serializable isolation.
    ///
    /// Only meant to be configured for a whole process, never declared by a
    /// single action.
    Serializable,
}

impl IsolationLevel {
    /// All recognised levels, weakest first.
    pub const ALL: [IsolationLevel; 4] = [
        IsolationLevel::ReadUncommitted,
        IsolationLevel::ReadCommitted,
        IsolationLevel::RepeatableRead,
        IsolationLevel::Serializable,
    ];

    /// Canonical lowercase name, as used in configuration and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "read_uncommitted",
            IsolationLevel::ReadCommitted => "read_committed",
            IsolationLevel::RepeatableRead => "repeatable_read",
            IsolationLevel::Serializable => "serializable",
        }
    }

    /// SQL spelling, for engines that issue `SET TRANSACTION ISOLATION LEVEL`.
    pub fn sql_name(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }

    /// Check if this is the serializable level.
    pub fn is_serializable(&self) -> bool {
        matches!(self, IsolationLevel::Serializable)
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse isolation level from string (config or SQL syntax).
impl std::str::FromStr for IsolationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace(' ', "_").as_str() {
            "READ_UNCOMMITTED" | "READ_UNCOMMITED" | "READUNCOMMITTED" => {
                Ok(IsolationLevel::ReadUncommitted)
            }
            "READ_COMMITTED" | "READCOMMITTED" => Ok(IsolationLevel::ReadCommitted),
            "REPEATABLE_READ" | "REPEATABLEREAD" | "SNAPSHOT" => Ok(IsolationLevel::RepeatableRead),
            "SERIALIZABLE" => Ok(IsolationLevel::Serializable),
            _ => Err(format!("unknown isolation level: {}", s)),
        }
    }
}

/// Rule checker for declared and nested isolation levels.
pub struct IsolationLevelValidator;

impl IsolationLevelValidator {
    /// Validate a declared level.
    ///
    /// Serializable is reported unless `allow_serializable` is set; the
    /// report only becomes an error in strict mode.
    pub fn validate(
        reporter: &ErrorReporter,
        level: IsolationLevel,
        allow_serializable: bool,
    ) -> ActionResult<()> {
        if level.is_serializable() && !allow_serializable {
            reporter.report(
                "serializable isolation should only be used for a whole project, please use global config",
            )?;
        }
        Ok(())
    }

    /// Validate a level given by name on behalf of `owner`.
    ///
    /// Returns `None` when the name is not a recognised level and the
    /// violation was not escalated.
    pub fn validate_name(
        reporter: &ErrorReporter,
        name: &str,
        owner: &str,
        allow_serializable: bool,
    ) -> ActionResult<Option<IsolationLevel>> {
        match name.parse::<IsolationLevel>() {
            Ok(level) => {
                Self::validate(reporter, level, allow_serializable)?;
                Ok(Some(level))
            }
            Err(_) => {
                reporter.report(format!("invalid isolation level {} for {}", name, owner))?;
                Ok(None)
            }
        }
    }

    /// Check whether an action asking for `requested` may join a transaction
    /// opened at `root`.
    ///
    /// A serializable global default covers every request.
    pub fn can_be_nested(
        requested: IsolationLevel,
        root: IsolationLevel,
        global_default: IsolationLevel,
    ) -> bool {
        global_default.is_serializable() || requested <= root
    }
}
