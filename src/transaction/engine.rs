//! The physical transaction engine seam.
//!
//! The crate never talks to a database directly. Whatever sits underneath
//! (a SQL pool, an embedded store, a test double) implements
//! [`TransactionEngine`]; a scope opens at most one handle per call tree.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::transaction::error::{EngineError, EngineResult};
use crate::transaction::isolation::IsolationLevel;

/// A physical transaction opened by an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHandle {
    id: String,
    isolation: IsolationLevel,
    started_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionHandle {
    /// Create a handle with a fresh ULID.
    pub fn new(isolation: IsolationLevel) -> Self {
        Self {
            id: Ulid::new().to_string().to_lowercase(),
            isolation,
            started_at: chrono::Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn started_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.started_at
    }
}

impl fmt::Display for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx/{} ({})", self.id, self.isolation)
    }
}

/// Begin/commit/rollback primitives of the underlying database.
pub trait TransactionEngine: Send + Sync {
    /// Open a new physical transaction at `isolation`.
    ///
    /// Must never reuse an enclosing transaction or create a savepoint.
    fn begin(&self, isolation: IsolationLevel) -> EngineResult<TransactionHandle>;

    fn commit(&self, handle: TransactionHandle) -> EngineResult<()>;

    fn rollback(&self, handle: TransactionHandle) -> EngineResult<()>;
}

/// What happened to a physical transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Begin { tx_id: String, isolation: IsolationLevel },
    Commit { tx_id: String },
    Rollback { tx_id: String },
}

#[derive(Debug, Default)]
struct EngineLog {
    events: Vec<EngineEvent>,
    active: HashMap<String, TransactionHandle>,
    fail_begin: Option<String>,
    fail_commit: Option<String>,
    fail_rollback: Option<String>,
}

/// In-memory engine that records every call.
///
/// Keeps track of active transactions the way a real engine would, so a
/// commit or rollback of an unknown handle fails. Begin, commit and
/// rollback can be made to fail for error-path tests.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    log: Mutex<EngineLog>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `begin` fail with `reason`.
    pub fn fail_begin_with(&self, reason: impl Into<String>) {
        self.log.lock().fail_begin = Some(reason.into());
    }

    /// Make every following `commit` fail with `reason`.
    pub fn fail_commit_with(&self, reason: impl Into<String>) {
        self.log.lock().fail_commit = Some(reason.into());
    }

    /// Make every following `rollback` fail with `reason`.
    pub fn fail_rollback_with(&self, reason: impl Into<String>) {
        self.log.lock().fail_rollback = Some(reason.into());
    }

    /// All events, oldest first.
    pub fn events(&self) -> Vec<EngineEvent> {
        self.log.lock().events.clone()
    }

    /// Isolation levels of every begun transaction.
    pub fn begins(&self) -> Vec<IsolationLevel> {
        self.log
            .lock()
            .events
            .iter()
            .filter_map(|event| match event {
                EngineEvent::Begin { isolation, .. } => Some(*isolation),
                _ => None,
            })
            .collect()
    }

    pub fn commit_count(&self) -> usize {
        self.count(|event| matches!(event, EngineEvent::Commit { .. }))
    }

    pub fn rollback_count(&self) -> usize {
        self.count(|event| matches!(event, EngineEvent::Rollback { .. }))
    }

    /// Number of transactions begun but not yet resolved.
    pub fn active_count(&self) -> usize {
        self.log.lock().active.len()
    }

    fn count(&self, predicate: impl Fn(&EngineEvent) -> bool) -> usize {
        self.log.lock().events.iter().filter(|e| predicate(e)).count()
    }

    fn mark_completed(log: &mut EngineLog, handle: &TransactionHandle) -> EngineResult<()> {
        log.active
            .remove(handle.id())
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(handle.id().to_string()))
    }
}

impl TransactionEngine for RecordingEngine {
    fn begin(&self, isolation: IsolationLevel) -> EngineResult<TransactionHandle> {
        let mut log = self.log.lock();
        if let Some(reason) = log.fail_begin.clone() {
            return Err(EngineError::Begin { isolation, reason });
        }

        let handle = TransactionHandle::new(isolation);
        log.events.push(EngineEvent::Begin {
            tx_id: handle.id().to_string(),
            isolation,
        });
        log.active.insert(handle.id().to_string(), handle.clone());
        Ok(handle)
    }

    fn commit(&self, handle: TransactionHandle) -> EngineResult<()> {
        let mut log = self.log.lock();
        Self::mark_completed(&mut log, &handle)?;
        if let Some(reason) = log.fail_commit.clone() {
            return Err(EngineError::Commit {
                tx_id: handle.id().to_string(),
                reason,
            });
        }
        log.events.push(EngineEvent::Commit {
            tx_id: handle.id().to_string(),
        });
        Ok(())
    }

    fn rollback(&self, handle: TransactionHandle) -> EngineResult<()> {
        let mut log = self.log.lock();
        Self::mark_completed(&mut log, &handle)?;
        if let Some(reason) = log.fail_rollback.clone() {
            return Err(EngineError::Rollback {
                tx_id: handle.id().to_string(),
                reason,
            });
        }
        log.events.push(EngineEvent::Rollback {
            tx_id: handle.id().to_string(),
        });
        Ok(())
    }
}
