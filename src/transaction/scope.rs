//! Call-tree scoped transaction state.
//!
//! A [`TransactionScope`] belongs to one execution context and is passed
//! explicitly to every action call. It tracks:
//! - the physical transaction opened by the outermost action, if any
//! - the root isolation level that transaction was opened with
//! - every action that took part in the call tree, in call order
//! - the lifecycle phase that currently restricts nested action calls
//!
//! Only the outermost `run` talks to the engine. Nested runs join the open
//! transaction and leave the commit/rollback bookkeeping to the outermost one,
//! which dispatches hooks to every participant once the transaction resolved.
//! The transaction stays visible to `after_commit` and `rollback` hooks and is
//! cleared before `ensure` runs.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::action::{Action, ActionError, ActionResult, CallResult};
use crate::config::Configuration;
use crate::reporter::ErrorReporter;
use crate::transaction::engine::{TransactionEngine, TransactionHandle};
use crate::transaction::isolation::{IsolationLevel, IsolationLevelValidator};

/// Lifecycle phases during which calling another action is a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    BeforeTransaction,
    BeforeActions,
    AfterCommit,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::BeforeTransaction => "before_transaction",
            Phase::BeforeActions => "before_actions",
            Phase::AfterCommit => "after_commit",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum Hook {
    AfterCommit,
    Rollback,
    Ensure,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::AfterCommit => f.write_str("after_commit"),
            Hook::Rollback => f.write_str("rollback"),
            Hook::Ensure => f.write_str("ensure"),
        }
    }
}

/// Terminal hooks of a finished action, type-erased.
pub(crate) trait Participant: Send {
    fn after_commit(&mut self, scope: &mut TransactionScope) -> ActionResult<()>;
    fn rollback(&mut self, scope: &mut TransactionScope) -> ActionResult<()>;
    fn ensure(&mut self, scope: &mut TransactionScope) -> ActionResult<()>;
}

impl<A: Action> Participant for A {
    fn after_commit(&mut self, scope: &mut TransactionScope) -> ActionResult<()> {
        Action::after_commit(self, scope)
    }

    fn rollback(&mut self, scope: &mut TransactionScope) -> ActionResult<()> {
        Action::rollback(self, scope)
    }

    fn ensure(&mut self, scope: &mut TransactionScope) -> ActionResult<()> {
        Action::ensure(self, scope)
    }
}

/// Position of one action in the call tree.
///
/// The action itself is attached once its body returned.
struct Slot {
    name: &'static str,
    action: Option<Box<dyn Participant>>,
}

/// Execution state of one call tree.
pub struct TransactionScope {
    engine: Arc<dyn TransactionEngine>,
    reporter: ErrorReporter,
    transaction: Option<TransactionHandle>,
    participants: Vec<Slot>,
    restricted_by: Option<Phase>,
}

impl TransactionScope {
    /// Scope reporting through the process-wide configuration.
    pub fn new(engine: Arc<dyn TransactionEngine>) -> Self {
        Self::with_reporter(engine, ErrorReporter::global())
    }

    pub fn with_reporter(engine: Arc<dyn TransactionEngine>, reporter: ErrorReporter) -> Self {
        Self {
            engine,
            reporter,
            transaction: None,
            participants: Vec::new(),
            restricted_by: None,
        }
    }

    pub fn reporter(&self) -> &ErrorReporter {
        &self.reporter
    }

    pub fn config(&self) -> &Arc<Configuration> {
        self.reporter.config()
    }

    /// Whether a physical transaction is open for this call tree.
    pub fn is_transaction_open(&self) -> bool {
        self.transaction.is_some()
    }

    /// Isolation level of the open transaction.
    pub fn root_isolation_level(&self) -> Option<IsolationLevel> {
        self.transaction.as_ref().map(TransactionHandle::isolation)
    }

    /// The open physical transaction.
    pub fn transaction(&self) -> Option<&TransactionHandle> {
        self.transaction.as_ref()
    }

    /// Names of the actions in the current call tree, in call order.
    pub fn participants(&self) -> Vec<&'static str> {
        self.participants.iter().map(|slot| slot.name).collect()
    }

    /// The phase currently restricting action calls.
    pub fn restricted_phase(&self) -> Option<Phase> {
        self.restricted_by
    }

    /// Effective isolation level of `A`: declared, or the configured default.
    pub fn isolation_level_for<A: Action>(&self) -> IsolationLevel {
        A::descriptor()
            .isolation_level()
            .unwrap_or_else(|| self.config().isolation_level())
    }

    /// Tag `phase` until the returned guard is dropped.
    ///
    /// The previous tag is restored on drop, including during unwinding.
    pub fn restrict_action_calls_by(&mut self, phase: Phase) -> PhaseGuard<'_> {
        let previous = self.restricted_by.replace(phase);
        PhaseGuard {
            scope: self,
            previous,
        }
    }

    /// Run `body` for `action` inside the call tree's transaction.
    ///
    /// The outermost call opens the transaction, resolves it and runs the
    /// terminal hooks of every participant. An `ActionFailure` is absorbed
    /// there and returned as `Ok(Err(failure))`; nested calls let it unwind.
    pub(crate) fn run<A, F>(&mut self, action: A, body: F) -> CallResult<A::Output>
    where
        A: Action,
        F: FnOnce(&mut A, &mut TransactionScope) -> ActionResult<A::Output>,
    {
        let isolation = self.isolation_level_for::<A>();
        let slot = self.participants.len();
        self.participants.push(Slot {
            name: A::descriptor().name(),
            action: None,
        });

        match self.root_isolation_level() {
            Some(root) => self.join(slot, isolation, root, action, body),
            None => self.open(slot, isolation, action, body),
        }
    }

    fn join<A, F>(
        &mut self,
        slot: usize,
        isolation: IsolationLevel,
        root: IsolationLevel,
        mut action: A,
        body: F,
    ) -> CallResult<A::Output>
    where
        A: Action,
        F: FnOnce(&mut A, &mut TransactionScope) -> ActionResult<A::Output>,
    {
        let global_default = self.config().isolation_level();
        let checked = if IsolationLevelValidator::can_be_nested(isolation, root, global_default) {
            Ok(())
        } else {
            self.reporter.report(format!(
                "action {} requires {}, run inside {}",
                A::descriptor().name(),
                isolation,
                root
            ))
        };

        let result = checked.and_then(|()| body(&mut action, self));
        self.attach(slot, action);
        result.map(Ok)
    }

    fn open<A, F>(
        &mut self,
        slot: usize,
        isolation: IsolationLevel,
        mut action: A,
        body: F,
    ) -> CallResult<A::Output>
    where
        A: Action,
        F: FnOnce(&mut A, &mut TransactionScope) -> ActionResult<A::Output>,
    {
        let handle = match self.engine.begin(isolation) {
            Ok(handle) => handle,
            Err(err) => {
                self.attach(slot, action);
                // Nothing ran, so only cleanup applies. Hook errors are
                // logged by `dispatch`; the engine error is what the caller gets.
                let _ = self.dispatch(slot, Hook::Ensure);
                self.participants.truncate(slot);
                return Err(err.into());
            }
        };
        debug!(tx = %handle.id(), %isolation, action = A::descriptor().name(), "transaction opened");
        self.transaction = Some(handle.clone());

        let result = body(&mut action, self);
        self.attach(slot, action);

        // The tree stays open while after_commit and rollback hooks run, so
        // actions they call join it and get their own hooks dispatched.
        let resolved = match result {
            Ok(value) => match self.engine.commit(handle) {
                Ok(()) => {
                    debug!(participants = self.participants.len() - slot, "transaction committed");
                    let mut scope = self.restrict_action_calls_by(Phase::AfterCommit);
                    scope
                        .dispatch(slot, Hook::AfterCommit)
                        .map(|()| Ok(value))
                }
                Err(err) => {
                    warn!(error = %err, "commit failed");
                    // Hook errors are logged by `dispatch`; the commit error wins.
                    let _ = self.dispatch(slot, Hook::Rollback);
                    Err(err.into())
                }
            },
            Err(err) => {
                let err = match self.engine.rollback(handle) {
                    Ok(()) => err,
                    Err(rollback_err) => {
                        warn!(error = %rollback_err, "rollback failed");
                        if err.is_failure() {
                            rollback_err.into()
                        } else {
                            err
                        }
                    }
                };
                debug!(reason = %err, participants = self.participants.len() - slot, "transaction rolled back");

                let compensated = self.dispatch(slot, Hook::Rollback);
                match err {
                    ActionError::Failure(failure) => compensated.map(|()| Err(failure)),
                    other => Err(other),
                }
            }
        };

        self.transaction = None;
        let cleaned = self.dispatch(slot, Hook::Ensure);
        self.participants.truncate(slot);

        match (resolved, cleaned) {
            (Ok(_), Err(err)) => Err(err),
            (resolved, _) => resolved,
        }
    }

    fn attach<A: Action>(&mut self, slot: usize, action: A) {
        if let Some(entry) = self.participants.get_mut(slot) {
            entry.action = Some(Box::new(action));
        }
    }

    /// Run `hook` for every participant from `first` on, in call order.
    ///
    /// Participants that join while the hooks run are visited too. Every
    /// participant gets the hook even if an earlier one failed; the first
    /// error is returned.
    fn dispatch(&mut self, first: usize, hook: Hook) -> ActionResult<()> {
        let mut first_error = None;
        let mut index = first;
        while index < self.participants.len() {
            let name = self.participants[index].name;
            let Some(mut action) = self.participants[index].action.take() else {
                index += 1;
                continue;
            };

            let result = match hook {
                Hook::AfterCommit => action.after_commit(self),
                Hook::Rollback => action.rollback(self),
                Hook::Ensure => action.ensure(self),
            };
            if let Some(entry) = self.participants.get_mut(index) {
                entry.action = Some(action);
            }

            if let Err(err) = result {
                warn!(action = name, %hook, error = %err, "hook failed");
                first_error.get_or_insert(err);
            }
            index += 1;
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for TransactionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionScope")
            .field("transaction", &self.transaction)
            .field("participants", &self.participants())
            .field("restricted_by", &self.restricted_by)
            .finish()
    }
}

/// Scoped phase tag. Derefs to the scope it restricts.
pub struct PhaseGuard<'a> {
    scope: &'a mut TransactionScope,
    previous: Option<Phase>,
}

impl Deref for PhaseGuard<'_> {
    type Target = TransactionScope;

    fn deref(&self) -> &TransactionScope {
        &*self.scope
    }
}

impl DerefMut for PhaseGuard<'_> {
    fn deref_mut(&mut self) -> &mut TransactionScope {
        &mut *self.scope
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.scope.restricted_by = self.previous;
    }
}
