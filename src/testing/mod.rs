//! Shared fixtures for unit tests.


use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::action::{fail_with, Action, ActionDescriptor, ActionError, ActionResult};
use crate::reporter::MemorySink;
use crate::transaction::{IsolationLevel, RecordingEngine, TransactionScope};

/// Scope over a recording engine, with its own configuration and a memory sink.
pub(crate) fn fixture(raise_errors: bool) -> (TransactionScope, Arc<RecordingEngine>, Arc<MemorySink>) {
    let (reporter, sink) = MemorySink::reporter(raise_errors);
    let engine = Arc::new(RecordingEngine::new());
    let scope = TransactionScope::with_reporter(engine.clone(), reporter);
    (scope, engine, sink)
}

/// Scope state observed from inside an action body.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub label: &'static str,
    pub hook: &'static str,
    pub open: bool,
    pub root: Option<IsolationLevel>,
    pub participants: Vec<&'static str>,
}

#[derive(Debug, Default)]
struct JournalInner {
    events: Vec<String>,
    snapshots: Vec<Snapshot>,
}

/// Ordered record of what test actions did.
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal {
    inner: Arc<Mutex<JournalInner>>,
}

impl Journal {
    pub fn record(&self, event: impl Into<String>) {
        self.inner.lock().events.push(event.into());
    }

    pub fn snapshot(&self, label: &'static str, hook: &'static str, scope: &TransactionScope) {
        self.inner.lock().snapshots.push(Snapshot {
            label,
            hook,
            open: scope.is_transaction_open(),
            root: scope.root_isolation_level(),
            participants: scope.participants(),
        });
    }

    pub fn events(&self) -> Vec<String> {
        self.inner.lock().events.clone()
    }

    /// Labels of the actions that recorded `kind`, in order.
    pub fn events_for(&self, kind: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| {
                let (label, event_kind) = event.split_once(':')?;
                (event_kind == kind).then(|| label.to_string())
            })
            .collect()
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.inner.lock().snapshots.clone()
    }

    /// Snapshots taken from `hook`, in order.
    pub fn snapshots_for(&self, hook: &str) -> Vec<Snapshot> {
        self.snapshots()
            .into_iter()
            .filter(|snapshot| snapshot.hook == hook)
            .collect()
    }
}

type Nested = Box<dyn FnOnce(&mut TransactionScope) -> ActionResult<()> + Send>;

fn nested<B: Action>(action: B) -> Nested {
    Box::new(move |scope| {
        action.call(scope)?.map(|_| ()).map_err(ActionError::from)
    })
}

#[derive(Debug, Clone, Copy)]
enum Ending {
    Return(i64),
    Fail(&'static str),
    Error(&'static str),
}

/// Configurable action that journals its lifecycle as `label:hook`.
pub(crate) struct Step {
    label: &'static str,
    journal: Journal,
    ending: Ending,
    calls: Vec<Nested>,
    guard_calls: Vec<Nested>,
    after_commit_calls: Vec<Nested>,
    fail_after_commit: bool,
    fail_ensure: bool,
}

impl Step {
    pub fn new(label: &'static str, journal: &Journal) -> Self {
        Self {
            label,
            journal: journal.clone(),
            ending: Ending::Return(0),
            calls: Vec::new(),
            guard_calls: Vec::new(),
            after_commit_calls: Vec::new(),
            fail_after_commit: false,
            fail_ensure: false,
        }
    }

    pub fn failing(mut self, reason: &'static str) -> Self {
        self.ending = Ending::Fail(reason);
        self
    }

    pub fn erroring(mut self, message: &'static str) -> Self {
        self.ending = Ending::Error(message);
        self
    }

    /// Call `action` from the main body.
    pub fn calls<B: Action>(mut self, action: B) -> Self {
        self.calls.push(nested(action));
        self
    }

    /// Call `action` from a guard block.
    pub fn guard_calls<B: Action>(mut self, action: B) -> Self {
        self.guard_calls.push(nested(action));
        self
    }

    /// Call `action` from the after-commit hook.
    pub fn after_commit_calls<B: Action>(mut self, action: B) -> Self {
        self.after_commit_calls.push(nested(action));
        self
    }

    pub fn failing_after_commit(mut self) -> Self {
        self.fail_after_commit = true;
        self
    }

    pub fn failing_ensure(mut self) -> Self {
        self.fail_ensure = true;
        self
    }

    fn run_all(calls: &mut Vec<Nested>, scope: &mut TransactionScope) -> ActionResult<()> {
        for call in calls.drain(..) {
            call(scope)?;
        }
        Ok(())
    }

    fn error(message: &str) -> ActionError {
        ActionError::application(std::io::Error::new(std::io::ErrorKind::Other, message))
    }
}

impl Action for Step {
    type Output = i64;

    fn descriptor() -> &'static ActionDescriptor<Self> {
        static DESCRIPTOR: OnceLock<ActionDescriptor<Step>> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            ActionDescriptor::new("Step").before_actions(|step: &mut Step, scope| {
                let mut calls = std::mem::take(&mut step.guard_calls);
                Step::run_all(&mut calls, scope)
            })
        })
    }

    fn perform(&mut self, scope: &mut TransactionScope) -> ActionResult<i64> {
        self.journal.snapshot(self.label, "perform", scope);
        self.journal.record(format!("{}:perform", self.label));
        Step::run_all(&mut self.calls, scope)?;

        match self.ending {
            Ending::Return(value) => Ok(value),
            Ending::Fail(reason) => fail_with(reason),
            Ending::Error(message) => Err(Step::error(message)),
        }
    }

    fn after_commit(&mut self, scope: &mut TransactionScope) -> ActionResult<()> {
        self.journal.snapshot(self.label, "after_commit", scope);
        self.journal.record(format!("{}:after_commit", self.label));
        Step::run_all(&mut self.after_commit_calls, scope)?;
        if self.fail_after_commit {
            return Err(Step::error("after_commit failed"));
        }
        Ok(())
    }

    fn rollback(&mut self, scope: &mut TransactionScope) -> ActionResult<()> {
        self.journal.snapshot(self.label, "rollback", scope);
        self.journal.record(format!("{}:rollback", self.label));
        Ok(())
    }

    fn ensure(&mut self, scope: &mut TransactionScope) -> ActionResult<()> {
        self.journal.snapshot(self.label, "ensure", scope);
        self.journal.record(format!("{}:ensure", self.label));
        if self.fail_ensure {
            return Err(Step::error("ensure failed"));
        }
        Ok(())
    }
}

/// [`Step`] declaring `repeatable_read`.
pub(crate) struct RepeatableStep(pub Step);

impl Action for RepeatableStep {
    type Output = i64;

    fn descriptor() -> &'static ActionDescriptor<Self> {
        static DESCRIPTOR: OnceLock<ActionDescriptor<RepeatableStep>> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            ActionDescriptor::new("RepeatableStep")
                .with_isolation_level(IsolationLevel::RepeatableRead)
                .expect("repeatable_read is a valid action level")
        })
    }

    fn perform(&mut self, scope: &mut TransactionScope) -> ActionResult<i64> {
        self.0.perform(scope)
    }

    fn after_commit(&mut self, scope: &mut TransactionScope) -> ActionResult<()> {
        self.0.after_commit(scope)
    }

    fn rollback(&mut self, scope: &mut TransactionScope) -> ActionResult<()> {
        self.0.rollback(scope)
    }

    fn ensure(&mut self, scope: &mut TransactionScope) -> ActionResult<()> {
        self.0.ensure(scope)
    }
}
