//! Per-action declarations.
//!
//! An [`ActionDescriptor`] is built once per action type (usually inside a
//! `OnceLock`) and only read afterwards. It carries the declared isolation
//! level, the pre-transaction hook, the guard blocks and the accepted
//! return types.
//!
//! Declarations are validated when the descriptor is built, which with a
//! `OnceLock` is the first `A::descriptor()` access. That access normally
//! happens on the first call; applications that want bad declarations to
//! surface at startup call `A::descriptor()` for each action while wiring up.

use std::fmt;

use crate::action::error::ActionResult;
use crate::action::typed_returns::ReturnType;
use crate::reporter::ErrorReporter;
use crate::transaction::{IsolationLevel, IsolationLevelValidator, TransactionScope};

pub(crate) type HookFn<A> = dyn Fn(&mut A, &mut TransactionScope) -> ActionResult<()> + Send + Sync;

/// A block evaluated before the main body.
///
/// Returning `Err(ActionError::Failure)` short-circuits the action.
pub struct Guard<A> {
    check: Box<HookFn<A>>,
}

impl<A> Guard<A> {
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&mut A, &mut TransactionScope) -> ActionResult<()> + Send + Sync + 'static,
    {
        Self {
            check: Box::new(check),
        }
    }

    pub fn evaluate(&self, action: &mut A, scope: &mut TransactionScope) -> ActionResult<()> {
        (self.check)(action, scope)
    }
}

/// Immutable declaration of an action type.
pub struct ActionDescriptor<A> {
    name: &'static str,
    isolation_level: Option<IsolationLevel>,
    before_transaction: Option<Box<HookFn<A>>>,
    guards: Vec<Guard<A>>,
    pub(crate) returns: Option<Vec<ReturnType>>,
}

impl<A> ActionDescriptor<A> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            isolation_level: None,
            before_transaction: None,
            guards: Vec::new(),
            returns: None,
        }
    }

    /// Declare the isolation level, validated against the global configuration.
    ///
    /// Violations go through [`ErrorReporter::global`], not the reporter of
    /// the scope that happens to trigger the first access.
    pub fn with_isolation_level(self, level: IsolationLevel) -> ActionResult<Self> {
        self.with_isolation_level_reported(level, &ErrorReporter::global())
    }

    /// Declare the isolation level, reporting violations through `reporter`.
    pub fn with_isolation_level_reported(
        mut self,
        level: IsolationLevel,
        reporter: &ErrorReporter,
    ) -> ActionResult<Self> {
        IsolationLevelValidator::validate(reporter, level, false)?;
        self.isolation_level = Some(level);
        Ok(self)
    }

    /// Hook run before any transaction is opened.
    pub fn before_transaction<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut A, &mut TransactionScope) -> ActionResult<()> + Send + Sync + 'static,
    {
        self.before_transaction = Some(Box::new(hook));
        self
    }

    /// Append a guard block. Guards run in declaration order.
    pub fn before_actions<F>(mut self, guard: F) -> Self
    where
        F: Fn(&mut A, &mut TransactionScope) -> ActionResult<()> + Send + Sync + 'static,
    {
        self.guards.push(Guard::new(guard));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The declared level, if any.
    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.isolation_level
    }

    pub fn guards(&self) -> &[Guard<A>] {
        &self.guards
    }

    pub(crate) fn before_transaction_hook(&self) -> Option<&HookFn<A>> {
        self.before_transaction.as_deref()
    }

    /// Accepted return types, when declared.
    pub fn return_types(&self) -> Option<&[ReturnType]> {
        self.returns.as_deref()
    }
}

impl<A> fmt::Debug for ActionDescriptor<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("name", &self.name)
            .field("isolation_level", &self.isolation_level)
            .field("before_transaction", &self.before_transaction.is_some())
            .field("guards", &self.guards.len())
            .field("returns", &self.returns)
            .finish()
    }
}
