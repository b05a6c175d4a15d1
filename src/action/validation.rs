//! Declarative guards and validation-only calls.

use serde_json::Value;

use crate::action::descriptor::ActionDescriptor;
use crate::action::error::{ActionError, ActionResult};
use crate::action::failure::ActionFailure;
use crate::action::Action;
use crate::transaction::{Phase, TransactionScope};

impl<A: 'static> ActionDescriptor<A> {
    /// Guard failing with `reason` whenever `predicate` holds.
    pub fn fail_with<F>(self, reason: impl Into<Value>, predicate: F) -> Self
    where
        F: Fn(&A) -> bool + Send + Sync + 'static,
    {
        let reason = reason.into();
        self.before_actions(move |action, _scope| {
            if predicate(&*action) {
                return super::fail_with(reason.clone());
            }
            Ok(())
        })
    }
}

/// Evaluate an action's guards without running it.
pub trait DryCall: Action {
    /// Run every guard, collecting each failure instead of stopping at the
    /// first one. Neither the main body nor the transaction engine is touched.
    fn dry_call(self, scope: &mut TransactionScope) -> ActionResult<Vec<ActionFailure>>;
}

impl<A: Action> DryCall for A {
    fn dry_call(mut self, scope: &mut TransactionScope) -> ActionResult<Vec<ActionFailure>> {
        let mut guarded = scope.restrict_action_calls_by(Phase::BeforeActions);
        let mut failures = Vec::new();
        for guard in A::descriptor().guards() {
            match guard.evaluate(&mut self, &mut guarded) {
                Ok(()) => {}
                Err(ActionError::Failure(failure)) => failures.push(failure),
                Err(err) => return Err(err),
            }
        }
        Ok(failures)
    }
}
