//! Actions: units of transactional business logic.
//!
//! An action declares itself through an [`ActionDescriptor`] and implements
//! [`Action::perform`]. Calling it runs, in order:
//!
//! ```text
//! restricted-phase check
//!        │
//!        ▼
//! before_transaction hook ──(phase: before_transaction)
//!        │
//!        ▼
//! TransactionScope::run ──► open or join the transaction
//!        │
//!        ├──► guard blocks ──(phase: before_actions)
//!        └──► perform
//!        │
//!        ▼ (outermost call only)
//! after_commit | rollback ──► ensure
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::OnceLock;
//! use txn_actions::{Action, ActionDescriptor, ActionResult, TransactionScope};
//!
//! struct CreateOrder { user: User, order: Option<Order> }
//!
//! impl Action for CreateOrder {
//!     type Output = Order;
//!
//!     fn descriptor() -> &'static ActionDescriptor<Self> {
//!         static DESCRIPTOR: OnceLock<ActionDescriptor<CreateOrder>> = OnceLock::new();
//!         DESCRIPTOR.get_or_init(|| {
//!             ActionDescriptor::new("CreateOrder").fail_with("banned_user", |a| a.user.banned)
//!         })
//!     }
//!
//!     fn perform(&mut self, scope: &mut TransactionScope) -> ActionResult<Order> {
//!         let order = orders::create(&self.user)?;
//!         self.order = Some(order.clone());
//!         Ok(order)
//!     }
//! }
//!
//! match CreateOrder::new(user).call(&mut scope)? {
//!     Ok(order) => println!("created {order:?}"),
//!     Err(failure) => println!("rejected: {}", failure.reason()),
//! }
//! ```

mod descriptor;
mod error;
mod failure;
mod typed_returns;
mod validation;

use serde_json::Value;

use crate::transaction::{Phase, TransactionScope};

pub use descriptor::{ActionDescriptor, Guard};
pub use error::{ActionError, ActionResult};
pub use failure::ActionFailure;
pub use typed_returns::{ReturnType, TypedCall};
pub use validation::DryCall;

/// Result of calling an action.
///
/// The outer error is an unexpected failure; the inner one is the expected
/// failure absorbed by the outermost call.
pub type CallResult<T> = ActionResult<Result<T, ActionFailure>>;

/// Abort the current action with `reason`.
///
/// Meant to be returned from guard blocks and [`Action::perform`].
pub fn fail_with<T>(reason: impl Into<Value>) -> ActionResult<T> {
    Err(ActionError::Failure(ActionFailure::new(reason)))
}

/// A unit of work run inside the call tree's transaction.
pub trait Action: Send + Sized + 'static {
    type Output;

    /// Declaration shared by every instance of this action.
    fn descriptor() -> &'static ActionDescriptor<Self>;

    /// Main body.
    fn perform(&mut self, scope: &mut TransactionScope) -> ActionResult<Self::Output>;

    /// Runs once the call tree's transaction committed.
    fn after_commit(&mut self, _scope: &mut TransactionScope) -> ActionResult<()> {
        Ok(())
    }

    /// Runs once the call tree's transaction rolled back.
    fn rollback(&mut self, _scope: &mut TransactionScope) -> ActionResult<()> {
        Ok(())
    }

    /// Runs after the call tree finished, whatever the outcome.
    fn ensure(&mut self, _scope: &mut TransactionScope) -> ActionResult<()> {
        Ok(())
    }

    /// Run the action.
    fn call(mut self, scope: &mut TransactionScope) -> CallResult<Self::Output> {
        let descriptor = Self::descriptor();

        if let Some(phase) = scope.restricted_phase() {
            scope.reporter().report(format!(
                "calling action {} is restricted inside #{}",
                descriptor.name(),
                phase
            ))?;
        }

        if let Some(hook) = descriptor.before_transaction_hook() {
            let transaction_open = scope.is_transaction_open();
            if transaction_open {
                scope.reporter().report(format!(
                    "{}#before_transaction was called inside the transaction",
                    descriptor.name()
                ))?;
            }

            let mut guarded = scope.restrict_action_calls_by(Phase::BeforeTransaction);
            match hook(&mut self, &mut *guarded) {
                Ok(()) => {}
                // Nothing to roll back yet: the failure is the outcome.
                Err(ActionError::Failure(failure)) if !transaction_open => return Ok(Err(failure)),
                Err(err) => return Err(err),
            }
        }

        scope.run(self, |action, scope| {
            evaluate_guards(action, scope)?;
            action.perform(scope)
        })
    }
}

/// Run every guard block in declaration order, stopping at the first error.
fn evaluate_guards<A: Action>(action: &mut A, scope: &mut TransactionScope) -> ActionResult<()> {
    let mut guarded = scope.restrict_action_calls_by(Phase::BeforeActions);
    for guard in A::descriptor().guards() {
        guard.evaluate(action, &mut guarded)?;
    }
    Ok(())
}
