//! txn-actions - transactional business actions
//!
//! Business logic is packaged as [`Action`]s. Calling an action runs it
//! inside a database transaction; actions called from inside another action
//! join the caller's transaction instead of opening their own. Once the
//! outermost action finishes, the transaction is committed or rolled back
//! and every action of the call tree gets its `after_commit` or `rollback`
//! hook, followed by `ensure`.
//!
//! Expected failures are values: return [`fail_with`] from a guard or from
//! [`Action::perform`] and the outermost call hands back
//! `Ok(Err(ActionFailure))` after rolling back. Anything else is an
//! [`ActionError`] and propagates.
//!
//! # Declarations
//!
//! Each action builds its [`ActionDescriptor`] lazily, on the first
//! `A::descriptor()` access, and validates it against the global
//! configuration at that point. Touch every descriptor during startup to
//! surface bad declarations before the first call:
//!
//! ```ignore
//! CreateOrder::descriptor();
//! AddItemToCart::descriptor();
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use txn_actions::{Action, RecordingEngine, TransactionScope};
//!
//! let mut scope = TransactionScope::new(Arc::new(RecordingEngine::new()));
//! match AddItemToCart::new(user, item).call(&mut scope)? {
//!     Ok(cart) => println!("cart: {cart:?}"),
//!     Err(failure) => println!("rejected: {}", failure.reason()),
//! }
//! ```

pub mod action;
pub mod config;
pub mod reporter;
pub mod transaction;

#[cfg(test)]
mod testing;

pub use action::{
    fail_with, Action, ActionDescriptor, ActionError, ActionFailure, ActionResult, CallResult,
    DryCall, Guard, ReturnType, TypedCall,
};
pub use config::{Configuration, Settings};
pub use reporter::{ErrorReporter, MemorySink, TracingSink, ViolationSink};
pub use transaction::{
    EngineError, EngineEvent, EngineResult, IsolationLevel, IsolationLevelValidator, Phase,
    PhaseGuard, RecordingEngine, TransactionEngine, TransactionHandle, TransactionScope,
};
