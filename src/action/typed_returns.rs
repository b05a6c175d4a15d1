//! Return-type contracts.
//!
//! An action may declare the types it is allowed to return. A typed call
//! checks the final value of the whole call against that list; when nothing
//! was declared, the value is dropped and the caller gets `None`.

use std::any::{Any, TypeId};
use std::fmt;

use crate::action::descriptor::ActionDescriptor;
use crate::action::{Action, ActionFailure, CallResult};
use crate::reporter::ErrorReporter;
use crate::transaction::TransactionScope;

/// A type an action is allowed to return.
#[derive(Clone, Copy, Eq)]
pub struct ReturnType {
    id: TypeId,
    name: &'static str,
}

impl ReturnType {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn id(&self) -> TypeId {
        self.id
    }
}

impl PartialEq for ReturnType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// `alloc::string::String` -> `String`; generic names are kept whole.
fn short_type_name(full: &'static str) -> &'static str {
    if full.contains('<') {
        return full;
    }
    full.rsplit("::").next().unwrap_or(full)
}

/// Concrete type of `value`, looking through `Box<dyn Any + Send>`.
fn runtime_type_id<T: Any>(value: &T) -> TypeId {
    let any: &dyn Any = value;
    match any.downcast_ref::<Box<dyn Any + Send>>() {
        Some(inner) => (**inner).type_id(),
        None => TypeId::of::<T>(),
    }
}

impl<A> ActionDescriptor<A> {
    /// Declare the accepted return types.
    pub fn returns(mut self, types: impl IntoIterator<Item = ReturnType>) -> Self {
        self.returns = Some(types.into_iter().collect());
        self
    }
}

/// Enforce the return contract on a finished call.
///
/// Failures pass through untouched.
pub(crate) fn check_returns<T>(
    action: &str,
    accepted: Option<&[ReturnType]>,
    reporter: &ErrorReporter,
    outcome: Result<T, ActionFailure>,
) -> CallResult<Option<T>>
where
    T: Any + fmt::Debug,
{
    let value = match outcome {
        Ok(value) => value,
        Err(failure) => return Ok(Err(failure)),
    };
    let Some(accepted) = accepted else {
        return Ok(Ok(None));
    };

    let actual = runtime_type_id(&value);
    if !accepted.iter().any(|ty| ty.id == actual) {
        let expected = accepted
            .iter()
            .map(ReturnType::name)
            .collect::<Vec<_>>()
            .join(", ");
        reporter.report(format!(
            "expected {} to return {}, returned {:?}",
            action, expected, value
        ))?;
    }
    Ok(Ok(Some(value)))
}

/// Call an action under its return contract.
pub trait TypedCall: Action {
    fn typed_call(self, scope: &mut TransactionScope) -> CallResult<Option<Self::Output>>;
}

impl<A> TypedCall for A
where
    A: Action,
    A::Output: Any + fmt::Debug,
{
    fn typed_call(self, scope: &mut TransactionScope) -> CallResult<Option<A::Output>> {
        let outcome = self.call(scope)?;
        let descriptor = A::descriptor();
        check_returns(
            descriptor.name(),
            descriptor.return_types(),
            scope.reporter(),
            outcome,
        )
    }
}
