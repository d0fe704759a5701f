//! The stack of containers currently constructing a unit.
//!
//! A unit constructor runs with its container on top of this stack. Cleanup
//! registration and nested resolution inside the constructor are routed to
//! that container.

use std::cell::RefCell;
use std::marker::PhantomData;

use super::scope_container::ScopeContainer;

thread_local! {
    static RESOLVING: RefCell<Vec<ScopeContainer>> = const { RefCell::new(Vec::new()) };
}

/// Pops the resolving container when dropped, also when a constructor panics.
pub(crate) struct ResolvingGuard {
    _not_send: PhantomData<*const ()>,
}

impl Drop for ResolvingGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| stack.borrow_mut().pop());
    }
}

pub(crate) fn enter(container: &ScopeContainer) -> ResolvingGuard {
    RESOLVING.with(|stack| stack.borrow_mut().push(container.clone()));
    ResolvingGuard {
        _not_send: PhantomData,
    }
}

pub(crate) fn current() -> Option<ScopeContainer> {
    RESOLVING.with(|stack| stack.borrow().last().cloned())
}
