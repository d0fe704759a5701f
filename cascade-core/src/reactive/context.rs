//! Tracking Context
//!
//! The tracking context records which scope is currently collecting
//! dependencies. When a signal or memo is read, it registers itself with the
//! scope on top of the stack.
//!
//! # Implementation
//!
//! We use a thread-local stack of active scopes. Entering a scope pushes it,
//! and the returned [`ScopeGuard`] pops it when dropped. Because the pop lives
//! in `Drop`, the stack stays balanced on every exit path, including panics
//! that unwind through a memo or effect.
//!
//! A component might open a scope, resolve a unit that reads a memo, which
//! opens the memo's own scope, which reads another memo, and so on. The stack
//! keeps those passes strictly nested.

use std::cell::RefCell;
use std::marker::PhantomData;

use super::scope::TrackingScope;
use super::subscriber::ScopeId;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<TrackingScope>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the tracking scope when dropped.
///
/// Not `Send`: the stack is per thread.
#[must_use = "the scope is popped as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ScopeGuard {
    scope_id: ScopeId,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let popped = SCOPE_STACK.with(|stack| stack.borrow_mut().pop());

        if let Some(scope) = popped {
            debug_assert_eq!(
                scope.id(),
                self.scope_id,
                "tracking scope mismatch: expected {:?}, got {:?}",
                self.scope_id,
                scope.id()
            );
        }
    }
}

/// Push `scope` onto the stack.
pub(crate) fn push(scope: &TrackingScope) -> ScopeGuard {
    SCOPE_STACK.with(|stack| stack.borrow_mut().push(scope.clone()));

    ScopeGuard {
        scope_id: scope.id(),
        _not_send: PhantomData,
    }
}

/// The scope on top of the stack, if any.
pub(crate) fn current() -> Option<TrackingScope> {
    SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
}

/// Number of scopes currently on the stack.
pub(crate) fn depth() -> usize {
    SCOPE_STACK.with(|stack| stack.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::ScopeKind;

    #[test]
    fn guard_pops_on_drop() {
        let scope = TrackingScope::new(ScopeKind::Component);

        assert!(current().is_none());

        {
            let _guard = push(&scope);
            assert_eq!(current().map(|s| s.id()), Some(scope.id()));
            assert_eq!(depth(), 1);
        }

        assert!(current().is_none());
        assert_eq!(depth(), 0);
    }

    #[test]
    fn nested_scopes() {
        let outer = TrackingScope::new(ScopeKind::Component);
        let inner = TrackingScope::new(ScopeKind::Derived);

        {
            let _outer = push(&outer);
            assert_eq!(current().map(|s| s.id()), Some(outer.id()));

            {
                let _inner = push(&inner);
                assert_eq!(current().map(|s| s.id()), Some(inner.id()));
            }

            // After the inner guard drops, the outer scope is current again
            assert_eq!(current().map(|s| s.id()), Some(outer.id()));
        }

        assert!(current().is_none());
    }

    #[test]
    fn guard_pops_on_panic() {
        let scope = TrackingScope::new(ScopeKind::Effect);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = push(&scope);
            panic!("inside scope");
        }));

        assert!(result.is_err());
        assert_eq!(depth(), 0);
    }
}
