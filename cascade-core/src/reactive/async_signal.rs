//! Async Signals
//!
//! An [`AsyncSignal`] is a signal whose value is the state of an asynchronous
//! operation: pending, fulfilled with a value, or rejected with a reason.
//!
//! # Superseding
//!
//! Every write starts a new operation and takes a fresh token. When an
//! operation settles, its result is applied only if its token is still the
//! current one. A superseded operation keeps running, but its result is
//! dropped and observers are never notified about it. At most one settlement
//! per write wins.
//!
//! # Driving Operations
//!
//! [`AsyncSignal::write`] returns the settlement future. Futures do nothing
//! until polled: the host awaits it, or spawns it on its local executor.
//! [`AsyncSignal::spawn_local`] does the latter on a tokio `LocalSet`.

use std::fmt::{self, Debug};
use std::future::Future;
use std::cell::Cell;
use std::panic::Location;
use std::rc::{Rc, Weak};

use super::debug::WriteKind;
use super::signal::Signal;
use super::subscriber::NotifierId;
use crate::error::UnwrapError;

/// State of an asynchronous operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FutureState<T, E> {
    Pending,
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> FutureState<T, E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, FutureState::Pending)
    }

    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    pub fn as_ref(&self) -> FutureState<&T, &E> {
        match self {
            FutureState::Pending => FutureState::Pending,
            FutureState::Fulfilled(value) => FutureState::Fulfilled(value),
            FutureState::Rejected(reason) => FutureState::Rejected(reason),
        }
    }

    /// The fulfilled value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            FutureState::Fulfilled(value) => Some(value),
            _ => None,
        }
    }

    /// Turn the state into a `Result`.
    ///
    /// Pending becomes [`UnwrapError::Pending`], a rejection becomes
    /// [`UnwrapError::Rejected`] with the reason. This does not track: the
    /// dependency is registered by whichever read produced the state.
    pub fn unwrap(self) -> Result<T, UnwrapError<E>> {
        match self {
            FutureState::Pending => Err(UnwrapError::Pending),
            FutureState::Fulfilled(value) => Ok(value),
            FutureState::Rejected(reason) => Err(UnwrapError::Rejected(reason)),
        }
    }
}

impl<T, E> From<Result<T, E>> for FutureState<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => FutureState::Fulfilled(value),
            Err(reason) => FutureState::Rejected(reason),
        }
    }
}

struct AsyncInner<T: 'static, E: 'static> {
    signal: Signal<FutureState<T, E>>,
    token: Cell<u64>,
}

/// A signal holding the state of the latest asynchronous operation.
pub struct AsyncSignal<T: 'static, E: 'static> {
    inner: Rc<AsyncInner<T, E>>,
}

impl<T: 'static, E: 'static> AsyncSignal<T, E> {
    /// Create a signal with no operation, in the pending state.
    #[track_caller]
    pub fn new() -> Self {
        Self::from_state(FutureState::Pending)
    }

    /// Create a signal that is already fulfilled.
    #[track_caller]
    pub fn ready(value: T) -> Self {
        Self::from_state(FutureState::Fulfilled(value))
    }

    #[track_caller]
    fn from_state(state: FutureState<T, E>) -> Self {
        Self {
            inner: Rc::new(AsyncInner {
                signal: Signal::new(state),
                token: Cell::new(0),
            }),
        }
    }

    pub fn id(&self) -> NotifierId {
        self.inner.signal.id()
    }

    /// The underlying signal holding the state.
    pub fn signal(&self) -> &Signal<FutureState<T, E>> {
        &self.inner.signal
    }

    /// Token of the latest write.
    pub fn token(&self) -> u64 {
        self.inner.token.get()
    }

    /// Whether `token` belongs to the latest write.
    pub fn is_current(&self, token: u64) -> bool {
        self.inner.token.get() == token
    }

    /// Get the current state, registering a dependency with the active scope.
    pub fn read(&self) -> FutureState<T, E>
    where
        T: Clone,
        E: Clone,
    {
        self.inner.signal.get()
    }

    /// Borrow the current state, registering a dependency with the active scope.
    pub fn with<R>(&self, f: impl FnOnce(&FutureState<T, E>) -> R) -> R {
        self.inner.signal.with(f)
    }

    /// Start a new operation, superseding any in-flight one.
    ///
    /// The state becomes pending immediately and observers are notified. The
    /// returned future awaits `operation` and applies its outcome if no newer
    /// write happened in the meantime; it resolves to whether the outcome was
    /// applied.
    #[track_caller]
    pub fn write<F>(&self, operation: F) -> impl Future<Output = bool> + 'static
    where
        F: Future<Output = Result<T, E>> + 'static,
    {
        let location = Location::caller();
        let token = self.inner.token.get() + 1;
        self.inner.token.set(token);

        tracing::debug!(signal = self.id().raw(), token, "async operation started");
        self.inner
            .signal
            .replace(FutureState::Pending, location, WriteKind::User);

        let weak: Weak<AsyncInner<T, E>> = Rc::downgrade(&self.inner);
        async move {
            let outcome = operation.await;

            let Some(inner) = weak.upgrade() else {
                return false;
            };

            if inner.token.get() != token {
                tracing::debug!(
                    signal = inner.signal.id().raw(),
                    token,
                    current = inner.token.get(),
                    "discarding superseded settlement"
                );
                return false;
            }

            inner.signal.replace(outcome.into(), location, WriteKind::User);
            true
        }
    }

    /// [`write`](Self::write), with the settlement spawned on the current
    /// tokio `LocalSet`.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a `LocalSet`.
    #[track_caller]
    pub fn spawn_local<F>(&self, operation: F) -> tokio::task::JoinHandle<bool>
    where
        F: Future<Output = Result<T, E>> + 'static,
    {
        tokio::task::spawn_local(self.write(operation))
    }
}

impl<T: 'static, E: 'static> Default for AsyncSignal<T, E> {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static, E: 'static> Clone for AsyncSignal<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static, E: Debug + 'static> Debug for AsyncSignal<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncSignal")
            .field("id", &self.id())
            .field("token", &self.token())
            .field("state", &self.inner.signal.with_untracked(|state| format!("{state:?}")))
            .finish()
    }
}
