//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which scopes depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while a tracking scope is active, the signal
//!    registers itself as a getter of that scope.
//!
//! 2. When a signal is written with a value different from the current one,
//!    the value is stored and every observing scope is notified.
//!
//! 3. Writing an equal value does nothing. Mutating the value in place (via
//!    interior mutability inside `T`) is not a write and never notifies.
//!
//! # Ownership
//!
//! A signal is a cheap handle around shared state; clones observe and write
//! the same value. Signals are not `Send`: the reactive graph is confined to
//! the thread that created it.
//!
//! The value sits behind its own `Rc`. Readers borrow a clone of that `Rc`,
//! so a callback passed to [`Signal::with`] may write the same signal.

use std::any::{type_name, Any};
use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::panic::Location;
use std::rc::Rc;

use super::debug::{self, WriteEvent, WriteKind};
use super::scope::{self, Notifier};
use super::subscriber::NotifierId;

struct SignalInner<T> {
    value: RefCell<Rc<T>>,
    notifier: Notifier,
}

/// A reactive cell holding a value of type `T`.
///
/// # Example
///
/// ```rust
/// use cascade_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    #[track_caller]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                value: RefCell::new(Rc::new(value)),
                notifier: Notifier::new_at(Location::caller()),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> NotifierId {
        self.inner.notifier.id()
    }

    /// The observable half of the signal.
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    /// Snapshot number of the last write. Grows with every notifying write.
    pub fn version(&self) -> u64 {
        self.inner.notifier.snapshot()
    }

    /// Get the current value, registering a dependency with the active scope.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Borrow the current value, registering a dependency with the active scope.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        scope::track_read(&self.inner.notifier);
        self.with_untracked(f)
    }

    /// Get the current value without tracking.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.with_untracked(T::clone)
    }

    /// Borrow the current value without tracking.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.current();
        f(&value)
    }

    fn current(&self) -> Rc<T> {
        Rc::clone(&self.inner.value.borrow())
    }

    /// Set a new value and notify observers.
    ///
    /// Returns `false` without notifying if `value` equals the current value.
    #[track_caller]
    pub fn set(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        if **self.inner.value.borrow() == value {
            return false;
        }

        self.replace(value, Location::caller(), WriteKind::User);
        true
    }

    /// Compute the next value from the current one, then [`set`](Self::set) it.
    #[track_caller]
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool
    where
        T: PartialEq,
    {
        let next = f(&self.current());
        self.set(next)
    }

    /// Store `value` and notify, skipping the equality check.
    pub(crate) fn replace(&self, value: T, location: &'static Location<'static>, kind: WriteKind) {
        let value = Rc::new(value);
        *self.inner.value.borrow_mut() = Rc::clone(&value);

        scope::track_write(&self.inner.notifier);

        debug::emit_write(&WriteEvent {
            notifier: &self.inner.notifier,
            value: &*value as &dyn Any,
            type_name: type_name::<T>(),
            kind,
            location,
        });

        tracing::trace!(signal = self.id().raw(), "signal written");

        self.inner.notifier.notify();
    }

    /// Get the number of observing scopes.
    pub fn observer_count(&self) -> usize {
        self.inner.notifier.observer_count()
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &*self.current())
            .field("observer_count", &self.observer_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
