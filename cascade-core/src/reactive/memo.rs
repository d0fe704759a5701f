//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. Reading a memo registers its notifier with the caller's scope, so memos
//!    can be chained and observed like signals.
//!
//! 2. A clean memo returns its cached value without running the computation.
//!
//! 3. A dirty memo runs the computation inside its own tracking scope, caches
//!    the result, then subscribes that scope.
//!
//! 4. When a dependency changes, the subscription marks the memo dirty and
//!    fires the memo's notifier. Nothing is recomputed yet.
//!
//! # Why This Matters
//!
//! Recomputation is always one step behind invalidation: a dependency can
//! change any number of times, and the memo computes at most once, on the next
//! read. A memo nobody reads never does any work.
//!
//! # Reads During Propagation
//!
//! One write reaches observers one at a time, so an effect may read a memo
//! before the memo has heard about the write. Each memo records the snapshot
//! of every source it read. A clean memo whose sources moved on (or are
//! themselves out of date) invalidates itself on read instead of returning
//! the old value.

use std::any::{type_name, Any};
use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::panic::Location;
use std::rc::{Rc, Weak};

use super::debug::{self, WriteEvent, WriteKind};
use super::scope::{Notifier, ScopeKind, Source, TrackingScope};
use super::subscriber::{NotifierId, Subscription};
use crate::container::ScopeContainer;
use crate::error::ContainerError;

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed (or nothing was computed yet).
    Dirty,
}

struct MemoInner<T> {
    compute: Box<dyn Fn() -> T>,
    value: RefCell<Option<Rc<T>>>,
    state: Cell<MemoState>,
    scope: TrackingScope,
    notifier: Notifier,
    sources: RefCell<Vec<(Notifier, u64)>>,
    subscription: RefCell<Option<Subscription>>,
    disposed: Cell<bool>,
    computations: Cell<usize>,
}

/// A cached derived value that recomputes lazily when dependencies change.
///
/// # Example
///
/// ```rust
/// use cascade_core::reactive::{Memo, Signal};
///
/// let count = Signal::new(2);
/// let source = count.clone();
/// let doubled = Memo::new(move || source.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Memo<T: 'static> {
    inner: Rc<MemoInner<T>>,
}

impl<T: 'static> Memo<T> {
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run until the first read. When created while a
    /// scope container is constructing a unit, the memo is disposed together
    /// with that container.
    #[track_caller]
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let memo = Self {
            inner: Rc::new(MemoInner {
                compute: Box::new(compute),
                value: RefCell::new(None),
                state: Cell::new(MemoState::Dirty),
                scope: TrackingScope::new(ScopeKind::Derived),
                notifier: Notifier::new_at(Location::caller()),
                sources: RefCell::new(Vec::new()),
                subscription: RefCell::new(None),
                disposed: Cell::new(false),
                computations: Cell::new(0),
            }),
        };
        let source: Weak<MemoInner<T>> = Rc::downgrade(&memo.inner);
        let source: Weak<dyn Source> = source;
        memo.inner.notifier.set_source(source);

        if let Some(container) = ScopeContainer::resolving() {
            let owned = memo.clone();
            if let Err(err) = container.register_cleanup(move || owned.dispose()) {
                tracing::warn!(error = %err, "memo created without an owning container");
            }
        }

        memo
    }

    /// Get the memo's unique ID.
    pub fn id(&self) -> NotifierId {
        self.inner.notifier.id()
    }

    /// The observable half of the memo.
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Borrow the current value, recomputing if necessary.
    ///
    /// `f` runs on a shared handle to the cached value, so it may write the
    /// memo's sources.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.current();
        self.track();
        f(&value)
    }

    fn current(&self) -> Rc<T> {
        if self.inner.state.get() == MemoState::Clean && self.inner.sources_changed() {
            tracing::trace!(memo = self.id().raw(), "memo read ahead of its notification");
            Self::invalidate(&self.inner);
        }

        // Invalidating may have run observers that already recomputed
        if self.inner.state.get() == MemoState::Dirty {
            self.recompute();
        }

        match self.inner.value.borrow().as_ref() {
            Some(value) => Rc::clone(value),
            // Only reachable if the computation read this memo recursively
            None => unreachable!("memo read before its first computation finished"),
        }
    }

    /// Register the memo's notifier with the caller's scope.
    ///
    /// A component scope resolving a unit does not pick up reads made while
    /// the unit is constructed; those belong to the unit, not the component.
    fn track(&self) {
        let Some(current) = TrackingScope::current() else {
            return;
        };

        if current.kind() == ScopeKind::Component && ScopeContainer::resolving().is_some() {
            return;
        }

        current.register_getter(&self.inner.notifier);
        debug::emit_read(&current, &self.inner.notifier);
    }

    /// Run the computation inside the memo's scope and resubscribe.
    fn recompute(&self) {
        if let Some(subscription) = self.inner.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }

        let value = Rc::new(self.inner.scope.track(|| (self.inner.compute)()));
        *self.inner.value.borrow_mut() = Some(Rc::clone(&value));
        self.inner
            .computations
            .set(self.inner.computations.get() + 1);

        *self.inner.sources.borrow_mut() = self
            .inner
            .scope
            .getters()
            .into_iter()
            .map(|notifier| {
                let snapshot = notifier.snapshot();
                (notifier, snapshot)
            })
            .collect();

        if !self.inner.disposed.get() {
            let weak: Weak<MemoInner<T>> = Rc::downgrade(&self.inner);
            let subscription = self.inner.scope.subscribe(move || {
                if let Some(inner) = weak.upgrade() {
                    Self::invalidate(&inner);
                }
            });
            *self.inner.subscription.borrow_mut() = Some(subscription);
            self.inner.state.set(MemoState::Clean);
        }

        debug::emit_write(&WriteEvent {
            notifier: &self.inner.notifier,
            value: &*value as &dyn Any,
            type_name: type_name::<T>(),
            kind: WriteKind::DerivedSettle,
            location: self.inner.notifier.created_at(),
        });

        tracing::trace!(memo = self.id().raw(), "memo recomputed");
    }

    fn invalidate(inner: &MemoInner<T>) {
        if let Some(subscription) = inner.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
        inner.state.set(MemoState::Dirty);
        inner.notifier.notify();
    }

    /// Stop tracking dependencies. Later reads still compute, but the memo
    /// never caches or notifies again.
    pub fn dispose(&self) {
        self.inner.disposed.set(true);
        if let Some(subscription) = self.inner.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
        self.inner.state.set(MemoState::Dirty);
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        self.inner.state.get()
    }

    /// Number of times the computation has run.
    pub fn computations(&self) -> usize {
        self.inner.computations.get()
    }

    /// Get the number of observing scopes.
    pub fn observer_count(&self) -> usize {
        self.inner.notifier.observer_count()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }
}

impl<T> MemoInner<T> {
    /// Whether a recorded source fired, or would change if read, since the
    /// last computation.
    fn sources_changed(&self) -> bool {
        self.sources
            .borrow()
            .iter()
            .any(|(notifier, snapshot)| notifier.snapshot() != *snapshot || notifier.is_stale())
    }
}

impl<T> Source for MemoInner<T> {
    fn is_stale(&self) -> bool {
        match self.state.get() {
            MemoState::Dirty => true,
            MemoState::Clean => self.sources_changed(),
        }
    }
}

/// Create a memo owned by the unit currently being constructed.
///
/// Fails with [`ContainerError::OutsideResolution`] when no scope container
/// is constructing a unit.
#[track_caller]
pub fn derived<T, F>(compute: F) -> Result<Memo<T>, ContainerError>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    if ScopeContainer::resolving().is_none() {
        return Err(ContainerError::OutsideResolution {
            operation: "derived",
        });
    }

    Ok(Memo::new(compute))
}

impl<T: 'static> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("value", &self.inner.value.borrow().as_deref())
            .field("observer_count", &self.observer_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;

    fn counted<T: 'static>(f: impl Fn() -> T + 'static) -> (Rc<Cell<usize>>, impl Fn() -> T) {
        let calls = Rc::new(Cell::new(0));
        let handle = calls.clone();
        (calls, move || {
            handle.set(handle.get() + 1);
            f()
        })
    }

    #[test]
    fn memo_computes_on_first_access() {
        let (calls, compute) = counted(|| 42);
        let memo = Memo::new(compute);

        // Not computed yet
        assert!(!memo.has_value());
        assert_eq!(calls.get(), 0);

        assert_eq!(memo.get(), 42);
        assert_eq!(calls.get(), 1);
        assert!(memo.has_value());
    }

    #[test]
    fn memo_caches_value_when_clean() {
        let signal = Signal::new(3);
        let source = signal.clone();
        let (calls, compute) = counted(move || source.get() + 1);
        let memo = Memo::new(compute);

        assert_eq!(memo.get(), 4);
        assert_eq!(memo.get(), 4);
        assert_eq!(memo.get(), 4);
        assert_eq!(calls.get(), 1);
        assert_eq!(memo.state(), MemoState::Clean);
    }

    #[test]
    fn memo_recomputes_once_after_many_changes() {
        let signal = Signal::new(0);
        let source = signal.clone();
        let (calls, compute) = counted(move || source.get() * 10);
        let memo = Memo::new(compute);

        assert_eq!(memo.get(), 0);

        for n in 1..=5 {
            signal.set(n);
        }
        assert_eq!(memo.state(), MemoState::Dirty);
        assert_eq!(calls.get(), 1);

        assert_eq!(memo.get(), 50);
        assert_eq!(calls.get(), 2);
        assert_eq!(memo.computations(), 2);
    }

    #[test]
    fn memo_notifies_observers_once_per_invalidation() {
        let signal = Signal::new(1);
        let source = signal.clone();
        let memo = Memo::new(move || source.get());

        let scope = TrackingScope::new(ScopeKind::Component);
        scope.track(|| memo.get());
        let notified = Rc::new(Cell::new(0));
        let handle = notified.clone();
        let _subscription = scope.subscribe(move || handle.set(handle.get() + 1));

        signal.set(2);
        signal.set(3);
        assert_eq!(notified.get(), 1);
    }

    #[test]
    fn chained_memos_propagate() {
        let base = Signal::new(5);

        let source = base.clone();
        let doubled = Memo::new(move || source.get() * 2);

        let inner = doubled.clone();
        let plus_ten = Memo::new(move || inner.get() + 10);

        assert_eq!(doubled.get(), 10);
        assert_eq!(plus_ten.get(), 20);

        base.set(10);
        assert_eq!(plus_ten.state(), MemoState::Dirty);
        assert_eq!(plus_ten.get(), 30);
        assert_eq!(doubled.get(), 20);
    }

    /// Subscribe a component scope to `signal` that reads `read` whenever
    /// the signal fires. Because it subscribes first, it hears about a write
    /// before any memo created afterwards does.
    fn read_on_write<T: 'static, R: 'static>(
        signal: &Signal<T>,
        read: impl Fn() -> R + 'static,
    ) -> (Subscription, Rc<RefCell<Vec<R>>>) {
        let scope = TrackingScope::new(ScopeKind::Component);
        scope.track(|| signal.with(|_| ()));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let subscription = scope.subscribe(move || sink.borrow_mut().push(read()));
        (subscription, seen)
    }

    #[test]
    fn memo_read_ahead_of_its_notification_is_fresh() {
        let signal = Signal::new(1);
        let source = signal.clone();
        let doubled = Memo::new(move || source.get() * 2);

        let reader = doubled.clone();
        let (_subscription, seen) = read_on_write(&signal, move || reader.get());
        assert_eq!(doubled.get(), 2);

        signal.set(2);
        assert_eq!(*seen.borrow(), vec![4]);
        assert_eq!(doubled.computations(), 2);
        assert_eq!(doubled.state(), MemoState::Clean);
        assert_eq!(signal.observer_count(), 1);
    }

    #[test]
    fn memo_chain_read_ahead_of_its_notification_is_fresh() {
        let signal = Signal::new(1);
        let source = signal.clone();
        let plus_one = Memo::new(move || source.get() + 1);
        let inner = plus_one.clone();
        let times_ten = Memo::new(move || inner.get() * 10);

        let reader = times_ten.clone();
        let (_subscription, seen) = read_on_write(&signal, move || reader.get());
        assert_eq!(times_ten.get(), 20);

        signal.set(5);
        assert_eq!(*seen.borrow(), vec![60]);
        assert_eq!(plus_one.computations(), 2);
        assert_eq!(times_ten.computations(), 2);
    }

    #[test]
    fn writing_a_source_inside_with_does_not_panic() {
        let signal = Signal::new(1);
        let source = signal.clone();
        let doubled = Memo::new(move || source.get() * 2);

        let seen = Rc::new(Cell::new(0));
        let (memo, sink) = (doubled.clone(), seen.clone());
        let scope = TrackingScope::new(ScopeKind::Effect);
        scope.track(|| memo.get());
        let _subscription = scope.subscribe(move || sink.set(memo.get()));

        let old = doubled.with(|value| {
            signal.set(*value);
            *value
        });

        assert_eq!(old, 2);
        assert_eq!(seen.get(), 4);
        assert_eq!(doubled.get(), 4);
    }

    #[test]
    fn disposed_memo_stops_caching() {
        let signal = Signal::new(1);
        let source = signal.clone();
        let (calls, compute) = counted(move || source.get());
        let memo = Memo::new(compute);

        assert_eq!(memo.get(), 1);
        memo.dispose();
        assert!(memo.is_disposed());
        assert_eq!(signal.observer_count(), 0);

        assert_eq!(memo.get(), 1);
        assert_eq!(memo.get(), 1);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn derived_requires_resolving_container() {
        let err = derived(|| 1).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::OutsideResolution { operation: "derived" }
        ));
    }

    #[test]
    fn memo_clone_shares_state() {
        let memo1 = Memo::new(|| 42);
        assert_eq!(memo1.get(), 42);

        let memo2 = memo1.clone();
        assert_eq!(memo1.id(), memo2.id());
        assert!(memo2.has_value());
        assert_eq!(memo2.computations(), 1);
    }
}
