//! Tracking Scopes and Notifiers
//!
//! A [`TrackingScope`] records which notifiers were read (getters) and written
//! (setters) during one execution pass. Subscribing the scope attaches it as an
//! observer to every getter. A [`Notifier`] is the observable half of a signal
//! or memo: the set of scopes interested in it.
//!
//! # Propagation
//!
//! When a notifier fires, each observing scope:
//!
//! 1. removes itself from every notifier it tracked,
//! 2. clears its getters and setters,
//! 3. invokes its subscriber exactly once.
//!
//! The subscriber is expected to start a new tracking pass, so dependencies
//! are always rediscovered in full. A scope never keeps a stale dependency.
//!
//! A notifier snapshots its observers before iterating. A scope that
//! re-subscribes while being notified lands in the live set, not in the
//! snapshot, so one write can never loop back into the same pass.
//!
//! Each observer entry is stamped with the subscription generation that
//! created it, and a generation fires at most once. An entry left in a
//! snapshot after its scope re-subscribed (or was already notified through
//! another path) is skipped.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::Location;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::context::{self, ScopeGuard};
use super::debug;
use super::subscriber::{next_snapshot, current_snapshot, NotifierId, ScopeId, Subscription};

/// What kind of computation a tracking scope belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// A render pass of a UI component, owned by the binding layer.
    Component,
    /// The internal scope of a memo.
    Derived,
    /// The internal scope of an effect.
    Effect,
}

// ----------------------------------------------------------------------------
// Notifier
// ----------------------------------------------------------------------------

/// Something a notifier can ask whether its cached value is out of date.
pub(crate) trait Source {
    fn is_stale(&self) -> bool;
}

#[derive(Clone)]
struct Observer {
    scope: Weak<ScopeInner>,
    generation: u64,
}

pub(crate) struct NotifierInner {
    id: NotifierId,
    created_at: &'static Location<'static>,
    observers: RefCell<IndexMap<ScopeId, Observer>>,
    snapshot: Cell<u64>,
    source: RefCell<Option<Weak<dyn Source>>>,
}

/// The set of scopes observing one signal or memo.
#[derive(Clone)]
pub struct Notifier {
    inner: Rc<NotifierInner>,
}

impl Notifier {
    /// Create a notifier, recording the caller as its source location.
    #[track_caller]
    pub fn new() -> Self {
        Self::new_at(Location::caller())
    }

    pub(crate) fn new_at(created_at: &'static Location<'static>) -> Self {
        Self {
            inner: Rc::new(NotifierInner {
                id: NotifierId::new(),
                created_at,
                observers: RefCell::new(IndexMap::new()),
                snapshot: Cell::new(current_snapshot()),
                source: RefCell::new(None),
            }),
        }
    }

    pub fn id(&self) -> NotifierId {
        self.inner.id
    }

    /// Where the owning signal or memo was created.
    pub fn created_at(&self) -> &'static Location<'static> {
        self.inner.created_at
    }

    /// Snapshot number of the last notification (or of creation).
    pub fn snapshot(&self) -> u64 {
        self.inner.snapshot.get()
    }

    /// Number of live observing scopes.
    pub fn observer_count(&self) -> usize {
        self.inner
            .observers
            .borrow()
            .values()
            .filter(|observer| observer.scope.strong_count() > 0)
            .count()
    }

    /// IDs and kinds of the live observing scopes, in subscription order.
    pub fn observers(&self) -> Vec<(ScopeId, ScopeKind)> {
        self.inner
            .observers
            .borrow()
            .values()
            .filter_map(|observer| observer.scope.upgrade())
            .map(|scope| (scope.id, scope.kind))
            .collect()
    }

    pub(crate) fn add_observer(&self, scope: &TrackingScope, generation: u64) {
        self.inner.observers.borrow_mut().insert(
            scope.id(),
            Observer {
                scope: Rc::downgrade(&scope.inner),
                generation,
            },
        );
    }

    /// Attach the cached value behind this notifier, if it has one.
    pub(crate) fn set_source(&self, source: Weak<dyn Source>) {
        *self.inner.source.borrow_mut() = Some(source);
    }

    /// Whether the value behind this notifier would change if read now.
    ///
    /// Plain signals are never stale: their notifier fires on write.
    pub(crate) fn is_stale(&self) -> bool {
        let source = self.inner.source.borrow().as_ref().and_then(Weak::upgrade);
        source.is_some_and(|source| source.is_stale())
    }

    pub(crate) fn remove_observer(&self, scope_id: ScopeId) {
        self.inner.observers.borrow_mut().shift_remove(&scope_id);
    }

    /// Notify every scope currently observing this notifier.
    pub fn notify(&self) {
        let snapshot = next_snapshot();
        self.inner.snapshot.set(snapshot);

        let observers: SmallVec<[Observer; 4]> = {
            let mut observers = self.inner.observers.borrow_mut();
            observers.retain(|_, observer| observer.scope.strong_count() > 0);
            observers.values().cloned().collect()
        };

        tracing::trace!(
            notifier = self.id().raw(),
            observers = observers.len(),
            snapshot,
            "notify"
        );

        for observer in observers {
            if let Some(inner) = observer.scope.upgrade() {
                TrackingScope::from_inner(inner).notify_generation(snapshot, observer.generation);
            }
        }
    }
}

impl Default for Notifier {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Notifier {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Notifier {}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("id", &self.id())
            .field("snapshot", &self.snapshot())
            .field("observer_count", &self.observer_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// TrackingScope
// ----------------------------------------------------------------------------

type SubscriberFn = Rc<dyn Fn()>;

pub(crate) struct ScopeInner {
    id: ScopeId,
    kind: ScopeKind,
    getters: RefCell<IndexMap<NotifierId, Notifier>>,
    setters: RefCell<IndexSet<NotifierId>>,
    subscriber: RefCell<Option<(u64, SubscriberFn)>>,
    generation: Cell<u64>,
    fired: Cell<u64>,
    snapshot: Cell<u64>,
}

impl fmt::Debug for ScopeInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeInner")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// The unit of dependency discovery.
///
/// Cloning a scope yields another handle to the same scope.
#[derive(Clone)]
pub struct TrackingScope {
    pub(crate) inner: Rc<ScopeInner>,
}

impl TrackingScope {
    /// Create a new, empty scope.
    pub fn new(kind: ScopeKind) -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                id: ScopeId::new(),
                kind,
                getters: RefCell::new(IndexMap::new()),
                setters: RefCell::new(IndexSet::new()),
                subscriber: RefCell::new(None),
                generation: Cell::new(0),
                fired: Cell::new(0),
                snapshot: Cell::new(current_snapshot()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<ScopeInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    pub fn kind(&self) -> ScopeKind {
        self.inner.kind
    }

    /// Snapshot number of the last notification this scope received.
    pub fn snapshot(&self) -> u64 {
        self.inner.snapshot.get()
    }

    /// The scope on top of the tracking stack, if any.
    pub fn current() -> Option<TrackingScope> {
        context::current()
    }

    /// Whether any scope is currently tracking.
    pub fn is_tracking() -> bool {
        context::depth() > 0
    }

    /// Make this scope the current one until the guard is dropped.
    pub fn enter(&self) -> ScopeGuard {
        context::push(self)
    }

    /// Run `f` with this scope as the current one.
    pub fn track<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        f()
    }

    /// Record a read of `notifier` in this pass.
    ///
    /// Ignored if the same notifier was already written in this pass, so a
    /// scope that reads and writes a value never triggers itself.
    pub fn register_getter(&self, notifier: &Notifier) {
        if self.inner.setters.borrow().contains(&notifier.id()) {
            return;
        }

        self.inner
            .getters
            .borrow_mut()
            .entry(notifier.id())
            .or_insert_with(|| notifier.clone());
    }

    /// Record a write of `notifier` in this pass, dropping any earlier read.
    pub fn register_setter(&self, notifier: &Notifier) {
        self.inner.getters.borrow_mut().shift_remove(&notifier.id());
        self.inner.setters.borrow_mut().insert(notifier.id());
    }

    /// Whether `notifier` is a tracked dependency of this pass.
    pub fn is_tracking_notifier(&self, notifier: &Notifier) -> bool {
        self.inner.getters.borrow().contains_key(&notifier.id())
    }

    pub fn getter_count(&self) -> usize {
        self.inner.getters.borrow().len()
    }

    pub fn setter_count(&self) -> usize {
        self.inner.setters.borrow().len()
    }

    /// The notifiers read in the current pass, in first-read order.
    pub fn getters(&self) -> Vec<Notifier> {
        self.inner.getters.borrow().values().cloned().collect()
    }

    /// Install `on_update` as the only subscriber and attach this scope to
    /// every notifier read in the current pass.
    pub fn subscribe<F>(&self, on_update: F) -> Subscription
    where
        F: Fn() + 'static,
    {
        let generation = self.inner.generation.get() + 1;
        self.inner.generation.set(generation);
        *self.inner.subscriber.borrow_mut() = Some((generation, Rc::new(on_update)));

        for notifier in self.inner.getters.borrow().values() {
            notifier.add_observer(self, generation);
        }

        Subscription::new(Rc::downgrade(&self.inner), generation)
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.subscriber.borrow().is_some()
    }

    pub(crate) fn subscriber_generation(&self) -> Option<u64> {
        self.inner
            .subscriber
            .borrow()
            .as_ref()
            .map(|(generation, _)| *generation)
    }

    pub(crate) fn unsubscribe_generation(&self, generation: u64) {
        if self.subscriber_generation() != Some(generation) {
            return;
        }

        *self.inner.subscriber.borrow_mut() = None;
        self.detach();
    }

    /// Notify on behalf of an observer entry created by `generation`.
    ///
    /// Skipped when that subscription was replaced, removed, or already
    /// fired.
    pub(crate) fn notify_generation(&self, snapshot: u64, generation: u64) {
        if self.subscriber_generation() != Some(generation)
            || self.inner.fired.get() == generation
        {
            return;
        }

        self.notify(snapshot);
    }

    /// Remove this scope from every notifier it tracked and forget them.
    fn detach(&self) {
        let getters = std::mem::take(&mut *self.inner.getters.borrow_mut());
        for notifier in getters.values() {
            notifier.remove_observer(self.id());
        }
        self.inner.setters.borrow_mut().clear();
    }

    /// Called by a notifier this scope observes.
    ///
    /// Clears all tracking state before invoking the subscriber.
    pub fn notify(&self, snapshot: u64) {
        self.inner.snapshot.set(snapshot);
        self.detach();

        let subscriber = self
            .inner
            .subscriber
            .borrow()
            .as_ref()
            .map(|(generation, subscriber)| (*generation, Rc::clone(subscriber)));

        if let Some((generation, subscriber)) = subscriber {
            self.inner.fired.set(generation);
            subscriber();
        }
    }
}

impl PartialEq for TrackingScope {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for TrackingScope {}

impl fmt::Debug for TrackingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingScope")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("getters", &self.getter_count())
            .field("setters", &self.setter_count())
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

/// Register a read of `notifier` with the current scope, if any.
pub(crate) fn track_read(notifier: &Notifier) -> Option<TrackingScope> {
    let scope = TrackingScope::current()?;
    scope.register_getter(notifier);
    debug::emit_read(&scope, notifier);
    Some(scope)
}

/// Register a write of `notifier` with the current scope, if any.
pub(crate) fn track_write(notifier: &Notifier) {
    if let Some(scope) = TrackingScope::current() {
        scope.register_setter(notifier);
    }
}
