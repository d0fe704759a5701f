//! Identifiers and subscription handles for the reactive system.
//!
//! Every tracking scope and every notifier gets a unique ID when created.
//! IDs key the getter/setter/observer sets, so equality never depends on
//! pointer identity.

use std::cell::Cell;
use std::rc::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

use super::scope::{ScopeInner, TrackingScope};

/// Unique identifier for a tracking scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Generate a new unique scope ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a notifier (the observable half of a signal or memo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotifierId(u64);

impl NotifierId {
    /// Generate a new unique notifier ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NotifierId {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static SNAPSHOT: Cell<u64> = const { Cell::new(0) };
}

/// The latest snapshot number handed out on this thread.
pub fn current_snapshot() -> u64 {
    SNAPSHOT.with(Cell::get)
}

/// Bump the snapshot counter. Every notification gets a fresh number.
pub(crate) fn next_snapshot() -> u64 {
    SNAPSHOT.with(|snapshot| {
        let next = snapshot.get() + 1;
        snapshot.set(next);
        next
    })
}

/// Handle returned by [`TrackingScope::subscribe`].
///
/// Unsubscribing removes the scope from every notifier it tracked and clears
/// the scope's subscriber. A handle only acts while its subscriber is still the
/// one installed on the scope; once the scope has been re-subscribed, an older
/// handle is inert.
#[derive(Debug)]
pub struct Subscription {
    scope: Weak<ScopeInner>,
    generation: u64,
    active: Cell<bool>,
}

impl Subscription {
    pub(crate) fn new(scope: Weak<ScopeInner>, generation: u64) -> Self {
        Self {
            scope,
            generation,
            active: Cell::new(true),
        }
    }

    /// Remove the subscription. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }

        if let Some(inner) = self.scope.upgrade() {
            TrackingScope::from_inner(inner).unsubscribe_generation(self.generation);
        }
    }

    /// Whether this handle still owns the scope's subscriber.
    pub fn is_active(&self) -> bool {
        self.active.get()
            && self
                .scope
                .upgrade()
                .map(|inner| TrackingScope::from_inner(inner).subscriber_generation() == Some(self.generation))
                .unwrap_or(false)
    }
}
