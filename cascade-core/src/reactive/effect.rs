//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately inside its own
//!    tracking scope, then subscribes that scope to re-run itself.
//!
//! 2. When any dependency changes, the scope's subscriber runs the effect
//!    again, synchronously, before the write returns.
//!
//! 3. Every run first drops the previous subscription, so no dependency from an
//!    older run survives into the next one.
//!
//! # Reading and Writing the Same Signal
//!
//! A write inside the effect removes the matching read from the effect's
//! scope. An effect that increments a counter it also reads therefore runs
//! once per outside trigger and never re-triggers itself.
//!
//! # Failure
//!
//! A panic inside the callback unwinds to whoever caused the run. The effect
//! is left unsubscribed; it does not retry.

use std::cell::{Cell, RefCell};
use std::panic::Location;
use std::rc::Rc;

use super::debug::{self, EffectRunEvent};
use super::scope::{ScopeKind, TrackingScope};
use super::subscriber::{ScopeId, Subscription};
use crate::container::ScopeContainer;
use crate::error::ContainerError;

struct EffectInner {
    run: RefCell<Box<dyn FnMut()>>,
    scope: TrackingScope,
    subscription: RefCell<Option<Subscription>>,
    disposed: Cell<bool>,
    run_count: Cell<usize>,
    created_at: &'static Location<'static>,
}

/// A side-effecting computation that runs when dependencies change.
///
/// An effect stays alive until it is disposed, even when every handle to it
/// has been dropped.
///
/// # Example
///
/// ```rust
/// use cascade_core::reactive::{Effect, Signal};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let count = Signal::new(0);
/// let seen = Rc::new(Cell::new(-1));
///
/// let (source, sink) = (count.clone(), seen.clone());
/// let effect = Effect::new(move || sink.set(source.get()));
///
/// count.set(5);
/// assert_eq!(seen.get(), 5);
/// effect.dispose();
/// ```
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies. When
    /// created while a scope container is constructing a unit, the effect is
    /// disposed together with that container.
    #[track_caller]
    pub fn new<F>(run: F) -> Self
    where
        F: FnMut() + 'static,
    {
        let effect = Self {
            inner: Rc::new(EffectInner {
                run: RefCell::new(Box::new(run)),
                scope: TrackingScope::new(ScopeKind::Effect),
                subscription: RefCell::new(None),
                disposed: Cell::new(false),
                run_count: Cell::new(0),
                created_at: Location::caller(),
            }),
        };

        if let Some(container) = ScopeContainer::resolving() {
            let owned = effect.clone();
            if let Err(err) = container.register_cleanup(move || owned.dispose()) {
                tracing::warn!(error = %err, "effect created without an owning container");
            }
        }

        effect.execute();

        effect
    }

    /// Get the scope ID used for dependency tracking.
    pub fn id(&self) -> ScopeId {
        self.inner.scope.id()
    }

    /// Run the effect now and resubscribe.
    pub fn execute(&self) {
        Self::run(&self.inner);
    }

    fn run(inner: &Rc<EffectInner>) {
        if inner.disposed.get() {
            return;
        }

        if let Some(subscription) = inner.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }

        {
            let Ok(mut callback) = inner.run.try_borrow_mut() else {
                tracing::warn!(
                    effect = inner.scope.id().raw(),
                    "effect re-entered its own run, skipping"
                );
                return;
            };

            let _guard = inner.scope.enter();
            (*callback)();
        }

        if inner.disposed.get() {
            return;
        }

        let handle = Rc::clone(inner);
        let subscription = inner.scope.subscribe(move || Self::run(&handle));
        *inner.subscription.borrow_mut() = Some(subscription);

        let run_count = inner.run_count.get() + 1;
        inner.run_count.set(run_count);

        debug::emit_effect_run(&EffectRunEvent {
            scope: inner.scope.id(),
            run_count,
            created_at: inner.created_at,
        });

        tracing::trace!(effect = inner.scope.id().raw(), run_count, "effect ran");
    }

    /// Dispose of the effect.
    ///
    /// After disposal, the effect will not run again.
    pub fn dispose(&self) {
        self.inner.disposed.set(true);
        if let Some(subscription) = self.inner.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Get the number of times the effect has run to completion.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of dependencies tracked by the latest run.
    pub fn dependency_count(&self) -> usize {
        self.inner.scope.getter_count()
    }

    /// Whether the effect currently listens for changes.
    pub fn is_subscribed(&self) -> bool {
        self.inner
            .subscription
            .borrow()
            .as_ref()
            .map(Subscription::is_active)
            .unwrap_or(false)
    }
}

/// Create an effect owned by the unit currently being constructed.
///
/// Fails with [`ContainerError::OutsideResolution`] when no scope container
/// is constructing a unit.
#[track_caller]
pub fn effect<F>(run: F) -> Result<Effect, ContainerError>
where
    F: FnMut() + 'static,
{
    if ScopeContainer::resolving().is_none() {
        return Err(ContainerError::OutsideResolution {
            operation: "effect",
        });
    }

    Ok(Effect::new(run))
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
