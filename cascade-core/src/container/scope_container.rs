//! Scope Container
//!
//! A hierarchical registry that constructs units lazily, on first
//! resolution, and disposes them together with the consumer scope that owns
//! the container.
//!
//! # Resolution
//!
//! 1. A container holding a construction error returns that same error.
//! 2. A locally provided, unresolved unit is constructed with this container
//!    on top of the resolving stack. Success caches the value; failure caches
//!    the error for the whole container.
//! 3. A locally resolved unit is returned from the cache.
//! 4. Anything else is delegated to the parent. The root container reports
//!    the unit as not provided.
//!
//! A constructor that panics instead of returning leaves the container
//! failed, exactly as if it had returned an error.
//!
//! # Contexts
//!
//! Besides units, a container holds plain context values keyed by type.
//! Looking one up walks from the container towards the root and returns the
//! nearest value.
//!
//! # Disposal
//!
//! Disposing marks the container disposed, runs every registered cleanup
//! once, then drops the constructed units and contexts.

use std::any::{type_name, Any, TypeId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

use super::resolving;
use super::unit::{short_type_name, Unit};
use crate::error::{ConstructorPanicked, ContainerError, UnitError};
use crate::reactive::debug::{self, UnitMountedEvent};
use crate::reactive::Signal;

/// Unique identifier for a scope container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(u64);

impl ContainerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

type Constructor = Box<dyn FnOnce() -> Result<Rc<dyn Any>, UnitError>>;
type Cleanup = Box<dyn FnOnce()>;

enum Entry {
    Unresolved(Constructor),
    Resolving,
    Resolved(Rc<dyn Any>),
    Failed,
}

struct Registration {
    name: &'static str,
    entry: Entry,
}

struct ContainerInner {
    id: ContainerId,
    parent: Option<ScopeContainer>,
    entries: RefCell<IndexMap<TypeId, Registration>>,
    contexts: RefCell<IndexMap<TypeId, Rc<dyn Any>>>,
    cleanups: RefCell<Vec<Cleanup>>,
    disposed: Cell<bool>,
    sticky_error: RefCell<Option<ContainerError>>,
}

/// A lazily resolving, hierarchical registry of units.
///
/// Cloning yields another handle to the same container.
#[derive(Clone)]
pub struct ScopeContainer {
    inner: Rc<ContainerInner>,
}

impl ScopeContainer {
    /// Create a container with no parent.
    pub fn root() -> Self {
        Self::with_parent(None)
    }

    /// Create a container that delegates unknown units to `self`.
    pub fn child(&self) -> Self {
        Self::with_parent(Some(self.clone()))
    }

    fn with_parent(parent: Option<ScopeContainer>) -> Self {
        Self {
            inner: Rc::new(ContainerInner {
                id: ContainerId::new(),
                parent,
                entries: RefCell::new(IndexMap::new()),
                contexts: RefCell::new(IndexMap::new()),
                cleanups: RefCell::new(Vec::new()),
                disposed: Cell::new(false),
                sticky_error: RefCell::new(None),
            }),
        }
    }

    pub fn id(&self) -> ContainerId {
        self.inner.id
    }

    pub fn parent(&self) -> Option<&ScopeContainer> {
        self.inner.parent.as_ref()
    }

    /// The container currently constructing a unit, if any.
    pub fn resolving() -> Option<ScopeContainer> {
        resolving::current()
    }

    /// Provide `U` using its [`Unit::construct`].
    pub fn provide<U: Unit>(&self) -> &Self {
        self.provide_with::<U, _>(U::construct)
    }

    /// Provide `U` using a custom constructor, typically a closure over props.
    ///
    /// Providing a unit that was already resolved or failed keeps the
    /// existing entry.
    pub fn provide_with<U, F>(&self, construct: F) -> &Self
    where
        U: 'static,
        F: FnOnce() -> Result<U, UnitError> + 'static,
    {
        let name = short_type_name(type_name::<U>());
        let constructor: Constructor =
            Box::new(move || construct().map(|value| Rc::new(value) as Rc<dyn Any>));

        let mut entries = self.inner.entries.borrow_mut();
        let replaceable = matches!(
            entries.get(&TypeId::of::<U>()),
            None | Some(Registration {
                entry: Entry::Unresolved(_),
                ..
            })
        );

        if replaceable {
            entries.insert(
                TypeId::of::<U>(),
                Registration {
                    name,
                    entry: Entry::Unresolved(constructor),
                },
            );
        } else {
            tracing::warn!(
                container = self.id().raw(),
                unit = name,
                "unit already constructed, keeping existing entry"
            );
        }

        self
    }

    /// Provide `U` from a constructor that receives its props as a signal.
    ///
    /// The returned signal is the host's handle: setting new props on it
    /// updates every memo and effect the unit derived from them, without
    /// constructing the unit again. If `U` was already constructed here, the
    /// existing entry is kept and the returned signal reaches nothing.
    #[track_caller]
    pub fn provide_with_props<U, P, F>(&self, props: P, construct: F) -> Signal<P>
    where
        U: 'static,
        P: 'static,
        F: FnOnce(Signal<P>) -> Result<U, UnitError> + 'static,
    {
        let props = Signal::new(props);
        let handle = props.clone();
        self.provide_with::<U, _>(move || construct(props));
        handle
    }

    /// Make `value` the context of type `C` for this container and its
    /// descendants, replacing an earlier value of the same type.
    pub fn provide_context<C: 'static>(&self, value: C) -> &Self {
        let replaced = self
            .inner
            .contexts
            .borrow_mut()
            .insert(TypeId::of::<C>(), Rc::new(value))
            .is_some();

        tracing::debug!(
            container = self.id().raw(),
            context = short_type_name(type_name::<C>()),
            replaced,
            "context provided"
        );
        self
    }

    /// Look up the context of type `C` here or in the nearest ancestor that
    /// provides it.
    pub fn context<C: 'static>(&self) -> Result<Rc<C>, ContainerError> {
        let name = short_type_name(type_name::<C>());

        if self.inner.disposed.get() {
            return Err(ContainerError::Disposed);
        }

        let local = self.inner.contexts.borrow().get(&TypeId::of::<C>()).cloned();
        match local {
            Some(value) => value
                .downcast::<C>()
                .map_err(|_| ContainerError::ContextNotProvided { context: name }),
            None => match self.parent() {
                Some(parent) => parent.context::<C>(),
                None => Err(ContainerError::ContextNotProvided { context: name }),
            },
        }
    }

    /// Whether `U` is provided by this container itself.
    pub fn provides<U: 'static>(&self) -> bool {
        self.inner.entries.borrow().contains_key(&TypeId::of::<U>())
    }

    /// Resolve `U` here or in the nearest ancestor that provides it.
    pub fn resolve<U: 'static>(&self) -> Result<Rc<U>, ContainerError> {
        let name = short_type_name(type_name::<U>());

        if let Some(err) = self.inner.sticky_error.borrow().as_ref() {
            return Err(err.clone());
        }

        if self.inner.disposed.get() {
            return Err(ContainerError::Disposed);
        }

        let constructor = {
            let mut entries = self.inner.entries.borrow_mut();
            let Some(registration) = entries.get_mut(&TypeId::of::<U>()) else {
                drop(entries);
                return match self.parent() {
                    Some(parent) => parent.resolve::<U>(),
                    None => Err(ContainerError::NotProvided { unit: name }),
                };
            };

            match std::mem::replace(&mut registration.entry, Entry::Resolving) {
                Entry::Unresolved(constructor) => constructor,
                Entry::Resolved(value) => {
                    registration.entry = Entry::Resolved(Rc::clone(&value));
                    return downcast(value, name);
                }
                Entry::Resolving => {
                    return Err(ContainerError::Cycle { unit: name });
                }
                Entry::Failed => {
                    registration.entry = Entry::Failed;
                    drop(entries);
                    return Err(self
                        .sticky_error()
                        .unwrap_or(ContainerError::Cycle { unit: name }));
                }
            }
        };

        let outcome = {
            let _guard = resolving::enter(self);
            let mut pending = PendingConstruction {
                container: self,
                key: TypeId::of::<U>(),
                name,
                finished: false,
            };
            let outcome = constructor();
            pending.finished = true;
            outcome
        };

        self.settle(TypeId::of::<U>(), name, outcome)
            .and_then(|value| downcast(value, name))
    }

    fn settle(
        &self,
        key: TypeId,
        name: &'static str,
        outcome: Result<Rc<dyn Any>, UnitError>,
    ) -> Result<Rc<dyn Any>, ContainerError> {
        let mut entries = self.inner.entries.borrow_mut();
        // Absent when the container was disposed during construction.
        let registration = entries.get_mut(&key);

        match outcome {
            Ok(value) => {
                if let Some(registration) = registration {
                    registration.entry = Entry::Resolved(Rc::clone(&value));
                }
                drop(entries);

                tracing::debug!(container = self.id().raw(), unit = name, "unit constructed");
                debug::emit_unit_mounted(&UnitMountedEvent {
                    container: self.id(),
                    parent: self.parent().map(ScopeContainer::id),
                    unit: name,
                });

                Ok(value)
            }
            Err(source) => {
                if let Some(registration) = registration {
                    registration.entry = Entry::Failed;
                }
                drop(entries);

                let err = ContainerError::Construction {
                    unit: name,
                    source: Arc::from(source),
                };
                tracing::debug!(container = self.id().raw(), unit = name, error = %err, "unit construction failed");
                *self.inner.sticky_error.borrow_mut() = Some(err.clone());

                Err(err)
            }
        }
    }

    /// Register a cleanup to run when this container is disposed.
    ///
    /// Only valid while this container is constructing one of its units.
    pub fn register_cleanup<F>(&self, cleanup: F) -> Result<(), ContainerError>
    where
        F: FnOnce() + 'static,
    {
        match resolving::current() {
            Some(current) if current == *self => {
                self.inner.cleanups.borrow_mut().push(Box::new(cleanup));
                Ok(())
            }
            _ => Err(ContainerError::CleanupOutsideResolution),
        }
    }

    /// Mark the container disposed and run every registered cleanup once.
    ///
    /// A panicking cleanup does not stop the others. The first panic is
    /// resumed once teardown has finished. Disposing again does nothing.
    /// Ancestors are not affected.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }

        let cleanups = std::mem::take(&mut *self.inner.cleanups.borrow_mut());
        let count = cleanups.len();
        let mut first_panic = None;
        for cleanup in cleanups {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(cleanup)) {
                tracing::warn!(container = self.id().raw(), "cleanup panicked");
                first_panic.get_or_insert(payload);
            }
        }

        let entries = std::mem::take(&mut *self.inner.entries.borrow_mut());
        drop(entries);
        let contexts = std::mem::take(&mut *self.inner.contexts.borrow_mut());
        drop(contexts);

        tracing::debug!(container = self.id().raw(), cleanups = count, "container disposed");
        debug::emit_unit_unmounted(self.id());

        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// The construction error this container keeps returning, if any.
    pub fn sticky_error(&self) -> Option<ContainerError> {
        self.inner.sticky_error.borrow().clone()
    }

    /// Number of cleanups waiting for disposal.
    pub fn cleanup_count(&self) -> usize {
        self.inner.cleanups.borrow().len()
    }
}

/// Marks a unit failed when its constructor unwinds instead of returning.
struct PendingConstruction<'a> {
    container: &'a ScopeContainer,
    key: TypeId,
    name: &'static str,
    finished: bool,
}

impl Drop for PendingConstruction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let inner = &self.container.inner;
        if let Ok(mut entries) = inner.entries.try_borrow_mut() {
            if let Some(registration) = entries.get_mut(&self.key) {
                registration.entry = Entry::Failed;
            }
        }

        let err = ContainerError::Construction {
            unit: self.name,
            source: Arc::new(ConstructorPanicked),
        };
        if let Ok(mut sticky) = inner.sticky_error.try_borrow_mut() {
            sticky.get_or_insert(err);
        }

        tracing::warn!(
            container = self.container.id().raw(),
            unit = self.name,
            "unit constructor panicked"
        );
    }
}

fn downcast<U: 'static>(value: Rc<dyn Any>, name: &'static str) -> Result<Rc<U>, ContainerError> {
    // Entries are keyed by `TypeId::of::<U>()`, so this cannot mismatch.
    value
        .downcast::<U>()
        .map_err(|_| ContainerError::NotProvided { unit: name })
}

impl PartialEq for ScopeContainer {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ScopeContainer {}

impl fmt::Debug for ScopeContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeContainer")
            .field("id", &self.id())
            .field("parent", &self.parent().map(ScopeContainer::id))
            .field(
                "units",
                &self
                    .inner
                    .entries
                    .borrow()
                    .values()
                    .map(|registration| registration.name)
                    .collect::<Vec<_>>(),
            )
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
