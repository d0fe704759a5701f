//! Scoped Units
//!
//! Units are factories for shared reactive state. A [`ScopeContainer`] is
//! created per consumer scope (a component subtree, a test), constructs each
//! unit the first time it is resolved, caches it, and hands out the same
//! instance to every later request. Containers form a tree: a child that
//! does not provide a unit asks its parent.
//!
//! While a unit is being constructed its container is the *resolving*
//! container. Code running in the constructor can reach it through the free
//! functions in this module:
//!
//! - [`use_unit`] resolves another unit against it.
//! - [`cleanup`] registers teardown to run when it is disposed.
//! - [`use_context`] looks up a context value provided by it or an ancestor,
//!   and [`provide_context`] adds one for its descendants.
//! - [`derived`](crate::reactive::derived) and
//!   [`effect`](crate::reactive::effect) create memos and effects owned by it.
//!
//! ```rust
//! use cascade_core::container::{cleanup, use_unit, ScopeContainer, Unit};
//! use cascade_core::error::UnitError;
//! use cascade_core::reactive::{derived, Memo, Signal};
//!
//! struct Count(Signal<i32>);
//!
//! impl Unit for Count {
//!     fn construct() -> Result<Self, UnitError> {
//!         Ok(Count(Signal::new(1)))
//!     }
//! }
//!
//! struct Doubled(Memo<i32>);
//!
//! impl Unit for Doubled {
//!     fn construct() -> Result<Self, UnitError> {
//!         let count = use_unit::<Count>()?;
//!         cleanup(|| tracing::debug!("doubled disposed"))?;
//!         Ok(Doubled(derived(move || count.0.get() * 2)?))
//!     }
//! }
//!
//! let root = ScopeContainer::root();
//! root.provide::<Count>().provide::<Doubled>();
//!
//! let doubled = root.resolve::<Doubled>().unwrap();
//! assert_eq!(doubled.0.get(), 2);
//! root.dispose();
//! ```

mod resolving;
mod scope_container;
mod unit;

use std::rc::Rc;

pub use scope_container::{ContainerId, ScopeContainer};
pub use unit::Unit;

use crate::error::ContainerError;

/// Resolve `U` against the container currently constructing a unit.
pub fn use_unit<U: 'static>() -> Result<Rc<U>, ContainerError> {
    let container = ScopeContainer::resolving().ok_or(ContainerError::OutsideResolution {
        operation: "use_unit",
    })?;
    container.resolve::<U>()
}

/// Register `f` to run when the container currently constructing a unit is
/// disposed.
pub fn cleanup<F>(f: F) -> Result<(), ContainerError>
where
    F: FnOnce() + 'static,
{
    let container = ScopeContainer::resolving().ok_or(ContainerError::OutsideResolution {
        operation: "cleanup",
    })?;
    container.register_cleanup(f)
}

/// Look up the context of type `C` from the container currently constructing
/// a unit, walking towards the root.
pub fn use_context<C: 'static>() -> Result<Rc<C>, ContainerError> {
    let container = ScopeContainer::resolving().ok_or(ContainerError::OutsideResolution {
        operation: "use_context",
    })?;
    container.context::<C>()
}

/// Provide `value` as a context on the container currently constructing a
/// unit.
pub fn provide_context<C: 'static>(value: C) -> Result<(), ContainerError> {
    let container = ScopeContainer::resolving().ok_or(ContainerError::OutsideResolution {
        operation: "provide_context",
    })?;
    container.provide_context(value);
    Ok(())
}
