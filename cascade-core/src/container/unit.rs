//! Units: the state factories a scope container constructs.

use crate::error::UnitError;

/// A piece of scoped state with a known constructor.
///
/// The implementing type is the unit's identity: a container resolves each
/// unit type at most once. Units that need props are provided with
/// [`ScopeContainer::provide_with`](super::ScopeContainer::provide_with)
/// instead.
///
/// ```rust
/// use cascade_core::container::{cleanup, ScopeContainer, Unit};
/// use cascade_core::error::UnitError;
/// use cascade_core::reactive::Signal;
///
/// struct Theme {
///     dark: Signal<bool>,
/// }
///
/// impl Unit for Theme {
///     fn construct() -> Result<Self, UnitError> {
///         cleanup(|| println!("theme disposed"))?;
///         Ok(Theme { dark: Signal::new(false) })
///     }
/// }
///
/// let root = ScopeContainer::root();
/// root.provide::<Theme>();
/// let theme = root.resolve::<Theme>().unwrap();
/// theme.dark.set(true);
/// root.dispose();
/// ```
pub trait Unit: Sized + 'static {
    /// Build the unit. Runs at most once per providing container, with that
    /// container marked as resolving.
    fn construct() -> Result<Self, UnitError>;
}

/// Last path segment of a type name, keeping generic arguments intact.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(index) => &full[index + 2..],
        None => full,
    }
}
