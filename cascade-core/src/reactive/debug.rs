//! Debug Hooks
//!
//! A per-thread table of optional callbacks invoked on reads, writes, effect
//! runs and unit (un)mounting. The inspector installs these to observe the
//! runtime; with no hooks installed nothing happens.

use std::any::Any;
use std::cell::RefCell;
use std::panic::Location;
use std::rc::Rc;

use super::scope::{Notifier, TrackingScope};
use super::subscriber::ScopeId;
use crate::container::ContainerId;

/// Who produced a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// A user call to `set`/`update`, or an async settlement.
    User,
    /// A memo storing a freshly computed value.
    DerivedSettle,
}

/// A value was written to a signal or settled in a memo.
pub struct WriteEvent<'a> {
    pub notifier: &'a Notifier,
    pub value: &'a dyn Any,
    pub type_name: &'static str,
    pub kind: WriteKind,
    /// Where the write happened.
    pub location: &'static Location<'static>,
}

/// An effect finished a run.
#[derive(Debug, Clone, Copy)]
pub struct EffectRunEvent {
    pub scope: ScopeId,
    pub run_count: usize,
    pub created_at: &'static Location<'static>,
}

/// A container finished constructing a unit.
#[derive(Debug, Clone, Copy)]
pub struct UnitMountedEvent {
    pub container: ContainerId,
    pub parent: Option<ContainerId>,
    pub unit: &'static str,
}

type ReadHook = Rc<dyn Fn(&TrackingScope, &Notifier)>;
type WriteHook = Rc<dyn Fn(&WriteEvent<'_>)>;
type EffectRunHook = Rc<dyn Fn(&EffectRunEvent)>;
type UnitMountedHook = Rc<dyn Fn(&UnitMountedEvent)>;
type UnitUnmountedHook = Rc<dyn Fn(ContainerId)>;

/// The hook table. Every entry is optional.
#[derive(Clone, Default)]
pub struct DebugHooks {
    pub on_read: Option<ReadHook>,
    pub on_write: Option<WriteHook>,
    pub on_effect_run: Option<EffectRunHook>,
    pub on_unit_mounted: Option<UnitMountedHook>,
    pub on_unit_unmounted: Option<UnitUnmountedHook>,
}

impl DebugHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_read(mut self, hook: impl Fn(&TrackingScope, &Notifier) + 'static) -> Self {
        self.on_read = Some(Rc::new(hook));
        self
    }

    pub fn on_write(mut self, hook: impl Fn(&WriteEvent<'_>) + 'static) -> Self {
        self.on_write = Some(Rc::new(hook));
        self
    }

    pub fn on_effect_run(mut self, hook: impl Fn(&EffectRunEvent) + 'static) -> Self {
        self.on_effect_run = Some(Rc::new(hook));
        self
    }

    pub fn on_unit_mounted(mut self, hook: impl Fn(&UnitMountedEvent) + 'static) -> Self {
        self.on_unit_mounted = Some(Rc::new(hook));
        self
    }

    pub fn on_unit_unmounted(mut self, hook: impl Fn(ContainerId) + 'static) -> Self {
        self.on_unit_unmounted = Some(Rc::new(hook));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.on_read.is_none()
            && self.on_write.is_none()
            && self.on_effect_run.is_none()
            && self.on_unit_mounted.is_none()
            && self.on_unit_unmounted.is_none()
    }
}

thread_local! {
    static HOOKS: RefCell<DebugHooks> = RefCell::new(DebugHooks::default());
}

/// Install a hook table, returning the previous one.
pub fn install_hooks(hooks: DebugHooks) -> DebugHooks {
    HOOKS.with(|table| std::mem::replace(&mut *table.borrow_mut(), hooks))
}

/// Remove all hooks.
pub fn clear_hooks() -> DebugHooks {
    install_hooks(DebugHooks::default())
}

// Hooks are cloned out of the table before being called, so a hook may
// itself install or clear hooks.

pub(crate) fn emit_read(scope: &TrackingScope, notifier: &Notifier) {
    let hook = HOOKS.with(|table| table.borrow().on_read.clone());
    if let Some(hook) = hook {
        hook(scope, notifier);
    }
}

pub(crate) fn emit_write(event: &WriteEvent<'_>) {
    let hook = HOOKS.with(|table| table.borrow().on_write.clone());
    if let Some(hook) = hook {
        hook(event);
    }
}

pub(crate) fn emit_effect_run(event: &EffectRunEvent) {
    let hook = HOOKS.with(|table| table.borrow().on_effect_run.clone());
    if let Some(hook) = hook {
        hook(event);
    }
}

pub(crate) fn emit_unit_mounted(event: &UnitMountedEvent) {
    let hook = HOOKS.with(|table| table.borrow().on_unit_mounted.clone());
    if let Some(hook) = hook {
        hook(event);
    }
}

pub(crate) fn emit_unit_unmounted(container: ContainerId) {
    let hook = HOOKS.with(|table| table.borrow().on_unit_unmounted.clone());
    if let Some(hook) = hook {
        hook(container);
    }
}
