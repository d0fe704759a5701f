//! Reactive Primitives
//!
//! This module implements the reactive graph: signals, tracking scopes, memos,
//! effects and async signals. These primitives let a UI layer re-render only
//! the parts that read changed data.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. Reading it while a tracking
//! scope is active registers the signal as a dependency of that scope. Writing
//! a different value notifies every scope observing the signal.
//!
//! ## Tracking Scopes
//!
//! A TrackingScope records what was read and written during one pass (a
//! render, a memo computation, an effect run). Subscribing the scope attaches
//! it to everything it read. On notification it detaches from everything,
//! forgets what it tracked, and calls its subscriber once; the subscriber
//! starts the next pass.
//!
//! ## Memos
//!
//! A Memo is a lazily computed, cached value derived from other signals and
//! memos. A change marks it dirty and notifies its observers; the computation
//! runs again on the next read.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs on creation and again,
//! synchronously, whenever a dependency changes.
//!
//! ## Async Signals
//!
//! An AsyncSignal holds the pending/fulfilled/rejected state of the latest
//! asynchronous operation written to it. Settlements of superseded operations
//! are discarded.
//!
//! # Implementation Notes
//!
//! Everything here is single-threaded. Handles are `Rc`-based and the stack of
//! active scopes is thread-local. Propagation is synchronous: when `set`
//! returns, every affected memo has been invalidated and every affected effect
//! has re-run. There is no scheduler and no batching.

mod async_signal;
mod context;
pub mod debug;
mod effect;
mod memo;
mod scope;
mod signal;
mod subscriber;

pub use async_signal::{AsyncSignal, FutureState};
pub use context::ScopeGuard;
pub use debug::{DebugHooks, WriteKind};
pub use effect::{effect, Effect};
pub use memo::{derived, Memo, MemoState};
pub use scope::{Notifier, ScopeKind, TrackingScope};
pub use signal::Signal;
pub use subscriber::{current_snapshot, NotifierId, ScopeId, Subscription};
