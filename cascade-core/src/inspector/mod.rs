//! Inspector Protocol
//!
//! Turns the runtime's debug hooks into a stream of [`DebugEvent`]s that a
//! browser extension or any other external tool can consume. Each event is
//! wrapped in a [`DebugEnvelope`] carrying the configured source tag and can
//! be encoded as JSON or MessagePack.
//!
//! The [`Inspector`] only produces events into a channel. Getting them across
//! a process or window boundary is up to the host.

mod event;
mod relay;

pub use event::{describe, DebugEnvelope, DebugEvent, ObserverInfo, SourceLocation};
pub use relay::Inspector;
