//! Error Types
//!
//! Every fallible operation in the crate returns one of the error enums
//! defined here. Container errors are `Clone` so that a sticky construction
//! failure can be handed out again, unchanged, on every later access.

use std::error::Error as StdError;
use std::sync::Arc;

/// Error produced by a unit constructor.
pub type UnitError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors raised by a [`ScopeContainer`](crate::container::ScopeContainer).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContainerError {
    /// A unit constructor failed. The container keeps this error and returns
    /// it on every later `resolve` until the container is discarded.
    #[error("could not construct unit `{unit}`: {source}")]
    Construction {
        unit: &'static str,
        source: Arc<dyn StdError + Send + Sync + 'static>,
    },

    /// No container in the ancestor chain provides the unit.
    #[error("unit `{unit}` is not provided by an ancestor scope")]
    NotProvided { unit: &'static str },

    /// A cleanup was registered while the container was not constructing one
    /// of its own units.
    #[error("cleanup registered outside of unit construction")]
    CleanupOutsideResolution,

    /// An operation that needs a resolving container ran without one.
    #[error("`{operation}` can only run while a unit is being constructed")]
    OutsideResolution { operation: &'static str },

    /// The container was already disposed.
    #[error("scope container has been disposed")]
    Disposed,

    /// A unit asked for itself while it was being constructed.
    #[error("unit `{unit}` depends on itself")]
    Cycle { unit: &'static str },

    /// No container in the ancestor chain provides the context.
    #[error("no provider for context `{context}`")]
    ContextNotProvided { context: &'static str },
}

/// Source of the sticky construction error left by a constructor that
/// panicked instead of returning.
#[derive(Debug, thiserror::Error)]
#[error("unit constructor panicked")]
pub struct ConstructorPanicked;

impl ContainerError {
    /// The original constructor failure, if this is a construction error.
    pub fn construction_source(&self) -> Option<&Arc<dyn StdError + Send + Sync + 'static>> {
        match self {
            ContainerError::Construction { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Returned when unwrapping a [`FutureState`](crate::reactive::FutureState)
/// that is not fulfilled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnwrapError<E> {
    /// The operation has not settled yet. Hosts translate this into their own
    /// suspension mechanism.
    #[error("operation is still pending")]
    Pending,

    /// The operation failed with the given reason.
    #[error("operation was rejected")]
    Rejected(E),
}

impl<E> UnwrapError<E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, UnwrapError::Pending)
    }
}

/// Errors raised by the inspector protocol.
#[derive(Debug, thiserror::Error)]
pub enum InspectorError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to encode event as MessagePack: {0}")]
    MessagePack(#[from] rmp_serde::encode::Error),

    #[error("inspector relay channel is closed")]
    ChannelClosed,

    #[error("invalid inspector configuration: {0}")]
    Config(String),
}
