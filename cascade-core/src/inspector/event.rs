//! Debug event wire format.
//!
//! Events are adjacently tagged: `{"type": "signal_updated", "data": {...}}`.
//! Unit variants carry no `data` field.

use std::any::Any;
use std::panic::Location;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InspectorError;
use crate::reactive::ScopeKind;

/// A position in the host's source code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl From<&Location<'_>> for SourceLocation {
    fn from(location: &Location<'_>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
        }
    }
}

/// One scope observing an updated signal or memo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverInfo {
    pub scope: u64,
    pub kind: ScopeKind,
}

/// Events relayed to the inspector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DebugEvent {
    /// Sent once when the relay is installed.
    Connected,

    UnitMounted {
        container: u64,
        parent: Option<u64>,
        unit: String,
    },

    UnitUnmounted {
        container: u64,
    },

    SignalUpdated {
        signal: u64,
        value: Value,
        /// Where the write happened.
        source: SourceLocation,
        /// Where the signal was created.
        target: SourceLocation,
        observers: Vec<ObserverInfo>,
    },

    DerivedUpdated {
        derived: u64,
        value: Value,
        target: SourceLocation,
        observers: Vec<ObserverInfo>,
    },

    EffectRan {
        effect: u64,
        run: usize,
        target: SourceLocation,
    },
}

/// An event tagged with the relay's source, as sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugEnvelope {
    pub source: String,
    pub event: DebugEvent,
}

impl DebugEnvelope {
    pub fn new(source: impl Into<String>, event: DebugEvent) -> Self {
        Self {
            source: source.into(),
            event,
        }
    }

    pub fn to_json(&self) -> Result<String, InspectorError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, InspectorError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode as MessagePack with named fields.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, InspectorError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }
}

/// Render a written value for the inspector.
///
/// Primitives and strings are sent as themselves; anything else is sent as
/// its type name. Strings longer than `max_len` characters are truncated.
pub fn describe(value: &dyn Any, type_name: &str, max_len: usize) -> Value {
    macro_rules! numeric {
        ($($ty:ty),*) => {
            $(
                if let Some(number) = value.downcast_ref::<$ty>() {
                    return Value::from(*number);
                }
            )*
        };
    }

    numeric!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

    if let Some(number) = value.downcast_ref::<usize>() {
        return Value::from(*number as u64);
    }
    if let Some(number) = value.downcast_ref::<isize>() {
        return Value::from(*number as i64);
    }
    if let Some(flag) = value.downcast_ref::<bool>() {
        return Value::Bool(*flag);
    }
    if let Some(text) = value.downcast_ref::<String>() {
        return Value::String(truncate(text, max_len));
    }
    if let Some(text) = value.downcast_ref::<&'static str>() {
        return Value::String(truncate(text, max_len));
    }

    Value::String(truncate(&format!("<{type_name}>"), max_len))
}

fn truncate(text: &str, max_len: usize) -> String {
    match text.char_indices().nth(max_len) {
        Some((index, _)) => format!("{}…", &text[..index]),
        None => text.to_string(),
    }
}
