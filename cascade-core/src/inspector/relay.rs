//! Relay from debug hooks to an event channel.

use std::rc::Rc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::event::{describe, DebugEnvelope, DebugEvent, ObserverInfo, SourceLocation};
use crate::config::InspectorConfig;
use crate::error::InspectorError;
use crate::reactive::debug::{self, DebugHooks, WriteEvent, WriteKind};

struct Relay {
    config: InspectorConfig,
    sender: UnboundedSender<DebugEnvelope>,
}

impl Relay {
    fn send(&self, event: DebugEvent) -> Result<(), InspectorError> {
        self.sender
            .send(DebugEnvelope::new(self.config.source.clone(), event))
            .map_err(|_| InspectorError::ChannelClosed)
    }

    /// Send from inside a hook, where there is no caller to report to.
    fn forward(&self, event: DebugEvent) {
        if let Err(err) = self.send(event) {
            tracing::trace!(error = %err, "dropping debug event");
        }
    }

    fn write_event(&self, event: &WriteEvent<'_>) -> DebugEvent {
        let value = if self.config.include_values {
            describe(event.value, event.type_name, self.config.max_value_len)
        } else {
            serde_json::Value::Null
        };
        let observers = event
            .notifier
            .observers()
            .into_iter()
            .map(|(scope, kind)| ObserverInfo {
                scope: scope.raw(),
                kind,
            })
            .collect();
        let target = SourceLocation::from(event.notifier.created_at());

        match event.kind {
            WriteKind::User => DebugEvent::SignalUpdated {
                signal: event.notifier.id().raw(),
                value,
                source: SourceLocation::from(event.location),
                target,
                observers,
            },
            WriteKind::DerivedSettle => DebugEvent::DerivedUpdated {
                derived: event.notifier.id().raw(),
                value,
                target,
                observers,
            },
        }
    }
}

/// Forwards runtime activity on this thread to a channel as [`DebugEnvelope`]s.
///
/// Installing replaces the thread's debug hooks; dropping the inspector puts
/// the previous hooks back.
///
/// ```rust
/// use cascade_core::config::InspectorConfig;
/// use cascade_core::inspector::{DebugEvent, Inspector};
/// use cascade_core::reactive::Signal;
///
/// let (inspector, mut events) = Inspector::install(InspectorConfig::default());
/// assert_eq!(events.try_recv().unwrap().event, DebugEvent::Connected);
///
/// Signal::new(1).set(2);
/// let update = events.try_recv().unwrap();
/// assert!(matches!(update.event, DebugEvent::SignalUpdated { .. }));
///
/// inspector.uninstall();
/// ```
pub struct Inspector {
    relay: Rc<Relay>,
    previous: Option<DebugHooks>,
}

impl Inspector {
    /// Install the relay hooks and announce the connection.
    pub fn install(config: InspectorConfig) -> (Self, UnboundedReceiver<DebugEnvelope>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let relay = Rc::new(Relay { config, sender });

        let hooks = DebugHooks::new()
            .on_write({
                let relay = relay.clone();
                move |event| relay.forward(relay.write_event(event))
            })
            .on_effect_run({
                let relay = relay.clone();
                move |event| {
                    relay.forward(DebugEvent::EffectRan {
                        effect: event.scope.raw(),
                        run: event.run_count,
                        target: SourceLocation::from(event.created_at),
                    })
                }
            })
            .on_unit_mounted({
                let relay = relay.clone();
                move |event| {
                    relay.forward(DebugEvent::UnitMounted {
                        container: event.container.raw(),
                        parent: event.parent.map(|parent| parent.raw()),
                        unit: event.unit.to_string(),
                    })
                }
            })
            .on_unit_unmounted({
                let relay = relay.clone();
                move |container| {
                    relay.forward(DebugEvent::UnitUnmounted {
                        container: container.raw(),
                    })
                }
            });

        let previous = debug::install_hooks(hooks);
        relay.forward(DebugEvent::Connected);
        tracing::debug!(source = %relay.config.source, "inspector installed");

        (
            Self {
                relay,
                previous: Some(previous),
            },
            receiver,
        )
    }

    pub fn config(&self) -> &InspectorConfig {
        &self.relay.config
    }

    /// Send an event of the host's own, such as a reconnect announcement.
    pub fn emit(&self, event: DebugEvent) -> Result<(), InspectorError> {
        self.relay.send(event)
    }

    /// Whether the receiving end is still alive.
    pub fn is_connected(&self) -> bool {
        !self.relay.sender.is_closed()
    }

    /// Restore the hooks that were installed before this inspector.
    ///
    /// Dropping the inspector does the same.
    pub fn uninstall(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if let Some(previous) = self.previous.take() {
            debug::install_hooks(previous);
            tracing::debug!(source = %self.relay.config.source, "inspector uninstalled");
        }
    }
}

impl Drop for Inspector {
    fn drop(&mut self) {
        self.restore();
    }
}
