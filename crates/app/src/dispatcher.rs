//! Command dispatcher: validates user intent and sends it to devices.

use std::sync::Arc;

use homesync_domain::command::{Action, Command, CommandValue};
use homesync_domain::device::{DeviceKind, DeviceStatus};
use homesync_domain::error::{NotFoundError, ValidationError};
use homesync_domain::topic::TopicNamespace;

use crate::ports::{PublishError, QoS, Transport};
use crate::registry::DeviceRegistry;

/// What happened to a valid command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to the broker.
    Sent,
    /// Dropped because the session is not connected.
    NotConnected,
    /// Dropped because the broker link rejected the publish.
    LinkFailed,
}

/// Errors from [`CommandDispatcher::toggle`].
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("device {0} is offline")]
    Offline(String),
}

/// Sends validated commands over a [`Transport`].
pub struct CommandDispatcher<T> {
    transport: T,
    registry: Arc<DeviceRegistry>,
    namespace: TopicNamespace,
    qos: QoS,
    optimistic: bool,
}

impl<T: Transport> CommandDispatcher<T> {
    /// Create a dispatcher with optimistic updates enabled.
    #[must_use]
    pub fn new(transport: T, registry: Arc<DeviceRegistry>, namespace: TopicNamespace) -> Self {
        Self {
            transport,
            registry,
            namespace,
            qos: QoS::AtLeastOnce,
            optimistic: true,
        }
    }

    /// Whether a sent command is reflected in the registry before the device
    /// confirms it.
    #[must_use]
    pub fn with_optimistic_updates(mut self, enabled: bool) -> Self {
        self.optimistic = enabled;
        self
    }

    #[must_use]
    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    /// Validate and publish `action`/`value` for the device at
    /// `{root}/{kind}/{device_id}/command`.
    ///
    /// A valid command issued while disconnected is dropped with a warning
    /// and reported as [`Dispatch::NotConnected`]; nothing is queued.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the action is not supported by
    /// `kind`, the value is out of range or of the wrong type, or the id
    /// belongs to a registered device of another kind. Nothing is sent.
    #[tracing::instrument(skip(self, value), fields(kind = %kind, action = %action))]
    pub async fn send_command(
        &self,
        device_id: &str,
        kind: DeviceKind,
        action: Action,
        value: impl Into<CommandValue>,
    ) -> Result<Dispatch, ValidationError> {
        if device_id.is_empty() {
            return Err(ValidationError::EmptyDeviceId);
        }
        let command = Command::new(action, value);
        let patch = command.resolve(kind)?;

        let registered = self.registry.get(device_id);
        if let Some(device) = &registered
            && device.kind() != kind
        {
            return Err(ValidationError::KindMismatch {
                device_id: device_id.to_string(),
                expected: kind,
                actual: device.kind(),
            });
        }

        if !self.transport.state().is_connected() {
            tracing::warn!("not connected; command dropped");
            return Ok(Dispatch::NotConnected);
        }

        let topic = self.namespace.command_topic(kind.as_str(), device_id);
        match self
            .transport
            .publish(&topic, command.to_payload(), self.qos)
            .await
        {
            Ok(()) => {}
            Err(PublishError::NotConnected) => return Ok(Dispatch::NotConnected),
            Err(PublishError::Link(_)) => return Ok(Dispatch::LinkFailed),
        }
        tracing::info!(%topic, "command sent");

        if self.optimistic && registered.is_some() {
            self.registry.upsert(device_id, &patch);
        }
        Ok(Dispatch::Sent)
    }

    /// Flip a registered device between on and off.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::NotFound`] for unknown ids and
    /// [`CommandError::Offline`] for devices currently offline.
    pub async fn toggle(&self, device_id: &str) -> Result<Dispatch, CommandError> {
        let device = self.registry.get(device_id).ok_or_else(|| NotFoundError {
            entity: "device",
            id: device_id.to_string(),
        })?;
        if device.status == DeviceStatus::Offline {
            return Err(CommandError::Offline(device_id.to_string()));
        }

        let next = if device.status == DeviceStatus::On {
            DeviceStatus::Off
        } else {
            DeviceStatus::On
        };
        self.send_command(device_id, device.kind(), Action::SetState, next)
            .await
            .map_err(CommandError::from)
    }
}
