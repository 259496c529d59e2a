//! State reconciler: folds inbound status messages into the registry.
//!
//! Every failure is contained here: a bad topic, an undecodable payload or
//! a status for a device of another kind is logged and dropped, and the
//! registry is left untouched.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use homesync_domain::device::DeviceKind;
use homesync_domain::error::{MalformedPayload, MalformedTopic};
use homesync_domain::status::StatusMessage;
use homesync_domain::time;
use homesync_domain::topic::TopicNamespace;

use crate::ports::InboundMessage;
use crate::registry::DeviceRegistry;

/// Why a status message was dropped.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Topic(#[from] MalformedTopic),

    #[error(transparent)]
    Payload(#[from] MalformedPayload),

    #[error("status for {device_id} names type {topic_kind:?} but the device is a {registered}")]
    KindMismatch {
        device_id: String,
        topic_kind: String,
        registered: DeviceKind,
    },
}

/// Result of handling one inbound message.
#[derive(Debug)]
pub enum Reconciled {
    /// The registry changed and subscribers were notified.
    Updated,
    /// The message matched the stored state.
    Unchanged,
    /// No device with that id is registered.
    UnknownDevice,
    Dropped(ReconcileError),
}

/// Applies status messages to a [`DeviceRegistry`].
pub struct StateReconciler {
    registry: Arc<DeviceRegistry>,
    namespace: TopicNamespace,
}

impl StateReconciler {
    #[must_use]
    pub fn new(registry: Arc<DeviceRegistry>, namespace: TopicNamespace) -> Self {
        Self {
            registry,
            namespace,
        }
    }

    /// Handle one inbound message. Never fails; drops are logged.
    pub fn apply(&self, message: &InboundMessage) -> Reconciled {
        match self.try_apply(message) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(topic = %message.topic, error = %err, "dropping status message");
                Reconciled::Dropped(err)
            }
        }
    }

    fn try_apply(&self, message: &InboundMessage) -> Result<Reconciled, ReconcileError> {
        let address = self.namespace.parse_status_topic(&message.topic)?;
        let mut patch = StatusMessage::from_slice(&message.payload)?.to_patch()?;

        let Some(device) = self.registry.get(&address.device_id) else {
            tracing::debug!(
                device_id = %address.device_id,
                device_type = %address.device_type,
                "status for unregistered device"
            );
            return Ok(Reconciled::UnknownDevice);
        };
        if device.kind().as_str() != address.device_type {
            return Err(ReconcileError::KindMismatch {
                device_id: address.device_id,
                topic_kind: address.device_type,
                registered: device.kind(),
            });
        }

        if patch.last_seen.is_none() {
            patch.last_seen = Some(time::now());
        }

        if self.registry.upsert(&address.device_id, &patch) {
            Ok(Reconciled::Updated)
        } else {
            Ok(Reconciled::Unchanged)
        }
    }

    /// Apply messages from `messages` until the bus closes.
    pub async fn run(self, mut messages: broadcast::Receiver<InboundMessage>) {
        loop {
            match messages.recv().await {
                Ok(message) => {
                    self.apply(&message);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "reconciler lagged behind; status messages skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("message bus closed; reconciler stopping");
                    break;
                }
            }
        }
    }

    /// Run the reconciler on its own task.
    pub fn spawn(self, messages: broadcast::Receiver<InboundMessage>) -> JoinHandle<()> {
        tokio::spawn(self.run(messages))
    }
}
