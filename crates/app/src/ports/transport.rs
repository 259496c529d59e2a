//! Transport port: the session-level view the command dispatcher needs.

use std::future::Future;
use std::sync::Arc;

use super::broker::{LinkError, QoS};

/// Lifecycle of a broker session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an outbound message was not handed to the broker.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("not connected to the broker")]
    NotConnected,
    #[error(transparent)]
    Link(#[from] LinkError),
}

/// A connected session able to publish messages.
pub trait Transport: Send + Sync {
    fn state(&self) -> ConnectionState;

    /// Publish `payload` on `topic`.
    ///
    /// Must not touch the network when [`state`](Self::state) is not
    /// [`ConnectionState::Connected`]; it returns
    /// [`PublishError::NotConnected`] instead.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
    ) -> impl Future<Output = Result<(), PublishError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn state(&self) -> ConnectionState {
        (**self).state()
    }

    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
    ) -> impl Future<Output = Result<(), PublishError>> + Send {
        (**self).publish(topic, payload, qos)
    }
}
