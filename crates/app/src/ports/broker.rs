//! Broker link port: the raw publish/subscribe connection to a message broker.
//!
//! A link knows nothing about device topics or session state. The
//! [`TransportSession`](crate::session::TransportSession) drives it: it opens
//! the link, subscribes, forwards [`LinkEvent`]s to observers and tracks
//! connection state.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

/// Delivery guarantee requested from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QoS {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

impl QoS {
    /// Numeric MQTT level (0, 1 or 2).
    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }
}

/// A message delivered by the broker on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Something that happened on an open link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Message(InboundMessage),
    /// The connection dropped. `code` is `0` for a clean, requested close.
    Lost { code: i32, reason: String },
}

/// Errors raised by a broker link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("broker refused the connection: {0}")]
    Refused(String),
    #[error("broker link is not open")]
    NotOpen,
    #[error("broker link failure")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Raw connection to a publish/subscribe broker.
pub trait BrokerLink: Send + Sync {
    /// Perform the connection handshake.
    ///
    /// Resolves once the broker has acknowledged the connection. The returned
    /// receiver yields every subsequent [`LinkEvent`] until the link closes.
    fn open(&self) -> impl Future<Output = Result<mpsc::Receiver<LinkEvent>, LinkError>> + Send;

    /// Subscribe to a topic filter (`+` and `#` wildcards allowed).
    fn subscribe(&self, filter: &str, qos: QoS)
    -> impl Future<Output = Result<(), LinkError>> + Send;

    /// Publish a payload (not retained).
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
    ) -> impl Future<Output = Result<(), LinkError>> + Send;

    /// Close the link. Closing a link that is not open is a no-op.
    fn close(&self) -> impl Future<Output = Result<(), LinkError>> + Send;
}

impl<T: BrokerLink> BrokerLink for Arc<T> {
    fn open(&self) -> impl Future<Output = Result<mpsc::Receiver<LinkEvent>, LinkError>> + Send {
        (**self).open()
    }

    fn subscribe(
        &self,
        filter: &str,
        qos: QoS,
    ) -> impl Future<Output = Result<(), LinkError>> + Send {
        (**self).subscribe(filter, qos)
    }

    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
    ) -> impl Future<Output = Result<(), LinkError>> + Send {
        (**self).publish(topic, payload, qos)
    }

    fn close(&self) -> impl Future<Output = Result<(), LinkError>> + Send {
        (**self).close()
    }
}
