//! Transport session: the single broker connection shared by the process.
//!
//! The session owns a [`BrokerLink`], serializes connection attempts, keeps
//! the status subscription in place and fans inbound messages out through a
//! [`MessageBus`]. Connection state is published on a `watch` channel so
//! any task can observe transitions.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use homesync_domain::topic::TopicNamespace;

use crate::event_bus::MessageBus;
use crate::ports::{
    BrokerLink, ConnectionState, InboundMessage, LinkEvent, PublishError, QoS, Transport,
};

/// How long [`TransportSession::connect`] waits for the broker handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-observer buffer of inbound messages.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub namespace: TopicNamespace,
    pub connect_timeout: Duration,
    pub subscribe_qos: QoS,
    pub bus_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            namespace: TopicNamespace::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            subscribe_qos: QoS::AtLeastOnce,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

/// One logical connection to the broker.
pub struct TransportSession<L> {
    link: L,
    config: SessionConfig,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    bus: MessageBus,
    connect_lock: AsyncMutex<()>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl<L: BrokerLink> TransportSession<L> {
    #[must_use]
    pub fn new(link: L, config: SessionConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let bus = MessageBus::new(config.bus_capacity);
        Self {
            link,
            config,
            state_tx: Arc::new(state_tx),
            bus,
            connect_lock: AsyncMutex::new(()),
            pump: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Observe connection state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    #[must_use]
    pub fn namespace(&self) -> &TopicNamespace {
        &self.config.namespace
    }

    /// Open the broker connection and subscribe to every device status topic.
    ///
    /// Returns `true` once connected and subscribed. Calling it while already
    /// connected returns `true` without opening a second connection, and
    /// concurrent callers wait for the attempt in flight. The handshake and
    /// the subscription share one `connect_timeout` deadline. Failures,
    /// timeouts and a loss reported while subscribing are logged and return
    /// `false`.
    pub async fn connect(&self) -> bool {
        let _guard = self.connect_lock.lock().await;

        if self.state().is_connected() {
            tracing::debug!("already connected to broker");
            return true;
        }

        self.state_tx.send_replace(ConnectionState::Connecting);
        let filter = self.config.namespace.status_subscription();
        let deadline = Instant::now() + self.config.connect_timeout;
        tracing::info!(%filter, "connecting to broker");

        let events = match tokio::time::timeout_at(deadline, self.link.open()).await {
            Ok(Ok(events)) => events,
            Ok(Err(err)) => {
                tracing::error!(error = %err, "broker connection failed");
                self.state_tx.send_replace(ConnectionState::Disconnected);
                return false;
            }
            Err(_) => {
                self.log_timeout("broker connection timed out");
                self.abandon().await;
                return false;
            }
        };

        // The broker may deliver retained status before the SUBACK, so the
        // link must be drained while subscribing.
        self.spawn_pump(events);

        let subscribe = self.link.subscribe(&filter, self.config.subscribe_qos);
        match tokio::time::timeout_at(deadline, subscribe).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(error = %err, %filter, "status subscription failed");
                self.abandon().await;
                return false;
            }
            Err(_) => {
                self.log_timeout("status subscription timed out");
                self.abandon().await;
                return false;
            }
        }

        let connected = self.state_tx.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Connected;
                true
            } else {
                false
            }
        });
        if !connected {
            tracing::error!(%filter, "connection lost while subscribing");
            self.abandon().await;
            return false;
        }

        tracing::info!(%filter, "connected to broker");
        true
    }

    fn log_timeout(&self, message: &'static str) {
        tracing::error!(
            timeout_secs = self.config.connect_timeout.as_secs_f64(),
            "{message}"
        );
    }

    /// Tear down a half-open connection.
    async fn abandon(&self) {
        self.stop_pump();
        self.close_link().await;
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }

    /// Close the connection. A no-op when not connected.
    pub async fn disconnect(&self) {
        let _guard = self.connect_lock.lock().await;

        if !self.state().is_connected() {
            tracing::debug!("not connected; nothing to disconnect");
            return;
        }

        self.stop_pump();
        self.close_link().await;
        self.state_tx.send_replace(ConnectionState::Disconnected);
        tracing::info!("disconnected from broker");
    }

    /// Receive every inbound message delivered after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<InboundMessage> {
        self.bus.subscribe()
    }

    /// Run `handler` for every inbound message on its own task.
    ///
    /// Observers are isolated from each other: a handler that panics only
    /// ends its own task.
    pub fn on_message<F>(&self, mut handler: F) -> JoinHandle<()>
    where
        F: FnMut(InboundMessage) + Send + 'static,
    {
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(message) => handler(message),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "message observer lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn spawn_pump(&self, mut events: mpsc::Receiver<LinkEvent>) {
        let state_tx = Arc::clone(&self.state_tx);
        let bus = self.bus.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    LinkEvent::Message(message) => {
                        bus.publish(message);
                    }
                    LinkEvent::Lost { code, reason } => {
                        mark_lost(&state_tx, code, &reason);
                        return;
                    }
                }
            }
            mark_lost(&state_tx, 0, "event stream ended");
        });

        let previous = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn stop_pump(&self) {
        let pump = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pump) = pump {
            pump.abort();
        }
    }

    async fn close_link(&self) {
        if let Err(err) = self.link.close().await {
            tracing::warn!(error = %err, "error while closing broker link");
        }
    }
}

/// Flip a live or pending connection to `Disconnected`.
fn mark_lost(state_tx: &watch::Sender<ConnectionState>, code: i32, reason: &str) {
    let was_connected = state_tx.send_if_modified(|state| {
        if matches!(
            state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            *state = ConnectionState::Disconnected;
            true
        } else {
            false
        }
    });
    if !was_connected {
        return;
    }
    if code == 0 {
        tracing::info!(reason, "broker connection closed");
    } else {
        tracing::error!(code, reason, "broker connection lost");
    }
}

impl<L: BrokerLink> Transport for TransportSession<L> {
    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), PublishError> {
        if !self.state().is_connected() {
            tracing::warn!(topic, "not connected; dropping outbound message");
            return Err(PublishError::NotConnected);
        }
        self.link
            .publish(topic, payload, qos)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, topic, "publish failed");
                PublishError::from(err)
            })
    }
}

impl<L> Drop for TransportSession<L> {
    fn drop(&mut self) {
        if let Some(pump) = self
            .pump
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pump.abort();
        }
    }
}
