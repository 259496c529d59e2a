//! # homesync-adapter-virtual
//!
//! Virtual/demo broker that hosts simulated devices in-process, so the whole
//! synchronization loop can run without a network.
//!
//! ## Behaviour
//!
//! | Device | Commands | Reports |
//! |--------|----------|---------|
//! | light | `set_state` (on → brightness 80, off → 0), `set_brightness` | `status`, `brightness` |
//! | fan | `set_speed` 0–5, `set_state` | `state` (`running`/`off`), `speed` |
//! | ac | `set_state`, `set_temperature` 18–30 | `status`, `temperature` |
//! | lock | `set_locked` | `locked` |
//! | camera | `set_state` | `status` |
//!
//! Every accepted command publishes the device's status (retained, as the
//! field devices do), and a new subscription immediately receives the
//! retained status of every device it matches. Devices seeded as offline
//! are not simulated.
//!
//! ## Dependency rule
//!
//! Depends on `homesync-app` (port traits) and `homesync-domain` only.

mod devices;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use homesync_app::ports::{BrokerLink, InboundMessage, LinkError, LinkEvent, QoS};
use homesync_domain::command::Command;
use homesync_domain::device::Device;
use homesync_domain::fleet::default_fleet;
use homesync_domain::status::StatusMessage;
use homesync_domain::topic::{TopicNamespace, matches_filter};

pub use devices::VirtualDevice;

/// Buffered link events per connection.
const EVENT_CAPACITY: usize = 64;

struct Connection {
    events: mpsc::Sender<LinkEvent>,
    filters: Vec<String>,
}

/// In-process broker with a simulated device fleet.
pub struct VirtualBroker {
    namespace: TopicNamespace,
    devices: Mutex<Vec<VirtualDevice>>,
    connection: Mutex<Option<Connection>>,
    refuse_connections: AtomicBool,
}

impl Default for VirtualBroker {
    fn default() -> Self {
        Self::new(TopicNamespace::default(), &default_fleet())
    }
}

impl VirtualBroker {
    /// Simulate every device of `fleet` that is not offline.
    #[must_use]
    pub fn new(namespace: TopicNamespace, fleet: &[Device]) -> Self {
        let devices = fleet
            .iter()
            .filter(|device| device.status.is_online())
            .map(VirtualDevice::from_device)
            .collect();
        Self {
            namespace,
            devices: Mutex::new(devices),
            connection: Mutex::new(None),
            refuse_connections: AtomicBool::new(false),
        }
    }

    /// Make subsequent [`open`](BrokerLink::open) calls fail.
    pub fn set_refuse_connections(&self, refuse: bool) {
        self.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.lock_connection().is_some()
    }

    /// Number of devices being simulated.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.lock_devices().len()
    }

    /// Current report of a simulated device.
    #[must_use]
    pub fn device_status(&self, device_id: &str) -> Option<StatusMessage> {
        self.lock_devices()
            .iter()
            .find(|device| device.id() == device_id)
            .map(VirtualDevice::report)
    }

    /// Sever the current connection as a network failure would.
    pub async fn drop_connection(&self, code: i32, reason: &str) {
        let Some(connection) = self.lock_connection().take() else {
            return;
        };
        tracing::info!(code, reason, "virtual broker dropping connection");
        let _ = connection
            .events
            .send(LinkEvent::Lost {
                code,
                reason: reason.to_string(),
            })
            .await;
    }

    /// Deliver `messages` to the connection for every subscription they match.
    async fn deliver(&self, messages: Vec<InboundMessage>) {
        let (events, matching): (_, Vec<InboundMessage>) = {
            let guard = self.lock_connection();
            let Some(connection) = guard.as_ref() else {
                return;
            };
            let matching = messages
                .into_iter()
                .filter(|message| {
                    connection
                        .filters
                        .iter()
                        .any(|filter| matches_filter(filter, &message.topic))
                })
                .collect();
            (connection.events.clone(), matching)
        };
        for message in matching {
            if events.send(LinkEvent::Message(message)).await.is_err() {
                tracing::debug!("virtual broker connection receiver dropped");
                return;
            }
        }
    }

    fn status_message(&self, device: &VirtualDevice) -> InboundMessage {
        InboundMessage::new(
            self.namespace
                .status_topic(device.kind().as_str(), device.id()),
            device.report().to_payload(),
        )
    }

    /// Route a command to its device, returning the status it publishes.
    fn execute(&self, topic: &str, payload: &[u8]) -> Option<InboundMessage> {
        let address = self.namespace.parse_command_topic(topic).ok()?;
        let command: Command = match serde_json::from_slice(payload) {
            Ok(command) => command,
            Err(err) => {
                tracing::debug!(topic, error = %err, "virtual device ignored undecodable command");
                return None;
            }
        };

        let mut devices = self.lock_devices();
        let device = devices.iter_mut().find(|device| {
            device.id() == address.device_id && device.kind().as_str() == address.device_type
        })?;
        if !device.handle(&command) {
            tracing::debug!(topic, action = %command.action, "virtual device ignored command");
            return None;
        }
        tracing::debug!(topic, action = %command.action, "virtual device applied command");
        Some(self.status_message(device))
    }

    fn lock_devices(&self) -> std::sync::MutexGuard<'_, Vec<VirtualDevice>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_connection(&self) -> std::sync::MutexGuard<'_, Option<Connection>> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl BrokerLink for VirtualBroker {
    async fn open(&self) -> Result<mpsc::Receiver<LinkEvent>, LinkError> {
        if self.refuse_connections.load(Ordering::SeqCst) {
            return Err(LinkError::Refused(
                "virtual broker is refusing connections".to_string(),
            ));
        }
        let (events, rx) = mpsc::channel(EVENT_CAPACITY);
        *self.lock_connection() = Some(Connection {
            events,
            filters: Vec::new(),
        });
        tracing::debug!("virtual broker accepted connection");
        Ok(rx)
    }

    async fn subscribe(&self, filter: &str, _qos: QoS) -> Result<(), LinkError> {
        {
            let mut guard = self.lock_connection();
            let connection = guard.as_mut().ok_or(LinkError::NotOpen)?;
            connection.filters.push(filter.to_string());
        }

        let retained: Vec<InboundMessage> = self
            .lock_devices()
            .iter()
            .map(|device| self.status_message(device))
            .filter(|message| matches_filter(filter, &message.topic))
            .collect();
        self.deliver(retained).await;
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, _qos: QoS) -> Result<(), LinkError> {
        if !self.is_open() {
            return Err(LinkError::NotOpen);
        }
        let status = self.execute(topic, &payload);
        let mut outgoing = vec![InboundMessage::new(topic, payload)];
        outgoing.extend(status);
        self.deliver(outgoing).await;
        Ok(())
    }

    async fn close(&self) -> Result<(), LinkError> {
        self.lock_connection().take();
        Ok(())
    }
}
