use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Outgoing, Packet};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use homesync_app::ports::{BrokerLink, InboundMessage, LinkError, LinkEvent, QoS};

use crate::config::MqttConfig;
use crate::error::MqttError;

/// How long [`RumqttLink::close`] lets the event loop flush the DISCONNECT.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Loss code reported when the network connection fails.
const LOSS_CODE_NETWORK: i32 = 1;

/// [`BrokerLink`] over a `rumqttc` client.
///
/// Every [`open`](BrokerLink::open) builds a fresh client and event loop;
/// the loop is polled by a background task until the connection ends.
pub struct RumqttLink {
    config: MqttConfig,
    client: Mutex<Option<AsyncClient>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl RumqttLink {
    #[must_use]
    pub fn new(config: MqttConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
            driver: Mutex::new(None),
        }
    }

    fn client(&self) -> Result<AsyncClient, MqttError> {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(MqttError::NotConnected)
    }
}

impl BrokerLink for RumqttLink {
    async fn open(&self) -> Result<mpsc::Receiver<LinkEvent>, LinkError> {
        let options = self.config.to_options();
        tracing::debug!(
            host = %self.config.broker_host,
            port = self.config.broker_port,
            client_id = %options.client_id(),
            "opening MQTT connection"
        );
        let (client, mut eventloop) = AsyncClient::new(options, self.config.channel_capacity);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        break;
                    }
                    return Err(MqttError::Refused(ack.code).into());
                }
                Ok(_) => {}
                Err(err) => return Err(MqttError::Connection(err).into()),
            }
        }

        let (events_tx, events_rx) = mpsc::channel(self.config.channel_capacity);
        let driver = tokio::spawn(drive(eventloop, events_tx));

        *self.client.lock().unwrap_or_else(PoisonError::into_inner) = Some(client);
        let previous = self
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(driver);
        if let Some(previous) = previous {
            previous.abort();
        }

        Ok(events_rx)
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> Result<(), LinkError> {
        self.client()?
            .subscribe(filter, to_rumqtt(qos))
            .await
            .map_err(|err| MqttError::Client(err).into())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), LinkError> {
        self.client()?
            .publish(topic, to_rumqtt(qos), false, payload)
            .await
            .map_err(|err| MqttError::Client(err).into())
    }

    async fn close(&self) -> Result<(), LinkError> {
        let client = self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let driver = self
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let result = match client {
            Some(client) => client.disconnect().await.map_err(MqttError::Client),
            None => Ok(()),
        };

        if let Some(mut driver) = driver
            && tokio::time::timeout(CLOSE_GRACE, &mut driver).await.is_err()
        {
            tracing::debug!("MQTT event loop did not stop in time; aborting");
            driver.abort();
        }

        result.map_err(LinkError::from)
    }
}

/// Poll the event loop, forwarding publishes until the connection ends.
async fn drive(mut eventloop: EventLoop, events: mpsc::Sender<LinkEvent>) {
    loop {
        let event = match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                LinkEvent::Message(InboundMessage::new(publish.topic, publish.payload.to_vec()))
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                let _ = events
                    .send(LinkEvent::Lost {
                        code: LOSS_CODE_NETWORK,
                        reason: "broker sent DISCONNECT".to_string(),
                    })
                    .await;
                return;
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                let _ = events
                    .send(LinkEvent::Lost {
                        code: 0,
                        reason: "client disconnected".to_string(),
                    })
                    .await;
                return;
            }
            Ok(_) => continue,
            Err(err) => {
                let _ = events
                    .send(LinkEvent::Lost {
                        code: LOSS_CODE_NETWORK,
                        reason: err.to_string(),
                    })
                    .await;
                return;
            }
        };
        if events.send(event).await.is_err() {
            tracing::debug!("link event receiver dropped; stopping MQTT event loop");
            return;
        }
    }
}

fn to_rumqtt(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}
