//! MQTT adapter error types.

use homesync_app::ports::LinkError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The MQTT client has not been opened yet.
    #[error("MQTT client not connected")]
    NotConnected,

    /// The broker answered the handshake with a failure code.
    #[error("MQTT broker refused the connection: {0:?}")]
    Refused(rumqttc::ConnectReturnCode),

    /// The rumqttc client rejected a request.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// The network connection failed or dropped.
    #[error("MQTT connection error")]
    Connection(#[source] rumqttc::ConnectionError),
}

impl MqttError {
    /// Convert into a [`LinkError`] for propagation across the port
    /// boundary.
    #[must_use]
    pub fn into_link(self) -> LinkError {
        match self {
            Self::NotConnected => LinkError::NotOpen,
            Self::Refused(code) => LinkError::Refused(format!("{code:?}")),
            Self::Connection(rumqttc::ConnectionError::ConnectionRefused(code)) => {
                LinkError::Refused(format!("{code:?}"))
            }
            other => LinkError::Transport(Box::new(other)),
        }
    }
}

impl From<MqttError> for LinkError {
    fn from(err: MqttError) -> Self {
        err.into_link()
    }
}
