//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `homesync.toml` in the working directory (or the file named by
//! `HOMESYNC_CONFIG`). Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;

use homesync_adapter_mqtt::MqttConfig;
use homesync_app::session::{DEFAULT_BUS_CAPACITY, DEFAULT_CONNECT_TIMEOUT, SessionConfig};
use homesync_domain::device::{Device, DeviceKind, DeviceStatus};
use homesync_domain::fleet::default_fleet;
use homesync_domain::topic::{DEFAULT_ROOT, TopicNamespace};

const DEFAULT_PATH: &str = "homesync.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which broker link to use.
    pub transport: TransportConfig,
    /// Broker connection settings, used by the `mqtt` transport.
    pub mqtt: MqttConfig,
    /// Session and dispatch settings.
    pub session: SessionSettings,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Device fleet. Empty means the built-in demo household.
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Mqtt,
    Virtual,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Topic namespace root, e.g. `smart_home/v1`.
    pub topic_root: String,
    /// How long to wait for the broker handshake.
    pub connect_timeout_secs: u64,
    /// Reflect sent commands in the registry before devices confirm them.
    pub optimistic_updates: bool,
    /// Inbound messages buffered per observer.
    pub bus_capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// One `[[devices]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub room: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    #[serde(default)]
    pub status: DeviceStatus,
    #[serde(default)]
    pub power_watts: Option<u32>,
}

impl Config {
    /// Load configuration from `homesync.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("HOMESYNC_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HOMESYNC_TRANSPORT") {
            match val.as_str() {
                "mqtt" => self.transport.kind = TransportKind::Mqtt,
                "virtual" => self.transport.kind = TransportKind::Virtual,
                _ => {}
            }
        }
        if let Ok(val) = std::env::var("HOMESYNC_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Ok(val) = std::env::var("HOMESYNC_MQTT_PORT")
            && let Ok(port) = val.parse()
        {
            self.mqtt.broker_port = port;
        }
        if let Ok(val) = std::env::var("HOMESYNC_CLIENT_ID") {
            self.mqtt.client_id = val;
        }
        if let Ok(val) = std::env::var("HOMESYNC_MQTT_USERNAME") {
            self.mqtt.username = Some(val);
        }
        if let Ok(val) = std::env::var("HOMESYNC_MQTT_PASSWORD") {
            self.mqtt.password = Some(val);
        }
        if let Ok(val) = std::env::var("HOMESYNC_TOPIC_ROOT") {
            self.session.topic_root = val;
        }
        if let Ok(val) = std::env::var("HOMESYNC_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.topic_root.trim_matches('/').is_empty() {
            return Err(ConfigError::Validation(
                "session topic_root must not be empty".to_string(),
            ));
        }
        if self.session.topic_root.contains(['+', '#']) {
            return Err(ConfigError::Validation(
                "session topic_root must not contain wildcards".to_string(),
            ));
        }
        if self.session.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "session connect_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.session.bus_capacity == 0 {
            return Err(ConfigError::Validation(
                "session bus_capacity must be non-zero".to_string(),
            ));
        }
        if self.transport.kind == TransportKind::Mqtt {
            self.mqtt.validate().map_err(ConfigError::Validation)?;
        }
        self.fleet().map(|_| ())
    }

    /// The configured devices, or the built-in fleet when none are listed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when an entry is invalid or an id
    /// is listed twice.
    pub fn fleet(&self) -> Result<Vec<Device>, ConfigError> {
        if self.devices.is_empty() {
            return Ok(default_fleet());
        }

        let mut seen = HashSet::new();
        self.devices
            .iter()
            .map(|entry| {
                if !seen.insert(entry.id.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "device {} is listed twice",
                        entry.id
                    )));
                }
                let mut builder = Device::builder()
                    .id(entry.id.clone())
                    .name(entry.name.clone())
                    .room(entry.room.clone())
                    .status(entry.status)
                    .kind(entry.kind);
                if let Some(watts) = entry.power_watts {
                    builder = builder.power_watts(watts);
                }
                builder
                    .build()
                    .map_err(|err| ConfigError::Validation(format!("device {}: {err}", entry.id)))
            })
            .collect()
    }

    #[must_use]
    pub fn namespace(&self) -> TopicNamespace {
        TopicNamespace::new(self.session.topic_root.clone())
    }

    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            namespace: self.namespace(),
            connect_timeout: Duration::from_secs(self.session.connect_timeout_secs),
            bus_capacity: self.session.bus_capacity,
            ..SessionConfig::default()
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            topic_root: DEFAULT_ROOT.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            optimistic_updates: true,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "homesyncd=info,homesync=info,rumqttc=warn".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
