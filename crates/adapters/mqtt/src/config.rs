//! MQTT connection configuration.

use std::time::Duration;

use rumqttc::MqttOptions;
use serde::Deserialize;

/// Broker the demo fleet publishes to.
pub const DEFAULT_BROKER_HOST: &str = "broker.emqx.io";

/// Configuration for the MQTT broker link.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client identifier. Empty means one is generated per connection.
    pub client_id: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Ask the broker to discard any previous session state.
    pub clean_session: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Capacity of the request and event channels.
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: DEFAULT_BROKER_HOST.to_string(),
            broker_port: 1883,
            client_id: String::new(),
            keep_alive_secs: 30,
            clean_session: true,
            username: None,
            password: None,
            channel_capacity: 64,
        }
    }
}

impl MqttConfig {
    /// Check the values `rumqttc` would otherwise reject at connect time.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.broker_host.trim().is_empty() {
            return Err("mqtt broker_host must not be empty".to_string());
        }
        if self.broker_port == 0 {
            return Err("mqtt broker_port must be non-zero".to_string());
        }
        if self.keep_alive_secs < 5 {
            return Err("mqtt keep_alive_secs must be at least 5".to_string());
        }
        if self.channel_capacity == 0 {
            return Err("mqtt channel_capacity must be non-zero".to_string());
        }
        if self.password.is_some() && self.username.is_none() {
            return Err("mqtt password requires a username".to_string());
        }
        Ok(())
    }

    /// The configured client id, or `homesync-` followed by eight random hex
    /// digits.
    #[must_use]
    pub fn resolved_client_id(&self) -> String {
        if self.client_id.is_empty() {
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            format!("homesync-{}", &suffix[..8])
        } else {
            self.client_id.clone()
        }
    }

    pub(crate) fn to_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.resolved_client_id(),
            self.broker_host.clone(),
            self.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(u64::from(self.keep_alive_secs)));
        options.set_clean_session(self.clean_session);
        if let Some(username) = &self.username {
            options.set_credentials(username.clone(), self.password.clone().unwrap_or_default());
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let config = MqttConfig::default();
        assert_eq!(config.broker_host, "broker.emqx.io");
        assert_eq!(config.broker_port, 1883);
        assert!(config.client_id.is_empty());
        assert_eq!(config.keep_alive_secs, 30);
        assert!(config.clean_session);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            broker_host = "mqtt.example.com"
            broker_port = 8883
            client_id = "dashboard-1"
            keep_alive_secs = 60
            clean_session = false
            username = "hub"
            password = "secret"
        "#;
        let config: MqttConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.broker_host, "mqtt.example.com");
        assert_eq!(config.broker_port, 8883);
        assert_eq!(config.client_id, "dashboard-1");
        assert_eq!(config.keep_alive_secs, 60);
        assert!(!config.clean_session);
        assert_eq!(config.username.as_deref(), Some("hub"));
    }

    #[test]
    fn should_use_defaults_for_missing_fields() {
        let toml = r#"broker_host = "192.168.1.100""#;
        let config: MqttConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.broker_host, "192.168.1.100");
        assert_eq!(config.broker_port, 1883);
        assert_eq!(config.channel_capacity, 64);
    }

    #[test]
    fn should_generate_prefixed_client_id() {
        let config = MqttConfig::default();
        let id = config.resolved_client_id();
        assert!(id.starts_with("homesync-"));
        assert_eq!(id.len(), "homesync-".len() + 8);
        assert!(id["homesync-".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn should_keep_configured_client_id() {
        let config = MqttConfig {
            client_id: "wall-panel".to_string(),
            ..MqttConfig::default()
        };
        assert_eq!(config.resolved_client_id(), "wall-panel");
        assert_eq!(config.to_options().client_id(), "wall-panel");
    }

    #[test]
    fn should_reject_short_keep_alive() {
        let config = MqttConfig {
            keep_alive_secs: 1,
            ..MqttConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_password_without_username() {
        let config = MqttConfig {
            password: Some("secret".to_string()),
            ..MqttConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
