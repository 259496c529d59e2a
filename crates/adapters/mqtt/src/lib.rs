//! # homesync-adapter-mqtt
//!
//! MQTT adapter: a [`BrokerLink`](homesync_app::ports::BrokerLink) backed by
//! `rumqttc`.
//!
//! ## Responsibilities
//! - Open a TCP connection to the broker and wait for the `CONNACK`
//! - Drive the `rumqttc` event loop on a background task
//! - Translate incoming `PUBLISH` packets into link events
//! - Report connection loss so the session can flip to disconnected
//!
//! ## Dependency rule
//! Same as other adapters: depends on `homesync-app` port traits only.

pub mod config;
pub mod error;
mod link;

pub use config::MqttConfig;
pub use error::MqttError;
pub use link::RumqttLink;
