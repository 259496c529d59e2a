//! Status messages: authoritative device state reported over the broker.
//!
//! Devices in the field do not agree on field names, so the decoder accepts
//! the common aliases (`id`/`deviceId`, `status`/`state`, …). Identity is
//! taken from the topic; the payload's own id is informational.

use serde::{Deserialize, Serialize};

use crate::device::{
    BRIGHTNESS_RANGE, Device, DevicePatch, DeviceStatus, SPEED_RANGE, TEMPERATURE_RANGE,
    check_range, widen,
};
use crate::error::{MalformedPayload, ValidationError};
use crate::time::{Timestamp, from_unix_secs};

/// Decoded inbound status document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    #[serde(
        default,
        alias = "deviceId",
        alias = "device_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        default,
        rename = "type",
        alias = "deviceType",
        alias = "device_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub device_type: Option<String>,
    #[serde(default, alias = "state", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    /// Unix seconds at which the device produced the report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<f64>,
}

impl StatusMessage {
    /// Decode a UTF-8 JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedPayload::Json`] when the bytes are not a JSON
    /// object with fields of the expected types.
    pub fn from_slice(payload: &[u8]) -> Result<Self, MalformedPayload> {
        serde_json::from_slice(payload).map_err(MalformedPayload::Json)
    }

    /// Build the report a device would publish for its current state.
    #[must_use]
    pub fn from_device(device: &Device, reported_at: Timestamp) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let last_updated = reported_at.timestamp_millis() as f64 / 1000.0;
        Self {
            id: Some(device.id.to_string()),
            device_type: Some(device.kind().to_string()),
            status: Some(device.status.to_string()),
            brightness: device.brightness().map(i64::from),
            speed: device.speed().map(i64::from),
            temperature: device.temperature().map(i64::from),
            locked: device.locked(),
            last_updated: Some(last_updated),
        }
    }

    /// Encode as UTF-8 JSON.
    #[must_use]
    pub fn to_payload(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Convert into a registry patch, validating every present field.
    ///
    /// A reported fan speed of `0` means "stopped" and leaves the stored
    /// speed level untouched.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedPayload::Field`] naming the first field whose
    /// value the device model rejects.
    pub fn to_patch(&self) -> Result<DevicePatch, MalformedPayload> {
        let mut patch = DevicePatch::default();

        if let Some(raw) = &self.status {
            let status = raw
                .parse::<DeviceStatus>()
                .map_err(|source| field("status", source))?;
            patch.status = Some(status);
        }
        if let Some(value) = self.brightness {
            let value = check_range("brightness", value, &widen(&BRIGHTNESS_RANGE))
                .map_err(|source| field("brightness", source))?;
            patch.brightness = u8::try_from(value).ok();
        }
        if let Some(value) = self.speed.filter(|speed| *speed != 0) {
            let value = check_range("speed", value, &widen(&SPEED_RANGE))
                .map_err(|source| field("speed", source))?;
            patch.speed = u8::try_from(value).ok();
        }
        if let Some(value) = self.temperature {
            let value = check_range("temperature", value, &widen(&TEMPERATURE_RANGE))
                .map_err(|source| field("temperature", source))?;
            patch.temperature = i16::try_from(value).ok();
        }
        patch.locked = self.locked;
        patch.last_seen = self.last_updated.and_then(from_unix_secs);

        Ok(patch)
    }
}

fn field(field: &'static str, source: ValidationError) -> MalformedPayload {
    MalformedPayload::Field { field, source }
}
