//! Command messages: user or automation intent sent to a device.
//!
//! A [`Command`] is validated against the target [`DeviceKind`] before it
//! leaves the process. Validation also yields the optimistic [`DevicePatch`]
//! the dashboard may apply while waiting for the device to report back.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::device::{
    BRIGHTNESS_RANGE, DeviceKind, DevicePatch, DeviceStatus, SPEED_RANGE, TEMPERATURE_RANGE,
    check_range, widen,
};
use crate::error::ValidationError;

/// Fan speed accepted by `set_speed`; `0` switches the fan off.
const COMMAND_SPEED_RANGE: std::ops::RangeInclusive<i64> = 0..=5;

/// Closed set of command actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    SetState,
    SetBrightness,
    SetSpeed,
    SetTemperature,
    SetLocked,
}

impl Action {
    pub const ALL: [Self; 5] = [
        Self::SetState,
        Self::SetBrightness,
        Self::SetSpeed,
        Self::SetTemperature,
        Self::SetLocked,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SetState => "set_state",
            Self::SetBrightness => "set_brightness",
            Self::SetSpeed => "set_speed",
            Self::SetTemperature => "set_temperature",
            Self::SetLocked => "set_locked",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownAction(s.to_string()))
    }
}

/// Value carried by a command: a string, an integer or a boolean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl CommandValue {
    /// Interpret free text the way a console user would type it.
    #[must_use]
    pub fn parse_loose(raw: &str) -> Self {
        if let Ok(b) = raw.parse::<bool>() {
            return Self::Bool(b);
        }
        if let Ok(n) = raw.parse::<i64>() {
            return Self::Int(n);
        }
        Self::Text(raw.to_string())
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(n) => serde_json::Value::from(*n),
            Self::Text(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

impl From<bool> for CommandValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for CommandValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for CommandValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for CommandValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<DeviceStatus> for CommandValue {
    fn from(value: DeviceStatus) -> Self {
        Self::Text(value.as_str().to_string())
    }
}

/// Outbound `{ "action": ..., "value": ... }` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub action: Action,
    pub value: CommandValue,
}

impl Command {
    #[must_use]
    pub fn new(action: Action, value: impl Into<CommandValue>) -> Self {
        Self {
            action,
            value: value.into(),
        }
    }

    /// Validate this command for a device of `kind` and derive the state the
    /// device is expected to report once it has applied it.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnsupportedAction`] when `kind` does not
    /// accept the action, [`ValidationError::InvalidValue`] when the value has
    /// the wrong type, and [`ValidationError::OutOfRange`] for values outside
    /// the allowed range.
    pub fn resolve(&self, kind: DeviceKind) -> Result<DevicePatch, ValidationError> {
        if !kind.supports(self.action) {
            return Err(ValidationError::UnsupportedAction {
                kind,
                action: self.action,
            });
        }

        match self.action {
            Action::SetState => {
                let status = match &self.value {
                    CommandValue::Bool(true) => DeviceStatus::On,
                    CommandValue::Bool(false) => DeviceStatus::Off,
                    CommandValue::Text(text) => text.parse()?,
                    CommandValue::Int(_) => return Err(self.invalid("a state name")),
                };
                // Offline, error and maintenance are reported by devices,
                // never requested.
                if !matches!(
                    status,
                    DeviceStatus::On | DeviceStatus::Off | DeviceStatus::Standby
                ) {
                    return Err(self.invalid("one of on, off, standby"));
                }
                Ok(DevicePatch::status(status))
            }
            Action::SetBrightness => {
                let value = self.int("an integer brightness")?;
                let brightness = check_range("brightness", value, &widen(&BRIGHTNESS_RANGE))?;
                let brightness = u8::try_from(brightness).map_err(|_| self.invalid("0..=100"))?;
                let status = if brightness > 0 {
                    DeviceStatus::On
                } else {
                    DeviceStatus::Off
                };
                Ok(DevicePatch::status(status).with_brightness(brightness))
            }
            Action::SetSpeed => {
                let value = self.int("an integer speed")?;
                let speed = check_range("speed", value, &COMMAND_SPEED_RANGE)?;
                let speed = u8::try_from(speed).map_err(|_| self.invalid("0..=5"))?;
                if SPEED_RANGE.contains(&speed) {
                    Ok(DevicePatch::status(DeviceStatus::On).with_speed(speed))
                } else {
                    Ok(DevicePatch::status(DeviceStatus::Off))
                }
            }
            Action::SetTemperature => {
                let value = self.int("an integer temperature")?;
                let temperature =
                    check_range("temperature", value, &widen(&TEMPERATURE_RANGE))?;
                let temperature =
                    i16::try_from(temperature).map_err(|_| self.invalid("18..=30"))?;
                Ok(DevicePatch::default().with_temperature(temperature))
            }
            Action::SetLocked => match self.value {
                CommandValue::Bool(locked) => Ok(DevicePatch::default().with_locked(locked)),
                _ => Err(self.invalid("a boolean")),
            },
        }
    }

    /// Serialize into the UTF-8 JSON wire payload.
    #[must_use]
    pub fn to_payload(&self) -> Vec<u8> {
        serde_json::json!({
            "action": self.action.as_str(),
            "value": self.value.to_json(),
        })
        .to_string()
        .into_bytes()
    }

    fn int(&self, expected: &'static str) -> Result<i64, ValidationError> {
        match self.value {
            CommandValue::Int(n) => Ok(n),
            _ => Err(self.invalid(expected)),
        }
    }

    fn invalid(&self, expected: &'static str) -> ValidationError {
        ValidationError::InvalidValue {
            action: self.action,
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_reject_brightness_above_range() {
        let cmd = Command::new(Action::SetBrightness, 150);
        assert_eq!(
            cmd.resolve(DeviceKind::Light),
            Err(ValidationError::OutOfRange {
                field: "brightness",
                value: 150,
                min: 0,
                max: 100,
            })
        );
    }

    #[test]
    fn should_reject_action_not_supported_by_kind() {
        let cmd = Command::new(Action::SetBrightness, 50);
        assert!(matches!(
            cmd.resolve(DeviceKind::Lock),
            Err(ValidationError::UnsupportedAction { .. })
        ));
    }

    #[test]
    fn should_reject_every_command_for_sensors() {
        for action in Action::ALL {
            let cmd = Command::new(action, true);
            assert!(cmd.resolve(DeviceKind::Sensor).is_err());
        }
    }

    #[test]
    fn should_reject_wrong_value_type() {
        let cmd = Command::new(Action::SetSpeed, "fast");
        assert_eq!(
            cmd.resolve(DeviceKind::Fan),
            Err(ValidationError::InvalidValue {
                action: Action::SetSpeed,
                expected: "an integer speed",
            })
        );
    }

    #[test]
    fn should_reject_temperature_outside_climate_range() {
        let cmd = Command::new(Action::SetTemperature, 16);
        assert!(matches!(
            cmd.resolve(DeviceKind::Ac),
            Err(ValidationError::OutOfRange {
                field: "temperature",
                ..
            })
        ));
    }

    #[test]
    fn should_reject_device_reported_states() {
        let cmd = Command::new(Action::SetState, "offline");
        assert!(matches!(
            cmd.resolve(DeviceKind::Light),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn should_derive_on_patch_for_positive_brightness() {
        let patch = Command::new(Action::SetBrightness, 80)
            .resolve(DeviceKind::Light)
            .unwrap();
        assert_eq!(patch.status, Some(DeviceStatus::On));
        assert_eq!(patch.brightness, Some(80));
    }

    #[test]
    fn should_switch_fan_off_on_speed_zero() {
        let patch = Command::new(Action::SetSpeed, 0)
            .resolve(DeviceKind::Fan)
            .unwrap();
        assert_eq!(patch.status, Some(DeviceStatus::Off));
        assert_eq!(patch.speed, None);
    }

    #[test]
    fn should_accept_boolean_state() {
        let patch = Command::new(Action::SetState, false)
            .resolve(DeviceKind::Camera)
            .unwrap();
        assert_eq!(patch, DevicePatch::status(DeviceStatus::Off));
    }

    #[test]
    fn should_encode_action_and_value() {
        let payload = Command::new(Action::SetSpeed, 3).to_payload();
        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"action": "set_speed", "value": 3}));
    }

    #[test]
    fn should_decode_command_from_wire() {
        let cmd: Command =
            serde_json::from_str(r#"{"action":"set_state","value":"on"}"#).unwrap();
        assert_eq!(cmd, Command::new(Action::SetState, "on"));
    }

    #[test]
    fn should_parse_console_values_loosely() {
        assert_eq!(CommandValue::parse_loose("true"), CommandValue::Bool(true));
        assert_eq!(CommandValue::parse_loose("42"), CommandValue::Int(42));
        assert_eq!(
            CommandValue::parse_loose("on"),
            CommandValue::Text("on".to_string())
        );
    }
}
