//! Device: a physical thing in the home whose state is mirrored locally.
//!
//! Kind-specific attributes are carried by [`Attributes`], a tagged union
//! keyed by [`DeviceKind`], so a lock can never hold a brightness.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::command::Action;
use crate::error::ValidationError;
use crate::id::DeviceId;
use crate::time::Timestamp;

/// Allowed light brightness, in percent.
pub const BRIGHTNESS_RANGE: RangeInclusive<u8> = 0..=100;
/// Allowed fan speed levels.
pub const SPEED_RANGE: RangeInclusive<u8> = 1..=5;
/// Allowed climate-control setpoint, in degrees Celsius.
pub const TEMPERATURE_RANGE: RangeInclusive<i16> = 18..=30;

/// Closed set of device kinds known to the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Light,
    Fan,
    Ac,
    Lock,
    Camera,
    Sensor,
}

impl DeviceKind {
    pub const ALL: [Self; 6] = [
        Self::Light,
        Self::Fan,
        Self::Ac,
        Self::Lock,
        Self::Camera,
        Self::Sensor,
    ];

    /// Topic segment and JSON name of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Fan => "fan",
            Self::Ac => "ac",
            Self::Lock => "lock",
            Self::Camera => "camera",
            Self::Sensor => "sensor",
        }
    }

    /// Command actions a device of this kind accepts.
    #[must_use]
    pub fn supported_actions(self) -> &'static [Action] {
        match self {
            Self::Light => &[Action::SetState, Action::SetBrightness],
            Self::Fan => &[Action::SetState, Action::SetSpeed],
            Self::Ac => &[Action::SetState, Action::SetTemperature],
            Self::Lock => &[Action::SetState, Action::SetLocked],
            Self::Camera => &[Action::SetState],
            // Sensors are read-only.
            Self::Sensor => &[],
        }
    }

    #[must_use]
    pub fn supports(self, action: Action) -> bool {
        self.supported_actions().contains(&action)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownKind(s.to_string()))
    }
}

/// Operational status of a device. Exactly one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    #[serde(alias = "running")]
    On,
    #[default]
    Off,
    Offline,
    Standby,
    Error,
    Maintenance,
}

impl DeviceStatus {
    /// Whether the device is reachable (anything but [`Offline`](Self::Offline)).
    #[must_use]
    pub fn is_online(self) -> bool {
        !matches!(self, Self::Offline)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Offline => "offline",
            Self::Standby => "standby",
            Self::Error => "error",
            Self::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" | "running" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "offline" => Ok(Self::Offline),
            "standby" => Ok(Self::Standby),
            "error" => Ok(Self::Error),
            "maintenance" => Ok(Self::Maintenance),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Kind-specific attribute set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Attributes {
    Light { brightness: u8 },
    Fan { speed: u8 },
    Ac { temperature: i16 },
    Lock { locked: bool },
    Camera,
    Sensor,
}

impl Attributes {
    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Light { .. } => DeviceKind::Light,
            Self::Fan { .. } => DeviceKind::Fan,
            Self::Ac { .. } => DeviceKind::Ac,
            Self::Lock { .. } => DeviceKind::Lock,
            Self::Camera => DeviceKind::Camera,
            Self::Sensor => DeviceKind::Sensor,
        }
    }

    /// Factory-default attributes for a freshly installed device of `kind`.
    #[must_use]
    pub fn default_for(kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::Light => Self::Light { brightness: 100 },
            DeviceKind::Fan => Self::Fan { speed: 1 },
            DeviceKind::Ac => Self::Ac { temperature: 24 },
            DeviceKind::Lock => Self::Lock { locked: true },
            DeviceKind::Camera => Self::Camera,
            DeviceKind::Sensor => Self::Sensor,
        }
    }

    /// Check that every attribute lies within its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::OutOfRange`] for the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match *self {
            Self::Light { brightness } => {
                check_range("brightness", i64::from(brightness), &widen(&BRIGHTNESS_RANGE))?;
            }
            Self::Fan { speed } => {
                check_range("speed", i64::from(speed), &widen(&SPEED_RANGE))?;
            }
            Self::Ac { temperature } => {
                check_range(
                    "temperature",
                    i64::from(temperature),
                    &widen(&TEMPERATURE_RANGE),
                )?;
            }
            Self::Lock { .. } | Self::Camera | Self::Sensor => {}
        }
        Ok(())
    }
}

/// A device as mirrored in the local registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub room: String,
    pub status: DeviceStatus,
    #[serde(flatten)]
    pub attributes: Attributes,
    /// Nominal power draw while on, in watts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_watts: Option<u32>,
    /// Time of the last authoritative status message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<Timestamp>,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        self.attributes.kind()
    }

    #[must_use]
    pub fn brightness(&self) -> Option<u8> {
        match self.attributes {
            Attributes::Light { brightness } => Some(brightness),
            _ => None,
        }
    }

    #[must_use]
    pub fn speed(&self) -> Option<u8> {
        match self.attributes {
            Attributes::Fan { speed } => Some(speed),
            _ => None,
        }
    }

    #[must_use]
    pub fn temperature(&self) -> Option<i16> {
        match self.attributes {
            Attributes::Ac { temperature } => Some(temperature),
            _ => None,
        }
    }

    #[must_use]
    pub fn locked(&self) -> Option<bool> {
        match self.attributes {
            Attributes::Lock { locked } => Some(locked),
            _ => None,
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the id or name is empty or an
    /// attribute is out of range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyDeviceId);
        }
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        self.attributes.validate()
    }

    /// Shallow-merge `patch` into this device and report whether anything
    /// changed.
    ///
    /// Attribute fields the device cannot hold (a brightness on a fan) or
    /// values outside the allowed ranges are ignored, so the merge never
    /// breaks an invariant.
    pub fn apply(&mut self, patch: &DevicePatch) -> bool {
        let mut changed = false;
        changed |= assign(&mut self.name, patch.name.as_ref());
        changed |= assign(&mut self.room, patch.room.as_ref());
        changed |= assign(&mut self.status, patch.status.as_ref());
        changed |= assign_opt(&mut self.power_watts, patch.power_watts);
        changed |= assign_opt(&mut self.last_seen, patch.last_seen);

        match &mut self.attributes {
            Attributes::Light { brightness } => {
                let value = patch.brightness.filter(|b| BRIGHTNESS_RANGE.contains(b));
                changed |= assign(brightness, value.as_ref());
            }
            Attributes::Fan { speed } => {
                let value = patch.speed.filter(|s| SPEED_RANGE.contains(s));
                changed |= assign(speed, value.as_ref());
            }
            Attributes::Ac { temperature } => {
                let value = patch.temperature.filter(|t| TEMPERATURE_RANGE.contains(t));
                changed |= assign(temperature, value.as_ref());
            }
            Attributes::Lock { locked } => {
                changed |= assign(locked, patch.locked.as_ref());
            }
            Attributes::Camera | Attributes::Sensor => {}
        }

        changed
    }
}

/// A partial update of a [`Device`]; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DevicePatch {
    pub name: Option<String>,
    pub room: Option<String>,
    pub status: Option<DeviceStatus>,
    pub brightness: Option<u8>,
    pub speed: Option<u8>,
    pub temperature: Option<i16>,
    pub locked: Option<bool>,
    pub power_watts: Option<u32>,
    pub last_seen: Option<Timestamp>,
}

impl DevicePatch {
    #[must_use]
    pub fn status(status: DeviceStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: DeviceStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_brightness(mut self, brightness: u8) -> Self {
        self.brightness = Some(brightness);
        self
    }

    #[must_use]
    pub fn with_speed(mut self, speed: u8) -> Self {
        self.speed = Some(speed);
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: i16) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = Some(locked);
        self
    }

    #[must_use]
    pub fn with_last_seen(mut self, ts: Timestamp) -> Self {
        self.last_seen = Some(ts);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<String>,
    name: Option<String>,
    room: Option<String>,
    status: Option<DeviceStatus>,
    attributes: Option<Attributes>,
    power_watts: Option<u32>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: DeviceStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Use the factory-default attributes of `kind`.
    #[must_use]
    pub fn kind(mut self, kind: DeviceKind) -> Self {
        self.attributes = Some(Attributes::default_for(kind));
        self
    }

    #[must_use]
    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    #[must_use]
    pub fn power_watts(mut self, watts: u32) -> Self {
        self.power_watts = Some(watts);
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the id, name or kind is missing or
    /// an attribute is out of range.
    pub fn build(self) -> Result<Device, ValidationError> {
        let attributes = self.attributes.ok_or(ValidationError::MissingKind)?;
        let device = Device {
            id: DeviceId::new(self.id.unwrap_or_default())?,
            name: self.name.unwrap_or_default(),
            room: self.room.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            attributes,
            power_watts: self.power_watts,
            last_seen: None,
        };
        device.validate()?;
        Ok(device)
    }
}

/// Check `value` against an inclusive range, naming `field` on failure.
pub(crate) fn check_range(
    field: &'static str,
    value: i64,
    range: &RangeInclusive<i64>,
) -> Result<i64, ValidationError> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

pub(crate) fn widen<T: Copy + Into<i64>>(range: &RangeInclusive<T>) -> RangeInclusive<i64> {
    (*range.start()).into()..=(*range.end()).into()
}

fn assign<T: PartialEq + Clone>(slot: &mut T, value: Option<&T>) -> bool {
    match value {
        Some(value) if slot != value => {
            *slot = value.clone();
            true
        }
        _ => false,
    }
}

fn assign_opt<T: PartialEq>(slot: &mut Option<T>, value: Option<T>) -> bool {
    match value {
        Some(value) if slot.as_ref() != Some(&value) => {
            *slot = Some(value);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn light(id: &str, status: DeviceStatus, brightness: u8) -> Device {
        Device::builder()
            .id(id)
            .name("Lamp")
            .room("Living Room")
            .status(status)
            .attributes(Attributes::Light { brightness })
            .build()
            .unwrap()
    }

    #[test]
    fn should_build_valid_device() {
        let device = light("1", DeviceStatus::Off, 0);
        assert_eq!(device.kind(), DeviceKind::Light);
        assert_eq!(device.brightness(), Some(0));
        assert_eq!(device.speed(), None);
    }

    #[test]
    fn should_reject_device_without_kind() {
        let result = Device::builder().id("1").name("Lamp").build();
        assert_eq!(result, Err(ValidationError::MissingKind));
    }

    #[test]
    fn should_reject_device_with_empty_name() {
        let result = Device::builder().id("1").kind(DeviceKind::Camera).build();
        assert_eq!(result, Err(ValidationError::EmptyName));
    }

    #[test]
    fn should_reject_out_of_range_temperature() {
        let result = Device::builder()
            .id("2")
            .name("AC")
            .attributes(Attributes::Ac { temperature: 40 })
            .build();
        assert!(matches!(
            result,
            Err(ValidationError::OutOfRange {
                field: "temperature",
                ..
            })
        ));
    }

    #[test]
    fn should_parse_running_as_on() {
        assert_eq!("running".parse::<DeviceStatus>(), Ok(DeviceStatus::On));
        let parsed: DeviceStatus = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(parsed, DeviceStatus::On);
    }

    #[test]
    fn should_report_offline_as_not_online() {
        assert!(!DeviceStatus::Offline.is_online());
        assert!(DeviceStatus::Standby.is_online());
    }

    #[test]
    fn should_parse_every_kind_from_its_name() {
        for kind in DeviceKind::ALL {
            assert_eq!(kind.as_str().parse::<DeviceKind>(), Ok(kind));
        }
        assert!("toaster".parse::<DeviceKind>().is_err());
    }

    #[test]
    fn should_overlay_patch_fields_and_keep_others() {
        let mut device = light("1", DeviceStatus::Off, 0);
        let before = device.clone();

        let changed = device.apply(
            &DevicePatch::status(DeviceStatus::On).with_brightness(80),
        );

        assert!(changed);
        assert_eq!(device.status, DeviceStatus::On);
        assert_eq!(device.brightness(), Some(80));
        assert_eq!(device.name, before.name);
        assert_eq!(device.room, before.room);
    }

    #[test]
    fn should_report_unchanged_when_patch_matches_state() {
        let mut device = light("1", DeviceStatus::On, 50);
        assert!(!device.apply(&DevicePatch::status(DeviceStatus::On).with_brightness(50)));
        assert!(!device.apply(&DevicePatch::default()));
    }

    #[test]
    fn should_ignore_attributes_of_other_kinds() {
        let mut lock = Device::builder()
            .id("7")
            .name("Smart Lock")
            .kind(DeviceKind::Lock)
            .build()
            .unwrap();

        let changed = lock.apply(&DevicePatch::default().with_brightness(30).with_speed(2));

        assert!(!changed);
        assert_eq!(lock.attributes, Attributes::Lock { locked: true });
    }

    #[test]
    fn should_ignore_out_of_range_attribute_values() {
        let mut device = light("1", DeviceStatus::On, 40);
        assert!(!device.apply(&DevicePatch::default().with_brightness(150)));
        assert_eq!(device.brightness(), Some(40));
    }

    #[test]
    fn should_serialize_attributes_flat_with_type_tag() {
        let device = light("1", DeviceStatus::Off, 0);
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["type"], "light");
        assert_eq!(json["brightness"], 0);
        assert_eq!(json["status"], "off");
        assert!(json.get("last_seen").is_none());
    }

    #[test]
    fn should_deserialize_device_from_flat_document() {
        let json = r#"{"id":"3","name":"Bedroom Fan","room":"Master Bedroom","status":"on","type":"fan","speed":3,"power_watts":75}"#;
        let device: Device = serde_json::from_str(json).unwrap();
        assert_eq!(device.kind(), DeviceKind::Fan);
        assert_eq!(device.speed(), Some(3));
        assert_eq!(device.power_watts, Some(75));
    }

    #[test]
    fn should_overlay_random_patches_on_random_devices() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let statuses = [
            DeviceStatus::On,
            DeviceStatus::Off,
            DeviceStatus::Offline,
            DeviceStatus::Standby,
            DeviceStatus::Error,
            DeviceStatus::Maintenance,
        ];

        for round in 0..500 {
            let kind = DeviceKind::ALL[rng.random_range(0..DeviceKind::ALL.len())];
            let mut device = Device::builder()
                .id(round.to_string())
                .name("Device")
                .room("Room")
                .status(statuses[rng.random_range(0..statuses.len())])
                .kind(kind)
                .build()
                .unwrap();

            let patch = DevicePatch {
                room: rng.random_bool(0.3).then(|| "Other".to_string()),
                status: rng
                    .random_bool(0.5)
                    .then(|| statuses[rng.random_range(0..statuses.len())]),
                brightness: rng.random_bool(0.5).then(|| rng.random_range(BRIGHTNESS_RANGE)),
                speed: rng.random_bool(0.5).then(|| rng.random_range(SPEED_RANGE)),
                temperature: rng
                    .random_bool(0.5)
                    .then(|| rng.random_range(TEMPERATURE_RANGE)),
                locked: rng.random_bool(0.5).then(|| rng.random_bool(0.5)),
                ..DevicePatch::default()
            };

            let mut expected = device.clone();
            if let Some(room) = &patch.room {
                expected.room.clone_from(room);
            }
            if let Some(status) = patch.status {
                expected.status = status;
            }
            expected.attributes = match expected.attributes {
                Attributes::Light { brightness } => Attributes::Light {
                    brightness: patch.brightness.unwrap_or(brightness),
                },
                Attributes::Fan { speed } => Attributes::Fan {
                    speed: patch.speed.unwrap_or(speed),
                },
                Attributes::Ac { temperature } => Attributes::Ac {
                    temperature: patch.temperature.unwrap_or(temperature),
                },
                Attributes::Lock { locked } => Attributes::Lock {
                    locked: patch.locked.unwrap_or(locked),
                },
                other => other,
            };

            let original = device.clone();
            let changed = device.apply(&patch);
            assert_eq!(device, expected);
            assert_eq!(changed, original != expected);
            assert!(device.validate().is_ok());
        }
    }
}
