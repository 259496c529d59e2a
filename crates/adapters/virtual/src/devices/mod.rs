//! Simulated devices: light, fan, air conditioner, lock and passive devices.
//!
//! Each device applies the commands it understands and describes its state
//! as the [`StatusMessage`] it would publish. Commands it does not
//! understand, or values outside its range, are ignored.

mod climate;
mod fan;
mod light;
mod lock;

pub use climate::VirtualAc;
pub use fan::VirtualFan;
pub use light::VirtualLight;
pub use lock::VirtualLock;

use std::ops::RangeInclusive;

use homesync_domain::command::{Command, CommandValue};
use homesync_domain::device::{Attributes, Device, DeviceKind, DeviceStatus};
use homesync_domain::status::StatusMessage;
use homesync_domain::time::now;

/// Wrapper enum for the concrete simulated device types.
pub enum VirtualDevice {
    Light(VirtualLight),
    Fan(VirtualFan),
    Ac(VirtualAc),
    Lock(VirtualLock),
    /// Cameras and sensors: only an on/off state, if anything.
    Passive {
        id: String,
        kind: DeviceKind,
        on: bool,
    },
}

impl VirtualDevice {
    /// Start a simulation from a device's seeded state.
    #[must_use]
    pub fn from_device(device: &Device) -> Self {
        let id = device.id.to_string();
        let on = device.status == DeviceStatus::On;
        match device.attributes {
            Attributes::Light { brightness } => Self::Light(VirtualLight::new(id, on, brightness)),
            Attributes::Fan { speed } => Self::Fan(VirtualFan::new(id, if on { speed } else { 0 })),
            Attributes::Ac { temperature } => Self::Ac(VirtualAc::new(id, on, temperature)),
            Attributes::Lock { locked } => Self::Lock(VirtualLock::new(id, locked)),
            Attributes::Camera | Attributes::Sensor => Self::Passive {
                id,
                kind: device.kind(),
                on,
            },
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Light(d) => d.id(),
            Self::Fan(d) => d.id(),
            Self::Ac(d) => d.id(),
            Self::Lock(d) => d.id(),
            Self::Passive { id, .. } => id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Light(_) => DeviceKind::Light,
            Self::Fan(_) => DeviceKind::Fan,
            Self::Ac(_) => DeviceKind::Ac,
            Self::Lock(_) => DeviceKind::Lock,
            Self::Passive { kind, .. } => *kind,
        }
    }

    /// Apply `command`. Returns `true` when the device accepted it and would
    /// publish a fresh status.
    pub fn handle(&mut self, command: &Command) -> bool {
        match self {
            Self::Light(d) => d.handle(command),
            Self::Fan(d) => d.handle(command),
            Self::Ac(d) => d.handle(command),
            Self::Lock(d) => d.handle(command),
            Self::Passive { kind, on, .. } => {
                if !kind.supports(command.action) {
                    return false;
                }
                match switch_value(&command.value) {
                    Some(value) => {
                        *on = value;
                        true
                    }
                    None => false,
                }
            }
        }
    }

    /// The status document this device publishes.
    #[must_use]
    pub fn report(&self) -> StatusMessage {
        match self {
            Self::Light(d) => d.report(),
            Self::Fan(d) => d.report(),
            Self::Ac(d) => d.report(),
            Self::Lock(d) => d.report(),
            Self::Passive { id, kind, on } => base_report(id, *kind, on_off(*on)),
        }
    }
}

/// `"on"`/`"off"` or a boolean.
fn switch_value(value: &CommandValue) -> Option<bool> {
    match value {
        CommandValue::Bool(b) => Some(*b),
        CommandValue::Text(text) if text == "on" => Some(true),
        CommandValue::Text(text) if text == "off" => Some(false),
        _ => None,
    }
}

fn int_within(value: &CommandValue, range: RangeInclusive<i64>) -> Option<i64> {
    match value {
        CommandValue::Int(n) if range.contains(n) => Some(*n),
        _ => None,
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

fn base_report(id: &str, kind: DeviceKind, status: &str) -> StatusMessage {
    #[allow(clippy::cast_precision_loss)]
    let last_updated = now().timestamp_millis() as f64 / 1000.0;
    StatusMessage {
        id: Some(id.to_string()),
        device_type: Some(kind.to_string()),
        status: Some(status.to_string()),
        last_updated: Some(last_updated),
        ..StatusMessage::default()
    }
}
