//! Simulated air conditioner: `set_state` and `set_temperature`.

use homesync_domain::command::{Action, Command};
use homesync_domain::device::DeviceKind;
use homesync_domain::status::StatusMessage;

use super::{base_report, int_within, on_off, switch_value};

pub struct VirtualAc {
    id: String,
    on: bool,
    temperature: i16,
}

impl VirtualAc {
    #[must_use]
    pub fn new(id: String, on: bool, temperature: i16) -> Self {
        Self {
            id,
            on,
            temperature,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handle(&mut self, command: &Command) -> bool {
        match command.action {
            Action::SetState => match switch_value(&command.value) {
                Some(on) => {
                    self.on = on;
                    true
                }
                None => false,
            },
            Action::SetTemperature => match int_within(&command.value, 18..=30) {
                Some(temperature) => {
                    self.temperature = i16::try_from(temperature).unwrap_or(self.temperature);
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    #[must_use]
    pub fn report(&self) -> StatusMessage {
        StatusMessage {
            temperature: Some(i64::from(self.temperature)),
            ..base_report(&self.id, DeviceKind::Ac, on_off(self.on))
        }
    }
}
