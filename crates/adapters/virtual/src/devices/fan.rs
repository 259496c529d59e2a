//! Simulated fan: `set_speed` (0 stops it) and `set_state`.

use homesync_domain::command::{Action, Command};
use homesync_domain::device::DeviceKind;
use homesync_domain::status::StatusMessage;

use super::{base_report, int_within, switch_value};

pub struct VirtualFan {
    id: String,
    speed: u8,
    /// Speed restored by `set_state: on`.
    last_speed: u8,
}

impl VirtualFan {
    #[must_use]
    pub fn new(id: String, speed: u8) -> Self {
        Self {
            id,
            speed,
            last_speed: speed.max(1),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handle(&mut self, command: &Command) -> bool {
        match command.action {
            Action::SetSpeed => {
                let Some(speed) = int_within(&command.value, 0..=5) else {
                    return false;
                };
                self.set_speed(u8::try_from(speed).unwrap_or(0));
                true
            }
            Action::SetState => {
                let Some(on) = switch_value(&command.value) else {
                    return false;
                };
                self.set_speed(if on { self.last_speed } else { 0 });
                true
            }
            _ => false,
        }
    }

    fn set_speed(&mut self, speed: u8) {
        self.speed = speed;
        if speed > 0 {
            self.last_speed = speed;
        }
    }

    #[must_use]
    pub fn report(&self) -> StatusMessage {
        let state = if self.speed > 0 { "running" } else { "off" };
        StatusMessage {
            speed: Some(i64::from(self.speed)),
            ..base_report(&self.id, DeviceKind::Fan, state)
        }
    }
}
