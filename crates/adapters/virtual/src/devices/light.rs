//! Simulated light: `set_state` and `set_brightness`.

use homesync_domain::command::{Action, Command};
use homesync_domain::device::DeviceKind;
use homesync_domain::status::StatusMessage;

use super::{base_report, int_within, on_off, switch_value};

/// Brightness a light comes back on at after `set_state: on`.
const DEFAULT_ON_BRIGHTNESS: u8 = 80;

pub struct VirtualLight {
    id: String,
    on: bool,
    brightness: u8,
}

impl VirtualLight {
    #[must_use]
    pub fn new(id: String, on: bool, brightness: u8) -> Self {
        Self { id, on, brightness }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handle(&mut self, command: &Command) -> bool {
        match command.action {
            Action::SetState => {
                let Some(on) = switch_value(&command.value) else {
                    return false;
                };
                self.on = on;
                self.brightness = if on { DEFAULT_ON_BRIGHTNESS } else { 0 };
                true
            }
            Action::SetBrightness => {
                let Some(brightness) = int_within(&command.value, 0..=100) else {
                    return false;
                };
                self.brightness = u8::try_from(brightness).unwrap_or(u8::MAX);
                self.on = self.brightness > 0;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn report(&self) -> StatusMessage {
        StatusMessage {
            brightness: Some(i64::from(self.brightness)),
            ..base_report(&self.id, DeviceKind::Light, on_off(self.on))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> VirtualLight {
        VirtualLight::new("living_room_light".to_string(), false, 0)
    }

    #[test]
    fn should_turn_on_at_default_brightness() {
        let mut light = light();
        assert!(light.handle(&Command::new(Action::SetState, "on")));

        let report = light.report();
        assert_eq!(report.status.as_deref(), Some("on"));
        assert_eq!(report.brightness, Some(80));
    }

    #[test]
    fn should_zero_brightness_when_turned_off() {
        let mut light = VirtualLight::new("1".to_string(), true, 55);
        assert!(light.handle(&Command::new(Action::SetState, "off")));
        assert_eq!(light.report().brightness, Some(0));
    }

    #[test]
    fn should_follow_brightness_with_state() {
        let mut light = light();
        assert!(light.handle(&Command::new(Action::SetBrightness, 30)));
        assert_eq!(light.report().status.as_deref(), Some("on"));

        assert!(light.handle(&Command::new(Action::SetBrightness, 0)));
        assert_eq!(light.report().status.as_deref(), Some("off"));
    }

    #[test]
    fn should_ignore_out_of_range_brightness() {
        let mut light = light();
        assert!(!light.handle(&Command::new(Action::SetBrightness, 101)));
        assert_eq!(light.report().brightness, Some(0));
    }

    #[test]
    fn should_ignore_unknown_state() {
        let mut light = light();
        assert!(!light.handle(&Command::new(Action::SetState, "dim")));
    }

    #[test]
    fn should_report_identity() {
        let report = light().report();
        assert_eq!(report.id.as_deref(), Some("living_room_light"));
        assert_eq!(report.device_type.as_deref(), Some("light"));
        assert!(report.last_updated.is_some());
    }
}
