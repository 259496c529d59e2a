//! Simulated smart lock: `set_locked`. Always powered.

use homesync_domain::command::{Action, Command, CommandValue};
use homesync_domain::device::DeviceKind;
use homesync_domain::status::StatusMessage;

use super::base_report;

pub struct VirtualLock {
    id: String,
    locked: bool,
}

impl VirtualLock {
    #[must_use]
    pub fn new(id: String, locked: bool) -> Self {
        Self { id, locked }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handle(&mut self, command: &Command) -> bool {
        match (command.action, &command.value) {
            (Action::SetLocked, CommandValue::Bool(locked)) => {
                self.locked = *locked;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn report(&self) -> StatusMessage {
        StatusMessage {
            locked: Some(self.locked),
            ..base_report(&self.id, DeviceKind::Lock, "on")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_unlock() {
        let mut lock = VirtualLock::new("7".to_string(), true);
        assert!(lock.handle(&Command::new(Action::SetLocked, false)));
        assert_eq!(lock.report().locked, Some(false));
    }

    #[test]
    fn should_ignore_non_boolean_value() {
        let mut lock = VirtualLock::new("7".to_string(), true);
        assert!(!lock.handle(&Command::new(Action::SetLocked, "open")));
        assert_eq!(lock.report().locked, Some(true));
    }
}
