//! Device identifier.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Opaque identifier of a [`Device`](crate::device::Device), stable for the
/// lifetime of the device.
///
/// Ids are carried verbatim inside broker topics and are not escaped: an id
/// containing `/` cannot be recovered from a status topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap a string, rejecting the empty id.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyDeviceId`] when `id` is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::EmptyDeviceId);
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for DeviceId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for DeviceId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_reject_empty_id() {
        assert_eq!(DeviceId::new(""), Err(ValidationError::EmptyDeviceId));
    }

    #[test]
    fn should_roundtrip_through_display_and_from_str() {
        let id = DeviceId::new("living_room_light").unwrap();
        let parsed: DeviceId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_serialize_as_plain_string() {
        let id = DeviceId::new("7").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"7\"");
        let parsed: DeviceId = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn should_compare_with_str() {
        let id = DeviceId::new("1").unwrap();
        assert_eq!(id, "1");
    }
}
