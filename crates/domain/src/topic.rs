//! Broker topic namespace.
//!
//! ```text
//! {root}/{device_type}/{device_id}/status    device → dashboard
//! {root}/{device_type}/{device_id}/command   dashboard → device
//! ```
//!
//! Segments are not escaped. A device type or id containing `/` yields a
//! topic that [`TopicNamespace::parse_status_topic`] rejects.

use crate::error::MalformedTopic;

/// Root used by the deployed fleet: a namespace plus a version segment.
pub const DEFAULT_ROOT: &str = "smart_home/v1";

const STATUS_SUFFIX: &str = "status";
const COMMAND_SUFFIX: &str = "command";

/// Device identity recovered from a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAddress {
    pub device_type: String,
    pub device_id: String,
}

/// Builds and parses topics under a fixed root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicNamespace {
    root: String,
}

impl Default for TopicNamespace {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

impl TopicNamespace {
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        Self {
            root: root.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Wildcard filter matching the status topic of every device.
    #[must_use]
    pub fn status_subscription(&self) -> String {
        format!("{}/+/+/{STATUS_SUFFIX}", self.root)
    }

    #[must_use]
    pub fn status_topic(&self, device_type: &str, device_id: &str) -> String {
        format!("{}/{device_type}/{device_id}/{STATUS_SUFFIX}", self.root)
    }

    #[must_use]
    pub fn command_topic(&self, device_type: &str, device_id: &str) -> String {
        format!("{}/{device_type}/{device_id}/{COMMAND_SUFFIX}", self.root)
    }

    /// Recover the device identity from a status topic.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedTopic`] when the topic is outside the root, does
    /// not have exactly two segments between root and suffix, or does not
    /// end in `status`.
    pub fn parse_status_topic(&self, topic: &str) -> Result<DeviceAddress, MalformedTopic> {
        self.parse(topic, STATUS_SUFFIX)
    }

    /// Recover the device identity from a command topic.
    ///
    /// # Errors
    ///
    /// Same rules as [`parse_status_topic`](Self::parse_status_topic), with
    /// the `command` suffix.
    pub fn parse_command_topic(&self, topic: &str) -> Result<DeviceAddress, MalformedTopic> {
        self.parse(topic, COMMAND_SUFFIX)
    }

    fn parse(&self, topic: &str, suffix: &str) -> Result<DeviceAddress, MalformedTopic> {
        let malformed = |reason| MalformedTopic {
            topic: topic.to_string(),
            reason,
        };

        let rest = topic
            .strip_prefix(self.root.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| malformed("outside the namespace root"))?;

        let segments: Vec<&str> = rest.split('/').collect();
        let [device_type, device_id, last] = segments.as_slice() else {
            return Err(malformed("unexpected segment count"));
        };
        if *last != suffix {
            return Err(malformed("unexpected topic suffix"));
        }
        if device_type.is_empty() || device_id.is_empty() {
            return Err(malformed("empty device segment"));
        }

        Ok(DeviceAddress {
            device_type: (*device_type).to_string(),
            device_id: (*device_id).to_string(),
        })
    }
}

/// MQTT topic filter matching with `+` (one level) and `#` (remaining
/// levels) wildcards.
#[must_use]
pub fn matches_filter(filter: &str, topic: &str) -> bool {
    let mut topic_levels = topic.split('/');
    for level in filter.split('/') {
        match level {
            "#" => return true,
            "+" => {
                if topic_levels.next().is_none() {
                    return false;
                }
            }
            literal => {
                if topic_levels.next() != Some(literal) {
                    return false;
                }
            }
        }
    }
    topic_levels.next().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_status_subscription_under_root() {
        let ns = TopicNamespace::default();
        assert_eq!(ns.status_subscription(), "smart_home/v1/+/+/status");
    }

    #[test]
    fn should_build_command_topic() {
        let ns = TopicNamespace::default();
        assert_eq!(
            ns.command_topic("light", "1"),
            "smart_home/v1/light/1/command"
        );
    }

    #[test]
    fn should_trim_trailing_slash_from_root() {
        let ns = TopicNamespace::new("home/v2/");
        assert_eq!(ns.status_subscription(), "home/v2/+/+/status");
    }

    #[test]
    fn should_parse_status_topic() {
        let ns = TopicNamespace::default();
        let addr = ns
            .parse_status_topic("smart_home/v1/fan/bedroom_fan/status")
            .unwrap();
        assert_eq!(addr.device_type, "fan");
        assert_eq!(addr.device_id, "bedroom_fan");
    }

    #[test]
    fn should_roundtrip_every_type_and_id_without_slash() {
        let ns = TopicNamespace::default();
        for device_type in ["light", "fan", "ac", "lock", "camera", "sensor", "x-y"] {
            for device_id in ["1", "10", "living_room_light", "a.b", "+"] {
                let topic = ns.status_topic(device_type, device_id);
                assert!(matches_filter(&ns.status_subscription(), &topic));
                let addr = ns.parse_status_topic(&topic).unwrap();
                assert_eq!(addr.device_type, device_type);
                assert_eq!(addr.device_id, device_id);
            }
        }
    }

    #[test]
    fn should_reject_wrong_segment_count() {
        let ns = TopicNamespace::default();
        let err = ns
            .parse_status_topic("smart_home/v1/light/status")
            .unwrap_err();
        assert_eq!(err.reason, "unexpected segment count");
    }

    #[test]
    fn should_reject_id_containing_slash() {
        let ns = TopicNamespace::default();
        let topic = ns.status_topic("light", "floor/1");
        assert!(ns.parse_status_topic(&topic).is_err());
    }

    #[test]
    fn should_reject_topic_outside_root() {
        let ns = TopicNamespace::default();
        let err = ns.parse_status_topic("other/v1/light/1/status").unwrap_err();
        assert_eq!(err.reason, "outside the namespace root");
    }

    #[test]
    fn should_reject_command_topic_as_status() {
        let ns = TopicNamespace::default();
        let topic = ns.command_topic("light", "1");
        assert!(ns.parse_status_topic(&topic).is_err());
        assert!(ns.parse_command_topic(&topic).is_ok());
    }

    #[test]
    fn should_match_wildcard_filters() {
        assert!(matches_filter("a/+/c", "a/b/c"));
        assert!(!matches_filter("a/+/c", "a/b/d"));
        assert!(!matches_filter("a/+", "a/b/c"));
        assert!(matches_filter("a/#", "a/b/c"));
        assert!(matches_filter("#", "anything/at/all"));
        assert!(!matches_filter("a/b/c", "a/b"));
    }
}
