//! Common error types used across the workspace.
//!
//! Each failure class of the synchronization client has its own type so that
//! callers can tell a rejected command apart from a dropped inbound message.

use crate::command::Action;
use crate::device::DeviceKind;

/// A value or command that breaks a domain invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("device id must not be empty")]
    EmptyDeviceId,

    #[error("device name must not be empty")]
    EmptyName,

    #[error("device kind is required")]
    MissingKind,

    #[error("unknown device kind {0:?}")]
    UnknownKind(String),

    #[error("unknown device status {0:?}")]
    UnknownStatus(String),

    #[error("unknown action {0:?}")]
    UnknownAction(String),

    #[error("action {action} is not supported by {kind} devices")]
    UnsupportedAction { kind: DeviceKind, action: Action },

    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("action {action} expects {expected}")]
    InvalidValue {
        action: Action,
        expected: &'static str,
    },

    #[error("device {device_id} is a {actual}, not a {expected}")]
    KindMismatch {
        device_id: String,
        /// Kind named by the caller.
        expected: DeviceKind,
        /// Kind the device is registered as.
        actual: DeviceKind,
    },

    #[error("device {0} is declared more than once")]
    DuplicateDevice(String),
}

/// A topic that does not follow the `{root}/{type}/{id}/{suffix}` shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed topic {topic:?}: {reason}")]
pub struct MalformedTopic {
    pub topic: String,
    pub reason: &'static str,
}

/// An inbound payload that could not be turned into a device update.
#[derive(Debug, thiserror::Error)]
pub enum MalformedPayload {
    /// The bytes are not a JSON object of the expected shape.
    #[error("payload is not a valid status document")]
    Json(#[source] serde_json::Error),

    /// A field parsed but holds a value the device model rejects.
    #[error("payload field `{field}` is invalid")]
    Field {
        field: &'static str,
        #[source]
        source: ValidationError,
    },
}

/// A lookup that found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}
