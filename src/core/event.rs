//! Point events emitted by channel schedulers
//!
//! The display layer consumes these instead of holding references into
//! the scheduler.

use crate::core::protocol::Value;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of an exchange failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Poll or confirmation read
    Read,
    /// External write
    Write,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// Classification of a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Value type differs from the point's data type
    TypeMismatch,
    /// Write to a read-only point
    ReadOnlyViolation,
    /// Response checksum mismatch
    ChecksumMismatch,
    /// Response shorter than the minimum frame
    Incomplete,
    /// Response payload shorter than required
    Truncated,
    /// No bytes within the settle interval
    Timeout,
    /// Underlying link failure
    Transport,
    /// Device returned an exception response
    DeviceException,
    /// Response came from a different address or function (strict echo only)
    EchoMismatch,
}

impl ErrorKind {
    /// Get name of error kind
    pub fn name(&self) -> &'static str {
        match self {
            Self::TypeMismatch => "type mismatch",
            Self::ReadOnlyViolation => "read-only violation",
            Self::ChecksumMismatch => "checksum mismatch",
            Self::Incomplete => "incomplete frame",
            Self::Truncated => "truncated frame",
            Self::Timeout => "timeout",
            Self::Transport => "transport error",
            Self::DeviceException => "device exception",
            Self::EchoMismatch => "echo mismatch",
        }
    }

    /// True for errors raised before anything was sent. These are
    /// rejected requests, not bus faults, and are logged at info level.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::TypeMismatch | Self::ReadOnlyViolation)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Event delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PointEvent {
    /// A read decoded successfully
    ValueUpdated {
        /// Point name
        point: String,
        /// Channel id
        channel: String,
        /// Decoded value
        value: Value,
        /// When the response was decoded
        timestamp: DateTime<Local>,
    },
    /// A read or write failed; the point's stored value is unchanged
    OperationFailed {
        /// Point name
        point: String,
        /// Channel id
        channel: String,
        /// Read or write
        operation: Operation,
        /// Failure class
        kind: ErrorKind,
        /// Full error text
        message: String,
        /// When the failure was detected
        timestamp: DateTime<Local>,
    },
}

impl PointEvent {
    /// Name of the point the event refers to
    pub fn point(&self) -> &str {
        match self {
            Self::ValueUpdated { point, .. } | Self::OperationFailed { point, .. } => point,
        }
    }

    /// Channel id
    pub fn channel(&self) -> &str {
        match self {
            Self::ValueUpdated { channel, .. } | Self::OperationFailed { channel, .. } => channel,
        }
    }

    /// When the event was produced
    pub fn timestamp(&self) -> DateTime<Local> {
        match self {
            Self::ValueUpdated { timestamp, .. } | Self::OperationFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Error kind, for failure events
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::OperationFailed { kind, .. } => Some(*kind),
            Self::ValueUpdated { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = PointEvent::OperationFailed {
            point: "temp".to_string(),
            channel: "COM3".to_string(),
            operation: Operation::Read,
            kind: ErrorKind::Timeout,
            message: "no response".to_string(),
            timestamp: Local::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "operation_failed");
        assert_eq!(json["kind"], "timeout");
        assert_eq!(json["operation"], "read");
        assert_eq!(event.point(), "temp");
        assert_eq!(event.error_kind(), Some(ErrorKind::Timeout));
    }

    #[test]
    fn test_value_event_json() {
        let event = PointEvent::ValueUpdated {
            point: "run".to_string(),
            channel: "COM3".to_string(),
            value: Value::Bool(true),
            timestamp: Local::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "value_updated");
        assert_eq!(json["value"], true);
        assert_eq!(event.error_kind(), None);
    }

    #[test]
    fn test_local_kinds() {
        assert!(ErrorKind::ReadOnlyViolation.is_local());
        assert!(ErrorKind::TypeMismatch.is_local());
        assert!(!ErrorKind::Timeout.is_local());
    }
}
