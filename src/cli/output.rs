//! Output formatting for events and frames

use crate::core::catalog::RegisterPoint;
use crate::core::event::PointEvent;
use clap::ValueEnum;

/// Output format for printed events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Format one event as a single line
pub fn format_event(event: &PointEvent, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => text_event(event),
        OutputFormat::Json => {
            serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
        }
    }
}

fn text_event(event: &PointEvent) -> String {
    let time = event.timestamp().format("%H:%M:%S%.3f");
    match event {
        PointEvent::ValueUpdated {
            point,
            channel,
            value,
            ..
        } => format!("{time} [{channel}] {point} = {value}"),
        PointEvent::OperationFailed {
            point,
            channel,
            operation,
            kind,
            message,
            ..
        } => format!("{time} [{channel}] {point} {operation} failed ({kind}): {message}"),
    }
}

/// Space separated hex bytes
pub fn hex_bytes(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(" ")
}

/// Format one catalog row
pub fn format_point(point: &RegisterPoint, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!(
            "{:<20} {:<12} {:<8} dev={:<3} reg={:<5} {}",
            point.name(),
            point.channel(),
            point.data_type(),
            point.device_address(),
            point.register_address(),
            if point.read_only() { "ro" } else { "rw" }
        ),
        OutputFormat::Json => serde_json::to_string(point.definition())
            .unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::{ErrorKind, Operation};
    use crate::core::protocol::Value;
    use chrono::Local;

    #[test]
    fn test_text_event() {
        let event = PointEvent::ValueUpdated {
            point: "temp".into(),
            channel: "COM1".into(),
            value: Value::Float32(100.0),
            timestamp: Local::now(),
        };
        let line = format_event(&event, OutputFormat::Text);
        assert!(line.ends_with("[COM1] temp = 100"), "{line}");

        let failed = PointEvent::OperationFailed {
            point: "sp".into(),
            channel: "COM1".into(),
            operation: Operation::Write,
            kind: ErrorKind::ReadOnlyViolation,
            message: "read only".into(),
            timestamp: Local::now(),
        };
        let line = format_event(&failed, OutputFormat::Text);
        assert!(line.contains("sp write failed"), "{line}");
    }

    #[test]
    fn test_json_event() {
        let event = PointEvent::ValueUpdated {
            point: "temp".into(),
            channel: "COM1".into(),
            value: Value::Int16(-5),
            timestamp: Local::now(),
        };
        let json: serde_json::Value = serde_json::from_str(&format_event(&event, OutputFormat::Json)).unwrap();
        assert_eq!(json["event"], "value_updated");
        assert_eq!(json["value"], -5);
    }

    #[test]
    fn test_hex_bytes() {
        assert_eq!(hex_bytes(&[0x01, 0x03, 0xC4]), "01 03 C4");
        assert_eq!(hex_bytes(&[]), "");
    }
}
