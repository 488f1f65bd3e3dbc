//! CLI Exit Codes
//!
//! Exit codes for one-shot operations and scripting.

use crate::core::event::ErrorKind;
use crate::core::transport::TransportError;
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Port could not be opened
    pub const CONNECTION_FAILED: u8 = 3;

    /// No response within the settle interval
    pub const TIMEOUT: u8 = 4;

    /// File not found
    pub const FILE_NOT_FOUND: u8 = 6;

    /// Permission denied
    pub const PERMISSION_DENIED: u8 = 7;

    /// Configuration or point table error
    pub const CONFIG_ERROR: u8 = 8;

    /// Malformed or corrupted response
    pub const PROTOCOL_ERROR: u8 = 9;

    /// Device answered with an exception
    pub const DEVICE_EXCEPTION: u8 = 10;

    /// Port not found
    pub const PORT_NOT_FOUND: u8 = 14;

    /// Value rejected before sending (type or access)
    pub const VALIDATION_FAILED: u8 = 17;

    /// Internal error
    pub const INTERNAL_ERROR: u8 = 127;

    /// Exit code for a failed point operation
    pub fn for_error_kind(kind: ErrorKind) -> u8 {
        match kind {
            ErrorKind::TypeMismatch | ErrorKind::ReadOnlyViolation => Self::VALIDATION_FAILED,
            ErrorKind::Timeout => Self::TIMEOUT,
            ErrorKind::Transport => Self::CONNECTION_FAILED,
            ErrorKind::DeviceException => Self::DEVICE_EXCEPTION,
            ErrorKind::ChecksumMismatch
            | ErrorKind::Incomplete
            | ErrorKind::Truncated
            | ErrorKind::EchoMismatch => Self::PROTOCOL_ERROR,
        }
    }

    /// Exit code for a transport that failed to open or broke
    pub fn for_transport(err: &TransportError) -> u8 {
        match err {
            TransportError::PortNotFound(_) => Self::PORT_NOT_FOUND,
            TransportError::PermissionDenied(_) => Self::PERMISSION_DENIED,
            TransportError::InvalidConfiguration(_) => Self::INVALID_ARGS,
            TransportError::ConnectionFailed(_)
            | TransportError::IoError(_)
            | TransportError::Disconnected => Self::CONNECTION_FAILED,
        }
    }
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Success without output
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Success with a message for stdout
    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success(Some(msg.into()))
    }

    /// Failure with an explicit exit code
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Bad command line input
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::INVALID_ARGS, msg.into())
    }

    /// Config file or point table problem
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::CONFIG_ERROR, msg.into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) => Some(msg),
            Self::Error(_, msg) => Some(msg),
            _ => None,
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// True for `Success`
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<TransportError> for CliResult {
    fn from(err: TransportError) -> Self {
        Self::Error(ExitCodes::for_transport(&err), err.to_string())
    }
}

impl From<std::io::Error> for CliResult {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let code = match err.kind() {
            ErrorKind::NotFound => ExitCodes::FILE_NOT_FOUND,
            ErrorKind::PermissionDenied => ExitCodes::PERMISSION_DENIED,
            ErrorKind::TimedOut => ExitCodes::TIMEOUT,
            _ => ExitCodes::ERROR,
        };

        Self::Error(code, err.to_string())
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Invalid arguments",
        3 => "Connection failed",
        4 => "No response",
        6 => "File not found",
        7 => "Permission denied",
        8 => "Configuration error",
        9 => "Protocol error",
        10 => "Device exception",
        14 => "Port not found",
        17 => "Validation failed",
        127 => "Internal error",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in [0, 1, 2, 3, 4, 6, 7, 8, 9, 10, 14, 17, 127] {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_result() {
        let success = CliResult::success();
        assert!(success.is_success());
        assert_eq!(success.code(), 0);
        assert_eq!(success.message(), None);

        let error = CliResult::invalid_args("bad hex");
        assert!(!error.is_success());
        assert_eq!(error.code(), ExitCodes::INVALID_ARGS);
        assert_eq!(error.message(), Some("bad hex"));
    }

    #[test]
    fn test_error_kind_codes() {
        assert_eq!(ExitCodes::for_error_kind(ErrorKind::Timeout), ExitCodes::TIMEOUT);
        assert_eq!(
            ExitCodes::for_error_kind(ErrorKind::ReadOnlyViolation),
            ExitCodes::VALIDATION_FAILED
        );
        assert_eq!(
            ExitCodes::for_error_kind(ErrorKind::ChecksumMismatch),
            ExitCodes::PROTOCOL_ERROR
        );
    }

    #[test]
    fn test_from_transport_error() {
        let result = CliResult::from(TransportError::PortNotFound("COM9".into()));
        assert_eq!(result.code(), ExitCodes::PORT_NOT_FOUND);
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(exit_code_description(0), "Success");
        assert_eq!(exit_code_description(10), "Device exception");
        assert_eq!(exit_code_description(200), "Unknown error");
    }
}
