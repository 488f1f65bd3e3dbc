//! Transport layer for polling channels
//!
//! A channel transport is one half-duplex link shared by every device on
//! it. The scheduler only needs three things from it: send a whole frame,
//! ask how many bytes arrived, and take them.

mod serial;

pub use serial::{list_ports, SerialConfig, SerialParity, SerialTransport};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Disconnected
    #[error("Disconnected")]
    Disconnected,
}

/// Byte-oriented half-duplex link consumed by the poll scheduler
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelTransport: Send {
    /// Write the whole frame
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Number of received bytes waiting to be read
    fn bytes_available(&mut self) -> Result<usize, TransportError>;

    /// Take up to `max` received bytes
    async fn read(&mut self, max: usize) -> Result<Bytes, TransportError>;

    /// Get connection info string
    fn connection_info(&self) -> String;
}

/// Open the serial transport described by `config`
pub fn open_serial(config: SerialConfig) -> Result<Box<dyn ChannelTransport>, TransportError> {
    let transport = SerialTransport::open(config)?;
    Ok(Box::new(transport))
}
