//! Serial port transport implementation

use super::{ChannelTransport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialStream, StopBits};
use tracing::debug;

/// Serial port parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    /// No parity
    #[default]
    #[serde(alias = "N", alias = "n")]
    None,
    /// Odd parity
    #[serde(alias = "O", alias = "o")]
    Odd,
    /// Even parity
    #[serde(alias = "E", alias = "e")]
    Even,
}

impl std::str::FromStr for SerialParity {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "n" => Ok(Self::None),
            "odd" | "o" => Ok(Self::Odd),
            "even" | "e" => Ok(Self::Even),
            other => Err(TransportError::InvalidConfiguration(format!("parity {other}"))),
        }
    }
}

/// Serial port configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port name (e.g., COM3, /dev/ttyUSB0)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5, 6, 7, 8)
    pub data_bits: u8,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
}

impl SerialConfig {
    /// Create a new serial configuration with 8N1 framing
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
        }
    }

    /// Set data bits
    #[must_use]
    pub fn data_bits(mut self, bits: u8) -> Self {
        self.data_bits = bits;
        self
    }

    /// Set stop bits
    #[must_use]
    pub fn stop_bits(mut self, bits: u8) -> Self {
        self.stop_bits = bits;
        self
    }

    /// Set parity
    #[must_use]
    pub fn parity(mut self, parity: SerialParity) -> Self {
        self.parity = parity;
        self
    }

    fn data_bits_setting(&self) -> Result<DataBits, TransportError> {
        match self.data_bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(TransportError::InvalidConfiguration(format!("data bits {other}"))),
        }
    }

    fn stop_bits_setting(&self) -> Result<StopBits, TransportError> {
        match self.stop_bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(TransportError::InvalidConfiguration(format!("stop bits {other}"))),
        }
    }

    fn parity_setting(&self) -> Parity {
        match self.parity {
            SerialParity::Odd => Parity::Odd,
            SerialParity::Even => Parity::Even,
            SerialParity::None => Parity::None,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new("", 9600)
    }
}

/// Serial port transport
pub struct SerialTransport {
    config: SerialConfig,
    stream: SerialStream,
}

impl SerialTransport {
    /// Open the port described by `config`
    pub fn open(config: SerialConfig) -> Result<Self, TransportError> {
        let builder = tokio_serial::new(&config.port, config.baud_rate)
            .data_bits(config.data_bits_setting()?)
            .stop_bits(config.stop_bits_setting()?)
            .parity(config.parity_setting())
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(100));

        let stream = SerialStream::open(&builder).map_err(|e| match e.kind() {
            tokio_serial::ErrorKind::NoDevice => TransportError::PortNotFound(config.port.clone()),
            tokio_serial::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                TransportError::PortNotFound(config.port.clone())
            }
            tokio_serial::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                TransportError::PermissionDenied(config.port.clone())
            }
            _ => TransportError::ConnectionFailed(e.to_string()),
        })?;

        debug!(port = %config.port, baud = config.baud_rate, "Serial port opened");
        Ok(Self { config, stream })
    }

    /// Settings the port was opened with
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

#[async_trait]
impl ChannelTransport for SerialTransport {
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        // Bytes left over from an earlier exchange would prefix this response
        self.stream
            .clear(ClearBuffer::Input)
            .map_err(std::io::Error::from)?;
        self.stream.write_all(frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        let pending = self.stream.bytes_to_read().map_err(std::io::Error::from)?;
        Ok(pending as usize)
    }

    async fn read(&mut self, max: usize) -> Result<Bytes, TransportError> {
        let mut buffer = vec![0u8; max];
        let n = self.stream.read(&mut buffer).await?;
        if n == 0 && max > 0 {
            return Err(TransportError::Disconnected);
        }
        buffer.truncate(n);
        Ok(Bytes::from(buffer))
    }

    fn connection_info(&self) -> String {
        format!(
            "{} @ {} baud ({}{}{})",
            self.config.port,
            self.config.baud_rate,
            self.config.data_bits,
            match self.config.parity {
                SerialParity::None => "N",
                SerialParity::Odd => "O",
                SerialParity::Even => "E",
            },
            self.config.stop_bits,
        )
    }
}

/// List available serial ports
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, TransportError> {
    serialport::available_ports().map_err(|e| TransportError::IoError(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity_from_str() {
        assert_eq!("N".parse::<SerialParity>().unwrap(), SerialParity::None);
        assert_eq!("even".parse::<SerialParity>().unwrap(), SerialParity::Even);
        assert!("mark".parse::<SerialParity>().is_err());
    }

    #[test]
    fn test_serial_config_settings() {
        let config = SerialConfig::new("/dev/ttyUSB0", 19200).data_bits(7).stop_bits(2);
        assert_eq!(config.data_bits_setting().unwrap(), DataBits::Seven);
        assert_eq!(config.stop_bits_setting().unwrap(), StopBits::Two);
        assert!(config.clone().data_bits(9).data_bits_setting().is_err());
        assert!(config.stop_bits(3).stop_bits_setting().is_err());
    }

    #[test]
    fn test_serial_config_toml_defaults() {
        let config: SerialConfig = toml::from_str("port = \"COM3\"\nparity = \"E\"").unwrap();
        assert_eq!(config.port, "COM3");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.parity, SerialParity::Even);
    }
}
