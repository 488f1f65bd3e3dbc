//! Modbus RTU frame codec
//!
//! Stateless translation between register points and wire frames:
//! request encoding for reads and writes, response decoding into typed
//! values, and the response-side builders a device (or the simulator) uses.

use super::checksum::{append_crc, crc16_modbus, split_crc};
use crate::core::catalog::RegisterPoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Smallest frame `decode_response` accepts: address, function, byte count, checksum
pub const MIN_RESPONSE_LEN: usize = 5;

/// Offset of the first data byte in a read response
const DATA_OFFSET: usize = 3;

/// High bit set on the function code of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Coil payload for ON in a write single coil request
const COIL_ON: u16 = 0xFF00;

/// Coil payload for OFF in a write single coil request
const COIL_OFF: u16 = 0x0000;

/// Modbus function codes used on the polling line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionCode {
    /// Read Coils (0x01)
    ReadCoils = 0x01,
    /// Read Holding Registers (0x03)
    ReadHoldingRegisters = 0x03,
    /// Write Single Coil (0x05)
    WriteSingleCoil = 0x05,
    /// Write Single Register (0x06)
    WriteSingleRegister = 0x06,
    /// Write Multiple Registers (0x10)
    WriteMultipleRegisters = 0x10,
}

impl FunctionCode {
    /// Get function code from u8
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(FunctionCode::ReadCoils),
            0x03 => Some(FunctionCode::ReadHoldingRegisters),
            0x05 => Some(FunctionCode::WriteSingleCoil),
            0x06 => Some(FunctionCode::WriteSingleRegister),
            0x10 => Some(FunctionCode::WriteMultipleRegisters),
            _ => None,
        }
    }

    /// Get name of function code
    pub fn name(&self) -> &'static str {
        match self {
            FunctionCode::ReadCoils => "Read Coils",
            FunctionCode::ReadHoldingRegisters => "Read Holding Registers",
            FunctionCode::WriteSingleCoil => "Write Single Coil",
            FunctionCode::WriteSingleRegister => "Write Single Register",
            FunctionCode::WriteMultipleRegisters => "Write Multiple Registers",
        }
    }
}

/// Modbus exception codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExceptionCode {
    /// Function code not supported (0x01)
    IllegalFunction = 0x01,
    /// Address not mapped (0x02)
    IllegalDataAddress = 0x02,
    /// Value or count out of range (0x03)
    IllegalDataValue = 0x03,
    /// Unrecoverable device error (0x04)
    SlaveDeviceFailure = 0x04,
    /// Accepted, still processing (0x05)
    Acknowledge = 0x05,
    /// Device busy (0x06)
    SlaveDeviceBusy = 0x06,
    /// Memory parity error (0x08)
    MemoryParityError = 0x08,
    /// Gateway path unavailable (0x0A)
    GatewayPathUnavailable = 0x0A,
    /// Gateway target did not respond (0x0B)
    GatewayTargetDeviceFailedToRespond = 0x0B,
}

impl ExceptionCode {
    /// Get exception from u8
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(ExceptionCode::IllegalFunction),
            0x02 => Some(ExceptionCode::IllegalDataAddress),
            0x03 => Some(ExceptionCode::IllegalDataValue),
            0x04 => Some(ExceptionCode::SlaveDeviceFailure),
            0x05 => Some(ExceptionCode::Acknowledge),
            0x06 => Some(ExceptionCode::SlaveDeviceBusy),
            0x08 => Some(ExceptionCode::MemoryParityError),
            0x0A => Some(ExceptionCode::GatewayPathUnavailable),
            0x0B => Some(ExceptionCode::GatewayTargetDeviceFailedToRespond),
            _ => None,
        }
    }

    /// Get name of exception
    pub fn name(&self) -> &'static str {
        match self {
            ExceptionCode::IllegalFunction => "Illegal Function",
            ExceptionCode::IllegalDataAddress => "Illegal Data Address",
            ExceptionCode::IllegalDataValue => "Illegal Data Value",
            ExceptionCode::SlaveDeviceFailure => "Slave Device Failure",
            ExceptionCode::Acknowledge => "Acknowledge",
            ExceptionCode::SlaveDeviceBusy => "Slave Device Busy",
            ExceptionCode::MemoryParityError => "Memory Parity Error",
            ExceptionCode::GatewayPathUnavailable => "Gateway Path Unavailable",
            ExceptionCode::GatewayTargetDeviceFailedToRespond => "Gateway Target Failed to Respond",
        }
    }
}

fn exception_name(code: u8) -> &'static str {
    ExceptionCode::from_u8(code).map_or("Unknown Exception", |e| e.name())
}

/// Register data type of a point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Single coil
    Bool,
    /// Signed 16-bit holding register
    Int16,
    /// IEEE-754 float spanning two holding registers
    Float32,
}

impl DataType {
    /// Function code used to read this type
    pub fn read_function(&self) -> FunctionCode {
        match self {
            DataType::Bool => FunctionCode::ReadCoils,
            DataType::Int16 | DataType::Float32 => FunctionCode::ReadHoldingRegisters,
        }
    }

    /// Function code used to write this type
    pub fn write_function(&self) -> FunctionCode {
        match self {
            DataType::Bool => FunctionCode::WriteSingleCoil,
            DataType::Int16 => FunctionCode::WriteSingleRegister,
            DataType::Float32 => FunctionCode::WriteMultipleRegisters,
        }
    }

    /// Number of registers (or coils) the value spans
    pub fn register_count(&self) -> u16 {
        match self {
            DataType::Bool | DataType::Int16 => 1,
            DataType::Float32 => 2,
        }
    }

    /// Number of data bytes the decoded value occupies in a read response
    pub fn value_width(&self) -> usize {
        match self {
            DataType::Bool => 1,
            DataType::Int16 => 2,
            DataType::Float32 => 4,
        }
    }

    /// Lowercase name as used in point tables
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int16 => "int16",
            DataType::Float32 => "float32",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for DataType {
    type Err = ValueParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bool" | "boolean" | "coil" => Ok(DataType::Bool),
            "int16" | "i16" => Ok(DataType::Int16),
            "float32" | "f32" | "float" => Ok(DataType::Float32),
            other => Err(ValueParseError::UnknownDataType(other.to_string())),
        }
    }
}

/// A decoded (or to-be-written) register value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Coil state
    Bool(bool),
    /// One holding register, two's complement
    Int16(i16),
    /// Two holding registers, high word first
    Float32(f32),
}

impl Value {
    /// Data type carried by this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Bool(_) => DataType::Bool,
            Value::Int16(_) => DataType::Int16,
            Value::Float32(_) => DataType::Float32,
        }
    }

    /// Parse user text as a value of `data_type`
    pub fn parse(data_type: DataType, text: &str) -> Result<Self, ValueParseError> {
        let text = text.trim();
        let invalid = || ValueParseError::Invalid {
            data_type,
            text: text.to_string(),
        };
        match data_type {
            DataType::Bool => match text.to_lowercase().as_str() {
                "true" | "1" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "off" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            DataType::Int16 => text.parse().map(Value::Int16).map_err(|_| invalid()),
            DataType::Float32 => text.parse().map(Value::Float32).map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
        }
    }
}

/// Value parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueParseError {
    /// Unknown data type name
    #[error("Unknown data type: {0}")]
    UnknownDataType(String),

    /// Text is not a valid value of the type
    #[error("Invalid {data_type} value: {text:?}")]
    Invalid {
        /// Type the text was parsed as
        data_type: DataType,
        /// Rejected text
        text: String,
    },
}

/// Request encoding errors. Both are raised before anything reaches the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Value type does not match the point's data type
    #[error("Type mismatch: point is {expected}, value is {actual}")]
    TypeMismatch {
        /// Point's data type
        expected: DataType,
        /// Type of the value offered
        actual: DataType,
    },

    /// Point is read-only
    #[error("Point {0} is read-only")]
    ReadOnlyViolation(String),
}

/// Response decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes than the minimum frame
    #[error("Incomplete frame: {len} bytes")]
    Incomplete {
        /// Bytes received
        len: usize,
    },

    /// Trailing checksum does not match the frame body
    #[error("CRC mismatch: received {received:04X}, calculated {calculated:04X}")]
    ChecksumMismatch {
        /// CRC carried by the frame
        received: u16,
        /// CRC of the frame body
        calculated: u16,
    },

    /// Payload shorter than declared or expected
    #[error("Truncated frame: need {needed} data bytes, {available} available")]
    Truncated {
        /// Data bytes required
        needed: usize,
        /// Data bytes present
        available: usize,
    },

    /// Device answered with an exception response
    #[error("Device exception on function {function:02X}: {code:02X} ({})", exception_name(*code))]
    Exception {
        /// Function code with the exception flag set
        function: u8,
        /// Exception code, see [`ExceptionCode`]
        code: u8,
    },

    /// Echoed address or function differs from the request
    #[error("Echo mismatch: expected {expected_address:02X}/{expected_function:02X}, got {address:02X}/{function:02X}")]
    EchoMismatch {
        /// Device address of the request
        expected_address: u8,
        /// Function code of the request
        expected_function: u8,
        /// Device address in the response
        address: u8,
        /// Function code in the response
        function: u8,
    },
}

// ============ Request side ============

fn header(device_address: u8, function: FunctionCode, register_address: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(13);
    frame.push(device_address);
    frame.push(function as u8);
    frame.extend_from_slice(&register_address.to_be_bytes());
    frame
}

/// Build the read request for a point
pub fn encode_read(point: &RegisterPoint) -> Vec<u8> {
    let data_type = point.data_type();
    let mut frame = header(
        point.device_address(),
        data_type.read_function(),
        point.register_address(),
    );
    frame.extend_from_slice(&data_type.register_count().to_be_bytes());
    append_crc(&mut frame);
    frame
}

/// Build the write request for a point
pub fn encode_write(point: &RegisterPoint, value: Value) -> Result<Vec<u8>, EncodeError> {
    let data_type = point.data_type();
    if value.data_type() != data_type {
        return Err(EncodeError::TypeMismatch {
            expected: data_type,
            actual: value.data_type(),
        });
    }
    if point.read_only() {
        return Err(EncodeError::ReadOnlyViolation(point.name().to_string()));
    }

    let mut frame = header(
        point.device_address(),
        data_type.write_function(),
        point.register_address(),
    );
    match value {
        Value::Bool(on) => {
            let payload = if on { COIL_ON } else { COIL_OFF };
            frame.extend_from_slice(&payload.to_be_bytes());
        }
        Value::Int16(v) => frame.extend_from_slice(&v.to_be_bytes()),
        Value::Float32(v) => {
            frame.extend_from_slice(&data_type.register_count().to_be_bytes());
            frame.push(4);
            frame.extend_from_slice(&v.to_be_bytes());
        }
    }
    append_crc(&mut frame);
    Ok(frame)
}

// ============ Response side ============

fn check_frame(raw: &[u8]) -> Result<(), DecodeError> {
    if raw.len() < MIN_RESPONSE_LEN {
        return Err(DecodeError::Incomplete { len: raw.len() });
    }
    let (body, received) = split_crc(raw).ok_or(DecodeError::Incomplete { len: raw.len() })?;
    let calculated = crc16_modbus(body);
    if received != calculated {
        return Err(DecodeError::ChecksumMismatch {
            received,
            calculated,
        });
    }
    if raw[1] & EXCEPTION_FLAG != 0 {
        return Err(DecodeError::Exception {
            function: raw[1] & !EXCEPTION_FLAG,
            code: raw[2],
        });
    }
    Ok(())
}

/// Decode a read response into a value of `expected`.
///
/// The echoed address and function code are not checked here; see [`check_echo`].
pub fn decode_response(raw: &[u8], expected: DataType) -> Result<Value, DecodeError> {
    check_frame(raw)?;

    let available = raw.len() - DATA_OFFSET - 2;
    let declared = usize::from(raw[2]);
    let needed = expected.value_width();
    if declared > available || needed > available {
        return Err(DecodeError::Truncated {
            needed: needed.max(declared),
            available,
        });
    }

    let data = &raw[DATA_OFFSET..DATA_OFFSET + needed];
    let value = match expected {
        DataType::Bool => Value::Bool(data[0] != 0),
        DataType::Int16 => Value::Int16(i16::from_be_bytes([data[0], data[1]])),
        DataType::Float32 => Value::Float32(f32::from_be_bytes([data[0], data[1], data[2], data[3]])),
    };
    Ok(value)
}

/// Validate a write acknowledgement: length, checksum and exception flag only
pub fn decode_ack(raw: &[u8]) -> Result<(), DecodeError> {
    check_frame(raw)
}

/// Compare a response's device address and function code against its request
pub fn check_echo(request: &[u8], response: &[u8]) -> Result<(), DecodeError> {
    let (Some(&expected_address), Some(&expected_function)) = (request.first(), request.get(1)) else {
        return Ok(());
    };
    let (Some(&address), Some(&function)) = (response.first(), response.get(1)) else {
        return Err(DecodeError::Incomplete { len: response.len() });
    };
    if address != expected_address || function & !EXCEPTION_FLAG != expected_function {
        return Err(DecodeError::EchoMismatch {
            expected_address,
            expected_function,
            address,
            function,
        });
    }
    Ok(())
}

/// Build a read response frame carrying `data`
pub fn encode_read_response(device_address: u8, function: u8, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(data.len() + 5);
    frame.push(device_address);
    frame.push(function);
    frame.push(data.len() as u8);
    frame.extend_from_slice(data);
    append_crc(&mut frame);
    frame
}

/// Build the response a device sends when a point holding `value` is read
pub fn encode_read_ack(device_address: u8, value: Value) -> Vec<u8> {
    let function = value.data_type().read_function() as u8;
    match value {
        Value::Bool(on) => encode_read_response(device_address, function, &[u8::from(on)]),
        Value::Int16(v) => encode_read_response(device_address, function, &v.to_be_bytes()),
        Value::Float32(v) => encode_read_response(device_address, function, &v.to_be_bytes()),
    }
}

/// Build the acknowledgement a device sends for a write request.
///
/// Single writes echo address and payload; write multiple echoes address and quantity.
pub fn encode_write_ack(request: &[u8]) -> Vec<u8> {
    let mut frame = request[..request.len().min(6)].to_vec();
    append_crc(&mut frame);
    frame
}

/// Build an exception response
pub fn encode_exception(device_address: u8, function: u8, code: ExceptionCode) -> Vec<u8> {
    let mut frame = vec![device_address, function | EXCEPTION_FLAG, code as u8];
    append_crc(&mut frame);
    frame
}

/// Format a frame for logs and display
pub fn format_frame(data: &[u8]) -> String {
    if data.len() < 4 {
        return format!("RTU: invalid frame {}", hex::encode(data));
    }
    let function = match FunctionCode::from_u8(data[1] & 0x7F) {
        Some(code) if data[1] & 0x80 != 0 => format!(" ({} exception)", code.name()),
        Some(code) => format!(" ({})", code.name()),
        None => String::new(),
    };
    format!(
        "RTU: Slave={:02X} Func={:02X}{} Data={} CRC={:04X}",
        data[0],
        data[1],
        function,
        hex::encode(&data[2..data.len() - 2]),
        u16::from_le_bytes([data[data.len() - 2], data[data.len() - 1]])
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::PointDefinition;

    fn point(data_type: DataType, device_address: u8, register_address: u16, read_only: bool) -> RegisterPoint {
        RegisterPoint::new(PointDefinition {
            name: "p".to_string(),
            channel: "COM1".to_string(),
            data_type,
            device_address,
            register_address,
            read_only,
        })
    }

    #[test]
    fn test_encode_read_float32() {
        let frame = encode_read(&point(DataType::Float32, 0x01, 0x0000, false));
        assert_eq!(frame, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B]);
    }

    #[test]
    fn test_encode_read_function_and_count() {
        let bool_frame = encode_read(&point(DataType::Bool, 0x11, 0x0013, true));
        assert_eq!(bool_frame, vec![0x11, 0x01, 0x00, 0x13, 0x00, 0x01, 0x0E, 0x9F]);

        let int_frame = encode_read(&point(DataType::Int16, 0x01, 0x0000, true));
        assert_eq!(int_frame, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A]);
    }

    #[test]
    fn test_encode_write_coil() {
        let p = point(DataType::Bool, 0x01, 0x000A, false);
        assert_eq!(
            encode_write(&p, Value::Bool(true)).unwrap(),
            vec![0x01, 0x05, 0x00, 0x0A, 0xFF, 0x00, 0xAC, 0x38]
        );
        assert_eq!(
            encode_write(&p, Value::Bool(false)).unwrap(),
            vec![0x01, 0x05, 0x00, 0x0A, 0x00, 0x00, 0xED, 0xC8]
        );
    }

    #[test]
    fn test_encode_write_int16_negative() {
        let p = point(DataType::Int16, 0x01, 0x0001, false);
        assert_eq!(
            encode_write(&p, Value::Int16(-123)).unwrap(),
            vec![0x01, 0x06, 0x00, 0x01, 0xFF, 0x85, 0x58, 0x59]
        );
    }

    #[test]
    fn test_encode_write_float32_multiple() {
        let p = point(DataType::Float32, 0x01, 0x0010, false);
        assert_eq!(
            encode_write(&p, Value::Float32(100.0)).unwrap(),
            vec![0x01, 0x10, 0x00, 0x10, 0x00, 0x02, 0x04, 0x42, 0xC8, 0x00, 0x00, 0x67, 0x25]
        );
    }

    #[test]
    fn test_encode_write_rejections() {
        let p = point(DataType::Int16, 0x01, 0x0001, false);
        assert_eq!(
            encode_write(&p, Value::Float32(1.0)),
            Err(EncodeError::TypeMismatch {
                expected: DataType::Int16,
                actual: DataType::Float32
            })
        );

        let ro = point(DataType::Int16, 0x01, 0x0001, true);
        assert_eq!(
            encode_write(&ro, Value::Int16(1)),
            Err(EncodeError::ReadOnlyViolation("p".to_string()))
        );
    }

    #[test]
    fn test_decode_float32_response() {
        let raw = [0x01, 0x03, 0x04, 0x42, 0xC8, 0x00, 0x00, 0x6F, 0xB5];
        assert_eq!(decode_response(&raw, DataType::Float32), Ok(Value::Float32(100.0)));
    }

    #[test]
    fn test_decode_int16_signed() {
        let raw = [0x02, 0x03, 0x02, 0xFF, 0x85, 0x7C, 0x17];
        assert_eq!(decode_response(&raw, DataType::Int16), Ok(Value::Int16(-123)));
    }

    #[test]
    fn test_decode_bool() {
        let raw = [0x11, 0x01, 0x01, 0x01, 0x94, 0x88];
        assert_eq!(decode_response(&raw, DataType::Bool), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_decode_read_ack_round_trip() {
        for value in [
            Value::Bool(true),
            Value::Bool(false),
            Value::Int16(i16::MIN),
            Value::Int16(32767),
            Value::Float32(-0.15625),
            Value::Float32(f32::MAX),
        ] {
            let raw = encode_read_ack(0x07, value);
            assert_eq!(decode_response(&raw, value.data_type()), Ok(value));
        }
        let nan = encode_read_ack(0x07, Value::Float32(f32::NAN));
        match decode_response(&nan, DataType::Float32) {
            Ok(Value::Float32(v)) => assert_eq!(v.to_bits(), f32::NAN.to_bits()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_incomplete() {
        assert_eq!(
            decode_response(&[0x01, 0x03, 0x02, 0x00], DataType::Int16),
            Err(DecodeError::Incomplete { len: 4 })
        );
        assert_eq!(decode_response(&[], DataType::Bool), Err(DecodeError::Incomplete { len: 0 }));
    }

    #[test]
    fn test_decode_truncated() {
        // Valid checksum, but only two data bytes for a float
        let raw = encode_read_response(0x01, 0x03, &[0x42, 0xC8]);
        assert_eq!(
            decode_response(&raw, DataType::Float32),
            Err(DecodeError::Truncated { needed: 4, available: 2 })
        );

        // Byte count claims more than is present
        let mut raw = vec![0x01, 0x03, 0x04, 0x00, 0x10];
        append_crc(&mut raw);
        assert!(matches!(
            decode_response(&raw, DataType::Int16),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_single_bit_flip_is_checksum_mismatch() {
        let valid = [0x01, 0x03, 0x04, 0x42, 0xC8, 0x00, 0x00, 0x6F, 0xB5];
        for byte in 0..valid.len() {
            for bit in 0..8 {
                let mut corrupted = valid;
                corrupted[byte] ^= 1 << bit;
                assert!(
                    matches!(
                        decode_response(&corrupted, DataType::Float32),
                        Err(DecodeError::ChecksumMismatch { .. })
                    ),
                    "byte {byte} bit {bit}"
                );
            }
        }
    }

    #[test]
    fn test_decode_exception() {
        let raw = encode_exception(0x01, 0x03, ExceptionCode::IllegalDataAddress);
        assert_eq!(
            decode_response(&raw, DataType::Int16),
            Err(DecodeError::Exception { function: 0x03, code: 0x02 })
        );
        assert!(decode_ack(&raw).is_err());
    }

    #[test]
    fn test_decode_ack() {
        let request = encode_write(&point(DataType::Float32, 0x01, 0x0010, false), Value::Float32(100.0)).unwrap();
        let ack = encode_write_ack(&request);
        assert_eq!(ack, vec![0x01, 0x10, 0x00, 0x10, 0x00, 0x02, 0x40, 0x0D]);
        assert_eq!(decode_ack(&ack), Ok(()));
    }

    #[test]
    fn test_decode_does_not_check_echo() {
        // Answer from another device still decodes
        let request = encode_read(&point(DataType::Int16, 0x01, 0x0000, true));
        let response = encode_read_ack(0x09, Value::Int16(5));
        assert_eq!(decode_response(&response, DataType::Int16), Ok(Value::Int16(5)));
        assert!(matches!(
            check_echo(&request, &response),
            Err(DecodeError::EchoMismatch { address: 0x09, .. })
        ));
        let own = encode_read_ack(0x01, Value::Int16(5));
        assert_eq!(check_echo(&request, &own), Ok(()));
    }

    #[test]
    fn test_value_parse() {
        assert_eq!(Value::parse(DataType::Bool, "on"), Ok(Value::Bool(true)));
        assert_eq!(Value::parse(DataType::Bool, "0"), Ok(Value::Bool(false)));
        assert_eq!(Value::parse(DataType::Int16, " -42 "), Ok(Value::Int16(-42)));
        assert_eq!(Value::parse(DataType::Float32, "1.5"), Ok(Value::Float32(1.5)));
        assert!(Value::parse(DataType::Int16, "40000").is_err());
        assert!(Value::parse(DataType::Bool, "maybe").is_err());
    }

    #[test]
    fn test_data_type_from_str() {
        assert_eq!("Float32".parse::<DataType>(), Ok(DataType::Float32));
        assert_eq!("bool".parse::<DataType>(), Ok(DataType::Bool));
        assert!("int32".parse::<DataType>().is_err());
    }

    #[test]
    fn test_format_frame() {
        let text = format_frame(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B]);
        assert_eq!(text, "RTU: Slave=01 Func=03 (Read Holding Registers) Data=00000002 CRC=0BC4");

        let text = format_frame(&[0x01, 0x86, 0x02, 0xC3, 0xA1]);
        assert!(text.starts_with("RTU: Slave=01 Func=86 (Write Single Register exception) Data=02 "));

        let text = format_frame(&[0x01, 0x2B, 0x00, 0x00]);
        assert_eq!(text, "RTU: Slave=01 Func=2B Data= CRC=0000");
    }
}
