//! Protocol implementations
//!
//! Provides the Modbus RTU frame codec and its checksum:
//! - Request encoding for reads and writes
//! - Response decoding into typed values
//! - CRC-16/Modbus

pub mod checksum;
pub mod modbus;

pub use checksum::crc16_modbus;
pub use modbus::{
    check_echo, decode_ack, decode_response, encode_exception, encode_read, encode_read_ack,
    encode_read_response, encode_write, encode_write_ack, format_frame, DataType, DecodeError,
    EncodeError, ExceptionCode, FunctionCode, Value, ValueParseError,
};
