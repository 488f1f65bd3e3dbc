//! Simulated multi-drop bus
//!
//! An in-memory [`ChannelTransport`] with Modbus slaves attached. Each
//! device keeps coils and holding registers and answers the function codes
//! the poller uses. Faults (dropped or corrupted responses) can be injected
//! by probability or for the next N responses.

use crate::core::catalog::RegisterPoint;
use crate::core::protocol::checksum::verify_frame;
use crate::core::protocol::modbus::{
    encode_exception, encode_read_response, encode_write_ack, ExceptionCode, FunctionCode,
};
use crate::core::protocol::{DataType, Value};
use crate::core::transport::{ChannelTransport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Largest coil count a single read may ask for
const MAX_READ_COILS: u16 = 2000;

/// Largest register count a single read may ask for
const MAX_READ_REGISTERS: u16 = 125;

/// A simulated slave device
#[derive(Debug, Clone, Default)]
pub struct SimulatedDevice {
    address: u8,
    coils: HashMap<u16, bool>,
    registers: HashMap<u16, u16>,
}

impl SimulatedDevice {
    /// Create a device with no coils or registers
    pub fn new(address: u8) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    /// Slave address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Add a coil
    #[must_use]
    pub fn with_coil(mut self, address: u16, state: bool) -> Self {
        self.coils.insert(address, state);
        self
    }

    /// Add a holding register
    #[must_use]
    pub fn with_register(mut self, address: u16, value: u16) -> Self {
        self.registers.insert(address, value);
        self
    }

    /// Store a typed value at `address` (floats take two registers, high word first)
    #[must_use]
    pub fn with_value(mut self, address: u16, value: Value) -> Self {
        self.set_value(address, value);
        self
    }

    /// Store a typed value at `address`
    pub fn set_value(&mut self, address: u16, value: Value) {
        match value {
            Value::Bool(state) => {
                self.coils.insert(address, state);
            }
            Value::Int16(v) => {
                self.registers.insert(address, v as u16);
            }
            Value::Float32(v) => {
                let bits = v.to_bits();
                self.registers.insert(address, (bits >> 16) as u16);
                self.registers.insert(address.wrapping_add(1), bits as u16);
            }
        }
    }

    /// Read a typed value at `address`
    pub fn value(&self, address: u16, data_type: DataType) -> Option<Value> {
        match data_type {
            DataType::Bool => self.coils.get(&address).copied().map(Value::Bool),
            DataType::Int16 => self.registers.get(&address).map(|&r| Value::Int16(r as i16)),
            DataType::Float32 => {
                let hi = *self.registers.get(&address)?;
                let lo = *self.registers.get(&address.wrapping_add(1))?;
                Some(Value::Float32(f32::from_bits((u32::from(hi) << 16) | u32::from(lo))))
            }
        }
    }

    /// Answer a checksum-valid request (checksum included) addressed to this device
    fn handle(&mut self, request: &[u8]) -> Vec<u8> {
        let function = request[1];
        let Some(code) = FunctionCode::from_u8(function) else {
            return encode_exception(self.address, function, ExceptionCode::IllegalFunction);
        };
        if request.len() < 8 {
            return encode_exception(self.address, function, ExceptionCode::IllegalDataValue);
        }
        let start = u16::from_be_bytes([request[2], request[3]]);
        let operand = u16::from_be_bytes([request[4], request[5]]);

        let result = match code {
            FunctionCode::ReadCoils => self.read_coils(start, operand),
            FunctionCode::ReadHoldingRegisters => self.read_registers(start, operand),
            FunctionCode::WriteSingleCoil => self.write_coil(start, operand),
            FunctionCode::WriteSingleRegister => self.write_register(start, operand),
            FunctionCode::WriteMultipleRegisters => self.write_registers(start, operand, request),
        };

        match result {
            Ok(Some(data)) => encode_read_response(self.address, function, &data),
            Ok(None) => encode_write_ack(request),
            Err(exception) => encode_exception(self.address, function, exception),
        }
    }

    fn read_coils(&self, start: u16, count: u16) -> Result<Option<Vec<u8>>, ExceptionCode> {
        if count == 0 || count > MAX_READ_COILS {
            return Err(ExceptionCode::IllegalDataValue);
        }
        let mut data = vec![0u8; usize::from(count).div_ceil(8)];
        for i in 0..count {
            let state = self
                .coils
                .get(&start.wrapping_add(i))
                .ok_or(ExceptionCode::IllegalDataAddress)?;
            if *state {
                data[usize::from(i / 8)] |= 1 << (i % 8);
            }
        }
        Ok(Some(data))
    }

    fn read_registers(&self, start: u16, count: u16) -> Result<Option<Vec<u8>>, ExceptionCode> {
        if count == 0 || count > MAX_READ_REGISTERS {
            return Err(ExceptionCode::IllegalDataValue);
        }
        let mut data = Vec::with_capacity(usize::from(count) * 2);
        for i in 0..count {
            let value = self
                .registers
                .get(&start.wrapping_add(i))
                .ok_or(ExceptionCode::IllegalDataAddress)?;
            data.extend_from_slice(&value.to_be_bytes());
        }
        Ok(Some(data))
    }

    fn write_coil(&mut self, address: u16, payload: u16) -> Result<Option<Vec<u8>>, ExceptionCode> {
        let state = match payload {
            0xFF00 => true,
            0x0000 => false,
            _ => return Err(ExceptionCode::IllegalDataValue),
        };
        let coil = self
            .coils
            .get_mut(&address)
            .ok_or(ExceptionCode::IllegalDataAddress)?;
        *coil = state;
        Ok(None)
    }

    fn write_register(&mut self, address: u16, value: u16) -> Result<Option<Vec<u8>>, ExceptionCode> {
        let register = self
            .registers
            .get_mut(&address)
            .ok_or(ExceptionCode::IllegalDataAddress)?;
        *register = value;
        Ok(None)
    }

    fn write_registers(
        &mut self,
        start: u16,
        count: u16,
        request: &[u8],
    ) -> Result<Option<Vec<u8>>, ExceptionCode> {
        let byte_count = usize::from(*request.get(6).ok_or(ExceptionCode::IllegalDataValue)?);
        if count == 0 || byte_count != usize::from(count) * 2 || request.len() < 9 + byte_count {
            return Err(ExceptionCode::IllegalDataValue);
        }
        for i in 0..count {
            if !self.registers.contains_key(&start.wrapping_add(i)) {
                return Err(ExceptionCode::IllegalDataAddress);
            }
        }
        for (i, chunk) in request[7..7 + byte_count].chunks(2).enumerate() {
            self.registers
                .insert(start.wrapping_add(i as u16), u16::from_be_bytes([chunk[0], chunk[1]]));
        }
        Ok(None)
    }
}

/// Random fault injection
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultProfile {
    /// Probability that a response is never sent
    pub drop_probability: f32,
    /// Probability that one bit of a response is flipped
    pub corrupt_probability: f32,
}

#[derive(Debug, Default)]
struct BusState {
    devices: HashMap<u8, SimulatedDevice>,
    pending: Vec<u8>,
    sent: Vec<Vec<u8>>,
    faults: FaultProfile,
    drop_next: usize,
    corrupt_next: usize,
    fail_next_send: usize,
}

/// In-memory bus; clones share the same devices and line state
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    state: Arc<Mutex<BusState>>,
}

impl SimulatedBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bus holding one device per address used by `points`, each
    /// point initialised to zero
    pub fn from_points(points: &[Arc<RegisterPoint>]) -> Self {
        let bus = Self::new();
        {
            let mut state = bus.state.lock();
            for point in points {
                let device = state
                    .devices
                    .entry(point.device_address())
                    .or_insert_with(|| SimulatedDevice::new(point.device_address()));
                let zero = match point.data_type() {
                    DataType::Bool => Value::Bool(false),
                    DataType::Int16 => Value::Int16(0),
                    DataType::Float32 => Value::Float32(0.0),
                };
                device.set_value(point.register_address(), zero);
            }
        }
        bus
    }

    /// Attach a device
    #[must_use]
    pub fn with_device(self, device: SimulatedDevice) -> Self {
        self.state.lock().devices.insert(device.address, device);
        self
    }

    /// Set random fault injection
    pub fn set_faults(&self, faults: FaultProfile) {
        self.state.lock().faults = faults;
    }

    /// Swallow the next `n` responses
    pub fn drop_next(&self, n: usize) {
        self.state.lock().drop_next = n;
    }

    /// Flip a bit in the next `n` responses
    pub fn corrupt_next(&self, n: usize) {
        self.state.lock().corrupt_next = n;
    }

    /// Fail the next `n` sends with an I/O error
    pub fn fail_next_send(&self, n: usize) {
        self.state.lock().fail_next_send = n;
    }

    /// Every frame sent on the bus so far
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent.clone()
    }

    /// Current value held by a device
    pub fn device_value(&self, device: u8, address: u16, data_type: DataType) -> Option<Value> {
        self.state
            .lock()
            .devices
            .get(&device)
            .and_then(|d| d.value(address, data_type))
    }

    /// Change a device value behind the poller's back
    pub fn set_device_value(&self, device: u8, address: u16, value: Value) {
        if let Some(d) = self.state.lock().devices.get_mut(&device) {
            d.set_value(address, value);
        }
    }
}

#[async_trait]
impl ChannelTransport for SimulatedBus {
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.fail_next_send > 0 {
            state.fail_next_send -= 1;
            return Err(TransportError::IoError(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulated line failure",
            )));
        }

        state.sent.push(frame.to_vec());
        state.pending.clear();

        // Devices ignore frames that fail the checksum or are not addressed to them
        if frame.len() < 4 || !verify_frame(frame) {
            return Ok(());
        }
        let Some(device) = state.devices.get_mut(&frame[0]) else {
            return Ok(());
        };
        let mut response = device.handle(frame);

        let mut rng = rand::thread_rng();
        if state.drop_next > 0 || rng.gen::<f32>() < state.faults.drop_probability {
            state.drop_next = state.drop_next.saturating_sub(1);
            trace!("Simulated response dropped");
            return Ok(());
        }
        if state.corrupt_next > 0 || rng.gen::<f32>() < state.faults.corrupt_probability {
            state.corrupt_next = state.corrupt_next.saturating_sub(1);
            let byte = rng.gen_range(0..response.len());
            let bit = rng.gen_range(0..8);
            response[byte] ^= 1 << bit;
            trace!(byte, bit, "Simulated response corrupted");
        }

        state.pending = response;
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        Ok(self.state.lock().pending.len())
    }

    async fn read(&mut self, max: usize) -> Result<Bytes, TransportError> {
        let mut state = self.state.lock();
        let n = max.min(state.pending.len());
        let data: Vec<u8> = state.pending.drain(..n).collect();
        Ok(Bytes::from(data))
    }

    fn connection_info(&self) -> String {
        format!("simulated bus ({} devices)", self.state.lock().devices.len())
    }
}
