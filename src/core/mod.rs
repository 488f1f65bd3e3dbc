//! Core module containing the polling engine
//!
//! This module provides:
//! - Modbus RTU frame codec and CRC-16
//! - Register point catalog
//! - Channel transports (serial port, simulated bus)
//! - Per-channel poll scheduler
//! - Engine running one scheduler per channel

pub mod catalog;
pub mod engine;
pub mod event;
pub mod protocol;
pub mod scheduler;
pub mod simulator;
pub mod transport;
