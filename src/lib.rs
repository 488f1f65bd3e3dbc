//! # Regpoll Core Library
//!
//! Polls typed register points on Modbus RTU devices that share half-duplex
//! serial lines, and writes values back on request.
//!
//! ## Features
//!
//! - Modbus RTU framing with CRC-16 (functions 01, 03, 05, 06, 10)
//! - One scheduler per channel, one request in flight at a time
//! - Writes jump the poll queue and are confirmed by an immediate read
//! - CSV or TOML point tables
//! - Simulated bus with fault injection
//! - CLI with exit codes
//!
//! ## Example
//!
//! ```rust,no_run
//! use regpoll_core::{open_serial, AppConfig, PointEvent, PollEngine, Value};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load("regpoll.toml")?;
//!     let catalog = Arc::new(config.build_catalog()?);
//!     let engine = PollEngine::start(catalog, &config.channels, |channel, _| {
//!         open_serial(channel.serial_config())
//!     })?;
//!
//!     engine.request_write("setpoint", Value::Int16(120)).await?;
//!
//!     let mut rx = engine.subscribe();
//!     while let Ok(event) = rx.recv().await {
//!         if let PointEvent::ValueUpdated { point, value, .. } = event {
//!             println!("{point} = {value}");
//!         }
//!     }
//!
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat};
pub use crate::config::{AppConfig, ChannelConfig, ConfigError};
pub use crate::core::catalog::{CatalogError, PointDefinition, RegisterCatalog, RegisterPoint};
pub use crate::core::engine::{EngineError, PollEngine};
pub use crate::core::event::{ErrorKind, Operation, PointEvent};
pub use crate::core::protocol::{DataType, DecodeError, EncodeError, Value};
pub use crate::core::scheduler::{PollError, PollScheduler, SchedulerConfig, Task, TaskQueue};
pub use crate::core::simulator::{FaultProfile, SimulatedBus, SimulatedDevice};
pub use crate::core::transport::{open_serial, ChannelTransport, SerialConfig, SerialParity, TransportError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
