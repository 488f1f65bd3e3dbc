//! Regpoll CLI - one-shot register tool
//!
//! Frame building, checksums and single reads/writes without running the poll engine.

use clap::{Args, Parser, Subcommand};
use regpoll_core::cli::{format_point, hex_bytes, init_tracing, print_exit_codes, CliResult, ExitCodes, OutputFormat};
use regpoll_core::config::LoggingConfig;
use regpoll_core::core::protocol::{
    crc16_modbus, decode_ack, decode_response, encode_read, encode_write, format_frame,
};
use regpoll_core::core::scheduler::{exchange, PollError};
use regpoll_core::{
    open_serial, AppConfig, ChannelTransport, DataType, PointDefinition, RegisterPoint, SerialConfig,
    SerialParity, Value,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

/// Regpoll CLI
#[derive(Parser, Debug)]
#[command(
    name = "regpoll-cli",
    version,
    about = "One-shot Modbus RTU register tool",
    long_about = None
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Log every frame
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    ListPorts {
        /// Show detailed info
        #[arg(short, long)]
        detailed: bool,
    },

    /// Compute the CRC-16/Modbus of hex bytes
    Crc {
        /// Hex bytes, spaces allowed (e.g. "01 03 00 00 00 02")
        data: Vec<String>,
    },

    /// Print a request frame without sending it
    Frame {
        #[command(subcommand)]
        kind: FrameKind,
    },

    /// Read one register point
    Read {
        #[command(flatten)]
        port: PortArgs,
        #[command(flatten)]
        point: PointArgs,
    },

    /// Write one register point and read it back
    Write {
        #[command(flatten)]
        port: PortArgs,
        #[command(flatten)]
        point: PointArgs,
        /// Value to write
        value: String,
    },

    /// Print the point table of a config file
    Points {
        /// Config file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Show exit codes
    ExitCodes,
}

#[derive(Subcommand, Debug)]
enum FrameKind {
    /// Read request
    Read {
        #[command(flatten)]
        point: PointArgs,
    },
    /// Write request
    Write {
        #[command(flatten)]
        point: PointArgs,
        /// Value to write
        value: String,
    },
}

#[derive(Args, Debug)]
struct PortArgs {
    /// Serial port name (e.g., COM3, /dev/ttyUSB0)
    #[arg(short, long)]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value = "9600")]
    baud: u32,

    /// Data bits (5-8)
    #[arg(long, default_value = "8")]
    data_bits: u8,

    /// Parity (none, odd, even)
    #[arg(long, default_value = "none")]
    parity: String,

    /// Stop bits (1, 2)
    #[arg(long, default_value = "1")]
    stop_bits: u8,

    /// Wait before reading the response (ms)
    #[arg(long, default_value = "100")]
    settle_ms: u64,
}

#[derive(Args, Debug)]
struct PointArgs {
    /// Slave address
    #[arg(short, long, default_value = "1")]
    device: u8,

    /// Register or coil address
    #[arg(short, long)]
    register: u16,

    /// Data type (bool, int16, float32)
    #[arg(short = 't', long = "type", default_value = "int16")]
    data_type: DataType,
}

impl PointArgs {
    fn point(&self) -> RegisterPoint {
        RegisterPoint::new(PointDefinition {
            name: format!("{}:{}", self.device, self.register),
            channel: String::new(),
            data_type: self.data_type,
            device_address: self.device,
            register_address: self.register,
            read_only: false,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: "warn".to_string(),
        ..LoggingConfig::default()
    };
    if let Err(e) = init_tracing(&logging, cli.verbose) {
        eprintln!("{e:#}");
    }

    let result = match &cli.command {
        Commands::ListPorts { detailed } => list_ports(&cli, *detailed),
        Commands::Crc { data } => crc(&cli, &data.join(" ")),
        Commands::Frame { kind } => frame(&cli, kind),
        Commands::Read { port, point } => read(&cli, port, point).await,
        Commands::Write { port, point, value } => write(&cli, port, point, value).await,
        Commands::Points { config } => points(&cli, config),
        Commands::ExitCodes => {
            print_exit_codes();
            CliResult::success()
        }
    };

    if let Some(message) = result.message() {
        if result.is_success() {
            println!("{message}");
        } else {
            eprintln!("Error: {message}");
        }
    }
    result.to_exit_code()
}

fn list_ports(cli: &Cli, detailed: bool) -> CliResult {
    let ports = match regpoll_core::core::transport::list_ports() {
        Ok(ports) => ports,
        Err(e) => return e.into(),
    };

    match cli.format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = ports
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "name": p.port_name,
                        "type": format!("{:?}", p.port_type)
                    })
                })
                .collect();
            println!("{}", serde_json::Value::Array(json));
        }
        OutputFormat::Text => {
            if ports.is_empty() {
                println!("No serial ports found.");
            }
            for port in &ports {
                if detailed {
                    println!("  {} [{:?}]", port.port_name, port.port_type);
                } else {
                    println!("{}", port.port_name);
                }
            }
        }
    }
    CliResult::success()
}

fn parse_hex(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    let compact = compact.trim_start_matches("0x");
    hex::decode(compact)
}

fn crc(cli: &Cli, text: &str) -> CliResult {
    let data = match parse_hex(text) {
        Ok(data) => data,
        Err(e) => return CliResult::invalid_args(format!("invalid hex: {e}")),
    };
    let crc = crc16_modbus(&data);
    let [lo, hi] = crc.to_le_bytes();
    match cli.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "crc": format!("0x{crc:04X}"), "trailer": format!("{lo:02X} {hi:02X}") })
        ),
        OutputFormat::Text => println!("CRC=0x{crc:04X}  trailer={lo:02X} {hi:02X}"),
    }
    CliResult::success()
}

fn print_frame(cli: &Cli, frame: &[u8]) {
    match cli.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "hex": hex::encode(frame), "frame": format_frame(frame) })
        ),
        OutputFormat::Text => {
            println!("{}", hex_bytes(frame));
            println!("{}", format_frame(frame));
        }
    }
}

fn frame(cli: &Cli, kind: &FrameKind) -> CliResult {
    let frame = match kind {
        FrameKind::Read { point } => encode_read(&point.point()),
        FrameKind::Write { point, value } => {
            let value = match Value::parse(point.data_type, value) {
                Ok(value) => value,
                Err(e) => return CliResult::invalid_args(e.to_string()),
            };
            match encode_write(&point.point(), value) {
                Ok(frame) => frame,
                Err(e) => return CliResult::error(ExitCodes::VALIDATION_FAILED, e.to_string()),
            }
        }
    };
    print_frame(cli, &frame);
    CliResult::success()
}

fn open(port: &PortArgs) -> Result<Box<dyn ChannelTransport>, CliResult> {
    let parity: SerialParity = port.parity.parse().map_err(CliResult::from)?;
    let config = SerialConfig::new(&port.port, port.baud)
        .data_bits(port.data_bits)
        .stop_bits(port.stop_bits)
        .parity(parity);
    open_serial(config).map_err(CliResult::from)
}

fn poll_failure(error: &PollError) -> CliResult {
    CliResult::error(ExitCodes::for_error_kind(error.kind()), error.to_string())
}

async fn read_value(
    transport: &mut dyn ChannelTransport,
    point: &RegisterPoint,
    settle: Duration,
) -> Result<Value, PollError> {
    let raw = exchange(transport, &encode_read(point), settle).await?;
    Ok(decode_response(&raw, point.data_type())?)
}

fn print_value(cli: &Cli, point: &RegisterPoint, value: Value) {
    match cli.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "point": point.name(), "type": point.data_type(), "value": value })
        ),
        OutputFormat::Text => println!("{} = {}", point.name(), value),
    }
}

async fn read(cli: &Cli, port: &PortArgs, point: &PointArgs) -> CliResult {
    let mut transport = match open(port) {
        Ok(t) => t,
        Err(result) => return result,
    };
    let point = point.point();
    match read_value(transport.as_mut(), &point, Duration::from_millis(port.settle_ms)).await {
        Ok(value) => {
            print_value(cli, &point, value);
            CliResult::success()
        }
        Err(e) => poll_failure(&e),
    }
}

async fn write(cli: &Cli, port: &PortArgs, point: &PointArgs, text: &str) -> CliResult {
    let value = match Value::parse(point.data_type, text) {
        Ok(value) => value,
        Err(e) => return CliResult::invalid_args(e.to_string()),
    };
    let point = point.point();
    let request = match encode_write(&point, value) {
        Ok(frame) => frame,
        Err(e) => return CliResult::error(ExitCodes::VALIDATION_FAILED, e.to_string()),
    };

    let mut transport = match open(port) {
        Ok(t) => t,
        Err(result) => return result,
    };
    let settle = Duration::from_millis(port.settle_ms);

    let acknowledged = match exchange(transport.as_mut(), &request, settle).await {
        Ok(raw) => decode_ack(&raw).map_err(PollError::from),
        Err(e) => Err(e),
    };
    if let Err(e) = acknowledged {
        return poll_failure(&e);
    }

    match read_value(transport.as_mut(), &point, settle).await {
        Ok(value) => {
            print_value(cli, &point, value);
            CliResult::success()
        }
        Err(e) => poll_failure(&e),
    }
}

fn points(cli: &Cli, path: &Path) -> CliResult {
    let config = match AppConfig::load(path) {
        Ok(config) => config,
        Err(e) => return CliResult::config_error(e.to_string()),
    };
    let catalog = match config.build_catalog() {
        Ok(catalog) => catalog,
        Err(e) => return CliResult::config_error(e.to_string()),
    };
    if let Err(e) = config.validate(&catalog) {
        return CliResult::config_error(e.to_string());
    }
    for point in catalog.points() {
        println!("{}", format_point(point, cli.format));
    }
    CliResult::success()
}
