//! Regpoll - register polling daemon
//!
//! Polls every configured point, prints value and failure events, and takes
//! `write <point> <value>` commands on stdin.

use anyhow::Context;
use clap::Parser;
use regpoll_core::cli::{format_event, init_tracing, OutputFormat};
use regpoll_core::{open_serial, AppConfig, PollEngine, SimulatedBus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// Regpoll daemon
#[derive(Parser, Debug)]
#[command(name = "regpoll", version, about = "Poll Modbus RTU register points", long_about = None)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "REGPOLL_CONFIG")]
    config: Option<PathBuf>,

    /// Poll an in-memory simulated bus instead of serial ports
    #[arg(long)]
    simulate: bool,

    /// Event output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Write { point: &'a str, value: &'a str },
    Empty,
}

fn parse_command(line: &str) -> Result<Command<'_>, String> {
    let mut words = line.split_whitespace();
    match (words.next(), words.next(), words.next(), words.next()) {
        (None, ..) => Ok(Command::Empty),
        (Some("write"), Some(point), Some(value), None) => Ok(Command::Write { point, value }),
        (Some("write"), ..) => Err("usage: write <point> <value>".to_string()),
        (Some(other), ..) => Err(format!("unknown command: {other}")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::load_default()?,
    };
    let _log_guard = init_tracing(&config.logging, args.verbose)?;

    info!("Starting Regpoll v{}", regpoll_core::VERSION);

    let catalog = Arc::new(config.build_catalog().context("loading point table")?);
    config.validate(&catalog)?;

    let simulate = args.simulate;
    let engine = PollEngine::start(Arc::clone(&catalog), &config.channels, |channel, points| {
        if simulate {
            info!(channel = %channel.id, faults = ?channel.faults, "Using simulated bus");
            let bus = SimulatedBus::from_points(points);
            bus.set_faults(channel.faults);
            Ok(Box::new(bus))
        } else {
            open_serial(channel.serial_config())
        }
    })?;

    let mut events = engine.subscribe();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => println!("{}", format_event(&event, args.format)),
                Err(RecvError::Lagged(n)) => warn!("Dropped {} events", n),
                Err(RecvError::Closed) => break,
            },
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Ok(Command::Write { point, value }) => {
                        if let Err(e) = engine.request_write_text(point, value).await {
                            error!("{}", e);
                        }
                    }
                    Ok(Command::Empty) => {}
                    Err(message) => eprintln!("{message}"),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("stdin: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    engine.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_write() {
        assert_eq!(
            parse_command("write setpoint -12"),
            Ok(Command::Write { point: "setpoint", value: "-12" })
        );
        assert_eq!(
            parse_command("  write   temp 1.5 \n"),
            Ok(Command::Write { point: "temp", value: "1.5" })
        );
    }

    #[test]
    fn test_parse_write_arity() {
        let usage = Err("usage: write <point> <value>".to_string());
        assert_eq!(parse_command("write"), usage);
        assert_eq!(parse_command("write setpoint"), usage);
        assert_eq!(parse_command("write setpoint 1 2"), usage);
    }

    #[test]
    fn test_parse_unknown_verb() {
        assert_eq!(parse_command("read temp"), Err("unknown command: read".to_string()));
        assert_eq!(parse_command("WRITE a 1"), Err("unknown command: WRITE".to_string()));
    }

    #[test]
    fn test_parse_blank_line() {
        assert_eq!(parse_command(""), Ok(Command::Empty));
        assert_eq!(parse_command(" \t "), Ok(Command::Empty));
    }
}
