//! CLI Module
//!
//! Shared pieces of the `regpoll` and `regpoll-cli` binaries:
//! - Exit codes for automation
//! - Event and catalog output formatting
//! - Tracing setup from the logging config

pub mod exit_codes;
pub mod output;

pub use exit_codes::{exit_code_description, print_exit_codes, CliResult, ExitCodes};
pub use output::{format_event, format_point, hex_bytes, OutputFormat};

use crate::config::LoggingConfig;
use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Log file name prefix inside the log directory
const LOG_FILE: &str = "regpoll.log";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level; `verbose` forces `debug`.
/// The returned guard must stay alive for file output to be flushed.
pub fn init_tracing(logging: &LoggingConfig, verbose: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let directive = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .with_context(|| format!("invalid log level {directive:?}"))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if logging.json {
        layers.push(fmt::layer().json().with_writer(std::io::stderr).boxed());
    } else {
        layers.push(fmt::layer().with_writer(std::io::stderr).boxed());
    }

    let mut guard = None;
    if logging.file {
        if let Some(dir) = &logging.directory {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create log directory {}", dir.display()))?;
            let (writer, worker) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE));
            layers.push(fmt::layer().with_ansi(false).with_writer(writer).boxed());
            guard = Some(worker);
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("tracing already initialised")?;
    Ok(guard)
}
