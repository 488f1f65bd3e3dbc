//! Application settings and channel definitions

use crate::core::catalog::{CatalogError, PointDefinition, RegisterCatalog};
use crate::core::scheduler::SchedulerConfig;
use crate::core::simulator::FaultProfile;
use crate::core::transport::SerialConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`AppConfig`]
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// No platform config directory
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// Point table failed to load
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Two channels share an id
    #[error("Channel {0} is defined more than once")]
    DuplicateChannel(String),

    /// `settle_ms = 0`
    #[error("Channel {0} has a zero settle interval")]
    ZeroSettle(String),

    /// A fault probability outside `0.0..=1.0`
    #[error("Channel {0} has a fault probability outside 0..1")]
    InvalidFaults(String),

    /// A point names a channel with no `[[channels]]` entry
    #[error("Point {point} refers to unknown channel {channel}")]
    UnknownChannel {
        /// Point name
        point: String,
        /// Channel it names
        channel: String,
    },
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Logging settings
    pub logging: LoggingConfig,
    /// Point table
    pub catalog: CatalogConfig,
    /// Serial channels
    pub channels: Vec<ChannelConfig>,
    /// File this config was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of text
    pub json: bool,
    /// Also write a daily rolling log file
    pub file: bool,
    /// Log file directory
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: false,
            directory: super::log_dir(),
        }
    }
}

/// Where points come from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// CSV point table, relative to the config file
    pub csv: Option<PathBuf>,
    /// Inline point definitions, appended after the CSV rows
    pub points: Vec<PointDefinition>,
}

/// One polled serial channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel id as used in the point table
    pub id: String,
    /// Port settings; an empty port name means the id is the port
    #[serde(flatten)]
    pub serial: SerialConfig,
    /// Wait between request and response read
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Minimum period of one full sweep
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Reject responses from the wrong device or function
    #[serde(default)]
    pub strict_echo: bool,
    /// Fault injection, applied only when running on the simulated bus
    #[serde(default)]
    pub faults: FaultProfile,
}

fn default_settle_ms() -> u64 {
    100
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl ChannelConfig {
    /// Channel on port `id` with default settings
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            serial: SerialConfig::new(id, 9600),
            settle_ms: default_settle_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            strict_echo: false,
            faults: FaultProfile::default(),
        }
    }

    /// Port settings, with the channel id as port name if none is set
    pub fn serial_config(&self) -> SerialConfig {
        let mut serial = self.serial.clone();
        if serial.port.is_empty() {
            serial.port = self.id.clone();
        }
        serial
    }

    /// Timing and echo settings for this channel's scheduler
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            settle: Duration::from_millis(self.settle_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            strict_echo: self.strict_echo,
        }
    }
}

impl AppConfig {
    /// Load config from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Load `<config_dir>/config.toml`, or defaults if it does not exist
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = super::default_config_path().ok_or(ConfigError::NoConfigDir)?;
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match self.source.as_deref().and_then(Path::parent) {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Build the catalog from the CSV table followed by inline points
    pub fn build_catalog(&self) -> Result<RegisterCatalog, ConfigError> {
        let mut definitions = Vec::new();
        if let Some(csv) = &self.catalog.csv {
            let table = RegisterCatalog::load_csv(self.resolve(csv))?;
            definitions.extend(table.points().iter().map(|p| p.definition().clone()));
        }
        definitions.extend(self.catalog.points.iter().cloned());
        Ok(RegisterCatalog::from_definitions(definitions)?)
    }

    /// Check channels against each other and against the catalog
    pub fn validate(&self, catalog: &RegisterCatalog) -> Result<(), ConfigError> {
        let mut ids = HashSet::new();
        for channel in &self.channels {
            if !ids.insert(channel.id.as_str()) {
                return Err(ConfigError::DuplicateChannel(channel.id.clone()));
            }
            if channel.settle_ms == 0 {
                return Err(ConfigError::ZeroSettle(channel.id.clone()));
            }
            let probabilities = [channel.faults.drop_probability, channel.faults.corrupt_probability];
            if !probabilities.iter().all(|p| (0.0..=1.0).contains(p)) {
                return Err(ConfigError::InvalidFaults(channel.id.clone()));
            }
        }
        if let Some(point) = catalog.points().iter().find(|p| !ids.contains(p.channel())) {
            return Err(ConfigError::UnknownChannel {
                point: point.name().to_string(),
                channel: point.channel().to_string(),
            });
        }
        Ok(())
    }

    /// Channel by id
    pub fn channel(&self, id: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.id == id)
    }
}
