use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;

use crate::integrations::mqtt::MqttConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    pub mqtt: MqttConfig,

    pub jeedom: JeedomConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target level overrides, e.g. `"jeedomd::api" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct JeedomConfig {
    /// Base URL of the Jeedom installation, e.g. `http://jeedom.local`
    pub base_url: String,

    /// API key for command execution
    pub api_key: String,

    /// Explicit JSON-RPC endpoint; derived from `base_url` when unset
    #[serde(default)]
    pub jsonrpc_url: Option<String>,

    /// Execute commands over JSON-RPC first
    #[serde(default = "default_true")]
    pub use_jsonrpc: bool,

    /// Fall back to the legacy HTTP GET API when JSON-RPC fails
    #[serde(default = "default_true")]
    pub jsonrpc_fallback: bool,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("jeedomd_store.json")
}

#[derive(Debug, Deserialize)]
pub struct DiscoveryConfig {
    /// Optional YAML rules file tuning classification
    #[serde(default)]
    pub rules_path: Option<PathBuf>,

    /// Where the eqLogic snapshot is persisted
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Restrict entity generation to these platforms; unset allows all
    #[serde(default)]
    pub domains: Option<BTreeSet<String>>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            rules_path: None,
            store_path: default_store_path(),
            domains: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
