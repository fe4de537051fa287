//! Configuration module: TOML-backed simulator config plus the station
//! templates it expands into running `ChargingStation`s.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::station_info::AutomaticTransactionGeneratorConfiguration;

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// One station's worth of seed data (`stationInfo` plus the supervision
/// URL and connector count a template expands into).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StationTemplate {
    pub hash_id: String,
    pub supervision_url: String,
    #[serde(default = "default_connector_count")]
    pub connector_count: u32,
    pub charge_point_vendor: String,
    pub charge_point_model: String,
    #[serde(default)]
    pub charge_point_serial_number: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default)]
    pub authorized_tags: Option<Vec<String>>,
    #[serde(default)]
    pub automatic_transaction_generator: AutomaticTransactionGeneratorConfiguration,
}

fn default_connector_count() -> u32 {
    1
}

/// Top-level simulator configuration, loaded from TOML.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub logging: LoggingConfig,
    pub stations: Vec<StationTemplate>,
}

impl Default for SimulatorConfig {
    /// A single demo station so the binary is runnable with zero
    /// configuration.
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            stations: vec![StationTemplate {
                hash_id: "CS001".to_string(),
                supervision_url: "ws://localhost:9000/CS001".to_string(),
                connector_count: 1,
                charge_point_vendor: "Simulated".to_string(),
                charge_point_model: "Demo".to_string(),
                charge_point_serial_number: None,
                firmware_version: None,
                authorized_tags: None,
                automatic_transaction_generator: AutomaticTransactionGeneratorConfiguration::default(),
            }],
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl SimulatorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// `~/.config/ocpp-station-sim/config.toml`.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ocpp-station-sim")
        .join("config.toml")
}
