//! Configuration management for wakelog.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "wakelog";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "trips.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `WAKELOG_`)
/// 2. TOML config file at `~/.config/wakelog/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Tracking and stop-detection configuration.
    pub tracking: TrackingConfig,
    /// Controller reconciliation configuration.
    pub controller: ControllerConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/wakelog/trips.db`
    pub database_path: Option<PathBuf>,
}

/// Tracking-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Default position sampling period in milliseconds.
    pub update_interval_ms: u64,
    /// Radius in meters within which consecutive points count as dwelling.
    pub stop_radius_meters: f64,
    /// Minimum dwell duration in seconds before a stop point is emitted.
    pub stop_min_dwell_seconds: i64,
}

/// Controller reconciliation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Delays between the post-start status polls, in milliseconds.
    pub convergence_delays_ms: Vec<u64>,
    /// How long to wait after a stop command before re-checking status,
    /// in milliseconds.
    pub stop_wait_ms: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 5000,
            // 45 ft dwell radius, 5 minute minimum dwell
            stop_radius_meters: 13.716,
            stop_min_dwell_seconds: 300,
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            convergence_delays_ms: vec![500, 500, 1000, 1000],
            stop_wait_ms: 1000,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `WAKELOG_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("WAKELOG_").split("_"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.tracking.update_interval_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "update_interval_ms must be greater than 0".to_string(),
            });
        }

        if self.tracking.stop_radius_meters <= 0.0 {
            return Err(Error::ConfigValidation {
                message: "stop_radius_meters must be greater than 0".to_string(),
            });
        }

        if self.tracking.stop_min_dwell_seconds <= 0 {
            return Err(Error::ConfigValidation {
                message: "stop_min_dwell_seconds must be greater than 0".to_string(),
            });
        }

        if self.controller.convergence_delays_ms.is_empty() {
            return Err(Error::ConfigValidation {
                message: "convergence_delays_ms must not be empty".to_string(),
            });
        }

        if self.controller.stop_wait_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "stop_wait_ms must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the default sampling period as a Duration.
    #[must_use]
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.tracking.update_interval_ms)
    }

    /// Get the convergence poll delays as Durations.
    #[must_use]
    pub fn convergence_delays(&self) -> Vec<Duration> {
        self.controller
            .convergence_delays_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }

    /// Get the post-stop wait as a Duration.
    #[must_use]
    pub fn stop_wait(&self) -> Duration {
        Duration::from_millis(self.controller.stop_wait_ms)
    }
}
