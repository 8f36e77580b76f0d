// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/carmon

//! Configuration module

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::alerts::AlertConfig;
use crate::telemetry::Scenario;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Application version
    pub version: String,

    /// Data directory
    pub data_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Where telemetry comes from and how often it is refreshed
    pub acquisition: AcquisitionConfig,

    /// Simulated vehicle behaviour
    pub simulation: SimulationConfig,

    /// Alert thresholds
    pub alerts: AlertConfig,

    /// Database configuration
    pub database: DatabaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "CarMon".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            acquisition: AcquisitionConfig::default(),
            simulation: SimulationConfig::default(),
            alerts: AlertConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the timers cannot run with
    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("simulation.tick_interval_ms", self.simulation.tick_interval_ms),
            (
                "acquisition.foreground_interval_secs",
                self.acquisition.foreground_interval_secs,
            ),
            (
                "acquisition.background_interval_secs",
                self.acquisition.background_interval_secs,
            ),
            ("acquisition.fetch_timeout_ms", self.acquisition.fetch_timeout_ms),
        ];
        for (name, value) in periods {
            if value == 0 {
                bail!("{} must be greater than zero", name);
            }
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            // Create parent directories
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("carmon"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Telemetry source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionMode {
    /// Poll the vehicle's HTTP endpoint
    Remote,
    /// Drive the built-in scenario simulator
    Simulated,
}

/// Acquisition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Telemetry source
    pub mode: AcquisitionMode,

    /// Base URL of the vehicle endpoint
    pub base_url: String,

    /// Per-request timeout in milliseconds
    pub fetch_timeout_ms: u64,

    /// Refresh period while in the foreground
    pub foreground_interval_secs: u64,

    /// Refresh period while running in the background
    pub background_interval_secs: u64,

    /// Use the background refresh period
    pub background: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            mode: AcquisitionMode::Simulated,
            base_url: "http://192.168.1.100:8080".to_string(),
            fetch_timeout_ms: 3000,
            foreground_interval_secs: 5,
            background_interval_secs: 30,
            background: false,
        }
    }
}

impl AcquisitionConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Refresh period for the current foreground/background setting
    pub fn refresh_interval(&self) -> Duration {
        if self.background {
            Duration::from_secs(self.background_interval_secs)
        } else {
            Duration::from_secs(self.foreground_interval_secs)
        }
    }
}

/// Simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulator tick period in milliseconds
    pub tick_interval_ms: u64,

    /// Shortest time a scenario stays active
    pub min_scenario_secs: u64,

    /// Upper bound (exclusive) of the scenario dwell time
    pub max_scenario_secs: u64,

    /// Shortest time between two synthesized trips
    pub min_trip_interval_secs: u64,

    /// Upper bound (exclusive) of the time between synthesized trips
    pub max_trip_interval_secs: u64,

    /// A new trip is not synthesized until the last one ended this long ago
    pub min_trip_gap_secs: u64,

    /// Number of trips kept in the history
    pub history_capacity: usize,

    /// Resting system temperature in °C
    pub base_temperature: f64,

    /// Charge level the battery recovers to while parked
    pub base_battery_level: u8,

    /// Scenario active at start
    pub initial_scenario: Scenario,

    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2000,
            min_scenario_secs: 30,
            max_scenario_secs: 60,
            min_trip_interval_secs: 120,
            max_trip_interval_secs: 300,
            min_trip_gap_secs: 60,
            history_capacity: 10,
            base_temperature: 35.0,
            base_battery_level: 85,
            initial_scenario: Scenario::Normal,
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Enable database storage
    pub enabled: bool,

    /// Database path
    pub path: PathBuf,

    /// Retention period for readings in days
    pub retention_days: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("./data/carmon.db"),
            retention_days: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.acquisition.mode, AcquisitionMode::Simulated);
        assert_eq!(parsed.simulation.history_capacity, 10);
        assert_eq!(parsed.alerts.low_battery, 20);
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let parsed = Config::from_toml_str(
            r#"
            [acquisition]
            mode = "remote"
            background = true

            [simulation]
            seed = 7

            [database]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(parsed.acquisition.mode, AcquisitionMode::Remote);
        assert_eq!(parsed.acquisition.base_url, "http://192.168.1.100:8080");
        assert_eq!(parsed.acquisition.fetch_timeout(), Duration::from_millis(3000));
        assert_eq!(parsed.acquisition.refresh_interval(), Duration::from_secs(30));
        assert_eq!(parsed.simulation.seed, Some(7));
        assert_eq!(parsed.simulation.tick_interval(), Duration::from_secs(2));
        assert_eq!(parsed.simulation.history_capacity, 10);
        assert!(!parsed.database.enabled);
        assert_eq!(parsed.database.retention_days, 30);
    }

    #[test]
    fn test_zero_periods_are_rejected() {
        for text in [
            "[simulation]\ntick_interval_ms = 0",
            "[acquisition]\nforeground_interval_secs = 0",
            "[acquisition]\nbackground_interval_secs = 0",
            "[acquisition]\nfetch_timeout_ms = 0",
        ] {
            let err = Config::from_toml_str(text).unwrap_err();
            assert!(err.to_string().contains("greater than zero"), "{}", err);
        }
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_load_validates_file() {
        let dir = std::env::temp_dir().join(format!("carmon-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[simulation]\ntick_interval_ms = 0\n").unwrap();
        assert!(Config::load(&path).is_err());

        std::fs::write(&path, "[simulation]\ntick_interval_ms = 500\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.simulation.tick_interval(), Duration::from_millis(500));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
