//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/stackscope/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/stackscope/` (~/.config/stackscope/)
//! - State/Logs: `$XDG_STATE_HOME/stackscope/` (~/.local/state/stackscope/)
//!
//! Every key is optional; a missing file yields the defaults below.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Pattern detector thresholds
    #[serde(default)]
    pub detectors: DetectorConfig,

    /// Report rendering options
    #[serde(default)]
    pub report: ReportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Thresholds for the built-in pattern detectors
#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    /// Errors from one subsystem needed for a warning
    #[serde(default = "default_failure_min_count")]
    pub failure_min_count: usize,

    /// Errors from one subsystem needed for a critical finding
    #[serde(default = "default_failure_critical_count")]
    pub failure_critical_count: usize,

    /// Maximum line distance between two errors of the same cluster
    #[serde(default = "default_failure_window_lines")]
    pub failure_window_lines: u64,

    /// Minimum FWHM samples before variation is judged
    #[serde(default = "default_fwhm_min_samples")]
    pub fwhm_min_samples: usize,

    /// Allowed FWHM spread (max - min) as a fraction of the median
    #[serde(default = "default_fwhm_spread_ratio")]
    pub fwhm_spread_ratio: f64,

    /// Rotation drift in degrees that indicates a mosaic
    #[serde(default = "default_mosaic_rotation_degrees")]
    pub mosaic_rotation_degrees: f64,

    /// Plate-solve success rate (percent) below which failures are a warning
    #[serde(default = "default_plate_solve_warn_percent")]
    pub plate_solve_warn_percent: f64,

    /// Silence between timestamped events that is worth reporting
    #[serde(default = "default_gap_secs")]
    pub gap_secs: i64,

    /// Detector names to skip
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            failure_min_count: default_failure_min_count(),
            failure_critical_count: default_failure_critical_count(),
            failure_window_lines: default_failure_window_lines(),
            fwhm_min_samples: default_fwhm_min_samples(),
            fwhm_spread_ratio: default_fwhm_spread_ratio(),
            mosaic_rotation_degrees: default_mosaic_rotation_degrees(),
            plate_solve_warn_percent: default_plate_solve_warn_percent(),
            gap_secs: default_gap_secs(),
            disabled: vec![],
        }
    }
}

impl DetectorConfig {
    /// Validate thresholds, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.failure_min_count == 0 {
            return Err(Error::Config(
                "detectors.failure_min_count must be at least 1".to_string(),
            ));
        }
        if self.failure_critical_count < self.failure_min_count {
            return Err(Error::Config(
                "detectors.failure_critical_count must not be below failure_min_count"
                    .to_string(),
            ));
        }
        if self.fwhm_spread_ratio.is_nan() || self.fwhm_spread_ratio <= 0.0 {
            return Err(Error::Config(
                "detectors.fwhm_spread_ratio must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_failure_min_count() -> usize {
    3
}

fn default_failure_critical_count() -> usize {
    5
}

fn default_failure_window_lines() -> u64 {
    20
}

fn default_fwhm_min_samples() -> usize {
    10
}

fn default_fwhm_spread_ratio() -> f64 {
    0.5
}

fn default_mosaic_rotation_degrees() -> f64 {
    10.0
}

fn default_plate_solve_warn_percent() -> f64 {
    85.0
}

fn default_gap_secs() -> i64 {
    900
}

/// Report rendering options
#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Width of the waterfall bars in characters
    #[serde(default = "default_bar_width")]
    pub bar_width: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            bar_width: default_bar_width(),
        }
    }
}

fn default_bar_width() -> usize {
    40
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.detectors.validate()?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/stackscope/config.toml` (~/.config/stackscope/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("stackscope").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/stackscope/` (~/.local/state/stackscope/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("stackscope")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/stackscope/stackscope.log` (~/.local/state/stackscope/stackscope.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("stackscope.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.detectors.failure_min_count, 3);
        assert_eq!(config.detectors.failure_critical_count, 5);
        assert_eq!(config.detectors.failure_window_lines, 20);
        assert_eq!(config.report.bar_width, 40);
        assert_eq!(config.logging.level, "info");
        assert!(config.detectors.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[detectors]
failure_window_lines = 50
fwhm_spread_ratio = 0.25
disabled = ["core.timing_gap"]

[report]
bar_width = 20

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.detectors.failure_window_lines, 50);
        assert_eq!(config.detectors.fwhm_spread_ratio, 0.25);
        // Unspecified keys keep their defaults
        assert_eq!(config.detectors.failure_min_count, 3);
        assert_eq!(config.detectors.disabled, vec!["core.timing_gap"]);
        assert_eq!(config.report.bar_width, 20);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_detector_config_validation() {
        let config = DetectorConfig {
            failure_min_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DetectorConfig {
            failure_min_count: 6,
            failure_critical_count: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DetectorConfig {
            fwhm_spread_ratio: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[detectors\nbroken").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn test_log_path_under_state_dir() {
        assert!(Config::log_path().ends_with("stackscope/stackscope.log"));
    }
}
