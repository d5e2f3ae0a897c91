//! Operator-tunable settings with JSON persistence

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Serial port of the acoustic modem
    pub port_name: String,
    /// Mirror target fixes as GNSS sentences on a second port
    pub gnss_emulation: bool,
    /// Serial port for the synthesized GNSS stream
    pub gnss_port_name: String,
    /// Water salinity (PSU), pushed to the device during the handshake
    pub salinity_psu: f64,
    /// Capacity of the measurement history ring
    pub measurements_fifo_size: usize,
    /// Capacity of the base-point ring
    pub base_size: usize,
    /// Acoustic address of the target transponder
    pub target_addr: u8,
    /// Residual considered good enough to stop the solver early (m)
    pub radial_error_threshold_m: f64,
    /// Ticks a command may wait for its local acknowledgement
    pub local_timeout_ticks: u64,
    /// Ticks a remote command may wait for its acoustic response
    pub remote_timeout_ticks: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port_name: "/dev/ttyUSB0".to_string(),
            gnss_emulation: false,
            gnss_port_name: "/dev/ttyUSB1".to_string(),
            salinity_psu: 0.0,
            measurements_fifo_size: 100,
            base_size: 5,
            target_addr: 0,
            radial_error_threshold_m: 25.0,
            local_timeout_ticks: 2,
            remote_timeout_ticks: 3,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file I/O error
    IoError { message: String },
    /// JSON serialization/deserialization error
    SerializationError { message: String },
    /// Invalid parameter value
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError { message } => write!(f, "I/O error: {}", message),
            ConfigError::SerializationError { message } => {
                write!(f, "serialization error: {}", message)
            }
            ConfigError::InvalidParameter {
                parameter,
                value,
                reason,
            } => write!(f, "invalid parameter '{}' = '{}': {}", parameter, value, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

impl AppConfig {
    /// Load and validate configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("failed to read '{}': {}", path.as_ref().display(), e),
        })?;
        let config: AppConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::SerializationError {
                message: format!("failed to parse '{}': {}", path.as_ref().display(), e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializationError {
                message: e.to_string(),
            })?;
        fs::write(&path, content).map_err(|e| ConfigError::IoError {
            message: format!("failed to write '{}': {}", path.as_ref().display(), e),
        })
    }

    /// Check every parameter against its valid range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.measurements_fifo_size == 0 {
            return Err(invalid(
                "measurements_fifo_size",
                self.measurements_fifo_size,
                "capacity must be at least 1",
            ));
        }
        if self.base_size == 0 {
            return Err(invalid("base_size", self.base_size, "capacity must be at least 1"));
        }
        if !(0.0..=50.0).contains(&self.salinity_psu) {
            return Err(invalid(
                "salinity_psu",
                self.salinity_psu,
                "salinity must be between 0 and 50 PSU",
            ));
        }
        if self.radial_error_threshold_m <= 0.0 {
            return Err(invalid(
                "radial_error_threshold_m",
                self.radial_error_threshold_m,
                "threshold must be positive",
            ));
        }
        if self.local_timeout_ticks == 0 {
            return Err(invalid(
                "local_timeout_ticks",
                self.local_timeout_ticks,
                "timeout must be at least 1 tick",
            ));
        }
        if self.remote_timeout_ticks <= self.local_timeout_ticks {
            return Err(invalid(
                "remote_timeout_ticks",
                self.remote_timeout_ticks,
                "remote timeout must exceed the local timeout",
            ));
        }
        Ok(())
    }
}

fn invalid(parameter: &str, value: impl fmt::Display, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Display for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "port_name = {}", self.port_name)?;
        writeln!(
            f,
            "gnss_emulation = {}, gnss_port_name = {}",
            self.gnss_emulation, self.gnss_port_name
        )?;
        writeln!(f, "salinity = {:.1} PSU", self.salinity_psu)?;
        writeln!(f, "measurements_fifo_size = {}", self.measurements_fifo_size)?;
        writeln!(f, "base_size = {}", self.base_size)?;
        writeln!(f, "target_addr = {}", self.target_addr)?;
        writeln!(f, "radial_error_threshold = {:.3} m", self.radial_error_threshold_m)?;
        write!(
            f,
            "timeouts = {} / {} ticks",
            self.local_timeout_ticks, self.remote_timeout_ticks
        )
    }
}
