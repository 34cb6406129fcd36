//! Configuration loading using Figment
//!
//! Configuration is merged from, in increasing precedence:
//! 1. Built-in defaults
//! 2. `config/mavo.toml` (or the file given to [`MavoConfig::load_from`]); a
//!    missing file is not an error
//! 3. Environment variables prefixed with `MAVO_`
//!
//! # Environment Variable Overrides
//!
//! Nested keys are separated by a double underscore:
//!
//! ```text
//! MAVO_APPLICATION__LOG_LEVEL=debug
//! MAVO_INSTRUMENT__PORT=/dev/ttyUSB0
//! MAVO_ERRORS__REACTION=raise
//! ```
//!
//! # Example
//!
//! ```no_run
//! use mavo_daq::config::MavoConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = MavoConfig::load()?;
//!     println!("Port: {}", config.instrument.port);
//!     println!("Log level: {}", config.application.log_level);
//!     Ok(())
//! }
//! ```

use crate::error::{AppResult, MavoError};
use crate::instrument::client::Timing;
use crate::instrument::error_handler::{ReactionPolicy, DEFAULT_ERROR_LOG};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/mavo.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MavoConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Serial connection settings
    pub instrument: InstrumentConfig,
    /// Device timing
    pub timing: TimingConfig,
    /// Error reaction and error log
    pub errors: ErrorConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Serial connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Serial device path
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Appended to every command
    pub line_terminator: String,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            port: "/dev/tty.usbserial-00gossen".to_string(),
            baud_rate: 9600,
            line_terminator: "\n".to_string(),
        }
    }
}

/// Device timing in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait between sending a command and reading the response
    pub settle_delay_ms: u64,
    /// Wait after `*RST`
    pub reset_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let timing = Timing::default();
        Self {
            settle_delay_ms: timing.settle_delay.as_millis() as u64,
            reset_delay_ms: timing.reset_delay.as_millis() as u64,
        }
    }
}

impl TimingConfig {
    /// Convert to the timing used by the protocol client.
    pub fn to_timing(&self) -> Timing {
        Timing {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            reset_delay: Duration::from_millis(self.reset_delay_ms),
        }
    }
}

/// Device error handling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorConfig {
    /// What a device error does to the failing query
    pub reaction: ReactionPolicy,
    /// Append-only error log
    pub log_path: PathBuf,
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self {
            reaction: ReactionPolicy::default(),
            log_path: PathBuf::from(DEFAULT_ERROR_LOG),
        }
    }
}

impl MavoConfig {
    /// Load configuration from `config/mavo.toml` and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or validation fails.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file (relative or absolute)
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("MAVO_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Port is not empty
    /// - Baud rate is not zero
    /// - Line terminator is not empty
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(MavoError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.instrument.port.trim().is_empty() {
            return Err(MavoError::Configuration(
                "instrument.port cannot be empty".to_string(),
            ));
        }

        if self.instrument.baud_rate == 0 {
            return Err(MavoError::Configuration(
                "instrument.baud_rate must be greater than 0".to_string(),
            ));
        }

        if self.instrument.line_terminator.is_empty() {
            return Err(MavoError::Configuration(
                "instrument.line_terminator cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = MavoConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.instrument.baud_rate, 9600);
        assert_eq!(config.instrument.line_terminator, "\n");
        assert_eq!(config.errors.reaction, ReactionPolicy::Ignore);
        assert_eq!(config.errors.log_path, PathBuf::from("error_log.txt"));
        assert_eq!(config.timing.to_timing(), Timing::default());
    }

    #[test]
    #[serial]
    fn test_missing_file_uses_defaults() {
        let config = MavoConfig::load_from("/nonexistent/mavo.toml").unwrap();
        assert_eq!(config, MavoConfig::default());
    }

    #[test]
    #[serial]
    fn test_file_overrides_defaults() {
        let file = write_config(
            r#"
[instrument]
port = "/dev/ttyUSB3"

[timing]
settle_delay_ms = 25

[errors]
reaction = "raise"
log_path = "/tmp/mavo_errors.txt"
"#,
        );

        let config = MavoConfig::load_from(file.path()).unwrap();
        assert_eq!(config.instrument.port, "/dev/ttyUSB3");
        assert_eq!(config.instrument.baud_rate, 9600);
        assert_eq!(config.timing.settle_delay_ms, 25);
        assert_eq!(config.timing.reset_delay_ms, 4000);
        assert_eq!(config.errors.reaction, ReactionPolicy::Raise);
        assert_eq!(config.errors.log_path, PathBuf::from("/tmp/mavo_errors.txt"));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let file = write_config("[instrument]\nport = \"/dev/ttyUSB3\"\n");
        std::env::set_var("MAVO_INSTRUMENT__PORT", "/dev/ttyACM0");
        std::env::set_var("MAVO_ERRORS__REACTION", "log");

        let result = MavoConfig::load_from(file.path());

        std::env::remove_var("MAVO_INSTRUMENT__PORT");
        std::env::remove_var("MAVO_ERRORS__REACTION");

        let config = result.unwrap();
        assert_eq!(config.instrument.port, "/dev/ttyACM0");
        assert_eq!(config.errors.reaction, ReactionPolicy::Log);
    }

    #[test]
    #[serial]
    fn test_invalid_log_level() {
        let file = write_config("[application]\nlog_level = \"verbose\"\n");
        let err = MavoConfig::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid log_level 'verbose'"));
    }

    #[test]
    #[serial]
    fn test_unknown_reaction_is_rejected() {
        let file = write_config("[errors]\nreaction = \"panic\"\n");
        let err = MavoConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, MavoError::Config(_)));
    }

    #[test]
    fn test_validation_rejects_bad_connection_settings() {
        let mut config = MavoConfig::default();
        config.instrument.port = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = MavoConfig::default();
        config.instrument.baud_rate = 0;
        assert!(config.validate().is_err());

        let mut config = MavoConfig::default();
        config.instrument.line_terminator.clear();
        assert!(config.validate().is_err());
    }
}
