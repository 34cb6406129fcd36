//! Custom error types for the crate.
//!
//! This module defines the primary error type, `MavoError`, used by every layer
//! of the protocol engine. Using the `thiserror` crate, it provides a centralized
//! and consistent way to report failures, from configuration and transport
//! problems to instrument-reported faults.
//!
//! ## Error Hierarchy
//!
//! - **`Config`** / **`Configuration`**: loading failures from `figment` and
//!   semantic validation failures of an otherwise well-formed configuration.
//! - **`Io`** and **`Serial`**: failures of the underlying line, e.g. a port that
//!   cannot be opened or a write that does not complete.
//! - **`Device`**: a device-reported error surfaced by the `Raise` reaction
//!   policy. It carries the decoded error so callers can match on the code.
//! - **`RangeOutOfBounds`**, **`UnsupportedUnit`**, **`NoResponse`**,
//!   **`InvalidIdentity`**: misuse conditions that are raised immediately.
//!
//! Malformed measurement text is deliberately *not* an error: the parsers
//! report it through sentinel values (`NaN`, `-1`) since device output is
//! untrusted.

use crate::instrument::error_codes::DecodedError;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, MavoError>;

/// Errors produced by the MAVO protocol engine.
#[derive(Error, Debug)]
pub enum MavoError {
    /// The configuration sources could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// A well-formed configuration with invalid values.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Line or file I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial port could not be opened or configured.
    #[cfg(feature = "instrument_serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O attempted on a closed line.
    #[error("Serial port not connected")]
    SerialPortNotConnected,

    /// The line ended before a complete response.
    #[error("Unexpected EOF from serial port")]
    SerialUnexpectedEof,

    /// Built without the `instrument_serial` feature.
    #[error("Serial support not enabled. Rebuild with --features instrument_serial")]
    SerialFeatureDisabled,

    /// Any other instrument-side failure.
    #[error("Instrument error: {0}")]
    Instrument(String),

    /// Device-reported fault escalated by [`ReactionPolicy::Raise`].
    ///
    /// [`ReactionPolicy::Raise`]: crate::instrument::ReactionPolicy::Raise
    #[error("{0}")]
    Device(DecodedError),

    /// Requested measurement range outside `[min, max]`.
    #[error("Range {value} is out of bounds. Allowed range is [{min}, {max}]")]
    RangeOutOfBounds {
        /// Requested range.
        value: i32,
        /// Lowest valid range.
        min: i32,
        /// Highest valid range.
        max: i32,
    },

    /// Unit symbol the driver cannot convert.
    #[error("Unsupported unit: {0}")]
    UnsupportedUnit(String),

    /// Empty identity response during initialization.
    #[error("Failed to initialize instrument: no response from device")]
    NoResponse,

    /// Fewer than five identity fields during initialization.
    #[error("Failed to initialize instrument: invalid identity response '{0}'")]
    InvalidIdentity(String),
}

impl From<figment::Error> for MavoError {
    fn from(err: figment::Error) -> Self {
        MavoError::Config(Box::new(err))
    }
}

impl MavoError {
    /// The decoded device error, if this error was raised by the device.
    pub fn device_error(&self) -> Option<&DecodedError> {
        match self {
            MavoError::Device(decoded) => Some(decoded),
            _ => None,
        }
    }
}
