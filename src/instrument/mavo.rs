//! Gossen MAVO photometer session
//!
//! This module provides the named operations of the MAVO command set on top of
//! [`ProtocolClient`]. Supported devices are the MAVOLUX, MAVOMONITOR and
//! MAVO SPOT2; the MAVOPROBE and MAVOMASTER use a different protocol.
//!
//! ## Configuration
//!
//! ```toml
//! [instrument]
//! port = "/dev/tty.usbserial-00gossen"
//! baud_rate = 9600
//!
//! [errors]
//! reaction = "ignore"  # ignore | raise | log
//! log_path = "error_log.txt"
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use mavo_daq::config::MavoConfig;
//! use mavo_daq::instrument::Mavo;
//!
//! # fn main() -> mavo_daq::error::AppResult<()> {
//! let config = MavoConfig::load()?;
//! let mut mavo = Mavo::open(&config)?;
//! let lux = mavo.get_photometric_value()?;
//! println!("{} lx", lux);
//! # Ok(())
//! # }
//! ```

use crate::adapters::Transport;
use crate::config::MavoConfig;
use crate::error::{AppResult, MavoError};
use crate::instrument::client::{settle, ProtocolClient, Timing, RAW_MEASUREMENT_QUERY};
use crate::instrument::error_handler::{ErrorAccount, ErrorAccounting};
use crate::instrument::parser::{
    parse_measurement, parse_operating_hours, parse_range, parse_reading, split_identity,
    PhotometricReading,
};
use serde::Serialize;
use std::fmt;
use tracing::info;

/// Highest manual measurement range index.
pub const MAX_RANGE: i32 = 4;
/// Lowest manual measurement range index.
pub const MIN_RANGE: i32 = 0;

/// Identity fields reported by `*IDN?`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstrumentIdentity {
    /// Manufacturer, e.g. `GOSSEN`.
    pub manufacturer: String,
    /// Instrument type.
    pub model: String,
    /// Serial number.
    pub serial_number: String,
    /// Hardware revision.
    pub hardware_revision: String,
    /// Firmware version.
    pub firmware_version: String,
}

impl InstrumentIdentity {
    /// Build from the comma separated `*IDN?` payload; extra fields are ignored.
    pub fn from_response(response: &str) -> AppResult<Self> {
        let mut fields = split_identity(response).into_iter();
        match (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) {
            (
                Some(manufacturer),
                Some(model),
                Some(serial_number),
                Some(hardware_revision),
                Some(firmware_version),
            ) => Ok(Self {
                manufacturer,
                model,
                serial_number,
                hardware_revision,
                firmware_version,
            }),
            _ => Err(MavoError::InvalidIdentity(response.to_string())),
        }
    }
}

impl fmt::Display for InstrumentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} SN:{}",
            self.manufacturer, self.model, self.firmware_version, self.serial_number
        )
    }
}

/// Measurement range as last selected through this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MeasurementRange {
    /// Not selected through this session.
    #[default]
    Unknown,
    /// Automatic range selection.
    Auto,
    /// Manual range `0..=4`.
    Fixed(u8),
}

/// A connected MAVO photometer.
pub struct Mavo {
    device_port: String,
    client: ProtocolClient,
    accounting: ErrorAccounting,
    identity: InstrumentIdentity,
    range: MeasurementRange,
}

impl Mavo {
    /// Open the serial port named in `config` and initialize the instrument.
    #[cfg(feature = "instrument_serial")]
    pub fn open(config: &MavoConfig) -> AppResult<Self> {
        use crate::adapters::SerialTransportBuilder;
        use crate::instrument::error_handler::FileErrorSink;

        let transport = SerialTransportBuilder::new(config.instrument.port.as_str())
            .with_baud_rate(config.instrument.baud_rate)
            .with_line_terminator(config.instrument.line_terminator.as_str())
            .build();
        let accounting = ErrorAccounting::new(
            config.errors.reaction,
            Box::new(FileErrorSink::new(&config.errors.log_path)),
        );
        Self::with_transport(
            &config.instrument.port,
            Box::new(transport),
            accounting,
            config.timing.to_timing(),
        )
    }

    /// Always fails: serial support is compiled out.
    #[cfg(not(feature = "instrument_serial"))]
    pub fn open(_config: &MavoConfig) -> AppResult<Self> {
        Err(MavoError::SerialFeatureDisabled)
    }

    /// Create a session on any transport and initialize the instrument.
    pub fn with_transport(
        device_port: &str,
        transport: Box<dyn Transport>,
        accounting: ErrorAccounting,
        timing: Timing,
    ) -> AppResult<Self> {
        let mut mavo = Self {
            device_port: device_port.trim().to_string(),
            client: ProtocolClient::new(transport, timing),
            accounting,
            identity: InstrumentIdentity::default(),
            range: MeasurementRange::default(),
        };
        mavo.initialize()?;
        Ok(mavo)
    }

    /// Enable echo and read the instrument identity.
    pub fn initialize(&mut self) -> AppResult<()> {
        self.query("ECH ON")?;
        let response = self.query("*IDN?")?;
        if response.is_empty() {
            return Err(MavoError::NoResponse);
        }
        self.identity = InstrumentIdentity::from_response(&response)?;
        info!("Connected to {} @ {}", self.identity, self.device_port);
        Ok(())
    }

    /// Send an arbitrary command, with the usual error accounting and retry.
    pub fn query(&mut self, command: &str) -> AppResult<String> {
        self.client.query(command, &mut self.accounting)
    }

    /// Identity read during initialization.
    pub fn identity(&self) -> &InstrumentIdentity {
        &self.identity
    }

    /// Port name the session was opened on, trimmed.
    pub fn device_port(&self) -> &str {
        &self.device_port
    }

    /// `"<type> <firmware> SN:<serial> @ <port>"`
    pub fn instrument_id(&self) -> String {
        format!(
            "{} {} SN:{} @ {}",
            self.identity.model,
            self.identity.firmware_version,
            self.identity.serial_number,
            self.device_port
        )
    }

    /// Query and error counters with the last decoded error.
    pub fn error_account(&self) -> &ErrorAccount {
        self.accounting.account()
    }

    /// Error accounting, e.g. to change the reaction policy at runtime.
    pub fn accounting_mut(&mut self) -> &mut ErrorAccounting {
        &mut self.accounting
    }

    /// Range mode as last selected through this session.
    pub fn range_mode(&self) -> MeasurementRange {
        self.range
    }

    /// Version of the device's command interpreter (`SYSTEM:VERSION?`).
    pub fn command_interpreter_version(&mut self) -> AppResult<String> {
        self.query("SYSTEM:VERSION?")
    }

    /// Current reading in lux or cd/m², `NaN` if the response was malformed.
    pub fn get_photometric_value(&mut self) -> AppResult<f64> {
        let response = self.query(RAW_MEASUREMENT_QUERY)?;
        parse_measurement(&response)
    }

    /// Current reading with its source unit, `None` if the response was malformed.
    pub fn get_photometric_reading(&mut self) -> AppResult<Option<PhotometricReading>> {
        let response = self.query(RAW_MEASUREMENT_QUERY)?;
        parse_reading(&response)
    }

    /// Range index reported by the device, `-1` if the response was malformed.
    pub fn get_range(&mut self) -> AppResult<i32> {
        let response = self.query("RAN?")?;
        Ok(parse_range(&response))
    }

    /// Select manual range `range` (0..=4).
    ///
    /// Auto-range must be deselected beforehand; the device does not reject
    /// a manual range while auto-range is active.
    pub fn set_range(&mut self, range: i32) -> AppResult<()> {
        let index = u8::try_from(range)
            .ok()
            .filter(|_| (MIN_RANGE..=MAX_RANGE).contains(&range))
            .ok_or(MavoError::RangeOutOfBounds {
                value: range,
                min: MIN_RANGE,
                max: MAX_RANGE,
            })?;
        self.query(&format!("RAN {}", index))?;
        self.range = MeasurementRange::Fixed(index);
        info!("Set range to {}", index);
        Ok(())
    }

    /// Switch the device to automatic range selection.
    pub fn select_auto_range(&mut self) -> AppResult<()> {
        self.query("RAN:AUTO ON")?;
        self.range = MeasurementRange::Auto;
        Ok(())
    }

    /// Leave automatic range selection.
    pub fn deselect_auto_range(&mut self) -> AppResult<()> {
        self.query("RAN:AUTO OFF")?;
        if self.range == MeasurementRange::Auto {
            self.range = MeasurementRange::Unknown;
        }
        Ok(())
    }

    /// Reset the instrument and wait until it has rebooted.
    pub fn reset(&mut self) -> AppResult<()> {
        self.query("*RST")?;
        info!("Reset {}, waiting {:?}", self.device_port, self.client.timing().reset_delay);
        settle(self.client.timing().reset_delay);
        self.range = MeasurementRange::Unknown;
        Ok(())
    }

    /// Total operating time in hours, `NaN` if the response was malformed.
    pub fn get_operating_hours(&mut self) -> AppResult<f64> {
        let response = self.query("TIM?")?;
        Ok(parse_operating_hours(&response))
    }

    /// Whole days of operation, `None` if the operating time is unavailable.
    pub fn get_operating_days(&mut self) -> AppResult<Option<i64>> {
        let hours = self.get_operating_hours()?;
        Ok(hours.is_finite().then(|| (hours / 24.0).trunc() as i64))
    }
}

impl fmt::Debug for Mavo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mavo")
            .field("device_port", &self.device_port)
            .field("identity", &self.identity)
            .field("range", &self.range)
            .field("accounting", &self.accounting)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_response() {
        let identity =
            InstrumentIdentity::from_response("GOSSEN,MAVOLUX 5032C USB,A1234,1.0,2.03,extra")
                .unwrap();
        assert_eq!(identity.manufacturer, "GOSSEN");
        assert_eq!(identity.model, "MAVOLUX 5032C USB");
        assert_eq!(identity.serial_number, "A1234");
        assert_eq!(identity.hardware_revision, "1.0");
        assert_eq!(identity.firmware_version, "2.03");
    }

    #[test]
    fn test_identity_needs_five_fields() {
        let err = InstrumentIdentity::from_response("GOSSEN,MAVOLUX,,A1234").unwrap_err();
        assert!(matches!(err, MavoError::InvalidIdentity(_)));
    }

    #[test]
    fn test_default_range_is_unknown() {
        assert_eq!(MeasurementRange::default(), MeasurementRange::Unknown);
    }
}
