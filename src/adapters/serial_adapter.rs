//! Serial transport for RS-232 communication
//!
//! Wraps the `serialport` crate with the fixed framing of the MAVO interface:
//! 7 data bits, even parity, 2 stop bits, no handshake. Reads are blocking and
//! byte-wise until the response delimiter; the port's own read timeout is only
//! a poll interval, so a silent device blocks the caller.

use crate::adapters::Transport;
use crate::error::{AppResult, MavoError};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::debug;

/// Connection parameters of a [`SerialTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,
    /// Baud rate (the MAVO interface runs at 9600)
    pub baud_rate: u32,
    /// Line terminator appended to commands
    pub line_terminator: String,
    /// Byte that ends a response line
    pub response_delimiter: u8,
    /// Internal read timeout of the port, used as poll interval
    pub poll_interval: Duration,
}

impl SerialSettings {
    /// MAVO defaults for `port_name`.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into().trim().to_string(),
            baud_rate: 9600,
            line_terminator: "\n".to_string(),
            response_delimiter: b'\n',
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Builder for constructing a [`SerialTransport`] with custom settings.
///
/// # Example
/// ```no_run
/// use mavo_daq::adapters::SerialTransportBuilder;
///
/// let transport = SerialTransportBuilder::new("/dev/ttyUSB0")
///     .with_baud_rate(9600)
///     .with_line_terminator("\n")
///     .build();
/// ```
pub struct SerialTransportBuilder {
    settings: SerialSettings,
}

impl SerialTransportBuilder {
    /// Create a new builder for `port_name`.
    ///
    /// Default configuration:
    /// * baud_rate: 9600
    /// * line_terminator: "\n"
    /// * response_delimiter: b'\n'
    /// * poll_interval: 100 ms
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            settings: SerialSettings::new(port_name),
        }
    }

    /// Set the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.settings.baud_rate = baud_rate;
        self
    }

    /// Set the terminator appended to commands.
    pub fn with_line_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.settings.line_terminator = terminator.into();
        self
    }

    /// Set the byte that ends a response.
    pub fn with_response_delimiter(mut self, delimiter: u8) -> Self {
        self.settings.response_delimiter = delimiter;
        self
    }

    /// Set the port's internal read timeout.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.settings.poll_interval = interval;
        self
    }

    /// Build the transport; the port is opened on first use.
    pub fn build(self) -> SerialTransport {
        SerialTransport::new(self.settings)
    }
}

/// Serial transport for the MAVO RS-232 interface.
pub struct SerialTransport {
    settings: SerialSettings,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Closed transport with the given settings.
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            port: None,
        }
    }

    /// Connection settings.
    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    fn port(&mut self) -> AppResult<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(MavoError::SerialPortNotConnected)
    }
}

impl Transport for SerialTransport {
    fn name(&self) -> &str {
        &self.settings.port_name
    }

    fn open(&mut self) -> AppResult<()> {
        if self.port.is_some() {
            return Ok(());
        }
        let port = serialport::new(&self.settings.port_name, self.settings.baud_rate)
            .data_bits(DataBits::Seven)
            .parity(Parity::Even)
            .stop_bits(StopBits::Two)
            .flow_control(FlowControl::None)
            .timeout(self.settings.poll_interval)
            .open()?;
        self.port = Some(port);
        debug!(
            "Serial port '{}' opened at {} baud",
            self.settings.port_name, self.settings.baud_rate
        );
        Ok(())
    }

    fn close(&mut self) -> AppResult<()> {
        if self.port.take().is_some() {
            debug!("Serial port '{}' closed", self.settings.port_name);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write_line(&mut self, line: &str) -> AppResult<()> {
        let command = format!("{}{}", line, self.settings.line_terminator);
        let port = self.port()?;
        port.write_all(command.as_bytes())?;
        port.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> AppResult<String> {
        let delimiter = self.settings.response_delimiter;
        let port = self.port()?;
        let mut response = Vec::new();
        let mut buffer = [0u8; 1];

        loop {
            match port.read(&mut buffer) {
                Ok(1) if buffer[0] == delimiter => break,
                Ok(1) => response.push(buffer[0]),
                Ok(_) => return Err(MavoError::SerialUnexpectedEof),
                // The port timeout is only a poll interval; keep waiting.
                Err(e) if e.kind() == ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(String::from_utf8_lossy(&response).into_owned())
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_transport_creation() {
        let transport = SerialTransportBuilder::new("/dev/ttyUSB0").build();
        assert_eq!(transport.name(), "/dev/ttyUSB0");
        assert!(!transport.is_open());
    }

    #[test]
    fn test_builder_defaults() {
        let transport = SerialTransportBuilder::new(" COM3 ").build();
        let settings = transport.settings();
        assert_eq!(settings.port_name, "COM3");
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.line_terminator, "\n");
        assert_eq!(settings.response_delimiter, b'\n');
    }

    #[test]
    fn test_builder_fluent_api() {
        let transport = SerialTransportBuilder::new("/dev/ttyS0")
            .with_baud_rate(19200)
            .with_line_terminator("\r\n")
            .with_response_delimiter(b'\r')
            .with_poll_interval(Duration::from_millis(20))
            .build();
        let settings = transport.settings();
        assert_eq!(settings.baud_rate, 19200);
        assert_eq!(settings.line_terminator, "\r\n");
        assert_eq!(settings.response_delimiter, b'\r');
        assert_eq!(settings.poll_interval, Duration::from_millis(20));
    }

    #[test]
    fn test_io_requires_open_port() {
        let mut transport = SerialTransportBuilder::new("/dev/does-not-exist").build();
        assert!(matches!(
            transport.write_line("?"),
            Err(MavoError::SerialPortNotConnected)
        ));
        assert!(matches!(
            transport.read_line(),
            Err(MavoError::SerialPortNotConnected)
        ));
        assert!(transport.close().is_ok());
    }
}
