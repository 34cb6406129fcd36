//! Line transports
//!
//! This module contains the [`Transport`] trait and its implementations,
//! providing the low-level, line-oriented I/O the protocol engine runs on.
//! The engine opens the transport before every exchange and closes it
//! afterwards, so implementations must tolerate repeated open/close cycles.

pub mod mock;
#[cfg(feature = "instrument_serial")]
pub mod serial_adapter;

pub use mock::MockTransport;
#[cfg(feature = "instrument_serial")]
pub use serial_adapter::{SerialSettings, SerialTransport, SerialTransportBuilder};

use crate::error::AppResult;

/// A byte-synchronous, newline-delimited channel to one instrument.
pub trait Transport: Send {
    /// Short identifier for logging, e.g. the port name.
    fn name(&self) -> &str;

    /// Open the line. Opening an already open transport is a no-op.
    fn open(&mut self) -> AppResult<()>;

    /// Close the line. Closing an already closed transport is a no-op.
    fn close(&mut self) -> AppResult<()>;

    /// Whether the line is currently open.
    fn is_open(&self) -> bool;

    /// Write `line` followed by the line terminator.
    fn write_line(&mut self, line: &str) -> AppResult<()>;

    /// Block until one complete line has been received.
    ///
    /// The returned text excludes the delimiter but is otherwise untrimmed.
    fn read_line(&mut self) -> AppResult<String>;
}
