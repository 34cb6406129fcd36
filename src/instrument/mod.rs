//! MAVO photometer protocol
//!
//! Layered bottom-up:
//! - [`error_codes`]: the fixed table of device fault codes
//! - [`parser`]: pure functions over response text
//! - [`error_handler`]: counters, error log and reaction policy
//! - [`client`]: the query state machine with its single overrun retry
//! - [`mavo`]: the named operations of one connected instrument

pub mod client;
pub mod error_codes;
pub mod error_handler;
pub mod mavo;
pub mod parser;

pub use client::{ProtocolClient, Timing};
pub use error_codes::{translate, DecodedError, ErrorCategory};
pub use error_handler::{
    CapturingSink, ErrorAccount, ErrorAccounting, ErrorSink, FileErrorSink, ReactionPolicy,
};
pub use mavo::{InstrumentIdentity, Mavo, MeasurementRange};
pub use parser::{PhotometricReading, PhotometricUnit};
