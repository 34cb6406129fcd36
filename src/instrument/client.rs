//! Query/response exchange with the instrument.
//!
//! One logical query runs through
//! `Idle -> Sent -> Received -> Decoded -> Done`, with a single detour through
//! `Retrying` when the device reports a UART overrun. The transport is opened
//! for every exchange and closed on every exit path, including failures.

use crate::adapters::Transport;
use crate::error::AppResult;
use crate::instrument::error_codes::{translate, DecodedError};
use crate::instrument::error_handler::ErrorAccounting;
use crate::instrument::parser::{detect_embedded_error, remove_echo};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Wait after writing a command before a response can be read.
pub const SETTLE_DELAY: Duration = Duration::from_millis(10);
/// Wait after `*RST` while the device reboots.
pub const RESET_DELAY: Duration = Duration::from_millis(4000);

/// The raw measurement query. Its response carries no echo.
pub const RAW_MEASUREMENT_QUERY: &str = "?";

/// Fixed device timing. These are hardware contracts, not timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Wait between writing a command and reading its response.
    pub settle_delay: Duration,
    /// Wait after `*RST` before the next command.
    pub reset_delay: Duration,
}

impl Timing {
    /// No waiting at all, for simulated transports.
    pub const fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            reset_delay: Duration::ZERO,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle_delay: SETTLE_DELAY,
            reset_delay: RESET_DELAY,
        }
    }
}

/// Block for `delay`, skipping the sleep entirely when it is zero.
pub(crate) fn settle(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryState {
    Idle,
    Sent,
    Received,
    Decoded,
    Retrying,
    Done,
}

/// Holds the line open for one exchange and closes it when dropped.
struct LineGuard<'a> {
    transport: &'a mut dyn Transport,
}

impl<'a> LineGuard<'a> {
    fn acquire(transport: &'a mut dyn Transport) -> AppResult<Self> {
        if !transport.is_open() {
            transport.open()?;
        }
        Ok(Self { transport })
    }
}

impl Drop for LineGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.transport.close() {
            warn!("Failed to close '{}': {}", self.transport.name(), e);
        }
    }
}

/// Runs queries against one exclusively owned transport.
pub struct ProtocolClient {
    transport: Box<dyn Transport>,
    timing: Timing,
}

impl ProtocolClient {
    /// Create a client that owns `transport`.
    pub fn new(transport: Box<dyn Transport>, timing: Timing) -> Self {
        Self { transport, timing }
    }

    /// Delays applied by this client.
    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Send `command` and return its response.
    ///
    /// Each exchange is recorded in `accounting`. An overrun (error 1) causes
    /// exactly one more exchange; its outcome is final. Error responses and the
    /// raw measurement query are returned verbatim, all other responses with
    /// the echoed command removed.
    pub fn query(&mut self, command: &str, accounting: &mut ErrorAccounting) -> AppResult<String> {
        let mut state = QueryState::Idle;
        let (mut response, mut decoded) = self.exchange(command, accounting, &mut state)?;

        if decoded.is_overrun() {
            transition(&mut state, QueryState::Retrying);
            warn!("Overrun on '{}', retrying once", command);
            (response, decoded) = self.exchange(command, accounting, &mut state)?;
        }
        transition(&mut state, QueryState::Done);

        if decoded.is_error() || command.trim() == RAW_MEASUREMENT_QUERY {
            Ok(response)
        } else {
            Ok(remove_echo(&response))
        }
    }

    fn exchange(
        &mut self,
        command: &str,
        accounting: &mut ErrorAccounting,
        state: &mut QueryState,
    ) -> AppResult<(String, DecodedError)> {
        let response = {
            let mut line = LineGuard::acquire(self.transport.as_mut())?;
            line.transport.write_line(command)?;
            transition(state, QueryState::Sent);
            debug!("Sent command: {}", command);

            settle(self.timing.settle_delay);

            let response = line.transport.read_line()?.trim().to_string();
            transition(state, QueryState::Received);
            debug!("Received response: {}", response);
            response
        };

        let decoded = translate(detect_embedded_error(&response));
        transition(state, QueryState::Decoded);
        accounting.record(decoded)?;
        Ok((response, decoded))
    }
}

fn transition(state: &mut QueryState, next: QueryState) {
    trace!("query state {:?} -> {:?}", state, next);
    *state = next;
}
