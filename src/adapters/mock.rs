//! Mock transport for testing
//!
//! This transport simulates a MAVO photometer without physical hardware. It
//! provides:
//! - Scripted responses (FIFO) or a responder closure computing the reply
//! - A shared log of every line written, for test verification
//! - Open/close bookkeeping to check the line is released after each exchange
//!
//! Clones share the same state, so a test can keep one handle while the
//! session owns the other.

use crate::adapters::Transport;
use crate::error::{AppResult, MavoError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Responder = Box<dyn FnMut(&str) -> String + Send>;

#[derive(Default)]
struct MockState {
    open: bool,
    opens: usize,
    closes: usize,
    sent: Vec<String>,
    pending: Option<String>,
    scripted: VecDeque<String>,
    responder: Option<Responder>,
    fail_next_read: bool,
}

/// Scripted in-memory transport.
///
/// # Example
///
/// ```
/// use mavo_daq::adapters::{MockTransport, Transport};
///
/// let mut mock = MockTransport::new();
/// mock.push_response("RAN? 2");
/// mock.open().unwrap();
/// mock.write_line("RAN?").unwrap();
/// assert_eq!(mock.read_line().unwrap(), "RAN? 2");
/// assert_eq!(mock.sent(), vec!["RAN?"]);
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Mock without script or responder; reads fail until one is added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock whose replies are computed from the last written line.
    ///
    /// Scripted responses, if any, take precedence.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&str) -> String + Send + 'static,
    {
        let mock = Self::new();
        mock.lock().responder = Some(Box::new(responder));
        mock
    }

    /// Queue a reply for a future read.
    pub fn push_response(&self, response: impl Into<String>) {
        self.lock().scripted.push_back(response.into());
    }

    /// Make the next read fail with an instrument error.
    pub fn fail_next_read(&self) {
        self.lock().fail_next_read = true;
    }

    /// Every line written so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// Number of times the line was opened.
    pub fn open_count(&self) -> usize {
        self.lock().opens
    }

    /// Number of times an open line was closed.
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    /// Forget the lines written so far.
    pub fn clear_log(&self) {
        self.lock().sent.clear();
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    fn open(&mut self) -> AppResult<()> {
        let mut state = self.lock();
        state.open = true;
        state.opens += 1;
        Ok(())
    }

    fn close(&mut self) -> AppResult<()> {
        let mut state = self.lock();
        if state.open {
            state.open = false;
            state.closes += 1;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn write_line(&mut self, line: &str) -> AppResult<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(MavoError::SerialPortNotConnected);
        }
        state.sent.push(line.to_string());
        state.pending = Some(line.to_string());
        Ok(())
    }

    fn read_line(&mut self) -> AppResult<String> {
        let mut state = self.lock();
        if !state.open {
            return Err(MavoError::SerialPortNotConnected);
        }
        if std::mem::take(&mut state.fail_next_read) {
            return Err(MavoError::Instrument("Injected read failure".to_string()));
        }
        let command = state.pending.take().unwrap_or_default();
        if let Some(response) = state.scripted.pop_front() {
            return Ok(response);
        }
        match state.responder.as_mut() {
            Some(responder) => Ok(responder(&command)),
            None => Err(MavoError::SerialUnexpectedEof),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_starts_closed() {
        let mock = MockTransport::new();
        assert!(!mock.is_open());
        assert_eq!(mock.open_count(), 0);
        assert_eq!(mock.name(), "mock");
    }

    #[test]
    fn test_refuses_io_when_closed() {
        let mut mock = MockTransport::new();
        mock.push_response("x");
        assert!(matches!(
            mock.write_line("?"),
            Err(MavoError::SerialPortNotConnected)
        ));
        assert!(matches!(
            mock.read_line(),
            Err(MavoError::SerialPortNotConnected)
        ));
    }

    #[test]
    fn test_scripted_before_responder() {
        let mut mock = MockTransport::with_responder(|cmd| format!("{} echo", cmd));
        mock.push_response("scripted");
        mock.open().unwrap();

        mock.write_line("A").unwrap();
        assert_eq!(mock.read_line().unwrap(), "scripted");
        mock.write_line("B").unwrap();
        assert_eq!(mock.read_line().unwrap(), "B echo");
        assert_eq!(mock.sent(), vec!["A", "B"]);
    }

    #[test]
    fn test_empty_script_is_eof() {
        let mut mock = MockTransport::new();
        mock.open().unwrap();
        mock.write_line("?").unwrap();
        assert!(matches!(mock.read_line(), Err(MavoError::SerialUnexpectedEof)));
    }

    #[test]
    fn test_clones_share_state() {
        let handle = MockTransport::new();
        let mut owned = handle.clone();
        owned.open().unwrap();
        owned.close().unwrap();
        owned.close().unwrap();
        assert_eq!(handle.open_count(), 1);
        assert_eq!(handle.close_count(), 1);
    }

    #[test]
    fn test_injected_read_failure_is_one_shot() {
        let mut mock = MockTransport::with_responder(|_| "ok".to_string());
        mock.open().unwrap();
        mock.fail_next_read();
        mock.write_line("?").unwrap();
        assert!(mock.read_line().is_err());
        mock.write_line("?").unwrap();
        assert_eq!(mock.read_line().unwrap(), "ok");
    }
}
