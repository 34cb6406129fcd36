//! Error accounting for device queries.
//!
//! Every query result passes through [`ErrorAccounting::record`], which keeps
//! the running counters and reacts to device-reported faults. Each fault is
//! appended to the error log regardless of the [`ReactionPolicy`]; the policy
//! only decides what happens after that.

use crate::error::{AppResult, MavoError};
use crate::instrument::error_codes::DecodedError;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// Default location of the append-only error log.
pub const DEFAULT_ERROR_LOG: &str = "error_log.txt";

/// What to do after a device fault has been logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionPolicy {
    /// Count and log only.
    #[default]
    Ignore,
    /// Fail the current query with [`MavoError::Device`].
    Raise,
    /// Print the formatted message to standard output.
    Log,
}

impl std::str::FromStr for ReactionPolicy {
    type Err = MavoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => Ok(ReactionPolicy::Ignore),
            "raise" => Ok(ReactionPolicy::Raise),
            "log" | "display" => Ok(ReactionPolicy::Log),
            other => Err(MavoError::Configuration(format!(
                "Invalid error reaction '{}'. Must be one of: ignore, raise, log",
                other
            ))),
        }
    }
}

/// Query and error counters of one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ErrorAccount {
    /// Number of recorded device exchanges, retries included.
    pub total_queries: u64,
    /// Number of exchanges that returned a non-zero error number.
    pub total_errors: u64,
    /// Decoded error of the most recent exchange.
    pub last_error: DecodedError,
}

impl ErrorAccount {
    /// True if the most recent exchange reported a device error.
    pub fn is_error(&self) -> bool {
        self.last_error.is_error()
    }
}

/// Destination for formatted device fault messages.
pub trait ErrorSink: Send {
    /// Append one line to the persistent error log.
    fn append(&mut self, line: &str) -> std::io::Result<()>;

    /// Show one line to the operator.
    fn emit(&mut self, line: &str);
}

/// Appends to a text file and prints to standard output.
#[derive(Debug, Clone)]
pub struct FileErrorSink {
    path: PathBuf,
}

impl FileErrorSink {
    /// Sink appending to the file at `path`, created on first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for FileErrorSink {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_LOG)
    }
}

impl ErrorSink for FileErrorSink {
    fn append(&mut self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }

    fn emit(&mut self, line: &str) {
        println!("{}", line);
    }
}

/// In-memory sink; clones share the captured lines.
#[derive(Debug, Clone, Default)]
pub struct CapturingSink {
    logged: Arc<Mutex<Vec<String>>>,
    emitted: Arc<Mutex<Vec<String>>>,
}

impl CapturingSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines appended to the error log so far.
    pub fn logged(&self) -> Vec<String> {
        self.logged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Lines shown to the operator so far.
    pub fn emitted(&self) -> Vec<String> {
        self.emitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ErrorSink for CapturingSink {
    fn append(&mut self, line: &str) -> std::io::Result<()> {
        self.logged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }

    fn emit(&mut self, line: &str) {
        self.emitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

/// Counters plus the configured reaction to device faults.
pub struct ErrorAccounting {
    account: ErrorAccount,
    policy: ReactionPolicy,
    sink: Box<dyn ErrorSink>,
}

impl ErrorAccounting {
    /// Fresh counters reporting to `sink`.
    pub fn new(policy: ReactionPolicy, sink: Box<dyn ErrorSink>) -> Self {
        Self {
            account: ErrorAccount::default(),
            policy,
            sink,
        }
    }

    /// Current counters.
    pub fn account(&self) -> &ErrorAccount {
        &self.account
    }

    /// Change the reaction for subsequent faults.
    pub fn set_policy(&mut self, policy: ReactionPolicy) {
        self.policy = policy;
    }

    /// Account for one device exchange.
    ///
    /// Returns [`MavoError::Device`] only under [`ReactionPolicy::Raise`]; the
    /// counters are updated before that happens.
    pub fn record(&mut self, decoded: DecodedError) -> AppResult<()> {
        self.account.total_queries += 1;
        self.account.last_error = decoded;
        if !decoded.is_error() {
            return Ok(());
        }

        self.account.total_errors += 1;
        let message = decoded.to_string();
        warn!(
            number = decoded.number,
            code = decoded.code,
            "Device reported error ({}/{} queries failed)",
            self.account.total_errors,
            self.account.total_queries
        );
        // Log file failures are reported but never fail the query.
        if let Err(e) = self.sink.append(&message) {
            warn!("Failed to append to error log: {}", e);
        }

        match self.policy {
            ReactionPolicy::Ignore => Ok(()),
            ReactionPolicy::Raise => Err(MavoError::Device(decoded)),
            ReactionPolicy::Log => {
                self.sink.emit(&message);
                Ok(())
            }
        }
    }
}

impl Default for ErrorAccounting {
    fn default() -> Self {
        Self::new(ReactionPolicy::default(), Box::new(FileErrorSink::default()))
    }
}

impl std::fmt::Debug for ErrorAccounting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorAccounting")
            .field("account", &self.account)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
