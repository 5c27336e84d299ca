//! Error taxonomy: client errors, transient scan I/O, and
//! fatal I/O / invariant violations are kept as distinct types so each
//! layer only has to handle the failures that can actually reach it.

use thiserror::Error;

/// A bad or missing ingest request. Mapped to HTTP 400 by the handler;
/// never logged above debug level.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("missing required header {0}")]
    MissingHeader(&'static str),
    #[error("invalid value for header {header}: {reason}")]
    InvalidHeader {
        header: &'static str,
        reason: String,
    },
}

/// An error encountered mid-scan. The scan is the unit of recovery: this
/// terminates the current pass cleanly, but never the process.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("I/O error reading log: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt frame at offset {offset}: {reason}")]
    CorruptFrame { offset: u64, reason: String },
}

/// An error that terminates the process.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("cannot open log file for append: {0}")]
    OpenLog(std::io::Error),
    #[error("write error: {0}")]
    Write(std::io::Error),
    #[error("invariant violation: {0}")]
    Invariant(String),
}

/// A malformed (not merely absent) environment variable at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("bad value for {var}: {reason}")]
    BadValue { var: &'static str, reason: String },
}
