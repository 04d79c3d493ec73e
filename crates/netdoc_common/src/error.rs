//! Error types for NetDoc
//!
//! Only two kinds of failure ever leave a component as an `Err`:
//! missing privileges and an unusable environment. Everything below that
//! level (a failed query or action or check) is recorded as
//! data on the result object instead.

use std::path::PathBuf;

/// Process-level failures that abort a run
#[derive(Debug, thiserror::Error)]
pub enum NetDocError {
    #[error("administrator privileges are required to change network settings")]
    NotElevated,

    #[error("required system utility unavailable: {0}")]
    EnvironmentMissing(String),

    #[error("invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single host query that could not produce a value
///
/// Never fatal: samplers turn it into a sentinel, checks turn it into a
/// finding.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("command failed: {0}")]
    Command(String),

    #[error("unexpected output: {0}")]
    Parse(String),

    #[error("request failed: {0}")]
    Http(String),

    #[error("lookup failed: {0}")]
    Resolve(String),

    #[error("{0}")]
    Io(String),
}

impl From<std::io::Error> for QueryError {
    fn from(err: std::io::Error) -> Self {
        QueryError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NetDocError>;
