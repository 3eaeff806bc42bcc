/// This module defines the error types for urlscout.
///
/// There are two distinct layers of failure:
///
/// 1. **Run-level errors** ([`SearchError`]) abort a whole search before any work
///    is dispatched, or abort the surrounding I/O: an invalid search pattern, a
///    missing input file, a malformed input row, a bad configuration file.
///
/// 2. **Target-level errors** ([`FetchError`]) describe why a single URL could not
///    be scanned. They are recorded as data on that target's result and never
///    propagate out of the worker pool:
///    ```rust,ignore
///    for result in results.iter() {
///        match result.error() {
///            None => println!("{}: {}", result.target, result.count()),
///            Some(FetchError::UnexpectedStatus(code)) => println!("{}: HTTP {}", result.target, code),
///            Some(e) => println!("{}: {}", result.target, e),
///        }
///    }
///    ```
use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that abort a search run
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Malformed row at line {line}: expected 6 fields, found {fields}")]
    MalformedRow { line: usize, fields: usize },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("HTTP client error: {0}")]
    ClientError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl SearchError {
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn invalid_pattern(pattern: impl Into<String>) -> Self {
        Self::InvalidPattern(pattern.into())
    }

    pub fn malformed_row(line: usize, fields: usize) -> Self {
        Self::MalformedRow { line, fields }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn client_error(msg: impl Into<String>) -> Self {
        Self::ClientError(msg.into())
    }
}

impl From<config::ConfigError> for SearchError {
    fn from(e: config::ConfigError) -> Self {
        Self::ConfigError(e.to_string())
    }
}

/// Why a single target could not be scanned
///
/// Messages are captured as strings so results stay `Clone` and comparable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("{0}")]
    Network(String),
    #[error("Unexpected Status Code: {0}")]
    UnexpectedStatus(u16),
    #[error("Error reading response body: {0}")]
    Read(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Search cancelled")]
    Cancelled,
    #[error("Worker exited before reporting a result")]
    WorkerLost,
}

impl FetchError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn read(msg: impl Into<String>) -> Self {
        Self::Read(msg.into())
    }
}

impl Serialize for FetchError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
