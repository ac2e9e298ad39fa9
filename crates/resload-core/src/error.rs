//! Loader error types.

use std::path::PathBuf;
use thiserror::Error;

/// Stable error codes.
pub mod codes {
    pub const LOAD_NOT_FOUND: &str = "LOAD_NOT_FOUND";
    pub const LOAD_READ_ERROR: &str = "LOAD_READ_ERROR";
    pub const LOAD_INVALID_URL: &str = "LOAD_INVALID_URL";
    pub const LOAD_TRANSPORT_ERROR: &str = "LOAD_TRANSPORT_ERROR";
    pub const LOAD_HTTP_STATUS: &str = "LOAD_HTTP_STATUS";
    pub const LOAD_CACHE_ERROR: &str = "LOAD_CACHE_ERROR";
    pub const LOAD_RESOLUTION_ERROR: &str = "LOAD_RESOLUTION_ERROR";
    pub const LOAD_EXECUTION_ERROR: &str = "LOAD_EXECUTION_ERROR";
    pub const LOAD_ENGINE_ERROR: &str = "LOAD_ENGINE_ERROR";
    pub const LOAD_CLIENT_ERROR: &str = "LOAD_CLIENT_ERROR";
}

/// Coarse failure category, for callers choosing a recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The resource does not exist (local file or dependency).
    Absent,
    /// The resource exists but could not be read or fetched.
    Retrieval,
    /// The remote server answered with an unusable response.
    Remote,
    /// The resource was retrieved but its code failed to run.
    Execution,
    /// An internal invariant did not hold.
    Internal,
}

/// Error returned by every loader operation.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server returned status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Server reported {url} as not modified, but nothing is cached for it")]
    Cache { url: String },

    #[error("Cannot find module '{specifier}' from '{}'", from.display())]
    Resolution { specifier: String, from: PathBuf },

    #[error("Failed to execute {reference}: {message}")]
    Execution { reference: String, message: String },

    #[error("Script engine error: {0}")]
    Engine(String),

    #[error("Failed to create HTTP client: {source}")]
    Client {
        #[source]
        source: reqwest::Error,
    },
}

impl LoadError {
    /// Get the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => codes::LOAD_NOT_FOUND,
            Self::Read { .. } => codes::LOAD_READ_ERROR,
            Self::InvalidUrl { .. } => codes::LOAD_INVALID_URL,
            Self::Transport { .. } => codes::LOAD_TRANSPORT_ERROR,
            Self::HttpStatus { .. } => codes::LOAD_HTTP_STATUS,
            Self::Cache { .. } => codes::LOAD_CACHE_ERROR,
            Self::Resolution { .. } => codes::LOAD_RESOLUTION_ERROR,
            Self::Execution { .. } => codes::LOAD_EXECUTION_ERROR,
            Self::Engine(_) => codes::LOAD_ENGINE_ERROR,
            Self::Client { .. } => codes::LOAD_CLIENT_ERROR,
        }
    }

    /// Get the failure category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::Resolution { .. } => ErrorKind::Absent,
            Self::Read { .. } | Self::InvalidUrl { .. } | Self::Transport { .. } => {
                ErrorKind::Retrieval
            }
            Self::HttpStatus { .. } => ErrorKind::Remote,
            Self::Execution { .. } => ErrorKind::Execution,
            Self::Cache { .. } | Self::Engine(_) | Self::Client { .. } => ErrorKind::Internal,
        }
    }

    /// HTTP status code, if this is a status error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Map an I/O error on a local path to `NotFound` or `Read`.
    #[must_use]
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Read { path, source }
        }
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }
}
