//! Error types for resumable downloads

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadError {
    // Network errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server error: http {status}")]
    ServerStatus { status: StatusCode },

    #[error("Body ended early: expected {expected} bytes, have {actual}")]
    Incomplete { expected: u64, actual: u64 },

    #[error("Server did not report a content length")]
    MissingContentLength,

    // Configuration errors
    #[error("Invalid download configuration: {0}")]
    InvalidConfiguration(String),

    // File errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Create a server status error
    pub fn server_status(status: StatusCode) -> Self {
        Self::ServerStatus { status }
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
