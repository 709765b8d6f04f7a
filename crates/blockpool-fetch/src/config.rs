//! Downloader configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{DownloadError, Result};

/// Default number of attempts per download
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default progress granularity in percentage points
pub const DEFAULT_PROGRESS_STEP: f64 = 0.1;

/// Default size of the write buffer in front of the destination file (128 KiB)
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Attempts per download, including the first one
    pub max_attempts: u32,

    /// Minimum change in completion percentage between progress callbacks
    pub progress_step: f64,

    /// Write buffer size in bytes
    pub buffer_size: usize,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Whole-request timeout, `None` for unbounded transfers
    pub request_timeout: Option<Duration>,

    /// Pause between attempts
    pub retry_delay: Duration,

    /// User agent sent with every request
    pub user_agent: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            progress_step: DEFAULT_PROGRESS_STEP,
            buffer_size: DEFAULT_BUFFER_SIZE,
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            retry_delay: Duration::ZERO,
            user_agent: None,
        }
    }
}

impl DownloadConfig {
    /// Create configuration from environment variables
    ///
    /// Reads `BLOCKPOOL_FETCH_MAX_ATTEMPTS`, `BLOCKPOOL_FETCH_PROGRESS_STEP`,
    /// `BLOCKPOOL_FETCH_BUFFER_SIZE`, `BLOCKPOOL_FETCH_CONNECT_TIMEOUT` (seconds),
    /// `BLOCKPOOL_FETCH_REQUEST_TIMEOUT` (seconds), `BLOCKPOOL_FETCH_RETRY_DELAY`
    /// (milliseconds) and `BLOCKPOOL_FETCH_USER_AGENT`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            max_attempts: env_parse("BLOCKPOOL_FETCH_MAX_ATTEMPTS").unwrap_or(defaults.max_attempts),
            progress_step: env_parse("BLOCKPOOL_FETCH_PROGRESS_STEP")
                .unwrap_or(defaults.progress_step),
            buffer_size: env_parse("BLOCKPOOL_FETCH_BUFFER_SIZE").unwrap_or(defaults.buffer_size),
            connect_timeout: env_parse("BLOCKPOOL_FETCH_CONNECT_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            request_timeout: env_parse("BLOCKPOOL_FETCH_REQUEST_TIMEOUT").map(Duration::from_secs),
            retry_delay: env_parse("BLOCKPOOL_FETCH_RETRY_DELAY")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_delay),
            user_agent: std::env::var("BLOCKPOOL_FETCH_USER_AGENT").ok(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(DownloadError::invalid_configuration(
                "max_attempts must be at least 1",
            ));
        }
        if !self.progress_step.is_finite() || self.progress_step < 0.0 {
            return Err(DownloadError::invalid_configuration(format!(
                "progress_step must be a non-negative number, got {}",
                self.progress_step
            )));
        }
        if self.buffer_size == 0 {
            return Err(DownloadError::invalid_configuration(
                "buffer_size must be positive",
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
