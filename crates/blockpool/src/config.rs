//! Pool configuration

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, Result};

/// Default block size (4 MiB)
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Configuration shared by every pool built from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Size of a content block in bytes; the last block of a file may be shorter
    pub block_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl PoolConfig {
    pub fn with_block_size(block_size: usize) -> Self {
        Self { block_size }
    }

    /// Create configuration from environment variables
    ///
    /// Reads `BLOCKPOOL_BLOCK_SIZE`; unset or unparsable values fall back to the default.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            block_size: std::env::var("BLOCKPOOL_BLOCK_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_BLOCK_SIZE),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no pool can run with
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(PoolError::InvalidBlockSize(self.block_size));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.block_size, 4 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let err = PoolConfig::with_block_size(0).validate().unwrap_err();
        assert!(matches!(err, PoolError::InvalidBlockSize(0)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PoolConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PoolConfig::default());

        let config: PoolConfig = serde_json::from_str(r#"{"block_size": 65536}"#).unwrap();
        assert_eq!(config.block_size, 65536);
    }
}
