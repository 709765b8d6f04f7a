//! Error types for block pool operations

use crate::container::BlockLocation;
use thiserror::Error;

/// Errors reported by a block source or sink implementation
#[derive(Debug, Error)]
pub enum BackendError {
    /// The requested block does not exist upstream
    #[error("Block not found: {0}")]
    NotFound(BlockLocation),

    /// The stored block does not fit into the caller's buffer
    #[error("Block {location} holds {actual} bytes, expected at most {capacity}")]
    Oversized {
        location: BlockLocation,
        actual: usize,
        capacity: usize,
    },

    /// The back end has no file with this index
    #[error("Unknown file index: {0}")]
    UnknownFile(usize),

    /// IO error in the underlying storage
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Back end specific failure
    #[error("Backend error: {0}")]
    Other(String),
}

impl BackendError {
    /// Create a back end specific error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Errors that can occur while reading or writing through a pool
#[derive(Debug, Error)]
pub enum PoolError {
    // Configuration errors
    #[error("Block pool has no source configured")]
    NoSource,

    #[error("Block pool has no sink configured")]
    NoSink,

    #[error("Invalid block size: {0}")]
    InvalidBlockSize(usize),

    #[error("File index {index} out of range (container holds {count} files)")]
    FileIndexOutOfRange { index: usize, count: usize },

    #[error("Invalid container manifest: {0}")]
    InvalidContainer(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // Backend errors
    #[error("Failed to fetch {location}")]
    Fetch {
        location: BlockLocation,
        #[source]
        source: BackendError,
    },

    #[error("Failed to store {location}")]
    Store {
        location: BlockLocation,
        #[source]
        source: BackendError,
    },

    #[error("Failed to prepare file {file_index} for writing")]
    Prepare {
        file_index: usize,
        #[source]
        source: BackendError,
    },

    #[error("Failed to release file {file_index}")]
    Release {
        file_index: usize,
        #[source]
        source: BackendError,
    },

    #[error("Short block {location}: expected {expected} bytes, got {actual}")]
    ShortBlock {
        location: BlockLocation,
        expected: usize,
        actual: usize,
    },

    // Usage errors
    #[error("Offset {offset} is past the end of a {size} byte file")]
    SeekOutOfRange { offset: u64, size: u64 },

    #[error("Seek to a negative position")]
    NegativeSeek,

    #[error("Reader for file {0} is closed")]
    ReaderClosed(usize),

    #[error("Writer for file {0} is closed")]
    WriterClosed(usize),

    #[error("Writer for file {0} failed an earlier flush")]
    WriterPoisoned(usize),

    #[error("Write of {len} bytes at offset {offset} overflows a {size} byte file")]
    WriteOverflow { offset: u64, len: usize, size: u64 },

    #[error("File {0} already has an open writer")]
    WriterBusy(usize),

    #[error("Block pool is closed")]
    PoolClosed,
}

impl PoolError {
    /// Missing capability, bad index or bad parameters
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NoSource
                | Self::NoSink
                | Self::InvalidBlockSize(_)
                | Self::FileIndexOutOfRange { .. }
                | Self::InvalidContainer(_)
                | Self::InvalidConfiguration(_)
        )
    }

    /// Failure reported by (or caused by) a source or sink
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. }
                | Self::Store { .. }
                | Self::Prepare { .. }
                | Self::Release { .. }
                | Self::ShortBlock { .. }
        )
    }

    /// Caller misuse of a cursor or pool
    pub fn is_usage(&self) -> bool {
        !self.is_configuration() && !self.is_backend()
    }

    /// True when a fetch failed because the block is absent upstream
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Fetch {
                source: BackendError::NotFound(_),
                ..
            }
        )
    }

    pub(crate) fn fetch(location: BlockLocation, source: BackendError) -> Self {
        Self::Fetch { location, source }
    }

    pub(crate) fn store(location: BlockLocation, source: BackendError) -> Self {
        Self::Store { location, source }
    }
}

impl From<PoolError> for std::io::Error {
    fn from(err: PoolError) -> Self {
        let kind = if err.is_not_found() {
            std::io::ErrorKind::NotFound
        } else if err.is_usage() {
            std::io::ErrorKind::InvalidInput
        } else {
            std::io::ErrorKind::Other
        };
        Self::new(kind, err)
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
