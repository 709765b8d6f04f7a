//! Block source and sink capabilities
//!
//! The pool never touches storage itself. It asks a [`BlockSource`] for whole
//! blocks when reading and hands whole blocks to a [`BlockSink`] when writing.
//! Anything that can serve or accept blocks keyed by [`BlockLocation`] can back
//! a pool: memory, a block-per-file cache directory, a plain directory tree, or
//! a network store.
//!
//! Both traits take `&self` so one back end can be shared between a pool's
//! reader and any number of writers through an `Arc`. Back ends that keep
//! mutable state guard it themselves.

mod directory;
mod disk;
mod memory;

pub use directory::{DirectorySink, DirectorySource};
pub use disk::DiskBlockStore;
pub use memory::{MemoryBlockStore, StoreStats};

use crate::container::BlockLocation;
use crate::error::BackendError;

/// Read side of a block store
pub trait BlockSource: Send + Sync {
    /// Copy the contents of the block at `location` into `buf`
    ///
    /// `buf` is exactly as long as the block is expected to be: the pool's
    /// block size, or the remainder for the final block of a file. Returns the
    /// number of bytes written.
    fn get(&self, location: BlockLocation, buf: &mut [u8]) -> Result<usize, BackendError>;

    /// Called once when the pool stops reading `file_index`
    fn release(&self, file_index: usize) -> Result<(), BackendError> {
        let _ = file_index;
        Ok(())
    }
}

/// Write side of a block store
pub trait BlockSink: Send + Sync {
    /// Persist one block
    ///
    /// `data` is a full block except for the final block of a file. Each
    /// location is expected to be written at most once per reconstruction.
    fn put(&self, location: BlockLocation, data: &[u8]) -> Result<(), BackendError>;

    /// Called when a writer for `file_index` opens, before any block is put
    ///
    /// Files that receive no blocks at all (empty files) only ever see this
    /// call.
    fn prepare(&self, file_index: usize) -> Result<(), BackendError> {
        let _ = file_index;
        Ok(())
    }
}
