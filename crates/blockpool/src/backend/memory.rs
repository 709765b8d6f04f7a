//! In-memory block store

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::trace;

use super::{BlockSink, BlockSource};
use crate::container::{BlockLocation, block_count, block_len};
use crate::error::BackendError;

/// Snapshot of store activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub get_count: u64,
    pub miss_count: u64,
    pub put_count: u64,
    pub release_count: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

/// Block store keeping every block in a hash map
///
/// Serves as both source and sink, so a reconstruction can write into it and
/// a later pool can read the result back.
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<HashMap<BlockLocation, Bytes>>,
    get_count: AtomicU64,
    miss_count: AtomicU64,
    put_count: AtomicU64,
    release_count: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split `data` into blocks and store them as file `file_index`
    pub fn load_file(&self, file_index: usize, data: &[u8], block_size: usize) {
        let size = data.len() as u64;
        let mut blocks = self.blocks.write();
        let mut start = 0;
        for block_index in 0..block_count(size, block_size) {
            let len = block_len(size, block_size, block_index);
            blocks.insert(
                BlockLocation::new(file_index, block_index),
                Bytes::copy_from_slice(&data[start..start + len]),
            );
            start += len;
        }
    }

    /// Stored contents of one block
    pub fn block(&self, location: BlockLocation) -> Option<Bytes> {
        self.blocks.read().get(&location).cloned()
    }

    /// Concatenation of the consecutive blocks of `file_index` starting at block 0
    pub fn file_contents(&self, file_index: usize) -> Vec<u8> {
        let blocks = self.blocks.read();
        let mut contents = Vec::new();
        let mut block_index = 0;
        while let Some(block) = blocks.get(&BlockLocation::new(file_index, block_index)) {
            contents.extend_from_slice(block);
            block_index += 1;
        }
        contents
    }

    /// Number of stored blocks
    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            get_count: self.get_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            put_count: self.put_count.load(Ordering::Relaxed),
            release_count: self.release_count.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

impl BlockSource for MemoryBlockStore {
    fn get(&self, location: BlockLocation, buf: &mut [u8]) -> Result<usize, BackendError> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let blocks = self.blocks.read();
        let Some(block) = blocks.get(&location) else {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            return Err(BackendError::NotFound(location));
        };

        if block.len() > buf.len() {
            return Err(BackendError::Oversized {
                location,
                actual: block.len(),
                capacity: buf.len(),
            });
        }

        buf[..block.len()].copy_from_slice(block);
        self.bytes_read
            .fetch_add(block.len() as u64, Ordering::Relaxed);
        trace!("Served {} ({} bytes) from memory", location, block.len());
        Ok(block.len())
    }

    fn release(&self, _file_index: usize) -> Result<(), BackendError> {
        self.release_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl BlockSink for MemoryBlockStore {
    fn put(&self, location: BlockLocation, data: &[u8]) -> Result<(), BackendError> {
        self.put_count.fetch_add(1, Ordering::Relaxed);
        self.bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);

        if self
            .blocks
            .write()
            .insert(location, Bytes::copy_from_slice(data))
            .is_some()
        {
            trace!("Replaced existing {}", location);
        }
        Ok(())
    }
}
