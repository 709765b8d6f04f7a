//! Random-access reader over a block source

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use tracing::trace;

use crate::backend::BlockSource;
use crate::container::{BlockLocation, block_len};
use crate::error::{PoolError, Result};

/// Read/seek cursor over one file of a pool
///
/// Keeps the most recently fetched block in memory, so reads and seeks that
/// stay within one block never go back to the source. Obtained from
/// [`BlockPool::reader`](crate::BlockPool::reader), which owns it.
pub struct PoolReader {
    source: Arc<dyn BlockSource>,
    file_index: usize,
    size: u64,
    block_size: usize,
    offset: u64,
    cached_block: Option<u64>,
    block_buf: Vec<u8>,
    closed: bool,
}

impl PoolReader {
    pub(crate) fn new(
        source: Arc<dyn BlockSource>,
        file_index: usize,
        size: u64,
        block_size: usize,
    ) -> Self {
        Self {
            source,
            file_index,
            size,
            block_size,
            offset: 0,
            cached_block: None,
            block_buf: vec![0; block_size],
            closed: false,
        }
    }

    pub fn file_index(&self) -> usize {
        self.file_index
    }

    /// Size of the file in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Current cursor position
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Index of the block currently held in memory, if any
    pub fn cached_block(&self) -> Option<u64> {
        self.cached_block
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Copy bytes at the cursor into `buf`, fetching blocks as needed
    ///
    /// Returns the number of bytes copied, which is less than `buf.len()` only
    /// when the end of the file was reached. Reading at the end returns 0.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(PoolError::ReaderClosed(self.file_index));
        }
        if self.offset > self.size {
            return Err(PoolError::SeekOutOfRange {
                offset: self.offset,
                size: self.size,
            });
        }

        let block_size = self.block_size as u64;
        let mut copied = 0;

        while copied < buf.len() && self.offset < self.size {
            let block_index = self.offset / block_size;
            let len = self.load_block(block_index)?;

            let interior = (self.offset % block_size) as usize;
            let n = (buf.len() - copied).min(len - interior);
            buf[copied..copied + n].copy_from_slice(&self.block_buf[interior..interior + n]);

            copied += n;
            self.offset += n as u64;
        }

        Ok(copied)
    }

    /// Move the cursor
    ///
    /// Positions past the end of the file are accepted and reported by the
    /// next read. The cached block survives the seek.
    pub fn seek_to(&mut self, pos: SeekFrom) -> Result<u64> {
        if self.closed {
            return Err(PoolError::ReaderClosed(self.file_index));
        }

        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.offset.checked_add_signed(delta),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
        };

        let offset = target.ok_or(PoolError::NegativeSeek)?;
        self.offset = offset;
        Ok(offset)
    }

    /// Drop the block buffer and tell the source this file is done
    ///
    /// Nothing is flushed. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.source
            .release(self.file_index)
            .map_err(|source| PoolError::Release {
                file_index: self.file_index,
                source,
            })?;

        self.block_buf = Vec::new();
        self.cached_block = None;
        self.closed = true;
        trace!("Closed reader for file {}", self.file_index);
        Ok(())
    }

    /// Make sure `block_index` is in the buffer and return its length
    fn load_block(&mut self, block_index: u64) -> Result<usize> {
        let expected = block_len(self.size, self.block_size, block_index);
        if self.cached_block == Some(block_index) {
            return Ok(expected);
        }

        let location = BlockLocation::new(self.file_index, block_index);
        self.cached_block = None;

        let actual = self
            .source
            .get(location, &mut self.block_buf[..expected])
            .map_err(|source| PoolError::fetch(location, source))?;
        if actual != expected {
            return Err(PoolError::ShortBlock {
                location,
                expected,
                actual,
            });
        }

        trace!("Fetched {} ({} bytes)", location, expected);
        self.cached_block = Some(block_index);
        Ok(expected)
    }
}

impl std::fmt::Debug for PoolReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolReader")
            .field("file_index", &self.file_index)
            .field("size", &self.size)
            .field("block_size", &self.block_size)
            .field("offset", &self.offset)
            .field("cached_block", &self.cached_block)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Read for PoolReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_bytes(buf)?)
    }
}

impl Seek for PoolReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.seek_to(pos)?)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.offset)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::MemoryBlockStore;
    use crate::error::BackendError;
    use pretty_assertions::assert_eq;

    fn reader_over(data: &[u8], block_size: usize) -> (PoolReader, Arc<MemoryBlockStore>) {
        let store = Arc::new(MemoryBlockStore::new());
        store.load_file(0, data, block_size);
        let reader = PoolReader::new(store.clone(), 0, data.len() as u64, block_size);
        (reader, store)
    }

    #[test]
    fn test_read_across_blocks() {
        let (mut reader, store) = reader_over(b"hello, block world", 4);

        let mut buf = [0u8; 7];
        assert_eq!(reader.read_bytes(&mut buf).unwrap(), 7);
        assert_eq!(&buf, b"hello, ");
        assert_eq!(reader.offset(), 7);
        assert_eq!(reader.cached_block(), Some(1));
        assert_eq!(store.stats().get_count, 2);
    }

    #[test]
    fn test_read_stops_at_end() {
        let (mut reader, _store) = reader_over(b"0123456789", 4);

        let mut buf = [0u8; 32];
        assert_eq!(reader.read_bytes(&mut buf).unwrap(), 10);
        assert_eq!(&buf[..10], b"0123456789");
        assert_eq!(reader.read_bytes(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_seek_within_block_reuses_cache() {
        let (mut reader, store) = reader_over(b"abcdefgh", 4);

        let mut byte = [0u8; 1];
        reader.read_bytes(&mut byte).unwrap();
        reader.seek_to(SeekFrom::Start(3)).unwrap();
        reader.read_bytes(&mut byte).unwrap();
        assert_eq!(&byte, b"d");
        reader.seek_to(SeekFrom::Current(-3)).unwrap();
        reader.read_bytes(&mut byte).unwrap();
        assert_eq!(&byte, b"b");

        assert_eq!(store.stats().get_count, 1);
    }

    #[test]
    fn test_seek_from_end() {
        let (mut reader, _store) = reader_over(b"abcdefghij", 4);

        assert_eq!(reader.seek_to(SeekFrom::End(-2)).unwrap(), 8);
        let mut buf = [0u8; 4];
        assert_eq!(reader.read_bytes(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ij");
    }

    #[test]
    fn test_seek_past_end_fails_on_read() {
        let (mut reader, _store) = reader_over(b"abcd", 4);

        assert_eq!(reader.seek_to(SeekFrom::Start(10)).unwrap(), 10);
        let mut buf = [0u8; 1];
        assert!(matches!(
            reader.read_bytes(&mut buf),
            Err(PoolError::SeekOutOfRange { offset: 10, size: 4 })
        ));
    }

    #[test]
    fn test_negative_seek_rejected() {
        let (mut reader, _store) = reader_over(b"abcd", 4);
        assert!(matches!(
            reader.seek_to(SeekFrom::Current(-1)),
            Err(PoolError::NegativeSeek)
        ));
        assert_eq!(reader.offset(), 0);
    }

    #[test]
    fn test_fetch_failure_invalidates_cache() {
        let store = Arc::new(MemoryBlockStore::new());
        store.load_file(0, b"abcd", 4);
        // Block 1 is never stored
        let mut reader = PoolReader::new(store, 0, 8, 4);

        let mut buf = [0u8; 8];
        let err = reader.read_bytes(&mut buf).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(reader.cached_block(), None);
        assert_eq!(reader.offset(), 4);
    }

    #[test]
    fn test_short_block_reported() {
        struct Truncating;
        impl BlockSource for Truncating {
            fn get(&self, _: BlockLocation, buf: &mut [u8]) -> std::result::Result<usize, BackendError> {
                Ok(buf.len() / 2)
            }
        }

        let mut reader = PoolReader::new(Arc::new(Truncating), 0, 8, 8);
        let mut buf = [0u8; 8];
        assert!(matches!(
            reader.read_bytes(&mut buf),
            Err(PoolError::ShortBlock {
                expected: 8,
                actual: 4,
                ..
            })
        ));
        assert_eq!(reader.cached_block(), None);
    }

    #[test]
    fn test_close_releases_once() {
        let (mut reader, store) = reader_over(b"abcd", 4);

        reader.close().unwrap();
        reader.close().unwrap();
        assert!(reader.is_closed());
        assert_eq!(store.stats().release_count, 1);

        let mut buf = [0u8; 1];
        assert!(matches!(
            reader.read_bytes(&mut buf),
            Err(PoolError::ReaderClosed(0))
        ));
    }

    #[test]
    fn test_std_io_traits() {
        let (mut reader, _store) = reader_over(b"the quick brown fox", 5);

        reader.seek(SeekFrom::Start(4)).unwrap();
        let mut word = String::new();
        reader.by_ref().take(5).read_to_string(&mut word).unwrap();
        assert_eq!(word, "quick");
        assert_eq!(reader.stream_position().unwrap(), 9);

        let err = reader.seek(SeekFrom::End(-100)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
