//! Sequential writer over a block sink

use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::backend::BlockSink;
use crate::container::BlockLocation;
use crate::error::{PoolError, Result};

/// File indices that currently have an open writer
#[derive(Debug, Clone, Default)]
pub(crate) struct WriterRegistry(Arc<Mutex<HashSet<usize>>>);

impl WriterRegistry {
    pub(crate) fn acquire(&self, file_index: usize) -> Result<WriterLease> {
        if !self.0.lock().insert(file_index) {
            return Err(PoolError::WriterBusy(file_index));
        }
        Ok(WriterLease {
            registry: self.clone(),
            file_index,
        })
    }

    pub(crate) fn is_open(&self, file_index: usize) -> bool {
        self.0.lock().contains(&file_index)
    }
}

/// Claim on a file index, given back when dropped
#[derive(Debug)]
pub(crate) struct WriterLease {
    registry: WriterRegistry,
    file_index: usize,
}

impl Drop for WriterLease {
    fn drop(&mut self) {
        self.registry.0.lock().remove(&self.file_index);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Open,
    Poisoned,
    Closed,
}

/// Sequential write cursor over one file of a pool
///
/// Bytes accumulate in a block-sized buffer. Each time the buffer fills it is
/// handed to the sink before `write` returns, so a sink failure surfaces on the
/// write that completed the block. The trailing partial block is only sent by
/// [`PoolWriter::close`]; `flush` never sends a partial block.
///
/// Dropping a writer without closing it discards the buffered tail.
pub struct PoolWriter {
    sink: Arc<dyn BlockSink>,
    file_index: usize,
    size: u64,
    block_size: usize,
    offset: u64,
    block_index: u64,
    interior: usize,
    block_buf: Vec<u8>,
    state: WriterState,
    lease: Option<WriterLease>,
}

impl PoolWriter {
    pub(crate) fn new(
        sink: Arc<dyn BlockSink>,
        file_index: usize,
        size: u64,
        block_size: usize,
        lease: WriterLease,
    ) -> Self {
        Self {
            sink,
            file_index,
            size,
            block_size,
            offset: 0,
            block_index: 0,
            interior: 0,
            block_buf: vec![0; block_size],
            state: WriterState::Open,
            lease: Some(lease),
        }
    }

    pub fn file_index(&self) -> usize {
        self.file_index
    }

    /// Declared size of the file
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of bytes accepted so far
    ///
    /// After a failed store this drops back to the bytes the sink persisted.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes buffered but not yet handed to the sink
    pub fn buffered(&self) -> usize {
        self.interior
    }

    pub fn is_closed(&self) -> bool {
        self.state == WriterState::Closed
    }

    /// Buffer `buf`, sending every block it completes to the sink
    ///
    /// Either consumes all of `buf` or fails. Writes that would run past the
    /// declared file size are rejected up front.
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<usize> {
        self.ensure_open()?;

        if self.offset + buf.len() as u64 > self.size {
            return Err(PoolError::WriteOverflow {
                offset: self.offset,
                len: buf.len(),
                size: self.size,
            });
        }

        let mut consumed = 0;
        while consumed < buf.len() {
            let n = (buf.len() - consumed).min(self.block_size - self.interior);
            self.block_buf[self.interior..self.interior + n]
                .copy_from_slice(&buf[consumed..consumed + n]);

            self.interior += n;
            self.offset += n as u64;
            consumed += n;

            if self.interior == self.block_size {
                self.flush_block()?;
            }
        }

        Ok(consumed)
    }

    /// Send the trailing partial block, if any, and finish the writer
    ///
    /// A file whose size is a multiple of the block size gets no extra block.
    /// Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            WriterState::Closed => return Ok(()),
            WriterState::Poisoned => {
                self.finish();
                return Err(PoolError::WriterPoisoned(self.file_index));
            }
            WriterState::Open => {}
        }

        if self.offset < self.size {
            warn!(
                "Closing writer for file {} after {} of {} bytes",
                self.file_index, self.offset, self.size
            );
        }

        let result = if self.interior > 0 {
            self.flush_block()
        } else {
            Ok(())
        };

        self.finish();
        debug!(
            "Closed writer for file {} ({} blocks)",
            self.file_index, self.block_index
        );
        result
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            WriterState::Open => Ok(()),
            WriterState::Poisoned => Err(PoolError::WriterPoisoned(self.file_index)),
            WriterState::Closed => Err(PoolError::WriterClosed(self.file_index)),
        }
    }

    fn flush_block(&mut self) -> Result<()> {
        let location = BlockLocation::new(self.file_index, self.block_index);

        if let Err(source) = self.sink.put(location, &self.block_buf[..self.interior]) {
            // The lost block no longer counts towards the offset
            self.offset -= self.interior as u64;
            self.interior = 0;
            self.state = WriterState::Poisoned;
            return Err(PoolError::store(location, source));
        }

        trace!("Stored {} ({} bytes)", location, self.interior);
        self.block_index += 1;
        self.interior = 0;
        Ok(())
    }

    fn finish(&mut self) {
        self.state = WriterState::Closed;
        self.block_buf = Vec::new();
        self.lease = None;
    }
}

impl std::fmt::Debug for PoolWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolWriter")
            .field("file_index", &self.file_index)
            .field("size", &self.size)
            .field("block_size", &self.block_size)
            .field("offset", &self.offset)
            .field("block_index", &self.block_index)
            .field("interior", &self.interior)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Drop for PoolWriter {
    fn drop(&mut self) {
        if self.state == WriterState::Open && self.interior > 0 {
            warn!(
                "Writer for file {} dropped with {} unflushed bytes",
                self.file_index, self.interior
            );
        }
    }
}

impl Write for PoolWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_bytes(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ensure_open()?;
        Ok(())
    }
}
