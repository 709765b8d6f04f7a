//! Block pool: hands out readers and writers bound to container files

use std::sync::Arc;

use tracing::debug;

use crate::backend::{BlockSink, BlockSource};
use crate::config::PoolConfig;
use crate::container::Container;
use crate::error::{PoolError, Result};
use crate::reader::PoolReader;
use crate::writer::{PoolWriter, WriterRegistry};

/// Maps reads, seeks and writes on container files to whole-block transfers
///
/// The pool keeps at most one reader alive. Asking for the same file again
/// returns that reader with its cursor where it was left; asking for another
/// file closes it and starts a fresh one at offset 0.
///
/// Writers are not cached: each [`BlockPool::writer`] call returns a new one,
/// owned by the caller, who must close it. Only one writer per file index may
/// be open at a time.
///
/// # Example
///
/// ```
/// use std::io::{Read, Write};
/// use std::sync::Arc;
/// use blockpool::{BlockPool, Container, MemoryBlockStore};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let container = Container::from_entries([("readme.txt", 11)]);
/// let store = Arc::new(MemoryBlockStore::new());
/// let mut pool = BlockPool::new(container, 4)?
///     .with_source(store.clone())
///     .with_sink(store);
///
/// let mut writer = pool.writer(0)?;
/// writer.write_all(b"hello world")?;
/// writer.close()?;
///
/// let mut text = String::new();
/// pool.reader(0)?.read_to_string(&mut text)?;
/// assert_eq!(text, "hello world");
/// pool.close()?;
/// # Ok(())
/// # }
/// ```
pub struct BlockPool {
    container: Arc<Container>,
    block_size: usize,
    source: Option<Arc<dyn BlockSource>>,
    sink: Option<Arc<dyn BlockSink>>,
    reader: Option<PoolReader>,
    writers: WriterRegistry,
    closed: bool,
}

impl BlockPool {
    /// Create a pool with no source and no sink
    pub fn new(container: impl Into<Arc<Container>>, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(PoolError::InvalidBlockSize(block_size));
        }

        Ok(Self {
            container: container.into(),
            block_size,
            source: None,
            sink: None,
            reader: None,
            writers: WriterRegistry::default(),
            closed: false,
        })
    }

    pub fn with_config(container: impl Into<Arc<Container>>, config: &PoolConfig) -> Result<Self> {
        config.validate()?;
        Self::new(container, config.block_size)
    }

    /// Set the back end readers fetch blocks from
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn BlockSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the back end writers store blocks into
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn BlockSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// File index of the live reader, if there is one
    pub fn open_reader_index(&self) -> Option<usize> {
        self.reader.as_ref().map(PoolReader::file_index)
    }

    /// Whether a writer for `file_index` is currently open
    pub fn has_open_writer(&self, file_index: usize) -> bool {
        self.writers.is_open(file_index)
    }

    /// Reader for `file_index`, reusing the live one when it matches
    ///
    /// A reused reader keeps its offset. If the live reader belongs to another
    /// file it is closed first; when that close fails the error is returned
    /// and the old reader stays in place. A reader the caller already closed
    /// is replaced by a fresh one at offset 0.
    pub fn reader(&mut self, file_index: usize) -> Result<&mut PoolReader> {
        self.ensure_open()?;
        let source = self.source.clone().ok_or(PoolError::NoSource)?;
        let size = self.container.file(file_index)?.size;

        match self.reader.take() {
            Some(reader) if reader.file_index() == file_index && !reader.is_closed() => {
                Ok(self.reader.insert(reader))
            }
            stale => {
                if let Some(mut stale) = stale {
                    debug!(
                        "Switching reader from file {} to file {}",
                        stale.file_index(),
                        file_index
                    );
                    if let Err(e) = stale.close() {
                        self.reader = Some(stale);
                        return Err(e);
                    }
                }

                let reader = PoolReader::new(source, file_index, size, self.block_size);
                Ok(self.reader.insert(reader))
            }
        }
    }

    /// New writer for `file_index`, starting at offset 0
    ///
    /// The sink is asked to prepare the file before the writer is returned.
    pub fn writer(&self, file_index: usize) -> Result<PoolWriter> {
        self.ensure_open()?;
        let sink = self.sink.clone().ok_or(PoolError::NoSink)?;
        let size = self.container.file(file_index)?.size;
        let lease = self.writers.acquire(file_index)?;
        sink.prepare(file_index)
            .map_err(|source| PoolError::Prepare { file_index, source })?;

        debug!("Opened writer for file {} ({} bytes)", file_index, size);
        Ok(PoolWriter::new(sink, file_index, size, self.block_size, lease))
    }

    /// Close the live reader, if any
    ///
    /// Open writers are left alone; their owners close them. After a
    /// successful close the pool hands out no more cursors.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        if let Some(reader) = self.reader.as_mut() {
            reader.close()?;
            self.reader = None;
        }

        self.closed = true;
        debug!("Closed block pool");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(PoolError::PoolClosed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for BlockPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockPool")
            .field("files", &self.container.len())
            .field("block_size", &self.block_size)
            .field("has_source", &self.has_source())
            .field("has_sink", &self.has_sink())
            .field("reader", &self.reader)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
