//! Blocks mapped onto a plain directory tree
//!
//! Block `b` of file `i` lives at byte offset `b * block_size` of
//! `<root>/<path of file i>`. The source reads an existing install in place;
//! the sink reconstructs one, sizing every file to its container entry.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{BlockSink, BlockSource};
use crate::container::{BlockLocation, Container};
use crate::error::BackendError;

/// Most recently used file handle, keyed by file index
type OpenFile = Mutex<Option<(usize, File)>>;

fn file_path(
    root: &Path,
    container: &Container,
    file_index: usize,
) -> Result<PathBuf, BackendError> {
    let file = container
        .file(file_index)
        .map_err(|_| BackendError::UnknownFile(file_index))?;
    Ok(root.join(&file.path))
}

fn block_offset(location: BlockLocation, block_size: usize) -> u64 {
    location.block_index * block_size as u64
}

/// Source reading blocks straight out of the files of a directory
#[derive(Debug)]
pub struct DirectorySource {
    root: PathBuf,
    container: Arc<Container>,
    block_size: usize,
    open: OpenFile,
}

impl DirectorySource {
    /// `block_size` must match the block size of the pool this source backs
    pub fn new(root: impl Into<PathBuf>, container: Arc<Container>, block_size: usize) -> Self {
        Self {
            root: root.into(),
            container,
            block_size,
            open: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlockSource for DirectorySource {
    fn get(&self, location: BlockLocation, buf: &mut [u8]) -> Result<usize, BackendError> {
        let mut open = self.open.lock();

        let file = match open.take() {
            Some((index, file)) if index == location.file_index => file,
            _ => {
                let path = file_path(&self.root, &self.container, location.file_index)?;
                trace!("Opening {} for block reads", path.display());
                File::open(&path)?
            }
        };
        let (_, file) = open.insert((location.file_index, file));

        file.seek(SeekFrom::Start(block_offset(location, self.block_size)))?;
        file.read_exact(buf)?;
        Ok(buf.len())
    }

    fn release(&self, file_index: usize) -> Result<(), BackendError> {
        let mut open = self.open.lock();
        if matches!(open.as_ref(), Some((index, _)) if *index == file_index) {
            debug!("Closing file {} in {}", file_index, self.root.display());
            *open = None;
        }
        Ok(())
    }
}

/// Sink writing blocks into the files of a directory
#[derive(Debug)]
pub struct DirectorySink {
    root: PathBuf,
    container: Arc<Container>,
    block_size: usize,
    open: OpenFile,
}

impl DirectorySink {
    /// `block_size` must match the block size of the pool this sink backs
    pub fn new(root: impl Into<PathBuf>, container: Arc<Container>, block_size: usize) -> Self {
        Self {
            root: root.into(),
            container,
            block_size,
            open: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open the target of `file_index`, creating it and cutting it to its container size
    fn open_target(&self, file_index: usize) -> Result<File, BackendError> {
        let descriptor = self
            .container
            .file(file_index)
            .map_err(|_| BackendError::UnknownFile(file_index))?;
        let path = self.root.join(&descriptor.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        trace!("Opening {} for block writes", path.display());
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        // Drops any stale tail left by an earlier, longer version of the file
        file.set_len(descriptor.size)?;
        Ok(file)
    }
}

impl BlockSink for DirectorySink {
    fn put(&self, location: BlockLocation, data: &[u8]) -> Result<(), BackendError> {
        let mut open = self.open.lock();

        let file = match open.take() {
            Some((index, file)) if index == location.file_index => file,
            _ => self.open_target(location.file_index)?,
        };
        let (_, file) = open.insert((location.file_index, file));

        file.seek(SeekFrom::Start(block_offset(location, self.block_size)))?;
        file.write_all(data)?;
        Ok(())
    }

    fn prepare(&self, file_index: usize) -> Result<(), BackendError> {
        let file = self.open_target(file_index)?;
        *self.open.lock() = Some((file_index, file));
        Ok(())
    }
}
