//! Block-per-file disk store
//!
//! Layout: `<root>/<file_index>/<block_index>.blk`. Blocks are written to a
//! temporary file first and renamed into place, so a reader never observes a
//! half-written block.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::{BlockSink, BlockSource};
use crate::container::BlockLocation;
use crate::error::BackendError;

/// Block store backed by one file per block
#[derive(Debug, Clone)]
pub struct DiskBlockStore {
    root: PathBuf,
}

impl DiskBlockStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!("Opened disk block store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path holding the block at `location`
    pub fn block_path(&self, location: BlockLocation) -> PathBuf {
        self.root
            .join(location.file_index.to_string())
            .join(format!("{}.blk", location.block_index))
    }

    /// Whether the block at `location` has been stored
    pub fn contains(&self, location: BlockLocation) -> bool {
        self.block_path(location).is_file()
    }
}

impl BlockSource for DiskBlockStore {
    fn get(&self, location: BlockLocation, buf: &mut [u8]) -> Result<usize, BackendError> {
        let path = self.block_path(location);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BackendError::NotFound(location));
            }
            Err(e) => return Err(e.into()),
        };

        let actual = file.metadata()?.len() as usize;
        if actual > buf.len() {
            return Err(BackendError::Oversized {
                location,
                actual,
                capacity: buf.len(),
            });
        }

        file.read_exact(&mut buf[..actual])?;
        trace!("Read {} ({} bytes) from {}", location, actual, path.display());
        Ok(actual)
    }
}

impl BlockSink for DiskBlockStore {
    fn put(&self, location: BlockLocation, data: &[u8]) -> Result<(), BackendError> {
        let path = self.block_path(location);
        let temp_path = path.with_extension("tmp");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &path)?;
        trace!("Stored {} ({} bytes) at {}", location, data.len(), path.display());
        Ok(())
    }
}
