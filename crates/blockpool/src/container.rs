//! Container manifests and block addressing
//!
//! A [`Container`] is the ordered list of files packed in an archive. The pool
//! only ever looks at a file's index and size; paths are carried along for
//! back ends that map files onto a real directory tree.

use crate::error::{PoolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single file in a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Position of the file in the container
    pub index: usize,
    /// Size of the file in bytes
    pub size: u64,
    /// Path of the file relative to the container root
    pub path: String,
}

/// Manifest entry as produced by container builders
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestEntry {
    path: String,
    size: u64,
}

/// Immutable, ordered manifest of the files in an archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    files: Vec<FileDescriptor>,
}

impl Container {
    /// Build a container from `(path, size)` pairs, indexed by position
    pub fn from_entries<I, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, u64)>,
        P: Into<String>,
    {
        let files = entries
            .into_iter()
            .enumerate()
            .map(|(index, (path, size))| FileDescriptor {
                index,
                size,
                path: path.into(),
            })
            .collect();

        Self { files }
    }

    /// Parse a JSON manifest: an array of `{"path": ..., "size": ...}` objects
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<ManifestEntry> =
            serde_json::from_str(json).map_err(|e| PoolError::InvalidContainer(e.to_string()))?;
        Ok(Self::from_entries(
            entries.into_iter().map(|entry| (entry.path, entry.size)),
        ))
    }

    /// Render the manifest in the shape accepted by [`Container::from_json`]
    pub fn to_json(&self) -> Result<String> {
        let entries: Vec<ManifestEntry> = self
            .files
            .iter()
            .map(|file| ManifestEntry {
                path: file.path.clone(),
                size: file.size,
            })
            .collect();
        serde_json::to_string_pretty(&entries).map_err(|e| PoolError::InvalidContainer(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }

    /// Look up a file by index
    pub fn file(&self, index: usize) -> Result<&FileDescriptor> {
        self.files
            .get(index)
            .ok_or(PoolError::FileIndexOutOfRange {
                index,
                count: self.files.len(),
            })
    }

    /// Sum of all file sizes
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|file| file.size).sum()
    }

    /// Number of blocks file `index` spans at the given block size
    pub fn block_count(&self, index: usize, block_size: usize) -> Result<u64> {
        Ok(block_count(self.file(index)?.size, block_size))
    }
}

/// Address of one block of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockLocation {
    pub file_index: usize,
    pub block_index: u64,
}

impl BlockLocation {
    pub const fn new(file_index: usize, block_index: u64) -> Self {
        Self {
            file_index,
            block_index,
        }
    }
}

impl fmt::Display for BlockLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file {} block {}", self.file_index, self.block_index)
    }
}

/// Number of blocks needed to hold `size` bytes
pub fn block_count(size: u64, block_size: usize) -> u64 {
    size.div_ceil(block_size as u64)
}

/// Length of block `block_index` of a `size` byte file
///
/// Every block is `block_size` long except the last one, which holds the
/// remainder. Blocks past the end of the file have length 0.
pub fn block_len(size: u64, block_size: usize, block_index: u64) -> usize {
    let start = block_index.saturating_mul(block_size as u64);
    size.saturating_sub(start).min(block_size as u64) as usize
}
