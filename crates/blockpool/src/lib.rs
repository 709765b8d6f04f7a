//! Block-addressed virtual file pool
//!
//! Lets the files of a multi-file container be read with arbitrary seeks and
//! partial reads, and written sequentially, while the storage underneath only
//! ever moves whole fixed-size blocks. Patch application and generation use it
//! to work on large files without holding them in memory, against back ends
//! that know nothing about byte ranges.
//!
//! # Architecture
//!
//! ```text
//!            caller (patcher, differ, ...)
//!                 │ Read + Seek      │ Write
//!          ┌──────┴──────┐    ┌──────┴──────┐
//!          │ PoolReader  │    │ PoolWriter  │   one block buffer each
//!          └──────┬──────┘    └──────┬──────┘
//!                 │ get(block)       │ put(block)
//!          ┌──────┴──────┐    ┌──────┴──────┐
//!          │ BlockSource │    │  BlockSink  │   memory, disk, directory, ...
//!          └─────────────┘    └─────────────┘
//! ```
//!
//! [`BlockPool`] ties a [`Container`] to one source and one sink, owns the
//! single live reader, and hands out writers.
//!
//! # Blocks
//!
//! Block `i` of a file covers bytes `[i * block_size, (i + 1) * block_size)`.
//! The final block of a file holds only the remainder; a file whose size is a
//! multiple of the block size has no short block and no empty trailing block.
//!
//! # Threading
//!
//! Pools and cursors are driven from one thread at a time (`&mut self`). Back
//! ends are shared through `Arc` and must be `Send + Sync`. Every fetch and
//! store is synchronous; the pool never retries, batches or reorders them.

pub mod backend;
pub mod config;
pub mod container;
pub mod error;
pub mod pool;
pub mod reader;
pub mod writer;

pub use backend::{
    BlockSink, BlockSource, DirectorySink, DirectorySource, DiskBlockStore, MemoryBlockStore,
    StoreStats,
};
pub use config::PoolConfig;
pub use container::{BlockLocation, Container, FileDescriptor, block_count, block_len};
pub use error::{BackendError, PoolError, Result};
pub use pool::BlockPool;
pub use reader::PoolReader;
pub use writer::PoolWriter;
