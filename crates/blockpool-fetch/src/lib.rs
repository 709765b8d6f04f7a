//! Resumable HTTP downloads
//!
//! Fetches a remote file into a local path, continuing from whatever part of
//! it is already on disk. Typical use is filling a directory that a
//! `blockpool` directory source later serves blocks from.
//!
//! ```no_run
//! use blockpool_fetch::{DownloadConfig, ResumableDownloader};
//! use std::path::Path;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = ResumableDownloader::with_config(DownloadConfig::default())?;
//! let url = Url::parse("https://cdn.example.com/builds/1234/game.pak")?;
//!
//! let mut report = |percent: f64| println!("{percent:.1}%");
//! let outcome = downloader
//!     .download(&url, Path::new("game.pak"), &mut report)
//!     .await?;
//! println!("{} bytes on disk", outcome.total_bytes);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod progress;
pub mod resumable;

pub use config::DownloadConfig;
pub use error::{DownloadError, Result};
pub use progress::{ProgressObserver, ProgressTracker};
pub use resumable::{DownloadOutcome, ResumableDownloader};
