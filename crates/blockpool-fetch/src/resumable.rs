//! Resumable downloads over HTTP range requests
//!
//! A download picks up from however many bytes the destination already holds.
//! The server's answer to `Range: bytes=<existing>-` decides what happens:
//!
//! | Status | Meaning | Action |
//! |--------|---------|--------|
//! | 200 | ranges unsupported | truncate, download everything |
//! | 206 | partial content | append from the existing offset |
//! | 416 | nothing left to send | HEAD for the real size, truncate if local data is longer |
//!
//! Failed attempts are retried after truncating the destination to empty.

use std::path::Path;

use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, HeaderMap, RANGE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::DownloadConfig;
use crate::error::{DownloadError, Result};
use crate::progress::{ProgressObserver, ProgressTracker};

/// Result of a completed download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Size of the destination once the download finished
    pub total_bytes: u64,
    /// Bytes transferred by the successful attempt
    pub downloaded_bytes: u64,
    /// Offset the successful attempt started writing at
    pub resumed_from: u64,
    /// Attempts used, including the successful one
    pub attempts: u32,
    /// Status of the ranged GET of the successful attempt
    pub status: StatusCode,
}

/// Downloads a URL to a local file, resuming partial downloads
#[derive(Debug, Clone)]
pub struct ResumableDownloader {
    client: Client,
    config: DownloadConfig,
}

impl ResumableDownloader {
    /// Create a downloader with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(DownloadConfig::default())
    }

    /// Create a downloader with its own HTTP client
    pub fn with_config(config: DownloadConfig) -> Result<Self> {
        config.validate()?;

        // Idempotent; fails only if another provider is already installed
        let _ = rustls::crypto::ring::default_provider().install_default();

        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            // Byte ranges address the stored entity, never a decoded one
            .no_gzip()
            .no_brotli()
            .no_deflate();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(ref user_agent) = config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    /// Create a downloader around an existing client
    ///
    /// The client should not decompress responses, or resumed ranges will not
    /// line up with the bytes on disk.
    pub fn with_client(client: Client, config: DownloadConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Download `url` into `dest`, resuming from the bytes already in `dest`
    ///
    /// Up to `max_attempts` attempts are made. Before every retry `dest` is
    /// truncated to empty, so the retry starts from scratch. The error of the
    /// last attempt is returned once all attempts have failed.
    pub async fn download<O>(&self, url: &Url, dest: &Path, observer: &mut O) -> Result<DownloadOutcome>
    where
        O: ProgressObserver + ?Sized,
    {
        let max_attempts = self.config.max_attempts;
        let mut attempt = 1;

        loop {
            match self.try_download(url, dest, observer).await {
                Ok(mut outcome) => {
                    outcome.attempts = attempt;
                    info!(
                        "Downloaded {} to {} ({} bytes, {} new)",
                        url,
                        dest.display(),
                        outcome.total_bytes,
                        outcome.downloaded_bytes
                    );
                    return Ok(outcome);
                }
                Err(e) => {
                    warn!("While downloading {}, got error {}", url, e);
                    if attempt >= max_attempts {
                        return Err(e);
                    }

                    truncate_file(dest, 0).await?;
                    info!("Retrying... ({} tries left)", max_attempts - attempt);
                    if !self.config.retry_delay.is_zero() {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// One pass of the range protocol
    async fn try_download<O>(&self, url: &Url, dest: &Path, observer: &mut O) -> Result<DownloadOutcome>
    where
        O: ProgressObserver + ?Sized,
    {
        let existing = existing_len(dest).await?;
        debug!("Existing file is {} bytes long", existing);

        let byte_range = format!("bytes={existing}-");
        debug!("Asking for range {}", byte_range);
        let response = self
            .request(Method::GET, url)
            .header(RANGE, &byte_range)
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                debug!("Server answered 200, byte ranges unsupported");
                truncate_file(dest, 0).await?;
                let total = header_content_length(response.headers());
                let downloaded = self.append_body(response, dest, 0, total, observer).await?;
                Ok(DownloadOutcome {
                    total_bytes: downloaded,
                    downloaded_bytes: downloaded,
                    resumed_from: 0,
                    attempts: 1,
                    status,
                })
            }
            StatusCode::PARTIAL_CONTENT => {
                debug!("Server answered 206, resuming at byte {}", existing);
                let total = content_range_total(response.headers()).or_else(|| {
                    header_content_length(response.headers()).map(|len| existing + len)
                });
                let downloaded = self
                    .append_body(response, dest, existing, total, observer)
                    .await?;
                Ok(DownloadOutcome {
                    total_bytes: existing + downloaded,
                    downloaded_bytes: downloaded,
                    resumed_from: existing,
                    attempts: 1,
                    status,
                })
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                debug!("Server answered 416, local data is complete");
                let range_total = content_range_total(response.headers());
                drop(response);

                let remote = self.remote_size(url, range_total).await?;
                let mut total = existing;
                if existing > remote {
                    warn!(
                        "Existing file too big ({} bytes), truncating to {}",
                        existing, remote
                    );
                    truncate_file(dest, remote).await?;
                    total = remote;
                }
                Ok(DownloadOutcome {
                    total_bytes: total,
                    downloaded_bytes: 0,
                    resumed_from: total,
                    attempts: 1,
                    status,
                })
            }
            other => Err(DownloadError::server_status(other)),
        }
    }

    /// Authoritative size of the remote entity, from a HEAD request
    async fn remote_size(&self, url: &Url, fallback: Option<u64>) -> Result<u64> {
        let response = self.request(Method::HEAD, url).send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::server_status(response.status()));
        }

        header_content_length(response.headers())
            .or(fallback)
            .ok_or(DownloadError::MissingContentLength)
    }

    /// Stream the response body onto the end of `dest`
    async fn append_body<O>(
        &self,
        response: Response,
        dest: &Path,
        existing: u64,
        total: Option<u64>,
        observer: &mut O,
    ) -> Result<u64>
    where
        O: ProgressObserver + ?Sized,
    {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dest)
            .await?;
        let mut out = BufWriter::with_capacity(self.config.buffer_size, file);

        let mut tracker =
            total.map(|total| ProgressTracker::new(existing, total, self.config.progress_step));
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            out.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            if let Some(tracker) = tracker.as_mut() {
                tracker.record(downloaded, observer);
            }
        }
        out.flush().await?;

        if let Some(total) = total
            && existing + downloaded != total
        {
            return Err(DownloadError::Incomplete {
                expected: total,
                actual: existing + downloaded,
            });
        }

        debug!("Done downloading, {} bytes received", downloaded);
        Ok(downloaded)
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        self.client.request(method, url.clone())
    }
}

/// Current length of `path`, 0 if it does not exist
async fn existing_len(path: &Path) -> Result<u64> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Cut `path` down to `len` bytes; a missing file is left missing
async fn truncate_file(path: &Path, len: u64) -> Result<()> {
    match OpenOptions::new().write(true).open(path).await {
        Ok(file) => {
            file.set_len(len).await?;
            debug!("Truncated {} to {} bytes", path.display(), len);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn header_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// Complete length from a `Content-Range` header (`bytes 200-1023/2048` or `bytes */2048`)
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_RANGE)?.to_str().ok()?;
    parse_content_range_total(value)
}

fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().strip_prefix("bytes")?.rsplit_once('/')?;
    total.trim().parse().ok()
}
