//! HTTP-based archive fetcher.
//!
//! Streams a bundle archive into a local scratch file in one GET request.
//! There is no resume or retry: a failed transfer is reported to the caller,
//! who owns the retry policy.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use crate::manager::error::{BundleError, BundleResult};
use crate::manager::traits::{ArchiveFetcher, ProgressCallback};

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Buffer size for reading/writing during downloads (8KB).
const BUFFER_SIZE: usize = 8 * 1024;

/// HTTP archive fetcher backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> BundleResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a fetcher with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> BundleResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BundleError::Network {
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, timeout })
    }

    /// Request timeout applied to every transfer.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn network_error(url: &str, reason: impl Into<String>) -> BundleError {
        BundleError::Network {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

impl ArchiveFetcher for HttpFetcher {
    fn fetch(
        &self,
        url: &str,
        dest: &Path,
        on_progress: ProgressCallback<'_>,
    ) -> BundleResult<u64> {
        let mut response = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                Self::network_error(
                    url,
                    format!("request timed out after {}s", self.timeout.as_secs()),
                )
            } else {
                Self::network_error(url, e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::network_error(
                url,
                format!("GET request failed with status {}", status),
            ));
        }

        let total_size = response.content_length().unwrap_or(0);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| BundleError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let file = File::create(dest).map_err(|e| BundleError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;

        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut downloaded = 0u64;

        loop {
            let bytes_read = response
                .read(&mut buffer)
                .map_err(|e| Self::network_error(url, format!("read error: {}", e)))?;

            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| BundleError::WriteFailed {
                    path: dest.to_path_buf(),
                    source: e,
                })?;

            downloaded += bytes_read as u64;
            on_progress(downloaded, total_size);
        }

        writer.flush().map_err(|e| BundleError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;

        debug!(url, bytes = downloaded, dest = %dest.display(), "Archive fetched");

        Ok(downloaded)
    }
}
