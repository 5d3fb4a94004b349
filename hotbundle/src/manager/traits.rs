//! Trait seams for the bundle pipeline.
//!
//! The lifecycle manager only talks to the network and to archive formats
//! through these traits, so hosts can swap transports and tests can run the
//! whole pipeline without a server.

use std::path::{Path, PathBuf};

use super::error::BundleResult;

/// Byte-level progress callback.
///
/// # Arguments
///
/// * `done` - Bytes processed so far
/// * `total` - Total expected bytes (0 when unknown)
pub type ProgressCallback<'a> = &'a dyn Fn(u64, u64);

/// Overall download progress callback, invoked with `(bundle_id, percent)`.
///
/// Percentages follow the 0-100 operation scale of a whole download. Delivery
/// is advisory: updates may be coalesced or dropped.
pub type DownloadProgressCallback = Box<dyn Fn(&str, u8) + Send + Sync>;

/// Fetches a remote archive into a local file.
pub trait ArchiveFetcher: Send + Sync {
    /// Stream `url` into `dest`, creating or truncating it.
    ///
    /// Performs a single attempt; retry policy belongs to the caller.
    ///
    /// # Returns
    ///
    /// The number of bytes written.
    fn fetch(&self, url: &str, dest: &Path, on_progress: ProgressCallback<'_>)
        -> BundleResult<u64>;
}

/// Unpacks an archive into a directory.
pub trait ArchiveExtractor: Send + Sync {
    /// Extract every entry of `archive_path` below `dest_dir`.
    ///
    /// Implementations must reject entries that resolve outside `dest_dir`
    /// before writing anything.
    ///
    /// # Returns
    ///
    /// The directory the archive was extracted into.
    fn extract(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
        on_progress: ProgressCallback<'_>,
    ) -> BundleResult<PathBuf>;
}
