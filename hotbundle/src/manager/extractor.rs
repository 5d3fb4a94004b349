//! Zip archive extraction for bundle installation.
//!
//! This module handles:
//! - Validating that every entry stays inside the extraction directory
//! - Streaming entries to disk
//! - Reporting progress by compressed bytes consumed
//!
//! Validation runs over the whole central directory before the first byte is
//! written, so an archive with a single escaping entry leaves nothing behind.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;

use super::error::{BundleError, BundleResult};
use super::traits::{ArchiveExtractor, ProgressCallback};

/// Zip extractor with path-containment enforcement.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl ZipExtractor {
    /// Create a new zip extractor.
    pub fn new() -> Self {
        Self
    }

    fn open(archive_path: &Path) -> BundleResult<ZipArchive<BufReader<File>>> {
        let file = File::open(archive_path).map_err(|e| BundleError::ReadFailed {
            path: archive_path.to_path_buf(),
            source: e,
        })?;

        ZipArchive::new(BufReader::new(file)).map_err(|e| BundleError::InvalidArchive {
            path: archive_path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn entry_error(archive_path: &Path, e: zip::result::ZipError) -> BundleError {
        BundleError::InvalidArchive {
            path: archive_path.to_path_buf(),
            reason: e.to_string(),
        }
    }
}

impl ArchiveExtractor for ZipExtractor {
    fn extract(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
        on_progress: ProgressCallback<'_>,
    ) -> BundleResult<PathBuf> {
        let archive_len = fs::metadata(archive_path)
            .map_err(|e| BundleError::ReadFailed {
                path: archive_path.to_path_buf(),
                source: e,
            })?
            .len();

        let mut archive = Self::open(archive_path)?;

        fs::create_dir_all(dest_dir).map_err(|e| BundleError::CreateDirFailed {
            path: dest_dir.to_path_buf(),
            source: e,
        })?;
        let canonical_dest = dest_dir
            .canonicalize()
            .map_err(|e| BundleError::ReadFailed {
                path: dest_dir.to_path_buf(),
                source: e,
            })?;

        // Pass 1: resolve every entry before touching the filesystem.
        let mut targets = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive
                .by_index_raw(index)
                .map_err(|e| Self::entry_error(archive_path, e))?;
            let name = entry.name().to_string();

            let target = resolve_entry_path(&canonical_dest, &name).ok_or_else(|| {
                warn!(entry = %name, archive = %archive_path.display(), "Rejected archive entry outside target");
                BundleError::Security {
                    entry: name.clone(),
                    target: canonical_dest.clone(),
                }
            })?;
            targets.push((target, entry.is_dir(), entry.compressed_size()));
        }

        // Pass 2: write.
        let mut consumed = 0u64;
        for (index, (target, is_dir, compressed_size)) in targets.into_iter().enumerate() {
            let dir = if is_dir {
                target.as_path()
            } else {
                target.parent().unwrap_or(canonical_dest.as_path())
            };
            ensure_dir_within(dir, &canonical_dest)?;

            if !is_dir {
                let mut entry = archive
                    .by_index(index)
                    .map_err(|e| Self::entry_error(archive_path, e))?;

                let file = File::create(&target).map_err(|e| BundleError::WriteFailed {
                    path: target.clone(),
                    source: e,
                })?;
                let mut writer = BufWriter::new(file);
                io::copy(&mut entry, &mut writer)
                    .and_then(|_| writer.flush())
                    .map_err(|e| BundleError::WriteFailed {
                        path: target.clone(),
                        source: e,
                    })?;
            }

            consumed += compressed_size;
            on_progress(consumed, archive_len);
        }

        debug!(
            archive = %archive_path.display(),
            dest = %dest_dir.display(),
            entries = archive.len(),
            "Archive extracted"
        );

        Ok(dest_dir.to_path_buf())
    }
}

/// Resolve an archive entry name below `base`, lexically.
///
/// Returns `None` when the name is absolute, carries a drive or root
/// component, or climbs above `base` through `..` segments. Backslashes are
/// treated as separators so Windows-built archives cannot smuggle `..\`.
pub fn resolve_entry_path(base: &Path, name: &str) -> Option<PathBuf> {
    let normalized = name.replace('\\', "/");
    let mut resolved = base.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    Some(resolved)
}

/// Create `dir` and check its canonical form is still under `base`.
///
/// Catches directories that already existed as symlinks pointing elsewhere.
fn ensure_dir_within(dir: &Path, base: &Path) -> BundleResult<()> {
    if !dir.is_dir() {
        fs::create_dir_all(dir).map_err(|e| BundleError::CreateDirFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }

    let canonical = dir.canonicalize().map_err(|e| BundleError::ReadFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    if !canonical.starts_with(base) {
        return Err(BundleError::Security {
            entry: dir.display().to_string(),
            target: base.to_path_buf(),
        });
    }

    Ok(())
}
