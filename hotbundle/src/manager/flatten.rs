//! Normalization of extracted archives into the bundle layout.
//!
//! Archive packaging tools commonly wrap everything in one top-level folder
//! (`zip -r app.zip app/`). A bundle must instead have its `index.html` at the
//! directory root, so a lone wrapping folder is unwrapped. This is a packaging
//! convention, not a rule about bundle structure: anything other than exactly
//! one non-`index.html` top-level entry is moved as-is.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::error::{BundleError, BundleResult};
use crate::bundle::INDEX_FILE;

/// Check whether a top-level name is an OS-generated artifact.
///
/// Covers dotfiles (`.DS_Store`, `._foo`) and macOS resource fork folders.
fn is_os_artifact(name: &str) -> bool {
    name.starts_with('.') || name.starts_with("__MACOSX")
}

/// Move an extracted archive into `dest`, unwrapping a single wrapping folder.
///
/// # Arguments
///
/// * `extracted_dir` - Directory the archive was extracted into
/// * `dest` - Final bundle directory (must not exist yet)
///
/// # Errors
///
/// - [`BundleError::NotFound`] if `extracted_dir` does not exist
/// - An I/O error if it contains no usable entries or a move fails
///
/// `index.html` presence is not checked here.
pub fn flatten(extracted_dir: &Path, dest: &Path) -> BundleResult<()> {
    if !extracted_dir.exists() {
        return Err(BundleError::NotFound {
            path: extracted_dir.to_path_buf(),
        });
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| BundleError::CreateDirFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let entries: Vec<_> = fs::read_dir(extracted_dir)
        .map_err(|e| BundleError::ReadFailed {
            path: extracted_dir.to_path_buf(),
            source: e,
        })?
        .filter_map(|e| e.ok())
        .filter(|e| !is_os_artifact(&e.file_name().to_string_lossy()))
        .collect();

    if entries.is_empty() {
        return Err(BundleError::ReadFailed {
            path: extracted_dir.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "extracted archive has no entries",
            ),
        });
    }

    if entries.len() == 1 && entries[0].file_name() != INDEX_FILE {
        let root = entries[0].path();
        debug!(root = %root.display(), dest = %dest.display(), "Unwrapping single top-level entry");
        move_path(&root, dest)?;
    } else {
        move_path(extracted_dir, dest)?;
    }

    if extracted_dir.exists() {
        fs::remove_dir_all(extracted_dir).map_err(|e| BundleError::RemoveFailed {
            path: extracted_dir.to_path_buf(),
            source: e,
        })?;
    }

    Ok(())
}

/// Move a file or directory, falling back to copy + delete across filesystems.
fn move_path(source: &Path, dest: &Path) -> BundleResult<()> {
    if fs::rename(source, dest).is_ok() {
        return Ok(());
    }

    if source.is_dir() {
        copy_dir_recursive(source, dest)?;
        fs::remove_dir_all(source).map_err(|e| BundleError::RemoveFailed {
            path: source.to_path_buf(),
            source: e,
        })?;
    } else {
        fs::copy(source, dest).map_err(|e| BundleError::MoveFailed {
            from: source.to_path_buf(),
            to: dest.to_path_buf(),
            reason: e.to_string(),
        })?;
        fs::remove_file(source).map_err(|e| BundleError::RemoveFailed {
            path: source.to_path_buf(),
            source: e,
        })?;
    }

    Ok(())
}

/// Recursively copy a directory.
fn copy_dir_recursive(source: &Path, dest: &Path) -> BundleResult<()> {
    fs::create_dir_all(dest).map_err(|e| BundleError::CreateDirFailed {
        path: dest.to_path_buf(),
        source: e,
    })?;

    for entry in fs::read_dir(source).map_err(|e| BundleError::ReadFailed {
        path: source.to_path_buf(),
        source: e,
    })? {
        let entry = entry.map_err(|e| BundleError::ReadFailed {
            path: source.to_path_buf(),
            source: e,
        })?;

        let source_path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if source_path.is_dir() {
            copy_dir_recursive(&source_path, &dest_path)?;
        } else {
            fs::copy(&source_path, &dest_path).map_err(|e| BundleError::WriteFailed {
                path: dest_path,
                source: e,
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_flatten_missing_source() {
        let temp = TempDir::new().unwrap();
        let result = flatten(&temp.path().join("missing"), &temp.path().join("dest"));
        assert!(matches!(result, Err(BundleError::NotFound { .. })));
    }

    #[test]
    fn test_flatten_unwraps_single_folder() {
        let temp = TempDir::new().unwrap();
        let extracted = temp.path().join("extracted");
        fs::create_dir_all(extracted.join("app/js")).unwrap();
        fs::write(extracted.join("app/index.html"), "hi").unwrap();
        fs::write(extracted.join("app/js/main.js"), "js").unwrap();
        fs::create_dir_all(extracted.join("__MACOSX/app")).unwrap();
        fs::write(extracted.join(".DS_Store"), "junk").unwrap();

        let dest = temp.path().join("versions/abc");
        flatten(&extracted, &dest).unwrap();

        assert!(dest.join("index.html").is_file());
        assert!(dest.join("js/main.js").is_file());
        assert!(!dest.join("app").exists());
        assert!(!extracted.exists());
    }

    #[test]
    fn test_flatten_keeps_root_with_multiple_entries() {
        let temp = TempDir::new().unwrap();
        let extracted = temp.path().join("extracted");
        fs::create_dir_all(extracted.join("assets")).unwrap();
        fs::write(extracted.join("index.html"), "hi").unwrap();
        fs::write(extracted.join("assets/a.css"), "css").unwrap();

        let dest = temp.path().join("versions/abc");
        flatten(&extracted, &dest).unwrap();

        assert!(dest.join("index.html").is_file());
        assert!(dest.join("assets/a.css").is_file());
        assert!(!extracted.exists());
    }

    #[test]
    fn test_flatten_lone_index_is_not_unwrapped() {
        let temp = TempDir::new().unwrap();
        let extracted = temp.path().join("extracted");
        fs::create_dir_all(&extracted).unwrap();
        fs::write(extracted.join("index.html"), "hi").unwrap();

        let dest = temp.path().join("versions/abc");
        flatten(&extracted, &dest).unwrap();

        assert!(dest.is_dir());
        assert_eq!(fs::read_to_string(dest.join("index.html")).unwrap(), "hi");
    }

    #[test]
    fn test_flatten_single_file_becomes_dest() {
        // Packaging convention applies to any lone entry, files included.
        let temp = TempDir::new().unwrap();
        let extracted = temp.path().join("extracted");
        fs::create_dir_all(&extracted).unwrap();
        fs::write(extracted.join("main.html"), "hi").unwrap();

        let dest = temp.path().join("versions/abc");
        flatten(&extracted, &dest).unwrap();

        assert!(dest.is_file());
        assert!(!extracted.exists());
    }

    #[test]
    fn test_flatten_empty_archive() {
        let temp = TempDir::new().unwrap();
        let extracted = temp.path().join("extracted");
        fs::create_dir_all(extracted.join("__MACOSX")).unwrap();

        let result = flatten(&extracted, &temp.path().join("versions/abc"));
        assert!(result.is_err());
        assert!(!temp.path().join("versions/abc").exists());
    }

    #[test]
    fn test_copy_dir_recursive() {
        let source_temp = TempDir::new().unwrap();
        let dest_temp = TempDir::new().unwrap();

        fs::write(source_temp.path().join("file1.txt"), "hello").unwrap();
        let subdir = source_temp.path().join("subdir");
        fs::create_dir(&subdir).unwrap();
        fs::write(subdir.join("file2.txt"), "world").unwrap();

        let dest = dest_temp.path().join("copied");
        copy_dir_recursive(source_temp.path(), &dest).unwrap();

        assert!(dest.join("file1.txt").exists());
        assert!(dest.join("subdir/file2.txt").exists());
        assert_eq!(fs::read_to_string(dest.join("file1.txt")).unwrap(), "hello");
    }

    #[test]
    fn test_os_artifact_filter() {
        assert!(is_os_artifact(".DS_Store"));
        assert!(is_os_artifact("._index.html"));
        assert!(is_os_artifact("__MACOSX"));
        assert!(!is_os_artifact("index.html"));
        assert!(!is_os_artifact("app"));
    }
}
