//! Error types for the bundle manager.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for manager operations.
pub type BundleResult<T> = Result<T, BundleError>;

/// Coarse classification of a [`BundleError`].
///
/// Hosts usually only need to know which family a failure belongs to
/// (retry a network error, alert on a security error, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fetching the archive failed.
    Network,
    /// An archive entry tried to escape the extraction directory.
    Security,
    /// Filesystem or persistence failure.
    Io,
    /// A required source path does not exist.
    NotFound,
    /// A persisted record could not be parsed.
    Parse,
}

/// Errors that can occur during bundle management operations.
#[derive(Debug, Error)]
pub enum BundleError {
    /// Failed to fetch a remote archive or talk to a remote endpoint.
    #[error("failed to fetch {url}: {reason}")]
    Network { url: String, reason: String },

    /// An archive entry resolves outside of the extraction directory.
    #[error("archive entry '{entry}' escapes extraction directory {}", target.display())]
    Security { entry: String, target: PathBuf },

    /// Failed to read a file or directory.
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Failed to remove a file or directory.
    #[error("failed to remove {}: {source}", path.display())]
    RemoveFailed { path: PathBuf, source: io::Error },

    /// Failed to move a directory into place.
    #[error("failed to move {} to {}: {reason}", from.display(), to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    /// The archive is not a readable zip file.
    #[error("invalid archive {}: {reason}", path.display())]
    InvalidArchive { path: PathBuf, reason: String },

    /// A path that must exist was not found.
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// A persisted record could not be parsed.
    #[error("failed to parse record '{key}': {reason}")]
    Parse { key: String, reason: String },

    /// The metadata store could not be loaded or committed.
    #[error("metadata store {}: {reason}", path.display())]
    Store { path: PathBuf, reason: String },

    /// A background task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl BundleError {
    /// The error family this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Security { .. } => ErrorKind::Security,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::ReadFailed { .. }
            | Self::WriteFailed { .. }
            | Self::CreateDirFailed { .. }
            | Self::RemoveFailed { .. }
            | Self::MoveFailed { .. }
            | Self::InvalidArchive { .. }
            | Self::Store { .. }
            | Self::Task(_) => ErrorKind::Io,
        }
    }

    /// Returns true if this is a path-containment violation.
    pub fn is_security(&self) -> bool {
        self.kind() == ErrorKind::Security
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BundleError::Network {
            url: "https://example.com/a.zip".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to fetch https://example.com/a.zip: connection refused"
        );
    }

    #[test]
    fn test_security_display_names_entry() {
        let err = BundleError::Security {
            entry: "../evil.txt".to_string(),
            target: PathBuf::from("/data/scratch"),
        };
        assert!(err.to_string().contains("../evil.txt"));
        assert!(err.to_string().contains("/data/scratch"));
        assert!(err.is_security());
    }

    #[test]
    fn test_error_kinds() {
        let io_err = BundleError::WriteFailed {
            path: PathBuf::from("/x"),
            source: io::Error::new(io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(io_err.kind(), ErrorKind::Io);

        let missing = BundleError::NotFound {
            path: PathBuf::from("/x"),
        };
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let parse = BundleError::Parse {
            key: "abc_info".to_string(),
            reason: "EOF".to_string(),
        };
        assert_eq!(parse.kind(), ErrorKind::Parse);
        assert_eq!(BundleError::Task("join".into()).kind(), ErrorKind::Io);
    }

    #[test]
    fn test_source_is_preserved() {
        use std::error::Error;

        let err = BundleError::ReadFailed {
            path: PathBuf::from("/x"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.source().is_some());
    }
}
