//! The persisted per-bundle record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Id of the bundle shipped inside the host application.
pub const BUILTIN_ID: &str = "builtin";

/// Id used when no real bundle id is available. Never persisted.
pub const UNKNOWN_ID: &str = "unknown";

/// Value of the current-bundle pointer while the builtin bundle is active.
pub const BUILTIN_PATH: &str = "public";

/// Entry file every valid bundle must have at its root.
pub const INDEX_FILE: &str = "index.html";

/// Lifecycle status of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleStatus {
    /// Archive is being fetched and unpacked.
    Downloading,
    /// Unpacked and registered, not yet confirmed by the host.
    Pending,
    /// Host confirmed the bundle loaded correctly.
    Success,
    /// Host reported the bundle failed to load.
    Error,
    /// Directory removed; record kept as a tombstone.
    Deleted,
}

impl BundleStatus {
    /// Lowercase name as stored on disk.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Downloading => "downloading",
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Error => "error",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for BundleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BundleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "downloading" => Ok(Self::Downloading),
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            "deleted" => Ok(Self::Deleted),
            other => Err(format!("unknown bundle status '{}'", other)),
        }
    }
}

/// Identity and status of one downloaded bundle.
///
/// # Example
///
/// ```
/// use hotbundle::bundle::{BundleInfo, BundleStatus};
///
/// let info = BundleInfo::new("a1B2c3D4e5", Some("1.4.0".into()), BundleStatus::Downloading);
/// let pending = info.with_status(BundleStatus::Pending);
///
/// assert_eq!(pending.id, "a1B2c3D4e5");
/// assert_eq!(pending.version_name(), "1.4.0");
/// assert!(!pending.is_builtin());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleInfo {
    /// Unique id, or one of the sentinels.
    pub id: String,

    /// Caller-supplied version label.
    #[serde(rename = "version", default)]
    pub version_name: Option<String>,

    /// Current lifecycle status.
    pub status: BundleStatus,

    /// Creation time. Absent on synthesized placeholder records.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Lowercase hex CRC32 of the downloaded archive, empty until complete.
    #[serde(default)]
    pub checksum: String,
}

impl BundleInfo {
    /// Create a record stamped with the current time and an empty checksum.
    pub fn new(id: impl Into<String>, version_name: Option<String>, status: BundleStatus) -> Self {
        Self {
            id: id.into(),
            version_name,
            status,
            timestamp: Some(Utc::now()),
            checksum: String::new(),
        }
    }

    /// Record for the builtin bundle. Always `SUCCESS`.
    ///
    /// ```
    /// use hotbundle::bundle::{BundleInfo, BundleStatus};
    ///
    /// let builtin = BundleInfo::builtin();
    /// assert!(builtin.is_builtin());
    /// assert_eq!(builtin.status, BundleStatus::Success);
    /// ```
    pub fn builtin() -> Self {
        Self::placeholder(BUILTIN_ID, BundleStatus::Success)
    }

    /// Record for an unknown bundle. Always `ERROR`.
    pub fn unknown() -> Self {
        Self::placeholder(UNKNOWN_ID, BundleStatus::Error)
    }

    /// Synthesized record with no timestamp, version or checksum.
    pub fn placeholder(id: impl Into<String>, status: BundleStatus) -> Self {
        Self {
            id: id.into(),
            version_name: None,
            status,
            timestamp: None,
            checksum: String::new(),
        }
    }

    /// Set the checksum (builder pattern).
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = checksum.into();
        self
    }

    /// Set the status (builder pattern).
    pub fn with_status(mut self, status: BundleStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the version name (builder pattern).
    pub fn with_version_name(mut self, version_name: Option<String>) -> Self {
        self.version_name = version_name;
        self
    }

    /// Set the id (builder pattern).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Version label, or the empty string when none was supplied.
    pub fn version_name(&self) -> &str {
        self.version_name.as_deref().unwrap_or("")
    }

    /// Check if this is the builtin bundle.
    pub fn is_builtin(&self) -> bool {
        self.id == BUILTIN_ID
    }

    /// Check if this is the unknown placeholder.
    pub fn is_unknown(&self) -> bool {
        self.id == UNKNOWN_ID
    }

    /// Check if the id is one of the two sentinels.
    pub fn is_sentinel(&self) -> bool {
        is_sentinel_id(&self.id)
    }

    /// Check if the bundle has been deleted.
    pub fn is_deleted(&self) -> bool {
        self.status == BundleStatus::Deleted
    }

    /// Check if the bundle is still being downloaded.
    pub fn is_downloading(&self) -> bool {
        self.status == BundleStatus::Downloading
    }

    /// Check if the host reported this bundle as failing.
    pub fn is_error_status(&self) -> bool {
        self.status == BundleStatus::Error
    }

    /// Serialize to the on-disk JSON form.
    pub fn to_json(&self) -> String {
        // Plain struct of strings and an enum; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse the on-disk JSON form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl fmt::Display for BundleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.id, self.status)?;
        if let Some(ref version) = self.version_name {
            write!(f, " v{}", version)?;
        }
        Ok(())
    }
}

/// Check whether an id is `builtin` or `unknown`.
pub(crate) fn is_sentinel_id(id: &str) -> bool {
    id == BUILTIN_ID || id == UNKNOWN_ID
}
