//! Durable metadata persistence.
//!
//! Bundle records and the global pointers live in a flat string key/value
//! store, one entry per key:
//!
//! | Key              | Value                                   |
//! |------------------|-----------------------------------------|
//! | `<id>_info`      | JSON [`BundleInfo`] record              |
//! | `serverBasePath` | path of the active bundle, or `public`  |
//! | `pastVersion`    | fallback bundle id                      |
//! | `nextVersion`    | bundle id staged for next start         |
//!
//! [`FileKeyValueStore`] keeps the whole map in one JSON file and commits
//! every write with write-temp → fsync → rename, so a crash leaves either the
//! old or the new map on disk.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use super::error::{BundleError, BundleResult};
use crate::bundle::{is_sentinel_id, BundleInfo, BundleStatus, BUILTIN_ID, UNKNOWN_ID};

/// Suffix appended to a bundle id to form its record key.
const INFO_SUFFIX: &str = "_info";

/// Build the record key for a bundle id.
pub fn info_key(id: &str) -> String {
    format!("{}{}", id, INFO_SUFFIX)
}

/// String key/value persistence.
///
/// Every mutating call must be durable before it returns.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Insert or replace a value.
    fn put(&self, key: &str, value: &str) -> BundleResult<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> BundleResult<()>;

    /// Apply several changes as one write: `Some` inserts, `None` removes.
    ///
    /// Either every change is durable or none is.
    fn apply(&self, changes: &[(&str, Option<&str>)]) -> BundleResult<()>;
}

fn apply_changes(entries: &mut BTreeMap<String, String>, changes: &[(&str, Option<&str>)]) {
    for (key, value) in changes {
        match value {
            Some(value) => {
                entries.insert(key.to_string(), value.to_string());
            }
            None => {
                entries.remove(*key);
            }
        }
    }
}

/// In-memory store for tests and hosts that manage persistence themselves.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) -> BundleResult<()> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> BundleResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn apply(&self, changes: &[(&str, Option<&str>)]) -> BundleResult<()> {
        apply_changes(&mut self.entries.lock(), changes);
        Ok(())
    }
}

/// JSON-file-backed store.
///
/// The file holds a single JSON object of string values. It is read once on
/// open and rewritten atomically on every change.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileKeyValueStore {
    /// Open the store at `path`, creating an empty one if the file is missing.
    ///
    /// A file that exists but cannot be parsed is an error rather than being
    /// silently replaced.
    pub fn open(path: impl Into<PathBuf>) -> BundleResult<Self> {
        let path = path.into();

        let entries = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| BundleError::Store {
                path: path.clone(),
                reason: format!("invalid JSON: {}", e),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(BundleError::ReadFailed {
                    path: path.clone(),
                    source: e,
                })
            }
        };

        debug!(path = %path.display(), keys = entries.len(), "Metadata store opened");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the whole map via temp file + rename.
    fn commit(&self, entries: &BTreeMap<String, String>) -> BundleResult<()> {
        let parent = self.path.parent().ok_or_else(|| BundleError::Store {
            path: self.path.clone(),
            reason: "store path has no parent directory".to_string(),
        })?;
        fs::create_dir_all(parent).map_err(|e| BundleError::CreateDirFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;

        let json = serde_json::to_vec_pretty(entries).map_err(|e| BundleError::Store {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        let write_err = |e: std::io::Error| BundleError::WriteFailed {
            path: self.path.clone(),
            source: e,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        Ok(())
    }

    /// Apply a mutation and commit it; roll the in-memory map back on failure.
    fn mutate(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> BundleResult<()> {
        let mut entries = self.entries.lock();
        let mut updated = entries.clone();
        apply(&mut updated);
        self.commit(&updated)?;
        *entries = updated;
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) -> BundleResult<()> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> BundleResult<()> {
        if !self.entries.lock().contains_key(key) {
            return Ok(());
        }
        self.mutate(|entries| {
            entries.remove(key);
        })
    }

    fn apply(&self, changes: &[(&str, Option<&str>)]) -> BundleResult<()> {
        self.mutate(|entries| apply_changes(entries, changes))
    }
}

/// Typed access to per-bundle records.
///
/// Sentinel ids never reach the backing store: `get` synthesizes their
/// records and `save` ignores them. Records that are missing or fail to parse
/// come back as `PENDING` placeholders.
pub struct MetadataStore {
    kv: Box<dyn KeyValueStore>,
}

impl MetadataStore {
    /// Wrap a key/value store.
    pub fn new(kv: Box<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Raw key/value access, used for the pointer keys.
    pub fn kv(&self) -> &dyn KeyValueStore {
        self.kv.as_ref()
    }

    /// Load the record for `id`.
    pub fn get(&self, id: &str) -> BundleInfo {
        match id {
            BUILTIN_ID => return BundleInfo::builtin(),
            UNKNOWN_ID => return BundleInfo::unknown(),
            _ => {}
        }

        let key = info_key(id);
        let stored = self.kv.get(&key).unwrap_or_default();

        match BundleInfo::from_json(&stored) {
            Ok(info) => info,
            Err(e) => {
                let err = BundleError::Parse {
                    key,
                    reason: e.to_string(),
                };
                if stored.is_empty() {
                    debug!(bundle_id = id, "No record stored, using placeholder");
                } else {
                    warn!(bundle_id = id, error = %err, "Corrupt bundle record, using placeholder");
                }
                BundleInfo::placeholder(id, BundleStatus::Pending)
            }
        }
    }

    /// Store `info` under `id`, or remove the record when `info` is `None`.
    ///
    /// The stored record's id is forced to `id`. Sentinel ids are ignored.
    pub fn save(&self, id: &str, info: Option<&BundleInfo>) -> BundleResult<()> {
        if is_sentinel_id(id) || info.is_some_and(BundleInfo::is_sentinel) {
            debug!(bundle_id = id, "Not saving record for sentinel bundle");
            return Ok(());
        }

        let key = info_key(id);
        match info {
            None => {
                debug!(bundle_id = id, "Removing bundle record");
                self.kv.remove(&key)
            }
            Some(info) => {
                let record = info.clone().with_id(id);
                debug!(bundle_id = id, record = %record, "Storing bundle record");
                self.kv.put(&key, &record.to_json()).inspect_err(|e| {
                    error!(bundle_id = id, error = %e, "Failed to store bundle record");
                })
            }
        }
    }

    /// Remove the record for `id`.
    pub fn remove(&self, id: &str) -> BundleResult<()> {
        self.save(id, None)
    }

    /// Read-modify-write the status of `id`.
    pub fn set_status(&self, id: &str, status: BundleStatus) -> BundleResult<BundleInfo> {
        let info = self.get(id).with_status(status);
        debug!(bundle_id = id, %status, "Setting bundle status");
        self.save(id, Some(&info))?;
        Ok(info)
    }

    /// Read-modify-write the version name of `id`.
    pub fn set_version_name(&self, id: &str, name: Option<String>) -> BundleResult<BundleInfo> {
        let info = self.get(id).with_version_name(name);
        self.save(id, Some(&info))?;
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Store wrapper that counts reads, to prove sentinels never hit storage.
    struct CountingStore {
        inner: MemoryKeyValueStore,
        reads: Arc<std::sync::atomic::AtomicUsize>,
        writes: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl KeyValueStore for CountingStore {
        fn get(&self, key: &str) -> Option<String> {
            self.reads
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: &str) -> BundleResult<()> {
            self.writes
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.put(key, value)
        }

        fn remove(&self, key: &str) -> BundleResult<()> {
            self.writes
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.remove(key)
        }

        fn apply(&self, changes: &[(&str, Option<&str>)]) -> BundleResult<()> {
            self.writes
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.apply(changes)
        }
    }

    fn memory_store() -> MetadataStore {
        MetadataStore::new(Box::new(MemoryKeyValueStore::new()))
    }

    #[test]
    fn test_save_then_get_roundtrip() {
        let store = memory_store();
        let info = BundleInfo::new("abc123", Some("1.2.3".into()), BundleStatus::Pending)
            .with_checksum("deadbeef");

        store.save("abc123", Some(&info)).unwrap();
        let loaded = store.get("abc123");

        assert_eq!(loaded, info);
    }

    #[test]
    fn test_save_forces_record_id() {
        let store = memory_store();
        let info = BundleInfo::new("other", None, BundleStatus::Pending);

        store.save("abc123", Some(&info)).unwrap();
        assert_eq!(store.get("abc123").id, "abc123");
    }

    #[test]
    fn test_sentinels_never_touch_storage() {
        let reads = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let writes = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let store = MetadataStore::new(Box::new(CountingStore {
            inner: MemoryKeyValueStore::new(),
            reads: Arc::clone(&reads),
            writes: Arc::clone(&writes),
        }));

        let builtin = store.get(BUILTIN_ID);
        let unknown = store.get(UNKNOWN_ID);
        assert_eq!(builtin.status, BundleStatus::Success);
        assert_eq!(unknown.status, BundleStatus::Error);

        let record = BundleInfo::new("x", None, BundleStatus::Error);
        store.save(BUILTIN_ID, Some(&record)).unwrap();
        store.save(UNKNOWN_ID, Some(&record)).unwrap();
        store.save(BUILTIN_ID, None).unwrap();
        store.save("real", Some(&BundleInfo::builtin())).unwrap();

        assert_eq!(reads.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(writes.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(store.get(BUILTIN_ID).status, BundleStatus::Success);
    }

    #[test]
    fn test_missing_record_is_pending_placeholder() {
        let store = memory_store();
        let info = store.get("nope");
        assert_eq!(info.id, "nope");
        assert_eq!(info.status, BundleStatus::Pending);
        assert!(info.timestamp.is_none());
    }

    #[test]
    fn test_corrupt_record_is_recovered() {
        let kv = MemoryKeyValueStore::new();
        kv.put(&info_key("abc"), "{not json").unwrap();
        let store = MetadataStore::new(Box::new(kv));

        let info = store.get("abc");
        assert_eq!(info.status, BundleStatus::Pending);
        assert_eq!(info.id, "abc");
    }

    #[test]
    fn test_save_none_removes_record() {
        let store = memory_store();
        let info = BundleInfo::new("abc", None, BundleStatus::Success);
        store.save("abc", Some(&info)).unwrap();

        store.remove("abc").unwrap();
        assert!(store.kv().get(&info_key("abc")).is_none());
        assert_eq!(store.get("abc").status, BundleStatus::Pending);
    }

    #[test]
    fn test_set_status_and_version_name() {
        let store = memory_store();
        let info = BundleInfo::new("abc", Some("1.0".into()), BundleStatus::Pending)
            .with_checksum("01234567");
        store.save("abc", Some(&info)).unwrap();

        store.set_status("abc", BundleStatus::Success).unwrap();
        store
            .set_version_name("abc", Some("1.0-hotfix".into()))
            .unwrap();

        let loaded = store.get("abc");
        assert_eq!(loaded.status, BundleStatus::Success);
        assert_eq!(loaded.version_name(), "1.0-hotfix");
        assert_eq!(loaded.checksum, "01234567");
        assert_eq!(loaded.timestamp, info.timestamp);
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("prefs").join("preferences.json");

        {
            let kv = FileKeyValueStore::open(&path).unwrap();
            kv.put("serverBasePath", "/data/versions/abc").unwrap();
            kv.put("pastVersion", "builtin").unwrap();
            kv.remove("pastVersion").unwrap();
        }

        let reopened = FileKeyValueStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("serverBasePath").as_deref(),
            Some("/data/versions/abc")
        );
        assert!(reopened.get("pastVersion").is_none());
        assert_eq!(reopened.path(), path.as_path());
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("preferences.json");
        fs::write(&path, "[[[").unwrap();

        let result = FileKeyValueStore::open(&path);
        assert!(matches!(result, Err(BundleError::Store { .. })));
    }

    #[test]
    fn test_file_store_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("preferences.json");
        let kv = FileKeyValueStore::open(&path).unwrap();
        for i in 0..5 {
            kv.put(&format!("k{}", i), "v").unwrap();
        }

        let files: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_file_store_batch_commits_together() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("preferences.json");

        {
            let kv = FileKeyValueStore::open(&path).unwrap();
            kv.put("nextVersion", "q1w2e3r4t5").unwrap();
            kv.apply(&[
                ("serverBasePath", Some("/data/versions/abc")),
                ("pastVersion", Some("zZ9yY8xX7w")),
                ("nextVersion", None),
            ])
            .unwrap();
        }

        let reopened = FileKeyValueStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("serverBasePath").as_deref(),
            Some("/data/versions/abc")
        );
        assert_eq!(reopened.get("pastVersion").as_deref(), Some("zZ9yY8xX7w"));
        assert!(reopened.get("nextVersion").is_none());
    }

    #[test]
    fn test_file_store_failed_batch_changes_nothing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("prefs");
        let path = dir.join("preferences.json");
        let kv = FileKeyValueStore::open(&path).unwrap();
        kv.put("serverBasePath", "public").unwrap();

        // Replace the directory with a file so the next commit cannot land.
        fs::remove_dir_all(&dir).unwrap();
        fs::write(&dir, "not a directory").unwrap();

        let result = kv.apply(&[
            ("serverBasePath", Some("/data/versions/abc")),
            ("pastVersion", Some("abc")),
        ]);

        assert!(result.is_err());
        assert_eq!(kv.get("serverBasePath").as_deref(), Some("public"));
        assert!(kv.get("pastVersion").is_none());
    }
}
