//! Integration tests for the bundle lifecycle.
//!
//! These tests drive a [`BundleManager`] end to end:
//! - download → flatten → PENDING registration
//! - set / set_success / reset pointer transitions
//! - delete guards and auto-deletion of the previous fallback
//! - stats emitted through a recording reporter
//!
//! Run with: `cargo test --test lifecycle_integration`

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use hotbundle::bundle::{BundleStatus, BUILTIN_ID, BUILTIN_PATH};
use hotbundle::manager::{
    ArchiveFetcher, BundleError, BundleManager, BundleResult, FileKeyValueStore,
    MemoryKeyValueStore, ProgressCallback, UpdaterConfig,
};
use hotbundle::reporting::StatsReporter;

// ============================================================================
// Helper Functions
// ============================================================================

/// Fetcher that reads archives from the local filesystem; the URL is a path.
struct LocalFetcher;

impl ArchiveFetcher for LocalFetcher {
    fn fetch(
        &self,
        url: &str,
        dest: &Path,
        on_progress: ProgressCallback<'_>,
    ) -> BundleResult<u64> {
        let bytes = fs::read(url).map_err(|e| BundleError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(dest, &bytes).unwrap();
        let len = bytes.len() as u64;
        on_progress(len / 2, len);
        on_progress(len, len);
        Ok(len)
    }
}

/// One recorded stat: action, the bundle's version, the running version.
type Stat = (String, String, String);

/// Reporter that records every stat it is asked to send.
#[derive(Default)]
struct RecordingReporter {
    stats: Mutex<Vec<Stat>>,
}

impl RecordingReporter {
    fn actions(&self) -> Vec<String> {
        self.stats.lock().iter().map(|(a, _, _)| a.clone()).collect()
    }

    fn last(&self) -> Option<Stat> {
        self.stats.lock().last().cloned()
    }
}

fn stat(action: &str, version: &str, current: &str) -> Option<Stat> {
    Some((action.into(), version.into(), current.into()))
}

impl StatsReporter for RecordingReporter {
    fn send_stats(&self, action: &str, version_name: &str, current_version: &str) {
        self.stats.lock().push((
            action.to_string(),
            version_name.to_string(),
            current_version.to_string(),
        ));
    }
}

struct Fixture {
    temp: TempDir,
    reporter: Arc<RecordingReporter>,
    manager: Arc<BundleManager>,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let reporter = Arc::new(RecordingReporter::default());
        let manager = BundleManager::builder(UpdaterConfig::new(temp.path().join("root")))
            .with_store(Box::new(MemoryKeyValueStore::new()))
            .with_fetcher(Box::new(LocalFetcher))
            .with_reporter(reporter.clone())
            .build()
            .unwrap();

        Self {
            temp,
            reporter,
            manager: Arc::new(manager),
        }
    }

    /// Write a zip archive into the fixture directory and return its "URL".
    fn archive(&self, name: &str, entries: &[(&str, &[u8])]) -> String {
        let path = self.temp.path().join(name);
        let mut zip = ZipWriter::new(fs::File::create(&path).unwrap());
        for (entry, data) in entries {
            if entry.ends_with('/') {
                zip.add_directory(*entry, SimpleFileOptions::default())
                    .unwrap();
            } else {
                zip.start_file(*entry, SimpleFileOptions::default()).unwrap();
                zip.write_all(data).unwrap();
            }
        }
        zip.finish().unwrap();
        path.to_string_lossy().into_owned()
    }

    /// Archive with the usual `app/` wrapping folder.
    fn app_archive(&self, name: &str) -> String {
        self.archive(
            name,
            &[
                ("app/", b""),
                ("app/index.html", b"<html></html>"),
                ("app/js/main.js", b"console.log(1)"),
            ],
        )
    }

    fn download(&self, name: &str, version: &str) -> String {
        let url = self.app_archive(name);
        self.manager.download(&url, Some(version)).unwrap().id
    }
}

// ============================================================================
// Download pipeline
// ============================================================================

#[test]
fn test_wrapping_folder_is_unwrapped() {
    let fx = Fixture::new();
    let id = fx.download("app.zip", "1.0.0");

    let dir = fx.manager.bundle_dir(&id);
    assert!(dir.join("index.html").is_file());
    assert!(dir.join("js/main.js").is_file());
    assert!(!dir.join("app").exists());
    assert!(fx.manager.bundle_exists(&id));
}

#[test]
fn test_concurrent_downloads_get_unique_ids() {
    let fx = Fixture::new();
    let url = fx.app_archive("app.zip");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = Arc::clone(&fx.manager);
            let url = url.clone();
            thread::spawn(move || {
                manager
                    .download(&url, Some(&format!("1.0.{}", i)))
                    .unwrap()
                    .id
            })
        })
        .collect();

    let ids: HashSet<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(ids.len(), 8);

    let listed = fx.manager.list().unwrap();
    assert_eq!(listed.len(), 8);
    assert!(listed.iter().all(|b| b.status == BundleStatus::Pending));
}

#[test]
fn test_path_escape_is_security_error() {
    let fx = Fixture::new();
    let url = fx.archive(
        "evil.zip",
        &[("index.html", b"ok"), ("../../outside.txt", b"gotcha")],
    );

    let err = fx.manager.download(&url, None).unwrap_err();
    assert!(err.is_security());
    assert!(!fx.temp.path().join("outside.txt").exists());
    assert!(fx.manager.list().unwrap().iter().all(|b| !fx
        .manager
        .bundle_exists(&b.id)));
}

#[test]
fn test_missing_archive_is_network_error() {
    let fx = Fixture::new();
    let missing = fx.temp.path().join("nope.zip");

    let err = fx
        .manager
        .download(&missing.to_string_lossy(), None)
        .unwrap_err();
    assert!(matches!(err, BundleError::Network { .. }));
}

// ============================================================================
// Pointer transitions
// ============================================================================

#[test]
fn test_two_downloads_then_confirm_one() {
    let fx = Fixture::new();
    let x = fx.download("x.zip", "1.0.0");
    let y = fx.download("y.zip", "1.1.0");

    assert_eq!(fx.manager.get_bundle_info(&x).status, BundleStatus::Pending);
    assert_eq!(fx.manager.get_bundle_info(&y).status, BundleStatus::Pending);

    assert!(fx.manager.set(&x).unwrap());
    fx.manager.set_success(&x, false).unwrap();

    assert_eq!(fx.manager.current_bundle_id(), x);
    assert_eq!(fx.manager.fallback_bundle().id, x);
    assert_eq!(fx.manager.get_bundle_info(&x).status, BundleStatus::Success);
    assert_eq!(fx.manager.get_bundle_info(&y).status, BundleStatus::Pending);
}

#[test]
fn test_set_builtin_resets_everything() {
    let fx = Fixture::new();
    let x = fx.download("x.zip", "1.0.0");
    fx.manager.set(&x).unwrap();
    fx.manager.set_success(&x, false).unwrap();
    fx.manager.set_next_bundle(Some(&x)).unwrap();

    assert!(fx.manager.set(BUILTIN_ID).unwrap());

    assert!(fx.manager.is_using_builtin());
    assert_eq!(fx.manager.current_bundle_id(), BUILTIN_ID);
    assert_eq!(fx.manager.current_bundle_path(), BUILTIN_PATH);
    assert_eq!(fx.manager.fallback_bundle().id, BUILTIN_ID);
    assert!(fx.manager.next_bundle().is_none());
}

#[test]
fn test_set_missing_bundle_leaves_pointer() {
    let fx = Fixture::new();
    let x = fx.download("x.zip", "1.0.0");
    fx.manager.set(&x).unwrap();

    assert!(!fx.manager.set("doesNotExist").unwrap());
    assert_eq!(fx.manager.current_bundle_id(), x);
}

#[test]
fn test_set_success_auto_deletes_previous_fallback() {
    let fx = Fixture::new();
    let f = fx.download("f.zip", "1.0.0");
    fx.manager.set(&f).unwrap();
    fx.manager.set_success(&f, false).unwrap();

    let b = fx.download("b.zip", "2.0.0");
    fx.manager.set(&b).unwrap();
    fx.manager.set_success(&b, true).unwrap();

    assert!(!fx.manager.bundle_dir(&f).exists());
    assert_eq!(fx.manager.fallback_bundle().id, b);
    assert!(fx.manager.get_bundle_info_by_name("1.0.0").unwrap().is_none());
    assert_eq!(
        fx.manager.get_bundle_info_by_name("2.0.0").unwrap().unwrap().id,
        b
    );
}

#[test]
fn test_error_status_is_sticky() {
    let fx = Fixture::new();
    let x = fx.download("x.zip", "1.0.0");
    fx.manager.set(&x).unwrap();
    fx.manager.set_error(&x).unwrap();

    assert_eq!(fx.manager.get_bundle_info(&x).status, BundleStatus::Error);
    // Still installed, so it can be retried explicitly.
    assert!(fx.manager.bundle_exists(&x));
}

// ============================================================================
// Deletion
// ============================================================================

#[test]
fn test_delete_current_is_refused() {
    let fx = Fixture::new();
    let x = fx.download("x.zip", "1.0.0");
    fx.manager.set(&x).unwrap();

    assert!(!fx.manager.delete(&x, true).unwrap());
    assert!(fx.manager.bundle_dir(&x).is_dir());
    assert_eq!(fx.manager.get_bundle_info(&x).version_name(), "1.0.0");
}

#[test]
fn test_delete_keeps_tombstone_or_purges() {
    let fx = Fixture::new();
    let x = fx.download("x.zip", "1.0.0");
    let y = fx.download("y.zip", "1.1.0");

    assert!(fx.manager.delete(&x, false).unwrap());
    assert_eq!(fx.manager.get_bundle_info(&x).status, BundleStatus::Deleted);
    assert!(!fx.manager.bundle_exists(&x));

    assert!(fx.manager.delete_bundle(&y).unwrap());
    let purged = fx.manager.get_bundle_info(&y);
    assert_eq!(purged.status, BundleStatus::Pending);
    assert!(purged.version_name().is_empty());

    // Directory already gone.
    assert!(!fx.manager.delete(&x, true).unwrap());
}

#[test]
fn test_delete_builtin_is_refused() {
    let fx = Fixture::new();
    assert!(!fx.manager.delete(BUILTIN_ID, true).unwrap());
}

// ============================================================================
// Stats
// ============================================================================

#[test]
fn test_stats_follow_transitions() {
    let fx = Fixture::new();
    let x = fx.download("x.zip", "1.0.0");
    let y = fx.download("y.zip", "2.0.0");

    fx.manager.set("missing").unwrap();
    assert_eq!(fx.reporter.last(), stat("set_fail", "", ""));

    fx.manager.set(&x).unwrap();
    assert_eq!(fx.reporter.last(), stat("set", "1.0.0", "1.0.0"));

    fx.manager.delete(&y, true).unwrap();
    assert_eq!(fx.reporter.last(), stat("delete", "2.0.0", "1.0.0"));

    fx.manager.reset(false).unwrap();
    assert_eq!(fx.reporter.last(), stat("reset", "1.0.0", ""));

    fx.manager.reset(true).unwrap();

    assert_eq!(
        fx.reporter.actions(),
        vec!["set_fail", "set", "delete", "reset"]
    );
}

#[test]
fn test_stats_carry_running_version() {
    let fx = Fixture::new();
    let x = fx.download("x.zip", "1.0.0");
    let y = fx.download("y.zip", "2.0.0");
    fx.manager.set(&x).unwrap();

    fx.manager.delete(&y, false).unwrap();

    let (_, version, current) = fx.reporter.last().unwrap();
    assert_eq!(version, "2.0.0");
    assert_eq!(current, fx.manager.current_bundle().version_name());
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_file_store_survives_restart() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    let archive = temp.path().join("app.zip");
    {
        let mut zip = ZipWriter::new(fs::File::create(&archive).unwrap());
        zip.start_file("index.html", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<html></html>").unwrap();
        zip.finish().unwrap();
    }

    let open = || {
        let store = FileKeyValueStore::open(root.join("preferences.json")).unwrap();
        BundleManager::builder(UpdaterConfig::new(&root))
            .with_store(Box::new(store))
            .with_fetcher(Box::new(LocalFetcher))
            .build()
            .unwrap()
    };

    let id = {
        let manager = open();
        let info = manager
            .download(&archive.to_string_lossy(), Some("3.0.0"))
            .unwrap();
        manager.set(&info.id).unwrap();
        manager.set_success(&info.id, false).unwrap();
        info.id
    };

    let manager = open();
    assert_eq!(manager.current_bundle_id(), id);
    assert_eq!(manager.fallback_bundle().id, id);
    let info = manager.get_bundle_info(&id);
    assert_eq!(info.status, BundleStatus::Success);
    assert_eq!(info.version_name(), "3.0.0");
    assert!(!info.checksum.is_empty());
}
