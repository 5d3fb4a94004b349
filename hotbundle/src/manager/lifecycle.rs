//! Bundle lifecycle manager.
//!
//! [`BundleManager`] owns the bundle directory tree, the metadata store and
//! the pointer state. It drives the download pipeline and every status or
//! pointer transition.
//!
//! # Locking
//!
//! One mutex guards the metadata store and the pointers. Pointer mutations
//! and read-modify-write status updates run entirely under it. The download
//! pipeline only takes it around its two metadata writes; network transfer,
//! extraction and flattening run unlocked.
//!
//! # Download pipeline
//!
//! ```text
//! allocate id ─► DOWNLOADING ─► fetch ─► fingerprint ─► extract ─► flatten ─► PENDING
//!      0%            5%         10-70%       71%         75-90%       91%       100%
//! ```
//!
//! The scratch archive and extraction directory are removed on every exit
//! path. The `PENDING` record is stamped when the bundle is registered, not
//! when the download started. A failure after the `DOWNLOADING` record is
//! written leaves that record behind; it can never be activated because
//! `bundle_exists` rejects `DOWNLOADING` bundles.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashSet;
use parking_lot::Mutex;
use rand::distr::Alphanumeric;
use rand::Rng;
use tracing::{debug, error, info, trace, warn};

use super::config::UpdaterConfig;
use super::download::{fingerprint, HttpFetcher, StageProgress, EXTRACT_RANGE, FETCH_RANGE};
use super::error::{BundleError, BundleResult};
use super::extractor::ZipExtractor;
use super::flatten::flatten;
use super::pointers::PointerState;
use super::store::{FileKeyValueStore, KeyValueStore, MetadataStore};
use super::traits::{ArchiveExtractor, ArchiveFetcher, DownloadProgressCallback};
use crate::bundle::{is_sentinel_id, BundleInfo, BundleStatus, BUILTIN_ID, INDEX_FILE};
use crate::reporting::{NoopReporter, ReportingClient, ResponseCallback, StatsReporter};

/// Length of generated bundle ids.
pub const ID_LENGTH: usize = 10;

/// Scratch directory under the root for in-progress downloads.
pub const SCRATCH_DIR: &str = ".scratch";

/// State guarded by the manager lock.
struct ManagerState {
    store: MetadataStore,
    pointers: PointerState,
}

impl ManagerState {
    /// Apply `change` to a copy of the pointers, persist it, then adopt it.
    fn update_pointers(&mut self, change: impl FnOnce(&mut PointerState)) -> BundleResult<()> {
        let mut next = self.pointers.clone();
        change(&mut next);
        next.persist(self.store.kv())?;
        self.pointers = next;
        Ok(())
    }
}

/// Removes scratch files when a download ends, however it ends.
struct Scratch {
    archive: PathBuf,
    extract_dir: PathBuf,
}

impl Scratch {
    fn new(root: &Path, id: &str) -> Self {
        let base = root.join(SCRATCH_DIR);
        Self {
            archive: base.join(format!("{}.zip", id)),
            extract_dir: base.join(id),
        }
    }

    fn remove_archive(&self) {
        if self.archive.exists() {
            if let Err(e) = fs::remove_file(&self.archive) {
                warn!(path = %self.archive.display(), error = %e, "Failed to remove scratch archive");
            }
        }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        self.remove_archive();
        if self.extract_dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.extract_dir) {
                warn!(path = %self.extract_dir.display(), error = %e, "Failed to remove scratch directory");
            }
        }
    }
}

/// Releases an in-flight id when a download ends.
struct InFlight<'a> {
    ids: &'a DashSet<String>,
    id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.ids.remove(&self.id);
    }
}

/// Check that an id is safe to use as a directory name.
fn is_valid_bundle_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Builder for [`BundleManager`].
///
/// Components that are not supplied fall back to the production defaults:
/// a JSON metadata file, an HTTP fetcher, the zip extractor, and either a
/// [`ReportingClient`] or a [`NoopReporter`] depending on the configured
/// endpoints.
pub struct BundleManagerBuilder {
    config: UpdaterConfig,
    store: Option<Box<dyn KeyValueStore>>,
    fetcher: Option<Box<dyn ArchiveFetcher>>,
    extractor: Option<Box<dyn ArchiveExtractor>>,
    reporter: Option<Arc<dyn StatsReporter>>,
    progress: Option<DownloadProgressCallback>,
}

impl BundleManagerBuilder {
    /// Use a specific key/value store for metadata.
    pub fn with_store(mut self, store: Box<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a specific archive fetcher.
    pub fn with_fetcher(mut self, fetcher: Box<dyn ArchiveFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Use a specific archive extractor.
    pub fn with_extractor(mut self, extractor: Box<dyn ArchiveExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Use a specific stats reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn StatsReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Receive `(bundle_id, percent)` updates during downloads.
    pub fn with_progress_callback(mut self, callback: DownloadProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Build the manager, loading persisted pointers.
    pub fn build(self) -> BundleResult<BundleManager> {
        let kv = match self.store {
            Some(store) => store,
            None => Box::new(FileKeyValueStore::open(self.config.preferences_path())?),
        };
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Box::new(HttpFetcher::with_timeout(self.config.download_timeout)?),
        };
        let extractor = self
            .extractor
            .unwrap_or_else(|| Box::new(ZipExtractor::new()));
        let reporter = self.reporter.unwrap_or_else(|| {
            if self.config.has_reporting() {
                Arc::new(ReportingClient::new(self.config.reporting_config()))
            } else {
                Arc::new(NoopReporter)
            }
        });

        let pointers = PointerState::load(kv.as_ref());
        info!(
            root = %self.config.root_dir.display(),
            current = %pointers.current_bundle_path,
            fallback = %pointers.fallback_bundle_id,
            "Bundle manager ready"
        );

        Ok(BundleManager {
            config: self.config,
            fetcher,
            extractor,
            reporter,
            progress: self.progress,
            state: Mutex::new(ManagerState {
                store: MetadataStore::new(kv),
                pointers,
            }),
            in_flight: DashSet::new(),
        })
    }
}

/// Manages downloaded bundles and which one the host boots from.
///
/// # Example
///
/// ```no_run
/// use hotbundle::manager::{BundleManager, UpdaterConfig};
///
/// let manager = BundleManager::open(UpdaterConfig::new("/data/app"))?;
/// let bundle = manager.download("https://example.com/app-1.2.0.zip", Some("1.2.0"))?;
///
/// // Activate at next start; the host confirms once it loaded cleanly.
/// manager.set_next_bundle(Some(&bundle.id))?;
/// # Ok::<(), hotbundle::manager::BundleError>(())
/// ```
pub struct BundleManager {
    config: UpdaterConfig,
    fetcher: Box<dyn ArchiveFetcher>,
    extractor: Box<dyn ArchiveExtractor>,
    reporter: Arc<dyn StatsReporter>,
    progress: Option<DownloadProgressCallback>,
    state: Mutex<ManagerState>,
    in_flight: DashSet<String>,
}

impl BundleManager {
    /// Start building a manager for `config`.
    pub fn builder(config: UpdaterConfig) -> BundleManagerBuilder {
        BundleManagerBuilder {
            config,
            store: None,
            fetcher: None,
            extractor: None,
            reporter: None,
            progress: None,
        }
    }

    /// Open a manager with the production defaults.
    pub fn open(config: UpdaterConfig) -> BundleResult<Self> {
        Self::builder(config).build()
    }

    /// Manager configuration.
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Directory of bundle `id`.
    pub fn bundle_dir(&self, id: &str) -> PathBuf {
        self.config.versions_dir().join(id)
    }

    /// Send a stat about a bundle, stamped with the running bundle's version.
    fn report(&self, state: &ManagerState, action: &str, version_name: &str) {
        let current = state.store.get(&state.pointers.current_bundle_id());
        self.reporter
            .send_stats(action, version_name, current.version_name());
    }

    fn notify(&self, id: &str, percent: u8) {
        trace!(bundle_id = id, percent, "Download progress");
        if let Some(ref callback) = self.progress {
            callback(id, percent);
        }
    }

    /// Pick a fresh id and mark it in flight.
    fn allocate_id(&self) -> String {
        loop {
            let id: String = rand::rng()
                .sample_iter(&Alphanumeric)
                .take(ID_LENGTH)
                .map(char::from)
                .collect();

            if self.bundle_dir(&id).exists() {
                continue;
            }
            if self.in_flight.insert(id.clone()) {
                return id;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Download
    // -------------------------------------------------------------------------

    /// Download, unpack and register a bundle.
    ///
    /// Blocks the calling thread for the whole transfer; see
    /// [`download_async`](Self::download_async) for async hosts.
    ///
    /// # Returns
    ///
    /// The registered `PENDING` record.
    pub fn download(&self, url: &str, version_name: Option<&str>) -> BundleResult<BundleInfo> {
        let id = self.allocate_id();
        let _in_flight = InFlight {
            ids: &self.in_flight,
            id: id.clone(),
        };

        info!(bundle_id = %id, url, version = ?version_name, "Downloading bundle");

        let result = self.run_pipeline(&id, url, version_name);
        match result {
            Ok(ref info) => info!(bundle_id = %id, checksum = %info.checksum, "Bundle downloaded"),
            Err(ref e) => error!(bundle_id = %id, url, error = %e, "Bundle download failed"),
        }
        result
    }

    fn run_pipeline(
        &self,
        id: &str,
        url: &str,
        version_name: Option<&str>,
    ) -> BundleResult<BundleInfo> {
        let scratch = Scratch::new(&self.config.root_dir, id);

        let record = BundleInfo::new(
            id,
            version_name.map(str::to_string),
            BundleStatus::Downloading,
        );
        self.state.lock().store.save(id, Some(&record))?;
        self.notify(id, 0);
        self.notify(id, 5);

        let sink = |percent: u8| self.notify(id, percent);

        let fetch_progress = StageProgress::new(FETCH_RANGE, &sink);
        let bytes = self
            .fetcher
            .fetch(url, &scratch.archive, &|done, total| fetch_progress.update(done, total))?;
        debug!(bundle_id = id, bytes, "Archive fetched");

        let checksum = fingerprint(&scratch.archive)?;
        self.notify(id, 71);

        let extract_progress = StageProgress::new(EXTRACT_RANGE, &sink);
        self.extractor
            .extract(&scratch.archive, &scratch.extract_dir, &|done, total| {
                extract_progress.update(done, total)
            })?;
        scratch.remove_archive();

        self.notify(id, 91);
        flatten(&scratch.extract_dir, &self.bundle_dir(id))?;

        let info = BundleInfo::new(id, record.version_name, BundleStatus::Pending)
            .with_checksum(checksum);
        self.state.lock().store.save(id, Some(&info))?;
        self.notify(id, 100);

        Ok(info)
    }

    /// Run [`download`](Self::download) on the blocking thread pool.
    pub async fn download_async(
        self: Arc<Self>,
        url: String,
        version_name: Option<String>,
    ) -> BundleResult<BundleInfo> {
        tokio::task::spawn_blocking(move || self.download(&url, version_name.as_deref()))
            .await
            .map_err(|e| BundleError::Task(e.to_string()))?
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Records of every bundle directory, oldest first.
    pub fn list(&self) -> BundleResult<Vec<BundleInfo>> {
        let versions_dir = self.config.versions_dir();
        if !versions_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&versions_dir).map_err(|e| BundleError::ReadFailed {
            path: versions_dir.clone(),
            source: e,
        })?;

        let state = self.state.lock();
        let mut bundles = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BundleError::ReadFailed {
                path: versions_dir.clone(),
                source: e,
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            bundles.push(state.store.get(&id));
        }

        bundles.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(bundles)
    }

    /// Record of bundle `id`, or a placeholder.
    pub fn get_bundle_info(&self, id: &str) -> BundleInfo {
        self.state.lock().store.get(id)
    }

    /// First bundle whose version name is `name`.
    pub fn get_bundle_info_by_name(&self, name: &str) -> BundleResult<Option<BundleInfo>> {
        Ok(self
            .list()?
            .into_iter()
            .find(|info| info.version_name() == name))
    }

    /// Check whether bundle `id` is installed and activatable.
    pub fn bundle_exists(&self, id: &str) -> bool {
        let state = self.state.lock();
        self.bundle_exists_locked(&state, id)
    }

    fn bundle_exists_locked(&self, state: &ManagerState, id: &str) -> bool {
        if is_sentinel_id(id) || !is_valid_bundle_id(id) {
            return false;
        }

        let info = state.store.get(id);
        let dir = self.bundle_dir(id);
        dir.is_dir()
            && !info.is_deleted()
            && !info.is_downloading()
            && dir.join(INDEX_FILE).is_file()
    }

    /// Id of the active bundle.
    pub fn current_bundle_id(&self) -> String {
        self.state.lock().pointers.current_bundle_id()
    }

    /// Path of the active bundle, or the builtin marker.
    pub fn current_bundle_path(&self) -> String {
        self.state.lock().pointers.current_bundle_path.clone()
    }

    /// Record of the active bundle.
    pub fn current_bundle(&self) -> BundleInfo {
        let state = self.state.lock();
        state.store.get(&state.pointers.current_bundle_id())
    }

    /// Check whether the builtin bundle is active.
    pub fn is_using_builtin(&self) -> bool {
        self.state.lock().pointers.is_using_builtin()
    }

    /// Record of the fallback bundle.
    pub fn fallback_bundle(&self) -> BundleInfo {
        let state = self.state.lock();
        state.store.get(&state.pointers.fallback_bundle_id)
    }

    /// Record of the bundle staged for next start.
    pub fn next_bundle(&self) -> Option<BundleInfo> {
        let state = self.state.lock();
        state
            .pointers
            .next_bundle_id
            .as_deref()
            .map(|id| state.store.get(id))
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Make bundle `id` the active bundle.
    ///
    /// Returns `false`, leaving the pointer untouched, when the bundle is not
    /// installed. Selecting [`BUILTIN_ID`] performs a full [`reset`](Self::reset).
    pub fn set(&self, id: &str) -> BundleResult<bool> {
        if id == BUILTIN_ID {
            self.reset(false)?;
            return Ok(true);
        }

        let mut state = self.state.lock();
        let info = state.store.get(id);

        if !self.bundle_exists_locked(&state, id) {
            warn!(bundle_id = id, "Cannot activate missing bundle");
            self.report(&state, "set_fail", info.version_name());
            return Ok(false);
        }

        let path = self.bundle_dir(id).to_string_lossy().into_owned();
        state.update_pointers(|p| p.current_bundle_path = path)?;
        state.store.set_status(id, BundleStatus::Pending)?;
        info!(bundle_id = id, "Bundle activated");
        self.report(&state, "set", info.version_name());

        Ok(true)
    }

    /// Record that bundle `id` loaded correctly and make it the fallback.
    ///
    /// With `auto_delete_previous`, the old fallback bundle is deleted first
    /// unless it is the builtin bundle. Deletion failures are logged only.
    pub fn set_success(&self, id: &str, auto_delete_previous: bool) -> BundleResult<()> {
        let mut state = self.state.lock();
        state.store.set_status(id, BundleStatus::Success)?;

        let previous = state.pointers.fallback_bundle_id.clone();
        if auto_delete_previous && previous != BUILTIN_ID && previous != id {
            match self.delete_locked(&mut state, &previous, true) {
                Ok(true) => info!(bundle_id = %previous, "Previous bundle deleted"),
                Ok(false) => debug!(bundle_id = %previous, "Previous bundle not deleted"),
                Err(e) => warn!(bundle_id = %previous, error = %e, "Failed to delete previous bundle"),
            }
        }

        let fallback = id.to_string();
        state.update_pointers(|p| p.fallback_bundle_id = fallback)?;
        info!(bundle_id = id, "Bundle confirmed");
        Ok(())
    }

    /// Record that bundle `id` failed to load.
    pub fn set_error(&self, id: &str) -> BundleResult<BundleInfo> {
        let info = self.state.lock().store.set_status(id, BundleStatus::Error)?;
        warn!(bundle_id = id, "Bundle marked as failing");
        Ok(info)
    }

    /// Return to the builtin bundle and clear fallback and next pointers.
    ///
    /// `internal` resets skip the `reset` stat.
    pub fn reset(&self, internal: bool) -> BundleResult<()> {
        let mut state = self.state.lock();
        let previous = state.store.get(&state.pointers.current_bundle_id());

        state.update_pointers(|p| *p = PointerState::default())?;
        info!(internal, previous = %previous.id, "Reset to builtin bundle");

        if !internal {
            self.report(&state, "reset", previous.version_name());
        }
        Ok(())
    }

    /// Delete bundle `id`'s directory.
    ///
    /// With `purge_metadata` the record is removed, otherwise it becomes a
    /// `DELETED` tombstone. Refuses the builtin bundle, the active bundle and
    /// bundles still downloading.
    ///
    /// # Returns
    ///
    /// `true` if a directory was removed.
    pub fn delete(&self, id: &str, purge_metadata: bool) -> BundleResult<bool> {
        let mut state = self.state.lock();
        self.delete_locked(&mut state, id, purge_metadata)
    }

    /// Delete bundle `id` and its record.
    pub fn delete_bundle(&self, id: &str) -> BundleResult<bool> {
        self.delete(id, true)
    }

    fn delete_locked(
        &self,
        state: &mut ManagerState,
        id: &str,
        purge_metadata: bool,
    ) -> BundleResult<bool> {
        if is_sentinel_id(id) || !is_valid_bundle_id(id) {
            warn!(bundle_id = id, "Refusing to delete bundle");
            return Ok(false);
        }
        if id == state.pointers.current_bundle_id() {
            warn!(bundle_id = id, "Cannot delete the active bundle");
            return Ok(false);
        }
        if self.in_flight.contains(id) {
            warn!(bundle_id = id, "Cannot delete a bundle that is still downloading");
            return Ok(false);
        }

        let dir = self.bundle_dir(id);
        if !dir.exists() {
            debug!(bundle_id = id, path = %dir.display(), "Bundle directory not found");
            return Ok(false);
        }

        let info = state.store.get(id);
        fs::remove_dir_all(&dir).map_err(|e| BundleError::RemoveFailed {
            path: dir.clone(),
            source: e,
        })?;

        if purge_metadata {
            state.store.remove(id)?;
        } else {
            state.store.set_status(id, BundleStatus::Deleted)?;
        }

        info!(bundle_id = id, purge_metadata, "Bundle deleted");
        self.report(state, "delete", info.version_name());
        Ok(true)
    }

    /// Set the fallback bundle; `None` restores the builtin bundle.
    pub fn set_fallback_bundle(&self, id: Option<&str>) -> BundleResult<()> {
        let fallback = id.unwrap_or(BUILTIN_ID).to_string();
        self.state
            .lock()
            .update_pointers(|p| p.fallback_bundle_id = fallback)
    }

    /// Stage bundle `id` for the next start; `None` clears it.
    ///
    /// Returns `false` when the bundle is not installed.
    pub fn set_next_bundle(&self, id: Option<&str>) -> BundleResult<bool> {
        let mut state = self.state.lock();

        let Some(id) = id else {
            state.update_pointers(|p| p.next_bundle_id = None)?;
            return Ok(true);
        };

        if id != BUILTIN_ID && !self.bundle_exists_locked(&state, id) {
            warn!(bundle_id = id, "Cannot stage missing bundle");
            return Ok(false);
        }

        let next = id.to_string();
        state.update_pointers(|p| p.next_bundle_id = Some(next))?;
        state.store.set_status(id, BundleStatus::Pending)?;
        debug!(bundle_id = id, "Bundle staged for next start");
        Ok(true)
    }

    /// Change the version name of bundle `id`.
    pub fn set_version_name(&self, id: &str, name: Option<&str>) -> BundleResult<BundleInfo> {
        self.state
            .lock()
            .store
            .set_version_name(id, name.map(str::to_string))
    }

    // -------------------------------------------------------------------------
    // Remote
    // -------------------------------------------------------------------------

    /// Ask the update endpoint for a newer bundle.
    ///
    /// `url` overrides the configured update URL.
    pub fn check_for_update(&self, url: Option<&str>, on_response: ResponseCallback) {
        let url = url.unwrap_or(&self.config.update_url);
        let version = self.current_bundle().version_name().to_string();
        self.reporter.check_for_update(url, &version, on_response);
    }

    /// Assign this device to update channel `channel`.
    pub fn set_channel(&self, channel: &str, on_response: ResponseCallback) {
        let version = self.current_bundle().version_name().to_string();
        self.reporter.set_channel(channel, &version, on_response);
    }

    /// Query this device's update channel.
    pub fn get_channel(&self, on_response: ResponseCallback) {
        let version = self.current_bundle().version_name().to_string();
        self.reporter.get_channel(&version, on_response);
    }
}
