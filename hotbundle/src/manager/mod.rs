//! Bundle manager: download, install, activate, roll back.
//!
//! # Components
//!
//! - [`BundleManager`]: lifecycle state machine and pointer ownership
//! - [`download`]: HTTP fetch, CRC32 fingerprint, progress scaling
//! - [`ZipExtractor`]: zip extraction with path containment
//! - [`flatten()`]: normalizes an extracted tree into the bundle layout
//! - [`MetadataStore`]: typed per-bundle records over a [`KeyValueStore`]
//!
//! # Directory Layout
//!
//! ```text
//! <root>/
//! ├── preferences.json      metadata records and pointers
//! ├── .scratch/             in-progress downloads, emptied after each run
//! └── versions/
//!     ├── aB3dE5gH7j/
//!     │   └── index.html
//!     └── q1w2e3r4t5/
//!         └── index.html
//! ```

mod config;
pub mod download;
mod error;
mod extractor;
mod flatten;
mod lifecycle;
mod pointers;
mod store;
mod traits;

pub use config::{UpdaterConfig, PREFERENCES_FILE, VERSIONS_DIR};
pub use error::{BundleError, BundleResult, ErrorKind};
pub use extractor::{resolve_entry_path, ZipExtractor};
pub use flatten::flatten;
pub use lifecycle::{BundleManager, BundleManagerBuilder, ID_LENGTH, SCRATCH_DIR};
pub use pointers::{PointerState, CURRENT_PATH_KEY, FALLBACK_ID_KEY, NEXT_ID_KEY};
pub use store::{info_key, FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, MetadataStore};
pub use traits::{ArchiveExtractor, ArchiveFetcher, DownloadProgressCallback, ProgressCallback};
