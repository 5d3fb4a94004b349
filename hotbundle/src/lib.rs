//! Hotbundle - over-the-air web bundle updates
//!
//! This library manages the web asset bundles a host application boots from:
//! it downloads packaged bundles, unpacks them safely, tracks their status,
//! switches the active bundle and keeps a fallback to recover from a bad
//! update.
//!
//! # Modules
//!
//! - [`bundle`]: bundle records, statuses and sentinel identities
//! - [`manager`]: download pipeline and lifecycle state machine
//! - [`reporting`]: stats and channel endpoints
//! - [`config`]: INI configuration file
//! - [`logging`]: `tracing` subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use hotbundle::manager::{BundleManager, UpdaterConfig};
//!
//! let manager = BundleManager::open(UpdaterConfig::new("/data/app"))?;
//!
//! let bundle = manager.download("https://example.com/app-2.0.0.zip", Some("2.0.0"))?;
//! if manager.set(&bundle.id)? {
//!     // ...host reloads and reports back...
//!     manager.set_success(&bundle.id, true)?;
//! }
//! # Ok::<(), hotbundle::manager::BundleError>(())
//! ```

pub mod bundle;
pub mod config;
pub mod logging;
pub mod manager;
pub mod reporting;
