//! The three process-wide bundle pointers.

use tracing::debug;

use super::error::BundleResult;
use super::store::KeyValueStore;
use crate::bundle::{BUILTIN_ID, BUILTIN_PATH};

/// Key holding the active bundle path.
pub const CURRENT_PATH_KEY: &str = "serverBasePath";

/// Key holding the fallback bundle id.
pub const FALLBACK_ID_KEY: &str = "pastVersion";

/// Key holding the bundle id staged for the next start.
pub const NEXT_ID_KEY: &str = "nextVersion";

/// Which bundle is active, which one to fall back to, and which one is staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerState {
    /// Path of the active bundle directory, or [`BUILTIN_PATH`].
    pub current_bundle_path: String,
    /// Bundle to roll back to.
    pub fallback_bundle_id: String,
    /// Bundle to switch to at the next start, if any.
    pub next_bundle_id: Option<String>,
}

impl Default for PointerState {
    fn default() -> Self {
        Self {
            current_bundle_path: BUILTIN_PATH.to_string(),
            fallback_bundle_id: BUILTIN_ID.to_string(),
            next_bundle_id: None,
        }
    }
}

impl PointerState {
    /// Read the pointers, substituting defaults for missing or empty values.
    pub fn load(kv: &dyn KeyValueStore) -> Self {
        let non_empty = |key: &str| kv.get(key).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Self {
            current_bundle_path: non_empty(CURRENT_PATH_KEY)
                .unwrap_or(defaults.current_bundle_path),
            fallback_bundle_id: non_empty(FALLBACK_ID_KEY).unwrap_or(defaults.fallback_bundle_id),
            next_bundle_id: non_empty(NEXT_ID_KEY),
        }
    }

    /// Write all three pointers in one batch.
    pub fn persist(&self, kv: &dyn KeyValueStore) -> BundleResult<()> {
        kv.apply(&[
            (CURRENT_PATH_KEY, Some(self.current_bundle_path.as_str())),
            (FALLBACK_ID_KEY, Some(self.fallback_bundle_id.as_str())),
            (NEXT_ID_KEY, self.next_bundle_id.as_deref()),
        ])?;
        debug!(
            current = %self.current_bundle_path,
            fallback = %self.fallback_bundle_id,
            next = ?self.next_bundle_id,
            "Pointers persisted"
        );
        Ok(())
    }

    /// Check whether the builtin bundle is active.
    pub fn is_using_builtin(&self) -> bool {
        self.current_bundle_path.is_empty() || self.current_bundle_path == BUILTIN_PATH
    }

    /// Id of the active bundle: the last path segment, or [`BUILTIN_ID`].
    pub fn current_bundle_id(&self) -> String {
        if self.is_using_builtin() {
            return BUILTIN_ID.to_string();
        }
        self.current_bundle_path
            .trim_end_matches(['/', '\\'])
            .rsplit(['/', '\\'])
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or(BUILTIN_ID)
            .to_string()
    }
}
