//! Per-view page size preference.
//!
//! Read once when a view is built, written on every page-size change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::errors::ConsoleError;

/// Page sizes the pager offers.
pub const PAGE_SIZE_OPTIONS: [u32; 5] = [10, 20, 30, 50, 100];
pub const DEFAULT_PAGE_SIZE: u32 = 10;

pub trait PreferenceStore: Send + Sync {
    fn page_size(&self, view: &str) -> Option<u32>;
    fn save_page_size(&self, view: &str, size: u32) -> Result<(), ConsoleError>;

    /// Stored size, or the default when absent or zero.
    fn page_size_or_default(&self, view: &str) -> u32 {
        self.page_size(view)
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

/// Process-local store.
#[derive(Clone, Default)]
pub struct MemoryPreferenceStore {
    sizes: Arc<DashMap<String, u32>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn page_size(&self, view: &str) -> Option<u32> {
        self.sizes.get(view).map(|v| *v)
    }

    fn save_page_size(&self, view: &str, size: u32) -> Result<(), ConsoleError> {
        self.sizes.insert(view.to_string(), size);
        Ok(())
    }
}

/// JSON file store: `{"token": 20, "user": 50}`.
///
/// Values are cached in memory; the whole map is rewritten on each save.
pub struct FilePreferenceStore {
    path: PathBuf,
    cache: MemoryPreferenceStore,
}

impl FilePreferenceStore {
    /// Open the store. A missing file is an empty store; an unreadable or
    /// corrupt one is logged and treated as empty so the console still starts.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = MemoryPreferenceStore::new();
        match read_map(&path) {
            Ok(map) => {
                for (view, size) in map {
                    cache.sizes.insert(view, size);
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable preference file");
            }
        }
        Self { path, cache }
    }
}

fn read_map(path: &Path) -> Result<BTreeMap<String, u32>, ConsoleError> {
    match std::fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn page_size(&self, view: &str) -> Option<u32> {
        self.cache.page_size(view)
    }

    fn save_page_size(&self, view: &str, size: u32) -> Result<(), ConsoleError> {
        self.cache.save_page_size(view, size)?;

        let snapshot: BTreeMap<String, u32> = self
            .cache
            .sizes
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        let json = serde_json::to_vec_pretty(&snapshot)?;
        std::fs::write(&self.path, json)?;
        tracing::debug!(view, size, path = %self.path.display(), "saved page size preference");
        Ok(())
    }
}
