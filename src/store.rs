//! Mapping Store - persisted normalized-key → canonical-value cache
//!
//! A store is read whole at the start of a run and written whole at the end.
//! There is no locking: one writer per store path is assumed, and two runs
//! racing on the same file may drop each other's entries.
//!
//! `JsonFileStore` writes a sibling temp file and renames it into place, so a
//! crash during `save` leaves the previous mapping readable. A file that is
//! nonetheless corrupt is treated as a cold start rather than an error.

use crate::error::{CanonError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Normalized key → canonical value. Ordered so persisted files diff cleanly.
pub type Mapping = BTreeMap<String, String>;

pub trait MappingStore: Send + Sync {
    /// Read persisted state. Missing or unreadable state yields an empty mapping.
    fn load(&self) -> Mapping;

    /// Replace persisted state with `mapping`.
    fn save(&self, mapping: &Mapping) -> Result<()>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

/// JSON object on disk, one per instantiation.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the persisted file. Returns whether anything was removed.
    pub fn clear(&self) -> Result<bool> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            info!("Cleared mapping store {}", self.path.display());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "mapping.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl MappingStore for JsonFileStore {
    fn load(&self) -> Mapping {
        if !self.path.exists() {
            debug!("No mapping at {}, starting cold", self.path.display());
            return Mapping::new();
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Mapping store {} unreadable ({}), starting cold", self.path.display(), e);
                return Mapping::new();
            }
        };

        match serde_json::from_str::<Mapping>(&content) {
            Ok(mapping) => {
                debug!("Loaded {} mapping entries from {}", mapping.len(), self.path.display());
                mapping
            }
            Err(e) => {
                warn!("Mapping store {} is corrupt ({}), starting cold", self.path.display(), e);
                Mapping::new()
            }
        }
    }

    fn save(&self, mapping: &Mapping) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(mapping)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            CanonError::Store(format!(
                "Failed to move {} over {}: {}",
                tmp.display(),
                self.path.display(),
                e
            ))
        })?;

        debug!("Saved {} mapping entries to {}", mapping.len(), self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Store substitute for tests and dry runs. Counts saves.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    mapping: Mutex<Mapping>,
    saves: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(mapping: Mapping) -> Self {
        Self {
            mapping: Mutex::new(mapping),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self) -> Mapping {
        self.mapping.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl MappingStore for InMemoryStore {
    fn load(&self) -> Mapping {
        self.snapshot()
    }

    fn save(&self, mapping: &Mapping) -> Result<()> {
        let mut guard = self
            .mapping
            .lock()
            .map_err(|_| CanonError::Store("in-memory store lock poisoned".to_string()))?;
        *guard = mapping.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}
