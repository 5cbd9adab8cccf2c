//! Snapshot Persistence
//!
//! Key-value snapshot storage for the session store. Each key holds one
//! serialized JSON document. The file backend writes one file per key,
//! replacing it atomically so a crash never leaves a half-written snapshot.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::NamedTempFile;

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::ensure_dir;

/// Key under which the session list is stored
pub const SESSIONS_KEY: &str = "ai-research-sessions";

/// Key under which the sidebar flag is stored
pub const SIDEBAR_KEY: &str = "ai-research-sidebar-open";

/// Storage medium for snapshots
pub trait SnapshotBackend: Send + Sync {
    /// Read the value stored under `key`, `None` if never written
    fn read(&self, key: &str) -> AppResult<Option<String>>;

    /// Replace the value stored under `key`
    fn write(&self, key: &str, value: &str) -> AppResult<()>;
}

fn validate_key(key: &str) -> AppResult<()> {
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::validation(format!("Invalid snapshot key: {}", key)));
    }
    Ok(())
}

/// One JSON file per key under a directory
#[derive(Debug, Clone)]
pub struct FileSnapshotBackend {
    dir: PathBuf,
}

impl FileSnapshotBackend {
    /// Use `dir` for snapshots, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        ensure_dir(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> AppResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl SnapshotBackend for FileSnapshotBackend {
    fn read(&self, key: &str) -> AppResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> AppResult<()> {
        let path = self.path_for(key)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| {
            AppError::persistence(format!("Failed to replace {}: {}", path.display(), e.error))
        })?;
        Ok(())
    }
}

/// In-process backend for tests and throwaway runs.
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemorySnapshotBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value as if it had been persisted earlier
    pub fn with_entry(self, key: &str, value: impl Into<String>) -> Self {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.into());
        }
        self
    }

    /// Make every subsequent write fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Current raw value under `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }
}

impl SnapshotBackend for MemorySnapshotBackend {
    fn read(&self, key: &str) -> AppResult<Option<String>> {
        validate_key(key)?;
        let entries = self
            .entries
            .lock()
            .map_err(|_| AppError::internal("snapshot lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> AppResult<()> {
        validate_key(key)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::persistence("write rejected"));
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::internal("snapshot lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
