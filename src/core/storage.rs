//! # Durable Storage
//!
//! A small key-value store. Values are opaque strings; callers own their
//! encoding. Absent keys read as `None`.
//!
//! `FileStorage` keeps one file per key (`<dir>/<key>.json`). All writes use
//! atomic rename (write `.tmp`, then `rename()`) so a crash never leaves a
//! half-written value behind.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, warn};
use thiserror::Error;

pub const VISITS_KEY: &str = "personal_visits";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Key-value persisted store.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// File-per-key storage rooted at a directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens (and creates if needed) the storage directory.
    pub fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Returns `~/.susu/`.
    pub fn default_dir() -> io::Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory"))?;
        Ok(home.join(".susu"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

/// Atomically write `contents` to `path` (via `.tmp` + rename).
fn atomic_write(path: &Path, contents: &str) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.key_path(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        atomic_write(&self.key_path(key), value)?;
        debug!("Stored key '{}' ({} bytes)", key, value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// In-process storage. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a usable map.
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.lock().remove(key);
        Ok(())
    }
}

/// Bumps and returns the persisted per-user visit counter.
/// An unreadable or garbled counter restarts at 1.
pub fn record_visit(storage: &dyn Storage) -> u64 {
    let previous = match storage.get(VISITS_KEY) {
        Ok(Some(raw)) => raw.trim().parse::<u64>().unwrap_or(0),
        Ok(None) => 0,
        Err(e) => {
            warn!("Failed to read visit counter: {}", e);
            0
        }
    };
    let visits = previous.saturating_add(1);
    if let Err(e) = storage.set(VISITS_KEY, &visits.to_string()) {
        warn!("Failed to write visit counter: {}", e);
    }
    visits
}
