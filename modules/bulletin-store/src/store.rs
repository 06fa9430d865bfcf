//! The store document on disk: load, validate, atomic save.
//!
//! Saves go to a temporary file in the same directory, are flushed to disk,
//! and then renamed over the target, so a crash mid-write leaves either the
//! old document or the new one. This is not a lock; concurrent writers are
//! not supported.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{CorruptStoreError, StoreError};
use crate::types::Store;

// ---------------------------------------------------------------------------
// StoreFile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StoreFile {
    path: PathBuf,
}

impl StoreFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read and check the store. A missing file is an I/O error.
    pub fn load(&self) -> Result<Store, StoreError> {
        let json = std::fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        let store = parse_store(&json).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        info!(
            path = %self.path.display(),
            events = store.events.len(),
            next_id = store.next_id,
            "Loaded store"
        );
        Ok(store)
    }

    /// Like `load`, but a missing file yields an empty store.
    pub fn load_or_init(&self) -> Result<Store, StoreError> {
        if self.exists() {
            return self.load();
        }
        info!(path = %self.path.display(), "No store found, starting empty");
        Ok(Store::default())
    }

    /// Write the whole store, atomically. Invariant-violating stores are
    /// refused rather than persisted.
    pub fn save(&self, store: &Store) -> Result<(), StoreError> {
        store.check_invariants().map_err(StoreError::Invalid)?;
        write_json_atomic(&self.path, store)?;
        info!(
            path = %self.path.display(),
            events = store.events.len(),
            next_id = store.next_id,
            "Saved store"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a store document and check its invariants.
pub fn parse_store(json: &str) -> Result<Store, CorruptStoreError> {
    let value: Value = serde_json::from_str(json)?;

    // A null id would otherwise surface as a generic type error.
    if let Some(events) = value.get("events").and_then(Value::as_array) {
        for (index, event) in events.iter().enumerate() {
            if event.get("id").map_or(true, Value::is_null) {
                return Err(CorruptStoreError::NullId { index });
            }
        }
    }

    let store: Store = serde_json::from_value(value)?;
    store.check_invariants()?;
    Ok(store)
}

// ---------------------------------------------------------------------------
// Atomic JSON writes
// ---------------------------------------------------------------------------

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.write_all(b"\n").map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;

    debug!(tmp = %tmp.path().display(), target = %path.display(), "Replacing file");
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
