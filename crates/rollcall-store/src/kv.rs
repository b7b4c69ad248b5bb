//! Key-value store trait and implementations.
//!
//! Values are JSON texts; the file backend keeps every key in one JSON
//! object document, read and rewritten whole on each operation. That is
//! the whole persistence model: collections small enough to rewrite per
//! append, one writer at a time.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

use crate::StoreError;

/// Key-value store with JSON-text values.
///
/// `get` of an absent key returns `None`; callers treat that as the
/// empty collection.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// An in-memory key-value store backed by a HashMap, for tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let data = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(data.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut data = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A persistent store keeping all keys in a single JSON object document.
///
/// `put` parses the value and stores it as structured JSON, so the
/// document on disk reads as `{"registeredFaces": [...], ...}`. Writes
/// go to a sibling temp file and rename over the document, keeping each
/// write atomic; the read-modify-write sequence itself is not guarded,
/// which is acceptable for a single-writer deployment.
#[derive(Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Open a store at the given path, creating parent directories.
    /// The document itself is created lazily on first write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    fn read_document(&self) -> Result<Map<String, Value>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(document)?)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), keys = document.len(), "store written");
        Ok(())
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let document = self.read_document()?;
        Ok(document.get(key).map(Value::to_string))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let parsed: Value = serde_json::from_str(value)?;
        let mut document = self.read_document()?;
        document.insert(key.to_string(), parsed);
        self.write_document(&document)
    }
}
