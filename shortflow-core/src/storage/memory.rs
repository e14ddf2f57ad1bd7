//! In-memory object store.
//!
//! Objects live in a `BTreeMap`, so listings come back in lexicographic key
//! order, the same order S3-style listings use.

use super::{ObjectStore, StorageError};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Object store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    container: String,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    /// Snapshot of every key currently stored.
    pub fn keys(&self) -> Vec<String> {
        self.lock().map(|m| m.keys().cloned().collect()).unwrap_or_default()
    }

    /// Whether `key` exists.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().map(|m| m.contains_key(key)).unwrap_or(false)
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Vec<u8>>>, StorageError> {
        self.objects
            .lock()
            .map_err(|_| StorageError::Other("memory store lock poisoned".into()))
    }

    fn not_found(&self, key: &str) -> StorageError {
        StorageError::NotFound {
            container: self.container.clone(),
            key: key.to_string(),
        }
    }
}

impl ObjectStore for MemoryStore {
    fn container(&self) -> &str {
        &self.container
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let objects = self.lock()?;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let objects = self.lock()?;
        objects.get(key).cloned().ok_or_else(|| self.not_found(key))
    }

    fn put(&self, key: &str, body: &[u8]) -> Result<(), StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        self.lock()?.insert(key.to_string(), body.to_vec());
        Ok(())
    }

    fn copy(&self, from: &str, to: &str) -> Result<(), StorageError> {
        if to.is_empty() {
            return Err(StorageError::InvalidKey(to.to_string()));
        }
        let mut objects = self.lock()?;
        let body = objects.get(from).cloned().ok_or_else(|| self.not_found(from))?;
        objects.insert(to.to_string(), body);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }
}
