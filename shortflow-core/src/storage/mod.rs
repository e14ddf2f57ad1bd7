//! Object storage abstraction and zone movement.
//!
//! An `ObjectStore` is a single container of byte blobs addressed by `/`-separated
//! keys. There is no rename primitive and no native directory concept: moving is
//! copy-then-delete, and an empty "folder" is represented by a zero-byte object
//! whose key ends in `/`.

mod local;
mod memory;
pub mod zones;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use zones::{archive_prefix, Archiver, MoveReport, Zone, ZoneMover};

use thiserror::Error;

/// Errors from object storage primitives.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {container}/{key}")]
    NotFound { container: String, key: String },

    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    #[error("storage I/O error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("storage error: {0}")]
    Other(String),
}

/// Primitive operations over one storage container.
///
/// Listing order is whatever the backend returns; callers must not rely on it.
pub trait ObjectStore: Send + Sync {
    /// Name of the container this store addresses.
    fn container(&self) -> &str;

    /// Every key starting with `prefix` (raw string prefix match).
    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Read a whole object.
    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Create or overwrite an object. An empty body is allowed.
    fn put(&self, key: &str, body: &[u8]) -> Result<(), StorageError>;

    /// Copy an object within the container.
    fn copy(&self, from: &str, to: &str) -> Result<(), StorageError>;

    /// Delete an object. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Final `/`-separated segment of a key (empty for keys ending in `/`).
pub fn basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Whether a basename names a real object rather than a marker or blank entry.
pub fn is_object_name(name: &str) -> bool {
    !name.trim().is_empty()
}

/// Join a prefix and a name with exactly one `/` between them.
pub fn join_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix.trim_end_matches('/'), name)
    }
}
