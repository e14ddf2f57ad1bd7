//! Local filesystem object store.
//!
//! Layout: `{root}/{container}/{key}` with `/` in keys mapped to directories.
//! A marker key ending in `/` is stored as a `.shortflow-marker` file inside the
//! matching directory so that it can coexist with objects beneath it.
//!
//! Writes are atomic: write to `{name}.shortflow-tmp`, then rename into place.

use super::{ObjectStore, StorageError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const MARKER_FILE: &str = ".shortflow-marker";
const TMP_SUFFIX: &str = ".shortflow-tmp";

/// Object store backed by a directory tree.
#[derive(Debug, Clone)]
pub struct LocalStore {
    container: String,
    base: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl AsRef<Path>, container: impl Into<String>) -> Self {
        let container = container.into();
        let base = root.as_ref().join(&container);
        Self { container, base }
    }

    /// Directory holding this container's objects.
    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    /// Filesystem path for a key.
    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let invalid = || StorageError::InvalidKey(key.to_string());
        if key.is_empty() || key.starts_with('/') {
            return Err(invalid());
        }

        let (dir_part, is_marker) = match key.strip_suffix('/') {
            Some(dir) => (dir, true),
            None => (key, false),
        };

        let mut path = self.base.clone();
        for segment in dir_part.split('/') {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment == MARKER_FILE
                || segment.ends_with(TMP_SUFFIX)
            {
                return Err(invalid());
            }
            path.push(segment);
        }
        if is_marker {
            path.push(MARKER_FILE);
        }
        Ok(path)
    }

    fn io_error(key: &str, source: std::io::Error) -> StorageError {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }

    fn write_atomic(&self, key: &str, path: &Path, body: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Self::io_error(key, e))?;
        }
        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(TMP_SUFFIX);
        let tmp_path = path.with_file_name(tmp_name);

        fs::write(&tmp_path, body).map_err(|e| Self::io_error(key, e))?;
        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            Self::io_error(key, e)
        })
    }

    /// Recursively collect keys below `dir`, where `rel` is the key prefix of `dir`.
    fn walk(&self, dir: &Path, rel: &str, out: &mut Vec<String>) -> Result<(), StorageError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Self::io_error(rel, e)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| Self::io_error(rel, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            let file_type = entry.file_type().map_err(|e| Self::io_error(rel, e))?;

            if file_type.is_dir() {
                let child = format!("{rel}{name}/");
                self.walk(&entry.path(), &child, out)?;
            } else if name == MARKER_FILE {
                if !rel.is_empty() {
                    out.push(rel.to_string());
                }
            } else if !name.ends_with(TMP_SUFFIX) {
                out.push(format!("{rel}{name}"));
            }
        }
        Ok(())
    }
}

impl ObjectStore for LocalStore {
    fn container(&self) -> &str {
        &self.container
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        self.walk(&self.base, "", &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(key)?;
        fs::read(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::NotFound {
                    container: self.container.clone(),
                    key: key.to_string(),
                }
            } else {
                Self::io_error(key, e)
            }
        })
    }

    fn put(&self, key: &str, body: &[u8]) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        self.write_atomic(key, &path, body)
    }

    fn copy(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let body = self.get(from)?;
        let path = self.object_path(to)?;
        self.write_atomic(to, &path, &body)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }
}
