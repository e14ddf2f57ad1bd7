//! Moving files between the local work directory and object storage.

use crate::error::{RunError, Stage};
use shortflow_core::storage::{basename, is_object_name};
use shortflow_core::{ObjectStore, RetryPolicy};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Upload a local file to `key`.
///
/// Returns `Ok(false)` without touching storage when the local file does not
/// exist. Storage failures are retried and then returned.
pub fn upload_file(
    store: &dyn ObjectStore,
    retry: RetryPolicy,
    local: &Path,
    key: &str,
) -> Result<bool, RunError> {
    let body = match std::fs::read(local) {
        Ok(body) => body,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %local.display(), key, "local file missing, skipping upload");
            return Ok(false);
        }
        Err(e) => return Err(RunError::io_at(Stage::Upload, local)(e)),
    };

    retry
        .run("upload object", || store.put(key, &body))
        .map_err(RunError::storage_at(Stage::Upload))?;
    debug!(container = store.container(), key, bytes = body.len(), "uploaded object");
    Ok(true)
}

/// An object copied from storage into the work directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedObject {
    /// Storage key the object was read from.
    pub key: String,
    /// Key relative to the listed prefix, e.g. `20240307.csv` or `retry/20240307.csv`.
    pub name: String,
    pub path: PathBuf,
}

/// Download every object under `prefix` into `dest_dir`.
///
/// Each object keeps its key path relative to `prefix`, so nested objects that
/// share a basename land in different local files. Markers and blank-named keys
/// are skipped. Returns objects in listing order.
pub fn download_objects(
    store: &dyn ObjectStore,
    retry: RetryPolicy,
    prefix: &str,
    dest_dir: &Path,
) -> Result<Vec<DownloadedObject>, RunError> {
    std::fs::create_dir_all(dest_dir).map_err(RunError::io_at(Stage::Download, dest_dir))?;

    let keys = retry
        .run("list objects", || store.list(prefix))
        .map_err(RunError::storage_at(Stage::Download))?;

    let mut objects = Vec::new();
    for key in keys {
        if !is_object_name(basename(&key)) {
            continue;
        }
        let Some(name) = relative_name(prefix, &key) else {
            warn!(key = %key, "object name has no usable path segments, skipping download");
            continue;
        };
        let path = dest_dir.join(&name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RunError::io_at(Stage::Download, parent))?;
        }

        let body = retry
            .run("download object", || store.get(&key))
            .map_err(RunError::storage_at(Stage::Download))?;
        std::fs::write(&path, &body).map_err(RunError::io_at(Stage::Download, &path))?;
        debug!(container = store.container(), key = %key, path = %path.display(), "downloaded object");
        objects.push(DownloadedObject { key, name, path });
    }
    Ok(objects)
}

/// `key` relative to `prefix`, with empty, `.` and `..` segments dropped.
fn relative_name(prefix: &str, key: &str) -> Option<String> {
    let rest = key.strip_prefix(prefix).unwrap_or_else(|| basename(key));
    let segments: Vec<&str> = rest
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();
    (!segments.is_empty()).then(|| segments.join("/"))
}
