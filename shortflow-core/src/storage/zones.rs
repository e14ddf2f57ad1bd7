//! Storage zones, the zone mover, and the date-partitioned archiver.
//!
//! Zones are key prefixes under a base prefix, one per pipeline stage:
//! `{base}/to_be_processed/` → `{base}/processing/` → `{base}/output/` and
//! `{base}/archive/YYYY/MM/DD/`. Moving an object out of a zone is the only thing
//! that prevents it from being processed twice. A sweep is not atomic across
//! objects, but re-running it is safe: objects already moved are no longer under
//! the source prefix.

use super::{basename, is_object_name, ObjectStore, StorageError};
use crate::retry::RetryPolicy;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

/// Logical pipeline zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    ToBeProcessed,
    Processing,
    Output,
    Archive,
    /// Raw inputs whose transform failed, when quarantine is enabled.
    Failed,
}

impl Zone {
    pub fn dir_name(self) -> &'static str {
        match self {
            Zone::ToBeProcessed => "to_be_processed",
            Zone::Processing => "processing",
            Zone::Output => "output",
            Zone::Archive => "archive",
            Zone::Failed => "failed",
        }
    }

    /// Zone prefix under `base`, always ending in `/`: `{base}/{zone}/`.
    pub fn prefix(self, base: &str) -> String {
        format!("{}/{}/", base.trim_end_matches('/'), self.dir_name())
    }

    /// Key for an object named `name` in this zone.
    pub fn key(self, base: &str, name: &str) -> String {
        format!("{}{}", self.prefix(base), name)
    }
}

/// Archive destination for `date`: `{base}/archive/YYYY/MM/DD/`.
pub fn archive_prefix(base: &str, date: NaiveDate) -> String {
    format!("{}{}/", Zone::Archive.prefix(base), date.format("%Y/%m/%d"))
}

/// What a sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MoveReport {
    /// `(source, destination)` for every object copied and deleted.
    pub moved: Vec<(String, String)>,
    /// Marker or blank-named keys deleted without being copied.
    pub discarded: usize,
    /// Whether the zero-byte placeholder was written at the source prefix.
    pub placeholder_written: bool,
}

impl MoveReport {
    pub fn moved_count(&self) -> usize {
        self.moved.len()
    }
}

/// Moves objects between prefixes of one container.
pub struct ZoneMover<'a> {
    store: &'a dyn ObjectStore,
    retry: RetryPolicy,
}

impl<'a> ZoneMover<'a> {
    pub fn new(store: &'a dyn ObjectStore, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Move every object under `from_prefix` to `to_prefix + basename`.
    ///
    /// Objects with a blank basename are deleted without a copy, except the
    /// placeholder at `from_prefix` itself. With `single_file`, the sweep ends
    /// after the first object is moved and no placeholder is written; otherwise
    /// a zero-byte object is put at `from_prefix` when the sweep completes.
    ///
    /// The first failing primitive (after retries) aborts the sweep.
    pub fn move_objects(
        &self,
        from_prefix: &str,
        to_prefix: &str,
        single_file: bool,
    ) -> Result<MoveReport, StorageError> {
        let store = self.store;
        let keys = self
            .retry
            .run("list objects", || store.list(from_prefix))?;

        let mut report = MoveReport::default();
        for key in keys {
            if single_file && !report.moved.is_empty() {
                break;
            }
            if key == from_prefix {
                continue;
            }

            let name = basename(&key);
            if is_object_name(name) {
                let destination = format!("{to_prefix}{name}");
                self.retry
                    .run("copy object", || store.copy(&key, &destination))?;
                self.retry.run("delete object", || store.delete(&key))?;
                debug!(container = store.container(), from = %key, to = %destination, "moved object");
                report.moved.push((key, destination));
            } else {
                self.retry.run("delete object", || store.delete(&key))?;
                debug!(container = store.container(), key = %key, "discarded marker");
                report.discarded += 1;
            }
        }

        if !single_file {
            self.retry
                .run("put placeholder", || store.put(from_prefix, &[]))?;
            report.placeholder_written = true;
        }

        info!(
            container = store.container(),
            from = from_prefix,
            to = to_prefix,
            moved = report.moved.len(),
            discarded = report.discarded,
            "zone sweep complete"
        );
        Ok(report)
    }
}

/// Moves everything in the processing zone into today's archive partition.
pub struct Archiver<'a> {
    mover: ZoneMover<'a>,
}

impl<'a> Archiver<'a> {
    pub fn new(store: &'a dyn ObjectStore, retry: RetryPolicy) -> Self {
        Self {
            mover: ZoneMover::new(store, retry),
        }
    }

    /// Archive `{base}/processing/` under the current local date.
    pub fn archive(&self, base_prefix: &str) -> Result<MoveReport, StorageError> {
        self.archive_on(base_prefix, chrono::Local::now().date_naive())
    }

    /// Archive `{base}/processing/` under an explicit date.
    pub fn archive_on(&self, base_prefix: &str, date: NaiveDate) -> Result<MoveReport, StorageError> {
        let destination = archive_prefix(base_prefix, date);
        self.mover
            .move_objects(&Zone::Processing.prefix(base_prefix), &destination, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn mover(store: &MemoryStore) -> ZoneMover<'_> {
        ZoneMover::new(store, RetryPolicy::no_retry())
    }

    #[test]
    fn zone_prefixes() {
        assert_eq!(Zone::ToBeProcessed.prefix("base"), "base/to_be_processed/");
        assert_eq!(Zone::Processing.prefix("base/"), "base/processing/");
        assert_eq!(Zone::Output.key("base", "x.csv"), "base/output/x.csv");
    }

    #[test]
    fn archive_prefix_is_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(archive_prefix("warehouse", date), "warehouse/archive/2024/03/07/");
    }

    #[test]
    fn sweep_moves_by_basename_and_writes_placeholder() {
        let store = MemoryStore::new("bucket");
        store.put("b/to_be_processed/1.csv", b"one").unwrap();
        store.put("b/to_be_processed/nested/2.csv", b"two").unwrap();

        let report = mover(&store)
            .move_objects("b/to_be_processed/", "b/processing/", false)
            .unwrap();

        assert_eq!(report.moved_count(), 2);
        assert_eq!(store.get("b/processing/1.csv").unwrap(), b"one");
        assert_eq!(store.get("b/processing/2.csv").unwrap(), b"two");
        assert!(!store.contains("b/to_be_processed/1.csv"));
        assert!(!store.contains("b/to_be_processed/nested/2.csv"));
        assert!(store.get("b/to_be_processed/").unwrap().is_empty());
        assert!(report.placeholder_written);
    }

    #[test]
    fn markers_and_blank_names_are_deleted_not_copied() {
        let store = MemoryStore::new("bucket");
        store.put("b/to_be_processed/old/", b"").unwrap();
        store.put("b/to_be_processed/  ", b"blank").unwrap();
        store.put("b/to_be_processed/x.csv", b"x").unwrap();

        let report = mover(&store)
            .move_objects("b/to_be_processed/", "b/processing/", false)
            .unwrap();

        assert_eq!(report.moved_count(), 1);
        assert_eq!(report.discarded, 2);
        assert_eq!(store.keys(), vec!["b/processing/x.csv", "b/to_be_processed/"]);
    }

    #[test]
    fn single_file_stops_after_first_move() {
        let store = MemoryStore::new("bucket");
        store.put("b/to_be_processed/a.csv", b"a").unwrap();
        store.put("b/to_be_processed/b.csv", b"b").unwrap();
        store.put("b/to_be_processed/c/", b"").unwrap();

        let report = mover(&store)
            .move_objects("b/to_be_processed/", "b/processing/", true)
            .unwrap();

        assert_eq!(report.moved_count(), 1);
        assert_eq!(report.discarded, 0);
        assert!(!report.placeholder_written);
        assert!(store.contains("b/processing/a.csv"));
        assert!(store.contains("b/to_be_processed/b.csv"));
        assert!(store.contains("b/to_be_processed/c/"));
        assert!(!store.contains("b/to_be_processed/"));
    }

    #[test]
    fn archiver_moves_processing_into_dated_partition() {
        let store = MemoryStore::new("bucket");
        store.put("wh/processing/20240307.csv", b"raw").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();

        let report = Archiver::new(&store, RetryPolicy::no_retry())
            .archive_on("wh", date)
            .unwrap();

        assert_eq!(
            report.moved,
            vec![(
                "wh/processing/20240307.csv".to_string(),
                "wh/archive/2024/03/07/20240307.csv".to_string()
            )]
        );
        assert!(store.contains("wh/processing/"));
    }
}
