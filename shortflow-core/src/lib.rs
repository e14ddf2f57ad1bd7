//! Shortflow Core: short sale table scoring, storage zones, retry, report source.
//!
//! This crate contains everything a pipeline run needs below the orchestration layer:
//! - Raw and output table types with CSV I/O and two-level header flattening
//! - Group-relative z-score transform over a polars `DataFrame`
//! - Object store trait with in-memory and local filesystem backends
//! - Zone mover and date-partitioned archiver (copy-then-delete semantics)
//! - Bounded retry policy for external calls
//! - HTTP report source and HTML table parser for the extract stage

pub mod retry;
pub mod source;
pub mod storage;
pub mod table;
pub mod transform;

pub use retry::RetryPolicy;
pub use source::{HttpReportSource, OutputFormat, ReportSource, SourceError};
pub use storage::{
    archive_prefix, Archiver, LocalStore, MemoryStore, MoveReport, ObjectStore, StorageError,
    Zone, ZoneMover,
};
pub use table::{OutputTable, RawTable, ScoredRecord};
pub use transform::{ShortSalesTransform, TableTransform, TransformError, TransformRegistry};
