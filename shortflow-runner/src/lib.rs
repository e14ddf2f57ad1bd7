//! Shortflow Runner: stage orchestration and pipeline configuration.
//!
//! This crate builds on `shortflow-core` to provide:
//! - `PipelineConfig` from the environment or a TOML file
//! - Extract flow: fetch, parse, write, and stage one day's report
//! - Transform flow: stage, download, transform, upload, quarantine, archive
//! - Run summaries with per-file outcomes and output checksums

pub mod config;
pub mod error;
pub mod extract;
pub mod transfer;
pub mod transform;

pub use config::{ConfigError, FailedInputPolicy, PipelineConfig};
pub use error::{RunError, Stage};
pub use extract::{run_extract, ExtractOutcome, DEFAULT_ENDPOINT};
pub use transfer::{download_objects, upload_file, DownloadedObject};
pub use transform::{run_transform, run_transform_on, FileOutcome, TransformSummary};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_and_summary_are_send_sync() {
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
        assert_send::<TransformSummary>();
        assert_sync::<TransformSummary>();
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }
}
