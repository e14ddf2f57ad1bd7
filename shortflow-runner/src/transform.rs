//! Transform flow: stage, download, transform each file, upload, archive.
//!
//! Storage failures while staging, downloading, or archiving end the run. A
//! failure on one file (bad data, output write, output upload) is logged and
//! recorded in the summary, and the remaining files are still processed.

use crate::config::{FailedInputPolicy, PipelineConfig};
use crate::error::{RunError, Stage};
use crate::transfer::{download_objects, DownloadedObject};
use chrono::NaiveDate;
use serde::Serialize;
use shortflow_core::{
    Archiver, MoveReport, ObjectStore, RawTable, RetryPolicy, StorageError, TableTransform,
    TransformError, TransformRegistry, Zone, ZoneMover,
};
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

/// What happened to one staged input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Transformed {
        input: String,
        rows: usize,
        output_key: String,
        /// blake3 hex digest of the uploaded output bytes.
        checksum: String,
    },
    Failed {
        input: String,
        error: String,
    },
}

impl FileOutcome {
    pub fn input(&self) -> &str {
        match self {
            FileOutcome::Transformed { input, .. } | FileOutcome::Failed { input, .. } => input,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }
}

/// Everything a transform run did.
#[derive(Debug, Clone, Serialize)]
pub struct TransformSummary {
    pub dataset: String,
    pub run_date: NaiveDate,
    /// Sweep from `to_be_processed/` into `processing/`.
    pub staged: MoveReport,
    pub files: Vec<FileOutcome>,
    /// Failed inputs moved to `failed/` (quarantine policy only).
    pub quarantined: Vec<String>,
    /// Sweep from `processing/` into the dated archive partition.
    pub archived: MoveReport,
}

impl TransformSummary {
    pub fn transformed_count(&self) -> usize {
        self.files.iter().filter(|f| !f.is_failed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.files.iter().filter(|f| f.is_failed()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed_count() > 0
    }
}

/// Per-file failure, kept in the summary as text.
#[derive(Debug, Error)]
enum FileError {
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("failed to read output '{path}': {source}")]
    ReadOutput {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to upload output: {0}")]
    Upload(#[from] StorageError),
}

/// Run the transform stage, archiving under today's local date.
pub fn run_transform(
    config: &PipelineConfig,
    store: &dyn ObjectStore,
    registry: &TransformRegistry,
) -> Result<TransformSummary, RunError> {
    run_transform_on(config, store, registry, chrono::Local::now().date_naive())
}

/// Run the transform stage, archiving under `run_date`.
pub fn run_transform_on(
    config: &PipelineConfig,
    store: &dyn ObjectStore,
    registry: &TransformRegistry,
    run_date: NaiveDate,
) -> Result<TransformSummary, RunError> {
    let transform = registry
        .get(&config.dataset)
        .ok_or_else(|| RunError::UnknownDataset(config.dataset.clone()))?;
    let base = config.base_prefix();
    let retry = config.retry_policy();
    let processing = Zone::Processing.prefix(base);

    info!(container = store.container(), prefix = base, "{}", Stage::Intake);
    let staged = ZoneMover::new(store, retry)
        .move_objects(&Zone::ToBeProcessed.prefix(base), &processing, false)
        .map_err(RunError::storage_at(Stage::Intake))?;

    info!(prefix = %processing, "{}", Stage::Download);
    let inputs = download_objects(store, retry, &processing, &config.work_dir)?;

    info!(dataset = transform.name(), files = inputs.len(), "{}", Stage::Transform);
    let output_dir = config.work_dir.join(Zone::Output.dir_name());
    let mut files = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let name = input.name.clone();
        let output_key = Zone::Output.key(base, &name);
        let outcome = match process_file(transform, store, retry, input, &output_dir, &output_key) {
            Ok((rows, checksum)) => {
                info!(input = %name, rows, output_key = %output_key, "transformed file");
                FileOutcome::Transformed {
                    input: name,
                    rows,
                    output_key,
                    checksum,
                }
            }
            Err(e) => {
                error!(input = %name, error = %e, "{} failed", Stage::Transform);
                FileOutcome::Failed {
                    input: name,
                    error: e.to_string(),
                }
            }
        };
        files.push(outcome);
    }

    let mut quarantined = Vec::new();
    if config.failed_inputs == FailedInputPolicy::Quarantine {
        let failed_inputs = inputs
            .iter()
            .zip(&files)
            .filter(|(_, outcome)| outcome.is_failed())
            .map(|(input, _)| input);
        for input in failed_inputs {
            let from = &input.key;
            let to = Zone::Failed.key(base, &input.name);
            warn!(from = %from, to = %to, "{}", Stage::Quarantine);
            retry
                .run("copy object", || store.copy(from, &to))
                .map_err(RunError::storage_at(Stage::Quarantine))?;
            retry
                .run("delete object", || store.delete(from))
                .map_err(RunError::storage_at(Stage::Quarantine))?;
            quarantined.push(to);
        }
    }

    info!(date = %run_date, "{}", Stage::Archive);
    let archived = Archiver::new(store, retry)
        .archive_on(base, run_date)
        .map_err(RunError::storage_at(Stage::Archive))?;

    let summary = TransformSummary {
        dataset: config.dataset.clone(),
        run_date,
        staged,
        files,
        quarantined,
        archived,
    };
    info!(
        transformed = summary.transformed_count(),
        failed = summary.failed_count(),
        archived = summary.archived.moved_count(),
        "transform run complete"
    );
    Ok(summary)
}

/// Transform one local raw file and upload the result to `output_key`.
///
/// Returns the output row count and the blake3 checksum of the uploaded bytes.
fn process_file(
    transform: &dyn TableTransform,
    store: &dyn ObjectStore,
    retry: RetryPolicy,
    input: &DownloadedObject,
    output_dir: &Path,
    output_key: &str,
) -> Result<(usize, String), FileError> {
    let raw = RawTable::read_csv(&input.path)?;
    let output = transform.transform(&raw)?;

    let local_output = output_dir.join(&input.name);
    output.write_csv(&local_output)?;
    let body = std::fs::read(&local_output).map_err(|e| FileError::ReadOutput {
        path: local_output.display().to_string(),
        source: e,
    })?;

    retry.run("upload object", || store.put(output_key, &body))?;
    Ok((output.len(), blake3::hash(&body).to_hex().to_string()))
}
