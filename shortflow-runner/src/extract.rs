//! Extract flow: fetch the day's report, save its first table, stage it.

use crate::config::PipelineConfig;
use crate::error::{RunError, Stage};
use crate::transfer::upload_file;
use chrono::NaiveDate;
use shortflow_core::source::{parse_first_table, write_table};
use shortflow_core::{ObjectStore, ReportSource, Zone};
use std::path::PathBuf;
use tracing::info;

/// Default report endpoint.
pub const DEFAULT_ENDPOINT: &str = "TWT93U";

/// Result of one extract run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOutcome {
    pub date: NaiveDate,
    /// Raw table written to the work directory.
    pub local_path: PathBuf,
    /// Rows below the title line, column header rows and footer included.
    pub rows: usize,
    /// Storage key the file was uploaded to, `None` if the upload was skipped.
    pub key: Option<String>,
}

/// File name for a raw table extracted on `date`.
pub fn raw_file_name(date: NaiveDate, extension: &str) -> String {
    format!("{}.{extension}", date.format("%Y%m%d"))
}

/// Fetch the report for `date`, write it locally, and upload it to the
/// `to_be_processed` zone.
pub fn run_extract(
    config: &PipelineConfig,
    store: &dyn ObjectStore,
    source: &dyn ReportSource,
    endpoint: &str,
    date: NaiveDate,
) -> Result<ExtractOutcome, RunError> {
    let retry = config.retry_policy();

    info!(source = source.name(), endpoint, date = %date, "{}", Stage::Fetch);
    let html = retry
        .run("fetch report", || source.fetch_report(endpoint, date))
        .map_err(RunError::source_at(Stage::Fetch))?;

    info!(bytes = html.len(), "{}", Stage::Parse);
    let table = parse_first_table(&html).map_err(RunError::source_at(Stage::Parse))?;
    std::fs::create_dir_all(&config.work_dir)
        .map_err(RunError::io_at(Stage::Parse, &config.work_dir))?;
    let name = raw_file_name(date, config.raw_format.extension());
    let local_path = config.work_dir.join(&name);
    write_table(&local_path, &table, config.raw_format)
        .map_err(RunError::source_at(Stage::Parse))?;

    let key = Zone::ToBeProcessed.key(config.base_prefix(), &name);
    info!(container = store.container(), key = %key, "{}", Stage::Upload);
    let uploaded = upload_file(store, retry, &local_path, &key)?;

    Ok(ExtractOutcome {
        date,
        local_path,
        rows: table.len(),
        key: uploaded.then_some(key),
    })
}
