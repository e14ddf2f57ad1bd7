//! Report source for the extract stage.
//!
//! The `ReportSource` trait abstracts over where the HTML report comes from so the
//! extract flow can run against a live endpoint or a canned document in tests.

mod html;
mod http;

pub use html::parse_first_table;
pub use http::HttpReportSource;

use crate::table::RawTable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors from fetching, parsing, or writing the source report.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network error requesting {url}: {message}")]
    Network { url: String, message: String },

    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("no parsable <table> in response")]
    NoTable,

    #[error("unsupported output format '{0}'")]
    UnsupportedFormat(String),

    #[error("failed to write table to '{path}': {message}")]
    Write { path: String, message: String },
}

/// Fetches the HTML report for one date.
pub trait ReportSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// HTML body of the report at `endpoint` for `date`.
    fn fetch_report(&self, endpoint: &str, date: NaiveDate) -> Result<String, SourceError>;
}

/// File format for extracted raw tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    #[default]
    Csv,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(SourceError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = SourceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OutputFormat> for String {
    fn from(format: OutputFormat) -> Self {
        format.to_string()
    }
}

/// Write an extracted table to `path` in `format`.
pub fn write_table(path: &Path, table: &RawTable, format: OutputFormat) -> Result<(), SourceError> {
    let write_err = |message: String| SourceError::Write {
        path: path.display().to_string(),
        message,
    };
    match format {
        OutputFormat::Csv => {
            let file = std::fs::File::create(path).map_err(|e| write_err(e.to_string()))?;
            table
                .write_to(std::io::BufWriter::new(file))
                .map_err(|e| write_err(e.to_string()))
        }
    }
}
