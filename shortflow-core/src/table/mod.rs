//! Raw and output tables with CSV I/O.
//!
//! A raw table is the extract stage's CSV exactly as read: the first line is a
//! header line, every following line is a row of text cells. The two-level column
//! header and the footer are still inside `rows`; interpreting them is the
//! transform's job.

pub mod columns;

use crate::transform::TransformError;
use columns::OUTPUT_COLUMNS;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

/// A raw tabular file: a header line plus text rows of the same width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Build a table, padding short rows with empty cells.
    ///
    /// A row wider than the header is a format error.
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, TransformError> {
        let width = header.len();
        let mut padded = Vec::with_capacity(rows.len());
        for (i, mut row) in rows.into_iter().enumerate() {
            if row.len() > width {
                return Err(TransformError::DataFormat(format!(
                    "row {} has {} fields, header has {width}",
                    i + 1,
                    row.len()
                )));
            }
            row.resize(width, String::new());
            padded.push(row);
        }
        Ok(Self {
            header,
            rows: padded,
        })
    }

    /// Build a table from a grid whose first row is the header line.
    pub fn from_grid(mut grid: Vec<Vec<String>>) -> Result<Self, TransformError> {
        if grid.is_empty() {
            return Err(TransformError::DataFormat("table has no header line".into()));
        }
        let header = grid.remove(0);
        Self::new(header, grid)
    }

    /// Parse CSV text.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TransformError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let header: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Self::new(header, rows)
    }

    /// Read a CSV file from disk.
    pub fn read_csv(path: &Path) -> Result<Self, TransformError> {
        let file = std::fs::File::open(path).map_err(|e| TransformError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Write as CSV: header line, then rows.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), TransformError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.header)?;
        for row in &self.rows {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush().map_err(|e| TransformError::Io {
            path: "<writer>".into(),
            source: e,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One security that cleared the z-score threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    #[serde(rename = "Security Code")]
    pub security_code: String,
    #[serde(rename = "Short Volume Pct")]
    pub short_volume_pct: f64,
    #[serde(rename = "Group Avg Short Volume Pct")]
    pub group_avg: f64,
    #[serde(rename = "Group Std Short Volume Pct")]
    pub group_std: f64,
    #[serde(rename = "Group Z score Short Volume Pct")]
    pub group_z_score: f64,
}

/// The transform result, in input row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputTable {
    pub records: Vec<ScoredRecord>,
}

impl OutputTable {
    pub fn new(records: Vec<ScoredRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn security_codes(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.security_code.as_str()).collect()
    }

    /// Write as CSV. The header line is written even when there are no records.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), TransformError> {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        csv_writer.write_record(OUTPUT_COLUMNS)?;
        for record in &self.records {
            csv_writer.serialize(record)?;
        }
        csv_writer.flush().map_err(|e| TransformError::Io {
            path: "<writer>".into(),
            source: e,
        })
    }

    /// Write as CSV to `path`, replacing any existing file.
    pub fn write_csv(&self, path: &Path) -> Result<(), TransformError> {
        let io_err = |e| TransformError::Io {
            path: path.display().to_string(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = std::fs::File::create(path).map_err(io_err)?;
        self.write_to(std::io::BufWriter::new(file))
    }

    /// Parse CSV previously written by [`OutputTable::write_to`].
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TransformError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let records = csv_reader
            .deserialize()
            .collect::<Result<Vec<ScoredRecord>, _>>()?;
        Ok(Self { records })
    }
}
