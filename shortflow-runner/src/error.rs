//! Runner errors.

use shortflow_core::{SourceError, StorageError};
use std::fmt;
use thiserror::Error;

/// Pipeline stage an error occurred in, used as log and error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Parse,
    Upload,
    Intake,
    Download,
    Transform,
    Quarantine,
    Archive,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Fetch => "GETting raw response",
            Stage::Parse => "Parsing and saving HTML table",
            Stage::Upload => "Uploading to storage",
            Stage::Intake => "Moving files to processing zone",
            Stage::Download => "Downloading files from storage",
            Stage::Transform => "Transforming data",
            Stage::Quarantine => "Quarantining failed inputs",
            Stage::Archive => "Archiving processed files",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that end a pipeline run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),

    #[error("{stage}: {source}")]
    Storage {
        stage: Stage,
        #[source]
        source: StorageError,
    },

    #[error("{stage}: {source}")]
    Source {
        stage: Stage,
        #[source]
        source: SourceError,
    },

    #[error("{stage}: I/O error on '{path}': {source}")]
    Io {
        stage: Stage,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl RunError {
    pub(crate) fn storage_at(stage: Stage) -> impl FnOnce(StorageError) -> Self {
        move |source| RunError::Storage { stage, source }
    }

    pub(crate) fn source_at(stage: Stage) -> impl FnOnce(SourceError) -> Self {
        move |source| RunError::Source { stage, source }
    }

    pub(crate) fn io_at(stage: Stage, path: &std::path::Path) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.display().to_string();
        move |source| RunError::Io {
            stage,
            path,
            source,
        }
    }

    /// Stage the run failed in, when known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            RunError::UnknownDataset(_) => None,
            RunError::Storage { stage, .. }
            | RunError::Source { stage, .. }
            | RunError::Io { stage, .. } => Some(*stage),
        }
    }
}
