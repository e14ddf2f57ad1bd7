//! Table transforms, one implementation per dataset, looked up by name.

mod short_sales;

pub use short_sales::{ShortSalesTransform, Z_SCORE_THRESHOLD};

use crate::table::{OutputTable, RawTable};
use polars::prelude::PolarsError;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while reading, transforming, or writing a table.
///
/// None of these are transient; retrying the same input gives the same result.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("data format error: {0}")]
    DataFormat(String),

    #[error("dataframe error: {0}")]
    Frame(#[from] PolarsError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A dataset-specific transform from a raw table to an output table.
///
/// Implementations must be pure and deterministic: the same raw table always
/// produces the same output table.
pub trait TableTransform: Send + Sync {
    /// Registry name of this transform.
    fn name(&self) -> &str;

    fn transform(&self, raw: &RawTable) -> Result<OutputTable, TransformError>;
}

/// Named transform variants.
pub struct TransformRegistry {
    transforms: BTreeMap<String, Box<dyn TableTransform>>,
}

impl TransformRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            transforms: BTreeMap::new(),
        }
    }

    /// Registry holding every built-in transform.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ShortSalesTransform));
        registry
    }

    /// Add a transform under its own name, replacing any previous one.
    pub fn register(&mut self, transform: Box<dyn TableTransform>) {
        self.transforms.insert(transform.name().to_string(), transform);
    }

    pub fn get(&self, name: &str) -> Option<&dyn TableTransform> {
        self.transforms.get(name).map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.transforms.keys().map(String::as_str).collect()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
