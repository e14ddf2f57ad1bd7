//! Daily short sale balance transform.
//!
//! Scores each security's day-over-day short balance change against the other
//! securities sharing the first character of its code, and keeps the outliers.
//!
//! Steps:
//! 1. drop the footer row, lift the next two rows into a two-level header
//! 2. flatten the header (`Margin_…`, `SBL_…`, or the metric label)
//! 3. parse every column except `Security Code` and `Note` as `f64`
//! 4. `Short Volume Pct` = 100 × balance change / next-day quota
//! 5. per-group mean and sample std (NaN percentages excluded), z-score
//! 6. keep rows with z-score ≥ 2, project to the five output columns

use super::{TableTransform, TransformError};
use crate::table::columns::{
    flatten_header, GROUP, GROUP_AVG_SHORT_VOLUME_PCT, GROUP_STD_SHORT_VOLUME_PCT,
    GROUP_Z_SCORE_SHORT_VOLUME_PCT, MARGIN_CURRENT_BALANCE, MARGIN_PREVIOUS_BALANCE,
    MARGIN_QUOTA, OUTPUT_COLUMNS, REQUIRED_NUMERIC_COLUMNS, SBL_CURRENT_BALANCE,
    SBL_NEXT_DAY_QUOTA, SBL_PREVIOUS_BALANCE, SECURITY_CODE, SHORT_VOLUME_PCT, TEXT_COLUMNS,
};
use crate::table::{OutputTable, RawTable, ScoredRecord};
use polars::prelude::*;
use std::collections::HashSet;

/// Minimum group z-score for a security to be reported.
pub const Z_SCORE_THRESHOLD: f64 = 2.0;

/// Transform for the daily short sale balances report.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortSalesTransform;

impl ShortSalesTransform {
    /// Reshape a raw table into a typed frame with a `Group` column.
    pub fn prepare(&self, raw: &RawTable) -> Result<DataFrame, TransformError> {
        let rows = raw.rows();
        if rows.len() < 3 {
            return Err(TransformError::DataFormat(format!(
                "expected two header rows and a footer row, found {} rows",
                rows.len()
            )));
        }

        let body = &rows[..rows.len() - 1];
        let names = flatten_header(&body[0], &body[1]);
        let data = &body[2..];
        validate_columns(&names)?;

        let cell = |row: &[String], idx: usize| -> String {
            row.get(idx).cloned().unwrap_or_default()
        };

        let mut columns: Vec<Column> = Vec::with_capacity(names.len() + 1);
        for (idx, name) in names.iter().enumerate() {
            if TEXT_COLUMNS.contains(&name.as_str()) {
                let values: Vec<String> = data.iter().map(|row| cell(row, idx)).collect();
                columns.push(Column::new(name.as_str().into(), values));
            } else {
                let values = data
                    .iter()
                    .enumerate()
                    .map(|(i, row)| parse_numeric(name, i, &cell(row, idx)))
                    .collect::<Result<Vec<f64>, _>>()?;
                columns.push(Column::new(name.as_str().into(), values));
            }
        }

        let code_idx = names
            .iter()
            .position(|n| n == SECURITY_CODE)
            .ok_or_else(|| missing_column(SECURITY_CODE))?;
        let groups: Vec<Option<String>> = data
            .iter()
            .map(|row| cell(row, code_idx).chars().next().map(String::from))
            .collect();
        columns.push(Column::new(GROUP.into(), groups));

        Ok(DataFrame::new(columns)?)
    }

    /// Every row with its percentage, group statistics, and z-score, before
    /// the threshold filter. Rows without a group are dropped.
    pub fn score(&self, raw: &RawTable) -> Result<DataFrame, TransformError> {
        let frame = self.prepare(raw)?;

        let balance_change = (col(SBL_CURRENT_BALANCE) - col(SBL_PREVIOUS_BALANCE))
            + (col(MARGIN_CURRENT_BALANCE) - col(MARGIN_PREVIOUS_BALANCE));
        let total_quota = col(MARGIN_QUOTA) + col(SBL_NEXT_DAY_QUOTA);

        // NaN percentages (0/0) do not contribute to group aggregates.
        let aggregated =
            col(SHORT_VOLUME_PCT).filter(col(SHORT_VOLUME_PCT).is_not_nan());

        let scored = frame
            .lazy()
            .with_column((lit(100.0) * (balance_change / total_quota)).alias(SHORT_VOLUME_PCT))
            .filter(col(GROUP).is_not_null())
            .with_columns([
                aggregated
                    .clone()
                    .mean()
                    .over([col(GROUP)])
                    .alias(GROUP_AVG_SHORT_VOLUME_PCT),
                aggregated
                    .std(1)
                    .over([col(GROUP)])
                    .alias(GROUP_STD_SHORT_VOLUME_PCT),
            ])
            .with_column(
                ((col(SHORT_VOLUME_PCT) - col(GROUP_AVG_SHORT_VOLUME_PCT))
                    / col(GROUP_STD_SHORT_VOLUME_PCT))
                .alias(GROUP_Z_SCORE_SHORT_VOLUME_PCT),
            )
            .collect()?;

        Ok(scored)
    }
}

impl TableTransform for ShortSalesTransform {
    fn name(&self) -> &str {
        "short_sales"
    }

    fn transform(&self, raw: &RawTable) -> Result<OutputTable, TransformError> {
        let z = col(GROUP_Z_SCORE_SHORT_VOLUME_PCT);
        let selected: Vec<Expr> = OUTPUT_COLUMNS.iter().map(|name| col(*name)).collect();

        // Polars orders NaN above every number, so NaN must be excluded explicitly.
        let filtered = self
            .score(raw)?
            .lazy()
            .filter(z.clone().is_not_nan().and(z.gt_eq(lit(Z_SCORE_THRESHOLD))))
            .select(selected)
            .collect()?;

        frame_to_output(&filtered)
    }
}

fn validate_columns(names: &[String]) -> Result<(), TransformError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(TransformError::DataFormat(format!(
                "duplicate column '{name}' after flattening header"
            )));
        }
    }
    if !seen.contains(SECURITY_CODE) {
        return Err(missing_column(SECURITY_CODE));
    }
    for required in REQUIRED_NUMERIC_COLUMNS {
        if !seen.contains(required) {
            return Err(missing_column(required));
        }
    }
    Ok(())
}

fn missing_column(name: &str) -> TransformError {
    TransformError::DataFormat(format!("missing expected column '{name}'"))
}

/// Parse a numeric cell. Empty cells are NaN; anything else must parse.
fn parse_numeric(column: &str, row: usize, value: &str) -> Result<f64, TransformError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(f64::NAN);
    }
    trimmed.parse::<f64>().map_err(|_| {
        TransformError::DataFormat(format!(
            "column '{column}', data row {}: cannot parse '{value}' as a number",
            row + 1
        ))
    })
}

fn frame_to_output(frame: &DataFrame) -> Result<OutputTable, TransformError> {
    let codes = frame.column(SECURITY_CODE)?.str()?;
    let pcts = frame.column(SHORT_VOLUME_PCT)?.f64()?;
    let avgs = frame.column(GROUP_AVG_SHORT_VOLUME_PCT)?.f64()?;
    let stds = frame.column(GROUP_STD_SHORT_VOLUME_PCT)?.f64()?;
    let zs = frame.column(GROUP_Z_SCORE_SHORT_VOLUME_PCT)?.f64()?;

    let records = (0..frame.height())
        .map(|i| ScoredRecord {
            security_code: codes.get(i).unwrap_or_default().to_string(),
            short_volume_pct: pcts.get(i).unwrap_or(f64::NAN),
            group_avg: avgs.get(i).unwrap_or(f64::NAN),
            group_std: stds.get(i).unwrap_or(f64::NAN),
            group_z_score: zs.get(i).unwrap_or(f64::NAN),
        })
        .collect();

    Ok(OutputTable::new(records))
}
