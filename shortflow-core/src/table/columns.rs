//! Column names and the two-level header flattening rule.

/// Top-level header category for margin short sales.
pub const MARGIN_CATEGORY: &str = "Margin Short Sales";
/// Top-level header category for securities-borrowing short sales.
pub const SBL_CATEGORY: &str = "SBL Short Sales";

pub const SECURITY_CODE: &str = "Security Code";
pub const NOTE: &str = "Note";

pub const MARGIN_PREVIOUS_BALANCE: &str = "Margin_Previous Day Balance";
pub const MARGIN_CURRENT_BALANCE: &str = "Margin_Current Day Balance";
pub const MARGIN_QUOTA: &str = "Margin_Quota";
pub const SBL_PREVIOUS_BALANCE: &str = "SBL_Previous Day Balance";
pub const SBL_CURRENT_BALANCE: &str = "SBL_Current Day Balance";
pub const SBL_NEXT_DAY_QUOTA: &str = "SBL_Quota for the Next Day";

pub const GROUP: &str = "Group";
pub const SHORT_VOLUME_PCT: &str = "Short Volume Pct";
pub const GROUP_AVG_SHORT_VOLUME_PCT: &str = "Group Avg Short Volume Pct";
pub const GROUP_STD_SHORT_VOLUME_PCT: &str = "Group Std Short Volume Pct";
pub const GROUP_Z_SCORE_SHORT_VOLUME_PCT: &str = "Group Z score Short Volume Pct";

/// Columns kept as text; every other raw column is numeric.
pub const TEXT_COLUMNS: [&str; 2] = [SECURITY_CODE, NOTE];

/// Numeric inputs to the short volume percentage.
pub const REQUIRED_NUMERIC_COLUMNS: [&str; 6] = [
    SBL_CURRENT_BALANCE,
    SBL_PREVIOUS_BALANCE,
    MARGIN_CURRENT_BALANCE,
    MARGIN_PREVIOUS_BALANCE,
    MARGIN_QUOTA,
    SBL_NEXT_DAY_QUOTA,
];

/// Output table columns, in order.
pub const OUTPUT_COLUMNS: [&str; 5] = [
    SECURITY_CODE,
    SHORT_VOLUME_PCT,
    GROUP_AVG_SHORT_VOLUME_PCT,
    GROUP_STD_SHORT_VOLUME_PCT,
    GROUP_Z_SCORE_SHORT_VOLUME_PCT,
];

/// A two-level column label: (category, metric).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnKey<'a> {
    pub category: &'a str,
    pub metric: &'a str,
}

impl<'a> ColumnKey<'a> {
    pub fn new(category: &'a str, metric: &'a str) -> Self {
        Self { category, metric }
    }

    /// Flat column name: `Margin_<metric>`, `SBL_<metric>`, or `<metric>` for any
    /// other category.
    pub fn flatten(&self) -> String {
        match self.category {
            MARGIN_CATEGORY => format!("Margin_{}", self.metric),
            SBL_CATEGORY => format!("SBL_{}", self.metric),
            _ => self.metric.to_string(),
        }
    }
}

/// Flatten parallel category/metric header rows into one name per column.
///
/// A missing cell on either row is treated as empty.
pub fn flatten_header(categories: &[String], metrics: &[String]) -> Vec<String> {
    let width = categories.len().max(metrics.len());
    (0..width)
        .map(|i| {
            let category = categories.get(i).map(String::as_str).unwrap_or("");
            let metric = metrics.get(i).map(String::as_str).unwrap_or("");
            ColumnKey::new(category, metric).flatten()
        })
        .collect()
}
