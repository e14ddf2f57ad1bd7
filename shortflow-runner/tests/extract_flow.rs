//! Integration tests for the extract flow with canned report sources.
//!
//! Tests:
//! 1. A report is parsed, written locally, and staged under `to_be_processed/`
//! 2. Transient fetch failures are retried; persistent ones end the run
//! 3. A response without a table is a parse-stage error
//! 4. Extract followed by transform produces the expected output

use chrono::NaiveDate;
use shortflow_core::{
    MemoryStore, ObjectStore, OutputTable, RawTable, ReportSource, SourceError, TransformRegistry,
};
use shortflow_runner::{
    run_extract, run_transform_on, PipelineConfig, RunError, Stage, DEFAULT_ENDPOINT,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────

/// Serves a fixed body after failing the first `failures` requests.
struct CannedSource {
    body: String,
    failures: usize,
    calls: AtomicUsize,
}

impl CannedSource {
    fn new(body: impl Into<String>, failures: usize) -> Self {
        Self {
            body: body.into(),
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReportSource for CannedSource {
    fn name(&self) -> &str {
        "canned"
    }

    fn fetch_report(&self, endpoint: &str, date: NaiveDate) -> Result<String, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(SourceError::Status {
                url: format!("http://canned.test/{endpoint}?date={}", date.format("%Y%m%d")),
                status: 503,
            });
        }
        Ok(self.body.clone())
    }
}

/// Report page with a three-row header and a footer, like the live endpoint.
fn report_html(rows: &[(&str, &str)]) -> String {
    let mut html = String::from(
        "<html><body><h1>Report</h1><table>\
         <thead>\
         <tr><th colspan=\"8\">Daily Short Sale Balances</th></tr>\
         <tr><th rowspan=\"2\">Security Code</th><th colspan=\"3\">Margin Short Sales</th>\
         <th colspan=\"3\">SBL Short Sales</th><th rowspan=\"2\">Note</th></tr>\
         <tr><th>Previous Day Balance</th><th>Current Day Balance</th><th>Quota</th>\
         <th>Previous Day Balance</th><th>Current Day Balance</th><th>Quota for the Next Day</th></tr>\
         </thead><tbody>",
    );
    for (code, sbl_current) in rows {
        html.push_str(&format!(
            "<tr><td>{code}</td><td>1,000</td><td>1,000</td><td>50</td>\
             <td>0</td><td>{sbl_current}</td><td>50</td><td>&nbsp;</td></tr>"
        ));
    }
    html.push_str(
        "</tbody><tfoot><tr><td colspan=\"8\">Balances in shares</td></tr></tfoot>\
         </table></body></html>",
    );
    html
}

fn sample_rows() -> Vec<(&'static str, &'static str)> {
    vec![
        ("2301", "0"),
        ("2302", "0"),
        ("2330", "6"),
        ("2303", "0"),
        ("2304", "0"),
        ("2305", "0"),
    ]
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
}

fn config() -> (PipelineConfig, TempDir) {
    let work = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::new("working", "wh", "http://canned.test");
    config.work_dir = work.path().to_path_buf();
    config.retry_backoff_ms = 0;
    (config, work)
}

// ── 1. Happy path ────────────────────────────────────────────────────

#[test]
fn report_is_written_and_staged() {
    let (config, work) = config();
    let store = MemoryStore::new("working");
    let source = CannedSource::new(report_html(&sample_rows()), 0);

    let outcome = run_extract(&config, &store, &source, DEFAULT_ENDPOINT, date()).unwrap();

    assert_eq!(outcome.local_path, work.path().join("20240307.csv"));
    assert_eq!(outcome.key.as_deref(), Some("wh/to_be_processed/20240307.csv"));
    assert_eq!(outcome.rows, 2 + 6 + 1);

    let staged = store.get("wh/to_be_processed/20240307.csv").unwrap();
    assert_eq!(staged, std::fs::read(&outcome.local_path).unwrap());

    let raw = RawTable::from_reader(staged.as_slice()).unwrap();
    assert_eq!(raw.width(), 8);
    assert_eq!(raw.rows()[0][0], "Security Code");
    assert_eq!(raw.rows()[1][6], "Quota for the Next Day");
    assert_eq!(raw.rows()[1][7], "Note");
    assert_eq!(raw.rows()[2][1], "1000");
    assert_eq!(raw.rows()[2][7], "");
}

// ── 2. Retry ─────────────────────────────────────────────────────────

#[test]
fn transient_fetch_failures_are_retried() {
    let (config, _work) = config();
    let store = MemoryStore::new("working");
    let source = CannedSource::new(report_html(&sample_rows()), 2);

    let outcome = run_extract(&config, &store, &source, DEFAULT_ENDPOINT, date()).unwrap();
    assert_eq!(source.calls(), 3);
    assert!(outcome.key.is_some());
}

#[test]
fn persistent_fetch_failure_ends_run_after_retry_limit() {
    let (config, _work) = config();
    let store = MemoryStore::new("working");
    let source = CannedSource::new("", usize::MAX);

    let err = run_extract(&config, &store, &source, DEFAULT_ENDPOINT, date()).unwrap_err();
    assert_eq!(source.calls(), 3);
    assert_eq!(err.stage(), Some(Stage::Fetch));
    assert!(err.to_string().contains("503"), "{err}");
    assert!(store.keys().is_empty());
}

// ── 3. Parse failures ────────────────────────────────────────────────

#[test]
fn response_without_table_is_parse_error() {
    let (config, _work) = config();
    let store = MemoryStore::new("working");
    let source = CannedSource::new("<html><body>No data for this date</body></html>", 0);

    let err = run_extract(&config, &store, &source, DEFAULT_ENDPOINT, date()).unwrap_err();
    assert!(matches!(
        err,
        RunError::Source {
            stage: Stage::Parse,
            source: SourceError::NoTable
        }
    ));
    assert_eq!(source.calls(), 1);
}

// ── 4. Both stages ───────────────────────────────────────────────────

#[test]
fn extract_then_transform_reports_outlier() {
    let (config, _work) = config();
    let store = MemoryStore::new("working");
    let source = CannedSource::new(report_html(&sample_rows()), 0);

    run_extract(&config, &store, &source, DEFAULT_ENDPOINT, date()).unwrap();
    let summary =
        run_transform_on(&config, &store, &TransformRegistry::with_defaults(), date()).unwrap();

    assert!(!summary.has_failures());
    let output = OutputTable::from_reader(store.get("wh/output/20240307.csv").unwrap().as_slice())
        .unwrap();
    assert_eq!(output.security_codes(), vec!["2330"]);
    assert!(store.contains("wh/archive/2024/03/07/20240307.csv"));
}
