//! Property tests for scoring and storage invariants.
//!
//! Uses proptest to verify:
//! 1. Deviations from the group mean sum to zero within every group
//! 2. Every reported row has z-score ≥ 2 and came from the input, in input order
//! 3. A full sweep leaves only the placeholder under the source prefix

use proptest::prelude::*;
use shortflow_core::table::columns::{GROUP, GROUP_AVG_SHORT_VOLUME_PCT, SHORT_VOLUME_PCT};
use shortflow_core::{
    MemoryStore, ObjectStore, RawTable, RetryPolicy, ShortSalesTransform, TableTransform,
    ZoneMover,
};
use std::collections::HashMap;

// ── Strategies (proptest) ────────────────────────────────────────────

/// (security code, SBL balance change) pairs. Quotas are fixed at 50 + 50.
fn arb_rows() -> impl Strategy<Value = Vec<(String, i32)>> {
    prop::collection::vec(("[1-4][0-9]{3}", -500..500_i32), 1..40)
}

fn arb_object_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z]{1,8}\\.csv", 0..12)
        .prop_map(|names| names.into_iter().collect())
}

fn line(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

fn build_raw(rows: &[(String, i32)]) -> RawTable {
    let mut grid: Vec<Vec<String>> = Vec::new();
    grid.push(line(&["title"; 8]));
    grid.push(line(&[
        "Security Code",
        "Margin Short Sales",
        "Margin Short Sales",
        "Margin Short Sales",
        "SBL Short Sales",
        "SBL Short Sales",
        "SBL Short Sales",
        "Note",
    ]));
    grid.push(line(&[
        "Security Code",
        "Previous Day Balance",
        "Current Day Balance",
        "Quota",
        "Previous Day Balance",
        "Current Day Balance",
        "Quota for the Next Day",
        "Note",
    ]));
    for (code, change) in rows {
        let change = change.to_string();
        grid.push(line(&[code.as_str(), "0", "0", "50", "0", change.as_str(), "50", ""]));
    }
    grid.push(line(&["footer"]));
    RawTable::from_grid(grid).unwrap()
}

// ── 1-2. Scoring ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn group_deviations_sum_to_zero(rows in arb_rows()) {
        let scored = ShortSalesTransform.score(&build_raw(&rows)).unwrap();
        let groups = scored.column(GROUP).unwrap().str().unwrap();
        let pcts = scored.column(SHORT_VOLUME_PCT).unwrap().f64().unwrap();
        let means = scored.column(GROUP_AVG_SHORT_VOLUME_PCT).unwrap().f64().unwrap();

        let mut sums: HashMap<String, f64> = HashMap::new();
        for i in 0..scored.height() {
            let group = groups.get(i).unwrap().to_string();
            *sums.entry(group).or_default() += pcts.get(i).unwrap() - means.get(i).unwrap();
        }
        for (group, sum) in sums {
            prop_assert!(sum.abs() < 1e-6, "group {} deviations sum to {}", group, sum);
        }
    }

    #[test]
    fn reported_rows_clear_threshold_in_input_order(rows in arb_rows()) {
        let out = ShortSalesTransform.transform(&build_raw(&rows)).unwrap();

        let mut cursor = 0;
        for record in &out.records {
            prop_assert!(record.group_z_score >= 2.0);
            let found = rows[cursor..].iter().position(|(code, _)| *code == record.security_code);
            prop_assert!(found.is_some(), "{} not found in order", record.security_code);
            cursor += found.unwrap_or_default() + 1;
        }
    }
}

// ── 3. Sweeps ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn sweep_empties_source_prefix(names in arb_object_names()) {
        let store = MemoryStore::new("bucket");
        for name in &names {
            store.put(&format!("wh/processing/{name}"), name.as_bytes()).unwrap();
        }

        let report = ZoneMover::new(&store, RetryPolicy::no_retry())
            .move_objects("wh/processing/", "wh/archive/2024/01/02/", false)
            .unwrap();

        prop_assert_eq!(report.moved_count(), names.len());
        prop_assert_eq!(store.list("wh/processing/").unwrap(), vec!["wh/processing/".to_string()]);
        for name in &names {
            let body = store.get(&format!("wh/archive/2024/01/02/{name}")).unwrap();
            prop_assert_eq!(body, name.as_bytes().to_vec());
        }
    }
}
