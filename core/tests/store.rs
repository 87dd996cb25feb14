//! Incremental CSV store: append, schema drift, maintenance, long table.

use chrono::NaiveDate;
use soma_core::{
    config::Tolerance,
    error::SomaError,
    frame::Frame,
    store::SomaStore,
    table::WideRecord,
    validate::check_wide_file,
};
use tempfile::TempDir;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn week(date: NaiveDate, mbs: &str, total: &str) -> WideRecord {
    WideRecord::new(date).with("mbs", mbs).with("total", total)
}

fn store() -> (TempDir, SomaStore) {
    let dir = TempDir::new().unwrap();
    let store = SomaStore::open(dir.path().join("data"));
    (dir, store)
}

/// The first append creates the directory and writes one header line.
#[test]
fn first_append_writes_header() {
    let (_dir, store) = store();
    assert!(!store.exists());
    store.append(&week(d(2025, 1, 1), "10", "10")).unwrap();
    store.append(&week(d(2025, 1, 8), "11", "11")).unwrap();

    let text = std::fs::read_to_string(store.wide_path()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["as_of_date,mbs,total", "2025-01-01,10,10", "2025-01-08,11,11"]);
}

/// A record with the same columns in another order reuses the header order.
#[test]
fn same_columns_reuse_header_order() {
    let (_dir, store) = store();
    store.append(&week(d(2025, 1, 1), "10", "10")).unwrap();
    let reordered = WideRecord::new(d(2025, 1, 8)).with("total", "12").with("mbs", "12");
    store.append(&reordered).unwrap();

    let text = std::fs::read_to_string(store.wide_path()).unwrap();
    assert_eq!(text.lines().last(), Some("2025-01-08,12,12"));
    assert_eq!(text.lines().filter(|l| l.starts_with("as_of_date")).count(), 1);
}

/// A new column later on widens the file in place, older rows reading zero.
#[test]
fn schema_drift_widens_single_header() {
    let (_dir, store) = store();
    store.append(&week(d(2025, 1, 1), "10", "10")).unwrap();
    store
        .append(&week(d(2025, 1, 8), "10", "15").with("bills", "5"))
        .unwrap();

    // No maintenance pass yet: the file is already one plain CSV table.
    let frame = Frame::read_csv(store.wide_path()).unwrap();
    assert_eq!(frame.headers, vec!["as_of_date", "mbs", "total", "bills"]);
    assert_eq!(frame.rows[0], vec!["2025-01-01", "10", "10", "0"]);
    assert_eq!(frame.rows[1], vec!["2025-01-08", "10", "15", "5"]);

    let report = check_wide_file(store.wide_path(), &Tolerance::default()).unwrap();
    assert_eq!(report.rows, 2);

    let wide = store.load_wide().unwrap();
    assert_eq!(wide.columns, vec!["mbs", "total", "bills"]);
    assert_eq!(store.dedupe_and_sort().unwrap().header_segments, 1);
}

/// A record missing a known column is appended under the existing header.
#[test]
fn narrower_record_fills_zero() {
    let (_dir, store) = store();
    store.append(&week(d(2025, 1, 1), "10", "10").with("bills", "5")).unwrap();
    store.append(&week(d(2025, 1, 8), "12", "12")).unwrap();

    let text = std::fs::read_to_string(store.wide_path()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec!["as_of_date,mbs,total,bills", "2025-01-01,10,10,5", "2025-01-08,12,12,0"]
    );
}

/// Files holding several header lines are still read and reconciled.
#[test]
fn multi_header_file_is_reconciled() {
    let (_dir, store) = store();
    std::fs::create_dir_all(store.wide_path().parent().unwrap()).unwrap();
    std::fs::write(
        store.wide_path(),
        "as_of_date,mbs,total\n2025-01-01,10,10\nas_of_date,mbs,total,bills\n2025-01-08,10,15,5\n",
    )
    .unwrap();

    let wide = store.load_wide().unwrap();
    assert_eq!(wide.columns, vec!["mbs", "total", "bills"]);
    assert_eq!(wide.rows[0].cells, vec!["10", "10", "0"]);

    let report = store.dedupe_and_sort().unwrap();
    assert_eq!(report.header_segments, 2);
    let frame = Frame::read_csv(store.wide_path()).unwrap();
    assert_eq!(frame.headers, vec!["as_of_date", "mbs", "total", "bills"]);
}

/// A header with no rows keeps its column names through maintenance.
#[test]
fn header_only_file_keeps_columns() {
    let (_dir, store) = store();
    std::fs::create_dir_all(store.wide_path().parent().unwrap()).unwrap();
    std::fs::write(store.wide_path(), "as_of_date,mbs,total\n").unwrap();

    assert_eq!(store.load_wide().unwrap().columns, vec!["mbs", "total"]);
    let report = store.dedupe_and_sort().unwrap();
    assert_eq!(report.rows_written, 0);
    assert_eq!(report.columns, 2);

    let text = std::fs::read_to_string(store.wide_path()).unwrap();
    assert_eq!(text.lines().next(), Some("as_of_date,mbs,total"));
}

/// Dedupe sorts ascending, keeps the first appended row per date, and is idempotent.
#[test]
fn dedupe_sorts_and_is_idempotent() {
    let (_dir, store) = store();
    store.append(&week(d(2025, 1, 15), "3", "3")).unwrap();
    store.append(&week(d(2025, 1, 1), "1", "1")).unwrap();
    store.append(&week(d(2025, 1, 8), "2", "2")).unwrap();
    store.append(&week(d(2025, 1, 8), "99", "99")).unwrap();

    let first = store.dedupe_and_sort().unwrap();
    assert_eq!(first.rows_read, 4);
    assert_eq!(first.duplicates_removed, 1);
    assert_eq!(first.rows_written, 3);
    let after_first = std::fs::read_to_string(store.wide_path()).unwrap();

    let second = store.dedupe_and_sort().unwrap();
    assert_eq!(second.duplicates_removed, 0);
    assert_eq!(second.rows_written, 3);
    assert_eq!(std::fs::read_to_string(store.wide_path()).unwrap(), after_first);

    let wide = store.load_wide().unwrap();
    let dates: Vec<_> = wide.rows.iter().map(|r| r.as_of_date).collect();
    assert_eq!(dates, vec![d(2025, 1, 1), d(2025, 1, 8), d(2025, 1, 15)]);
    assert_eq!(wide.rows[1].cells, vec!["2", "2"]);
}

/// Dedupe on a missing file is a no-op.
#[test]
fn dedupe_missing_file() {
    let (_dir, store) = store();
    let report = store.dedupe_and_sort().unwrap();
    assert_eq!(report.rows_written, 0);
    assert!(!store.exists());
}

/// Last stored date is None until something is stored.
#[test]
fn last_stored_date_tracks_max() {
    let (_dir, store) = store();
    assert_eq!(store.last_stored_date().unwrap(), None);
    store.append(&week(d(2025, 1, 8), "1", "1")).unwrap();
    store.append(&week(d(2025, 1, 1), "1", "1")).unwrap();
    assert_eq!(store.last_stored_date().unwrap(), Some(d(2025, 1, 8)));
}

/// A data row before any header is rejected.
#[test]
fn row_before_header_is_malformed() {
    let (_dir, store) = store();
    std::fs::create_dir_all(store.wide_path().parent().unwrap()).unwrap();
    std::fs::write(store.wide_path(), "2025-01-01,1,1\n").unwrap();
    let err = store.load_wide().unwrap_err();
    assert!(matches!(err, SomaError::MalformedRow { .. }), "got {err:?}");
}

/// Melting gives one row per (date, category), and pivots back to the same table.
#[test]
fn long_table_round_trips() {
    let (_dir, store) = store();
    store.append(&week(d(2025, 1, 1), "10", "10")).unwrap();
    store.append(&week(d(2025, 1, 8), "11.5", "11.5")).unwrap();

    let wide = store.load_wide().unwrap();
    let long = store.to_long().unwrap();
    assert_eq!(long.len(), 4);
    assert_eq!(long.rows[0].category, "mbs");
    assert_eq!(long.rows[1].category, "total");
    assert_eq!(long.rows[3].amount, 11.5);
    assert_eq!(long.to_wide(), wide);
}

/// `refresh_derived` writes the long CSV and no snapshots without a writer.
#[test]
fn refresh_writes_long_csv() {
    let (_dir, store) = store();
    store.append(&week(d(2025, 1, 1), "10", "10")).unwrap();

    let report = store.refresh_derived(None).unwrap();
    assert_eq!(report.wide_rows, 1);
    assert_eq!(report.long_rows, 2);
    assert!(report.snapshots.is_empty());

    let frame = Frame::read_csv(store.long_path()).unwrap();
    assert_eq!(frame.headers, vec!["as_of_date", "category", "amount"]);
    assert_eq!(frame.rows[0], vec!["2025-01-01", "mbs", "10"]);
}

/// Refreshing an empty store is an error, not an empty file.
#[test]
fn refresh_without_wide_file_fails() {
    let (_dir, store) = store();
    let err = store.refresh_derived(None).unwrap_err();
    assert!(matches!(err, SomaError::EmptyStore { .. }));
    assert!(!store.long_path().exists());
}
