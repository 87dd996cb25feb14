//! End-to-end runs against a fake feed: backfill, skip-and-continue, update, validate.

use chrono::NaiveDate;
use soma_core::{
    config::SomaConfig,
    error::{FetchResult, SomaError},
    fetch::{HttpResponse, RemoteFetcher, Sleeper, Transport},
    pipeline::Pipeline,
    report::WeekOutcome,
    store::SomaStore,
};
use std::time::Duration;
use tempfile::TempDir;

/// Answers every request with a one-row summary for the requested date,
/// except dates listed in `failing`, which always get a 500.
struct FakeFeed {
    failing: Vec<&'static str>,
}

impl Transport for FakeFeed {
    fn get(&self, url: &str) -> FetchResult<HttpResponse> {
        let start = url.find("startDt=").expect("startDt in url") + "startDt=".len();
        let date = &url[start..start + 10];
        if self.failing.contains(&date) {
            return Ok(HttpResponse { status: 500, body: Vec::new() });
        }
        let body = format!("As Of Date,Mbs,Notes Bonds,Total\n{date},2000,4000,6000\n");
        Ok(HttpResponse { status: 200, body: body.into_bytes() })
    }
}

struct NoSleep;

impl Sleeper for NoSleep {
    fn sleep(&self, _: Duration) {}
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn pipeline(dir: &TempDir, failing: Vec<&'static str>) -> Pipeline {
    let config = SomaConfig { data_dir: dir.path().to_path_buf(), ..SomaConfig::default_test() };
    let fetcher = RemoteFetcher::new(&config, Box::new(FakeFeed { failing }), Box::new(NoSleep));
    let store = SomaStore::from_config(&config);
    Pipeline::new(config, fetcher, store).unwrap()
}

/// Backfill appends every anchor date in range and leaves the file sorted.
#[test]
fn backfill_appends_every_week() {
    let dir = TempDir::new().unwrap();
    let p = pipeline(&dir, vec![]);

    let report = p.backfill(d(2025, 1, 1), d(2025, 1, 22)).unwrap();
    assert_eq!(
        report.appended(),
        vec![d(2025, 1, 1), d(2025, 1, 8), d(2025, 1, 15), d(2025, 1, 22)]
    );
    assert!(report.skipped().is_empty());
    assert_eq!(report.dedupe.unwrap().rows_written, 4);

    let wide = p.store.load_wide().unwrap();
    assert_eq!(wide.columns, vec!["mbs", "notes_bonds", "total"]);
    assert_eq!(wide.len(), 4);
}

/// One week failing every attempt is skipped; the rest of the run continues.
#[test]
fn failed_week_is_skipped() {
    let dir = TempDir::new().unwrap();
    let p = pipeline(&dir, vec!["2025-01-08"]);

    let report = p.backfill(d(2025, 1, 1), d(2025, 1, 15)).unwrap();
    assert_eq!(report.appended(), vec![d(2025, 1, 1), d(2025, 1, 15)]);
    assert_eq!(report.skipped(), vec![d(2025, 1, 8)]);
    match &report.outcomes[1] {
        WeekOutcome::Skipped { reason, .. } => assert!(reason.contains("500"), "{reason}"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(p.store.load_wide().unwrap().len(), 2);
}

/// Re-running the same backfill does not duplicate rows.
#[test]
fn repeated_backfill_is_deduplicated() {
    let dir = TempDir::new().unwrap();
    let p = pipeline(&dir, vec![]);
    p.backfill(d(2025, 1, 1), d(2025, 1, 8)).unwrap();
    let report = p.backfill(d(2025, 1, 1), d(2025, 1, 8)).unwrap();

    let dedupe = report.dedupe.unwrap();
    assert_eq!(dedupe.duplicates_removed, 2);
    assert_eq!(dedupe.rows_written, 2);
}

/// Update fetches only weeks after the last stored date.
#[test]
fn update_fetches_only_new_weeks() {
    let dir = TempDir::new().unwrap();
    let p = pipeline(&dir, vec![]);
    p.backfill(d(2025, 1, 1), d(2025, 1, 15)).unwrap();

    let report = p.update(d(2025, 1, 31)).unwrap();
    assert_eq!(report.appended(), vec![d(2025, 1, 22), d(2025, 1, 29)]);
    assert_eq!(p.store.last_stored_date().unwrap(), Some(d(2025, 1, 29)));
}

/// Update with nothing new returns an empty report without a window.
#[test]
fn update_with_nothing_new() {
    let dir = TempDir::new().unwrap();
    let p = pipeline(&dir, vec![]);
    p.backfill(d(2025, 1, 1), d(2025, 1, 8)).unwrap();

    let report = p.update(d(2025, 1, 14)).unwrap();
    assert!(report.window.is_none());
    assert!(report.outcomes.is_empty());
}

/// Update needs an existing store.
#[test]
fn update_on_empty_store_fails() {
    let dir = TempDir::new().unwrap();
    let p = pipeline(&dir, vec![]);
    assert!(matches!(p.update(d(2025, 1, 31)).unwrap_err(), SomaError::EmptyStore { .. }));
}

/// Refresh then validate: both tables check out, with no snapshot mirror in tests.
#[test]
fn refresh_and_validate() {
    let dir = TempDir::new().unwrap();
    let p = pipeline(&dir, vec![]);
    assert!(matches!(p.validate().unwrap_err(), SomaError::EmptyStore { .. }));

    p.backfill(d(2025, 1, 1), d(2025, 1, 15)).unwrap();
    let refresh = p.refresh().unwrap();
    assert_eq!(refresh.wide_rows, 3);
    assert_eq!(refresh.long_rows, 9);
    assert!(refresh.snapshots.is_empty());

    let (wide, long) = p.validate().unwrap();
    assert!(wide.is_clean(), "{:?}", wide.warnings);
    let long = long.expect("long table validated");
    assert_eq!(long.categories, Some(3));
    assert_eq!(long.rows, 9);
}
