//! The per-date driver loop.
//!
//! EXECUTION ORDER (per run, strictly sequential):
//!   1. Compute the fetch window
//!   2. For each as-of date: fetch → normalize → append
//!      (a failed fetch is logged and skipped; one bad week never aborts the run)
//!   3. dedupe_and_sort the wide file
//!
//! `refresh` (long table + snapshot mirror) and validation are separate
//! passes so each can be re-run on its own.

use crate::{
    calendar::FetchWindow,
    config::SomaConfig,
    error::{SomaError, SomaResult},
    fetch::RemoteFetcher,
    normalize::normalize,
    report::{RunKind, RunReport, WeekOutcome},
    store::{
        snapshot::{select_snapshot_writer, SnapshotWriter},
        RefreshReport, SomaStore,
    },
    types::AsOfDate,
    validate::{check_long_file, check_wide_file, ValidationReport},
};
use chrono::Weekday;

pub struct Pipeline {
    pub config:  SomaConfig,
    pub store:   SomaStore,
    fetcher:     RemoteFetcher,
    anchor:      Weekday,
    snapshot:    Option<Box<dyn SnapshotWriter>>,
}

impl Pipeline {
    pub fn new(config: SomaConfig, fetcher: RemoteFetcher, store: SomaStore) -> SomaResult<Self> {
        config.validate()?;
        let anchor = config.anchor()?;
        let snapshot = select_snapshot_writer(config.snapshot_backend);
        Ok(Self { config, store, fetcher, anchor, snapshot })
    }

    /// Build a fully wired pipeline: real HTTP, store under `data_dir`.
    pub fn build(config: SomaConfig) -> SomaResult<Self> {
        let fetcher = RemoteFetcher::http(&config)?;
        let store = SomaStore::from_config(&config);
        Self::new(config, fetcher, store)
    }

    pub fn fetcher(&self) -> &RemoteFetcher {
        &self.fetcher
    }

    /// Fetch and append every anchor date in `[start, end]`.
    pub fn backfill(&self, start: AsOfDate, end: AsOfDate) -> SomaResult<RunReport> {
        let window = FetchWindow::backfill(start, end, self.anchor);
        let mut report = RunReport::new(RunKind::Backfill, Some(window));
        log::info!("backfill {start} ..= {end} (run {})", report.run_id);
        self.run_window(&window, &mut report)?;
        Ok(report)
    }

    /// Fetch only as-of dates newer than the last stored one, through `today`.
    pub fn update(&self, today: AsOfDate) -> SomaResult<RunReport> {
        let last = self.store.last_stored_date()?.ok_or_else(|| SomaError::EmptyStore {
            path: self.store.wide_path().display().to_string(),
        })?;
        let window = FetchWindow::incremental(last, today, self.anchor);
        if window.is_empty() {
            log::info!("no new weeks to fetch (last stored {last}, today {today})");
            return Ok(RunReport::new(RunKind::Update, None));
        }
        let mut report = RunReport::new(RunKind::Update, Some(window));
        log::info!("update from {last} through {today} (run {})", report.run_id);
        self.run_window(&window, &mut report)?;
        Ok(report)
    }

    fn run_window(&self, window: &FetchWindow, report: &mut RunReport) -> SomaResult<()> {
        for as_of_date in window.dates() {
            log::info!("[fetch] {as_of_date} -> {}", self.fetcher.request_url(as_of_date));
            let payload = match self.fetcher.fetch(as_of_date) {
                Ok(payload) => payload,
                Err(e) => {
                    log::warn!("[skip] {as_of_date}: {e}");
                    report.outcomes.push(WeekOutcome::Skipped { as_of_date, reason: e.to_string() });
                    continue;
                }
            };
            let record = normalize(&payload, as_of_date);
            self.store.append(&record)?;
            report.outcomes.push(WeekOutcome::Appended {
                as_of_date,
                columns: record.fields().len(),
            });
        }

        if self.store.exists() {
            report.dedupe = Some(self.store.dedupe_and_sort()?);
        }
        Ok(())
    }

    /// Regenerate the long table and the snapshot mirror from the wide file.
    pub fn refresh(&self) -> SomaResult<RefreshReport> {
        self.store.refresh_derived(self.snapshot.as_deref())
    }

    /// Validate both stored tables. The long table is optional.
    pub fn validate(&self) -> SomaResult<(ValidationReport, Option<ValidationReport>)> {
        if !self.store.exists() {
            return Err(SomaError::EmptyStore { path: self.store.wide_path().display().to_string() });
        }
        let wide = check_wide_file(self.store.wide_path(), &self.config.tolerance())?;
        wide.log_warnings();
        let long = if self.store.long_path().exists() {
            let report = check_long_file(self.store.long_path())?;
            report.log_warnings();
            Some(report)
        } else {
            None
        };
        Ok((wide, long))
    }
}
