//! Incremental CSV store.
//!
//! RULE: only the store touches files under `data_dir`.
//!
//! The wide file always has a single header. Rows are appended in place
//! while the payload's columns fit that header; a payload with new columns
//! rewrites the file (temp file + rename) with the union of columns, older
//! cells filled with zero. The reader still accepts files with several
//! header lines and reconciles them the same way, and `dedupe_and_sort`
//! rewrites the file sorted and unique.

pub mod snapshot;
#[cfg(feature = "parquet")]
mod parquet_mirror;
#[cfg(feature = "sqlite")]
mod sqlite_mirror;

#[cfg(feature = "parquet")]
pub use parquet_mirror::ParquetSnapshotWriter;
#[cfg(feature = "sqlite")]
pub use sqlite_mirror::SqliteSnapshotWriter;

use crate::{
    config::SomaConfig,
    error::{SomaError, SomaResult},
    frame::Frame,
    table::{LongTable, WideRecord, WideTable, FILL_VALUE},
    types::{format_date, parse_date, AsOfDate, AS_OF_DATE},
};
use serde::Serialize;
use snapshot::{SnapshotTable, SnapshotWriter};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

pub const WIDE_FILE: &str = "soma_summary_weekly.csv";
pub const LONG_FILE: &str = "soma_summary_long.csv";

/// Outcome of one maintenance pass over the wide file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupeReport {
    pub rows_read:          usize,
    pub duplicates_removed: usize,
    pub rows_written:       usize,
    pub columns:            usize,
    /// Header lines found before the rewrite. More than one means schema drift.
    pub header_segments:    usize,
}

/// What `refresh_derived` produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub wide_rows: usize,
    pub long_rows: usize,
    pub snapshots: Vec<PathBuf>,
}

pub struct SomaStore {
    wide_path: PathBuf,
    long_path: PathBuf,
}

impl SomaStore {
    /// Store rooted at `data_dir`. Nothing is created until the first write.
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self {
            wide_path: dir.join(WIDE_FILE),
            long_path: dir.join(LONG_FILE),
        }
    }

    pub fn from_config(config: &SomaConfig) -> Self {
        Self::open(&config.data_dir)
    }

    pub fn wide_path(&self) -> &Path {
        &self.wide_path
    }

    pub fn long_path(&self) -> &Path {
        &self.long_path
    }

    pub fn exists(&self) -> bool {
        self.wide_path.exists()
    }

    // ── Append ────────────────────────────────────────────────────

    /// Append one record as a new row. No duplicate check.
    ///
    /// Columns the header already has are written in header order, with
    /// `FILL_VALUE` for any the record lacks. A record bringing new columns
    /// widens the whole file to the union under a single header.
    pub fn append(&self, record: &WideRecord) -> SomaResult<()> {
        let scan = if self.wide_path.exists() {
            self.scan()?
        } else {
            ensure_parent(&self.wide_path)?;
            WideScan::default()
        };

        match scan.latest {
            Some(header) if record.columns().all(|c| header.iter().any(|h| h == c)) => {
                let mut row = vec![format_date(record.as_of_date)];
                row.extend(header.iter().map(|c| record.get(c).unwrap_or(FILL_VALUE).to_string()));
                self.append_lines(&[row])?;
            }
            Some(_) => {
                log::info!(
                    "{}: new columns at {}; widening the header",
                    self.wide_path.display(),
                    record.as_of_date
                );
                let mut table = scan.table;
                table.push_record(record);
                write_frame(&self.wide_path, &table.to_frame())?;
            }
            None => {
                let mut header = vec![AS_OF_DATE.to_string()];
                header.extend(record.columns().map(str::to_string));
                let mut row = vec![format_date(record.as_of_date)];
                row.extend(record.fields().iter().map(|(_, v)| v.clone()));
                self.append_lines(&[header, row])?;
            }
        }
        log::debug!("appended {} to {}", record.as_of_date, self.wide_path.display());
        Ok(())
    }

    fn append_lines(&self, lines: &[Vec<String>]) -> SomaResult<()> {
        let file = OpenOptions::new().create(true).append(true).open(&self.wide_path)?;
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);
        for line in lines {
            writer.write_record(line)?;
        }
        writer.flush()?;
        Ok(())
    }

    // ── Load ──────────────────────────────────────────────────────

    /// Every stored row, all header segments reconciled. Empty if missing.
    pub fn load_wide(&self) -> SomaResult<WideTable> {
        if !self.wide_path.exists() {
            return Ok(WideTable::new());
        }
        Ok(self.scan()?.table)
    }

    /// Walk the wide file. Files written by other tools may hold several
    /// header lines; every header's columns are kept, even with no rows.
    fn scan(&self) -> SomaResult<WideScan> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.wide_path)?;
        let mut scan = WideScan::default();

        for result in reader.records() {
            let rec = result?;
            let line = rec.position().map(|p| p.line()).unwrap_or(0);
            let malformed = |reason: String| SomaError::MalformedRow {
                path: self.wide_path.display().to_string(),
                line,
                reason,
            };

            let first = rec.get(0).unwrap_or("").trim();
            if first == AS_OF_DATE {
                let header: Vec<String> = rec.iter().skip(1).map(|c| c.trim().to_string()).collect();
                scan.table.add_columns(header.iter().map(String::as_str));
                scan.latest = Some(header);
                scan.segments += 1;
                continue;
            }
            let columns = scan
                .latest
                .as_ref()
                .ok_or_else(|| malformed("data row before any header".into()))?;
            if rec.len() > columns.len() + 1 {
                return Err(malformed(format!(
                    "{} cells for {} columns",
                    rec.len(),
                    columns.len() + 1
                )));
            }
            let date = parse_date(first)
                .ok_or_else(|| malformed(format!("unparseable as_of_date {first:?}")))?;

            let mut record = WideRecord::new(date);
            for (name, value) in columns.iter().zip(rec.iter().skip(1)) {
                record.set(name.clone(), value);
            }
            scan.table.push_record(&record);
        }
        Ok(scan)
    }

    // ── Maintenance ───────────────────────────────────────────────

    /// Sort ascending by date, drop duplicate dates (first appended wins),
    /// reconcile header segments, rewrite. Idempotent.
    pub fn dedupe_and_sort(&self) -> SomaResult<DedupeReport> {
        if !self.wide_path.exists() {
            return Ok(DedupeReport::default());
        }
        let WideScan { mut table, segments, .. } = self.scan()?;
        let rows_read = table.len();
        let duplicates_removed = table.sort_and_dedupe();
        write_frame(&self.wide_path, &table.to_frame())?;

        let report = DedupeReport {
            rows_read,
            duplicates_removed,
            rows_written: table.len(),
            columns: table.columns.len(),
            header_segments: segments,
        };
        log::info!(
            "{}: {} rows, {} duplicates removed, {} header segment(s) reconciled",
            self.wide_path.display(),
            report.rows_written,
            report.duplicates_removed,
            report.header_segments
        );
        Ok(report)
    }

    /// Newest stored as-of date, or `None` for a missing or empty file.
    pub fn last_stored_date(&self) -> SomaResult<Option<AsOfDate>> {
        Ok(self.load_wide()?.last_date())
    }

    // ── Derived tables ────────────────────────────────────────────

    pub fn to_long(&self) -> SomaResult<LongTable> {
        self.load_wide()?.to_long()
    }

    /// Rewrite the long file wholesale.
    pub fn write_long(&self, table: &LongTable) -> SomaResult<()> {
        write_frame(&self.long_path, &table.to_frame())
    }

    /// Regenerate the long CSV from the wide file and mirror both tables
    /// through `writer`, when one is available.
    pub fn refresh_derived(&self, writer: Option<&dyn SnapshotWriter>) -> SomaResult<RefreshReport> {
        if !self.wide_path.exists() {
            return Err(SomaError::EmptyStore { path: self.wide_path.display().to_string() });
        }
        let wide = self.load_wide()?;
        let long = wide.to_long()?;
        self.write_long(&long)?;
        log::info!("{}: {} long rows written", self.long_path.display(), long.len());

        let mut snapshots = Vec::new();
        if let Some(writer) = writer {
            let targets = [
                (SnapshotTable::from_wide(&wide)?, &self.wide_path),
                (SnapshotTable::from_long(&long), &self.long_path),
            ];
            for (table, csv_path) in targets {
                let path = csv_path.with_extension(writer.extension());
                writer.write(&table, &path)?;
                log::info!("{} snapshot refreshed: {}", writer.name(), path.display());
                snapshots.push(path);
            }
        }
        Ok(RefreshReport { wide_rows: wide.len(), long_rows: long.len(), snapshots })
    }
}

/// One pass over the wide file.
#[derive(Default)]
struct WideScan {
    table:    WideTable,
    /// Columns of the last header line, without `as_of_date`.
    latest:   Option<Vec<String>>,
    segments: usize,
}

fn ensure_parent(path: &Path) -> SomaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write a whole CSV file through a sibling temp file and a rename, so an
/// interrupted rewrite never leaves a half-written table behind.
fn write_frame(path: &Path, frame: &Frame) -> SomaResult<()> {
    ensure_parent(path)?;
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp)?;
        writer.write_record(&frame.headers)?;
        for row in &frame.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
