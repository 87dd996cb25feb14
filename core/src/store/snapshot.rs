//! Columnar snapshot mirror.
//!
//! The wide and long tables are mirrored wholesale into a typed snapshot
//! for downstream readers. Which engine writes it is decided once, at
//! configuration time, from the backends compiled into this build. A
//! missing backend skips the mirror with a warning; it never fails a run.

use crate::{
    error::SomaResult,
    table::{LongTable, WideTable},
    types::{AsOfDate, AMOUNT, AS_OF_DATE, CATEGORY},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotColumn {
    Date(Vec<AsOfDate>),
    Text(Vec<String>),
    Number(Vec<f64>),
}

impl SnapshotColumn {
    pub fn len(&self) -> usize {
        match self {
            SnapshotColumn::Date(v)   => v.len(),
            SnapshotColumn::Text(v)   => v.len(),
            SnapshotColumn::Number(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A fully typed table, ready for a columnar engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotTable {
    /// Table name inside engines that hold several (SQLite).
    pub name:    &'static str,
    pub columns: Vec<(String, SnapshotColumn)>,
}

impl SnapshotTable {
    pub fn from_wide(wide: &WideTable) -> SomaResult<Self> {
        let mut columns = Vec::with_capacity(wide.columns.len() + 1);
        columns.push((
            AS_OF_DATE.to_string(),
            SnapshotColumn::Date(wide.rows.iter().map(|r| r.as_of_date).collect()),
        ));
        for (j, name) in wide.columns.iter().enumerate() {
            let values = (0..wide.len())
                .map(|i| wide.amount(i, j))
                .collect::<SomaResult<Vec<f64>>>()?;
            columns.push((name.clone(), SnapshotColumn::Number(values)));
        }
        Ok(Self { name: "wide", columns })
    }

    pub fn from_long(long: &LongTable) -> Self {
        let columns = vec![
            (
                AS_OF_DATE.to_string(),
                SnapshotColumn::Date(long.rows.iter().map(|r| r.as_of_date).collect()),
            ),
            (
                CATEGORY.to_string(),
                SnapshotColumn::Text(long.rows.iter().map(|r| r.category.clone()).collect()),
            ),
            (
                AMOUNT.to_string(),
                SnapshotColumn::Number(long.rows.iter().map(|r| r.amount).collect()),
            ),
        ];
        Self { name: "long", columns }
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }
}

/// An engine able to write a `SnapshotTable` to one file.
pub trait SnapshotWriter {
    fn name(&self) -> &'static str;

    /// File extension, without the dot.
    fn extension(&self) -> &'static str;

    /// Replace whatever is at `path` with `table`.
    fn write(&self, table: &SnapshotTable, path: &Path) -> SomaResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotBackend {
    /// Parquet if compiled in, else SQLite, else none.
    #[default]
    Auto,
    Parquet,
    Sqlite,
    Disabled,
}

/// Backends compiled into this build, in `Auto` preference order.
pub fn available_backends() -> Vec<SnapshotBackend> {
    let mut out = Vec::new();
    if cfg!(feature = "parquet") {
        out.push(SnapshotBackend::Parquet);
    }
    if cfg!(feature = "sqlite") {
        out.push(SnapshotBackend::Sqlite);
    }
    out
}

/// Pick the snapshot engine for `backend`, or `None` (with a warning)
/// when it is not available in this build.
pub fn select_snapshot_writer(backend: SnapshotBackend) -> Option<Box<dyn SnapshotWriter>> {
    let chosen = match backend {
        SnapshotBackend::Disabled => return None,
        SnapshotBackend::Auto => match available_backends().first() {
            Some(b) => *b,
            None => {
                log::warn!("no snapshot backend compiled in (features: parquet, sqlite); skipping snapshots");
                return None;
            }
        },
        other => other,
    };
    let writer = build_writer(chosen);
    if writer.is_none() {
        log::warn!("snapshot backend {chosen:?} not compiled into this build; skipping snapshots");
    }
    writer
}

fn build_writer(backend: SnapshotBackend) -> Option<Box<dyn SnapshotWriter>> {
    match backend {
        #[cfg(feature = "parquet")]
        SnapshotBackend::Parquet => Some(Box::new(super::parquet_mirror::ParquetSnapshotWriter)),
        #[cfg(feature = "sqlite")]
        SnapshotBackend::Sqlite => Some(Box::new(super::sqlite_mirror::SqliteSnapshotWriter)),
        _ => None,
    }
}
