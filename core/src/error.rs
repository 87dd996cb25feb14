use crate::types::AsOfDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SomaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[cfg(feature = "parquet")]
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[cfg(feature = "parquet")]
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Store {path} has no as_of_date values. Run a backfill first.")]
    EmptyStore { path: String },

    #[error("Malformed row {line} in {path}: {reason}")]
    MalformedRow { path: String, line: u64, reason: String },

    #[error("'{column}' column not found. Columns: {found:?}")]
    MissingColumn { column: String, found: Vec<String> },

    #[error("Non-numeric value {value:?} in column '{column}' at {as_of_date}")]
    NonNumeric { as_of_date: AsOfDate, column: String, value: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SomaResult<T> = Result<T, SomaError>;

/// One failed attempt to retrieve a weekly payload.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Empty response body from {url}")]
    EmptyBody { url: String },

    #[error("Empty CSV (no rows) from {url}")]
    EmptyTable { url: String },

    #[error("Unparseable CSV from {url}: {reason}")]
    Parse { url: String, reason: String },
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Which stored table a validation finding refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Wide,
    Long,
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableKind::Wide => f.write_str("wide"),
            TableKind::Long => f.write_str("long"),
        }
    }
}

/// A hard validation failure. Downstream consumption must stop.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("{table}: missing required columns {missing:?}. Got: {found:?}")]
    MissingColumns {
        table: TableKind,
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("{table}: unparseable as_of_date {value:?} at data row {row}")]
    InvalidDate { table: TableKind, row: usize, value: String },

    #[error("{table}: dates not sorted ascending ({previous} followed by {next} at data row {row})")]
    Unsorted {
        table: TableKind,
        row: usize,
        previous: AsOfDate,
        next: AsOfDate,
    },

    #[error("{table}: non-numeric values after coercion: {counts:?}")]
    NonNumeric {
        table: TableKind,
        /// (column, offending cell count)
        counts: Vec<(String, usize)>,
    },

    #[error("{table}: 'total' has negatives at: {}", format_dated(.rows))]
    NegativeTotal {
        table: TableKind,
        rows: Vec<(AsOfDate, f64)>,
    },
}

fn format_dated(rows: &[(AsOfDate, f64)]) -> String {
    rows.iter()
        .map(|(d, v)| format!("{d} ({v})"))
        .collect::<Vec<_>>()
        .join(", ")
}
