//! Shared primitive types and column names used across the pipeline.

use chrono::NaiveDate;

/// The calendar date a holdings snapshot represents.
pub type AsOfDate = NaiveDate;

/// A stable identifier for one pipeline run.
pub type RunId = String;

/// Key column of every stored table.
pub const AS_OF_DATE: &str = "as_of_date";

/// Aggregate column of the wide table, and reserved category of the long table.
pub const TOTAL: &str = "total";

/// Long table columns.
pub const CATEGORY: &str = "category";
pub const AMOUNT: &str = "amount";

/// ISO-8601 calendar date, the only date format written to disk.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a stored or fetched date cell.
///
/// Accepts a bare ISO date, and also a timestamp whose first ten
/// characters are an ISO date (some exports append `T00:00:00`).
pub fn parse_date(raw: &str) -> Option<AsOfDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .or_else(|| raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok()))
}

/// Render a date the way it is stored.
pub fn format_date(date: AsOfDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// A raw cell after numeric coercion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue {
    Number(f64),
    /// Empty cell. Coerces to zero.
    Absent,
    /// Present but not a finite number.
    Invalid,
}

impl CellValue {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return CellValue::Absent;
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => CellValue::Number(v),
            _ => CellValue::Invalid,
        }
    }

    /// Numeric value with absent cells read as zero.
    pub fn or_zero(self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(v),
            CellValue::Absent    => Some(0.0),
            CellValue::Invalid   => None,
        }
    }
}
