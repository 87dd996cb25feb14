//! Sanity checks over the stored wide and long tables.
//!
//! Hard failures (missing columns, bad dates, non-numeric cells, a
//! negative total) return `ValidationError` and must stop downstream use.
//! Soft findings (negative components, components not adding up to the
//! total) come back as warnings; they are normal for this source.
//!
//! Checks run on raw `Frame`s so that a bad cell is reported, not lost.

use crate::{
    config::Tolerance,
    error::{SomaResult, TableKind, ValidationError},
    frame::Frame,
    types::{parse_date, AsOfDate, CellValue, AMOUNT, AS_OF_DATE, CATEGORY, TOTAL},
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationWarning {
    /// A component column holds negative values.
    NegativeComponent { column: String, count: usize, min: f64 },
    /// Sum of components differs from `total` beyond tolerance.
    ReconciliationMismatch {
        dates:      Vec<AsOfDate>,
        worst_diff: f64,
        tolerance:  Tolerance,
    },
    /// Empty cells read as zero.
    AbsentCells { column: String, count: usize },
    /// Same as-of date stored more than once.
    DuplicateDates { count: usize },
    /// A non-total long category holds negative amounts.
    NegativeCategory { category: String, count: usize, min: f64 },
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationWarning::NegativeComponent { column, count, min } => {
                write!(f, "negative component amounts in '{column}': {count} rows (min={min})")
            }
            ValidationWarning::ReconciliationMismatch { dates, worst_diff, tolerance } => write!(
                f,
                "component sum != total within tolerances (atol={}, rtol={}). Off rows: {}, worst |diff|={worst_diff}",
                tolerance.absolute,
                tolerance.relative,
                dates.len()
            ),
            ValidationWarning::AbsentCells { column, count } => {
                write!(f, "{count} empty cells in '{column}' read as zero")
            }
            ValidationWarning::DuplicateDates { count } => {
                write!(f, "{count} duplicate as_of_date rows")
            }
            ValidationWarning::NegativeCategory { category, count, min } => {
                write!(f, "negative amounts in category '{category}': {count} rows (min={min})")
            }
        }
    }
}

/// Result of a check that found no hard failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub table:    TableKind,
    pub rows:     usize,
    pub columns:  Vec<String>,
    /// Distinct categories (long table only).
    pub categories: Option<usize>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn log_warnings(&self) {
        for w in &self.warnings {
            log::warn!("[{}] {w}", self.table);
        }
    }
}

// ── Shared steps ───────────────────────────────────────────────────

fn require_columns(frame: &Frame, table: TableKind, required: &[&str]) -> Result<(), ValidationError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|c| frame.column_index(c).is_none())
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingColumns { table, missing, found: frame.headers.clone() })
    }
}

/// Parse the date column and require it to be non-decreasing.
fn sorted_dates(frame: &Frame, table: TableKind, col: usize) -> Result<Vec<AsOfDate>, ValidationError> {
    let mut dates: Vec<AsOfDate> = Vec::with_capacity(frame.len());
    for (row, raw) in frame.column(col).enumerate() {
        let date = parse_date(raw)
            .ok_or_else(|| ValidationError::InvalidDate { table, row, value: raw.to_string() })?;
        if let Some(&previous) = dates.last() {
            if date < previous {
                return Err(ValidationError::Unsorted { table, row, previous, next: date });
            }
        }
        dates.push(date);
    }
    Ok(dates)
}

/// How a numeric check treats empty cells.
#[derive(Clone, Copy, PartialEq, Eq)]
enum EmptyCells {
    /// Read as zero and counted in an `AbsentCells` warning.
    Zero,
    /// Non-numeric, like any other unparseable text.
    Reject,
}

/// Coerce whole columns to numbers; a hard failure lists every bad column.
fn numeric_columns(
    frame: &Frame,
    table: TableKind,
    cols: &[usize],
    empty: EmptyCells,
    warnings: &mut Vec<ValidationWarning>,
) -> Result<Vec<Vec<f64>>, ValidationError> {
    let mut out = Vec::with_capacity(cols.len());
    let mut bad: Vec<(String, usize)> = Vec::new();
    for &col in cols {
        let mut values = Vec::with_capacity(frame.len());
        let mut absent = 0;
        let mut invalid = 0;
        for raw in frame.column(col) {
            match CellValue::parse(raw) {
                CellValue::Number(v) => values.push(v),
                CellValue::Absent if empty == EmptyCells::Zero => {
                    absent += 1;
                    values.push(0.0);
                }
                CellValue::Absent | CellValue::Invalid => invalid += 1,
            }
        }
        let name = frame.headers[col].clone();
        if invalid > 0 {
            bad.push((name, invalid));
        } else if absent > 0 {
            warnings.push(ValidationWarning::AbsentCells { column: name, count: absent });
        }
        out.push(values);
    }
    if bad.is_empty() {
        Ok(out)
    } else {
        Err(ValidationError::NonNumeric { table, counts: bad })
    }
}

fn negative_summary(values: impl Iterator<Item = f64>) -> Option<(usize, f64)> {
    values
        .filter(|v| *v < 0.0)
        .fold(None, |acc, v| match acc {
            None => Some((1, v)),
            Some((n, min)) => Some((n + 1, min.min(v))),
        })
}

// ── Wide ───────────────────────────────────────────────────────────

/// Validate the wide table. See the module docs for the hard/soft split.
pub fn check_wide(frame: &Frame, tolerance: &Tolerance) -> Result<ValidationReport, ValidationError> {
    let table = TableKind::Wide;
    require_columns(frame, table, &[AS_OF_DATE, TOTAL])?;
    let date_col = frame.column_index(AS_OF_DATE).unwrap_or(0);
    let dates = sorted_dates(frame, table, date_col)?;

    let mut warnings = Vec::new();
    let value_cols: Vec<usize> = (0..frame.headers.len()).filter(|c| *c != date_col).collect();
    let values = numeric_columns(frame, table, &value_cols, EmptyCells::Zero, &mut warnings)?;

    let total_pos = value_cols
        .iter()
        .position(|c| frame.headers[*c] == TOTAL)
        .unwrap_or(0);
    let totals = &values[total_pos];

    let negative_totals: Vec<(AsOfDate, f64)> = dates
        .iter()
        .zip(totals)
        .filter(|(_, t)| **t < 0.0)
        .map(|(d, t)| (*d, *t))
        .collect();
    if !negative_totals.is_empty() {
        return Err(ValidationError::NegativeTotal { table, rows: negative_totals });
    }

    // Components: every numeric column except the total, case-insensitively.
    let components: Vec<usize> = value_cols
        .iter()
        .enumerate()
        .filter(|(_, c)| !frame.headers[**c].eq_ignore_ascii_case(TOTAL))
        .map(|(i, _)| i)
        .collect();

    for &i in &components {
        if let Some((count, min)) = negative_summary(values[i].iter().copied()) {
            warnings.push(ValidationWarning::NegativeComponent {
                column: frame.headers[value_cols[i]].clone(),
                count,
                min,
            });
        }
    }

    if !components.is_empty() {
        let mut off_dates = Vec::new();
        let mut worst = 0.0_f64;
        for (row, date) in dates.iter().enumerate() {
            let sum: f64 = components.iter().map(|&i| values[i][row]).sum();
            let diff = (sum - totals[row]).abs();
            if diff > tolerance.allowed(totals[row]) {
                off_dates.push(*date);
                worst = worst.max(diff);
            }
        }
        if !off_dates.is_empty() {
            warnings.push(ValidationWarning::ReconciliationMismatch {
                dates:      off_dates,
                worst_diff: worst,
                tolerance:  *tolerance,
            });
        }
    }

    let duplicates = dates.windows(2).filter(|w| w[0] == w[1]).count();
    if duplicates > 0 {
        warnings.push(ValidationWarning::DuplicateDates { count: duplicates });
    }

    Ok(ValidationReport {
        table,
        rows: frame.len(),
        columns: frame.headers.clone(),
        categories: None,
        warnings,
    })
}

// ── Long ───────────────────────────────────────────────────────────

/// Validate the long (tidy) table. Every amount must be a number; the
/// long table is generated, so an empty amount is never legitimate.
pub fn check_long(frame: &Frame) -> Result<ValidationReport, ValidationError> {
    let table = TableKind::Long;
    require_columns(frame, table, &[AS_OF_DATE, CATEGORY, AMOUNT])?;
    let date_col = frame.column_index(AS_OF_DATE).unwrap_or(0);
    let cat_col = frame.column_index(CATEGORY).unwrap_or(0);
    let amount_col = frame.column_index(AMOUNT).unwrap_or(0);
    let dates = sorted_dates(frame, table, date_col)?;

    let mut warnings = Vec::new();
    let amounts = numeric_columns(frame, table, &[amount_col], EmptyCells::Reject, &mut warnings)?
        .pop()
        .unwrap_or_default();

    let mut negative_totals = Vec::new();
    let mut by_category: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for (row, (date, amount)) in dates.iter().zip(&amounts).enumerate() {
        if *amount >= 0.0 {
            continue;
        }
        let category = frame.cell(row, cat_col);
        if category.trim().eq_ignore_ascii_case(TOTAL) {
            negative_totals.push((*date, *amount));
        } else {
            let entry = by_category.entry(category).or_insert((0, *amount));
            entry.0 += 1;
            entry.1 = entry.1.min(*amount);
        }
    }
    if !negative_totals.is_empty() {
        return Err(ValidationError::NegativeTotal { table, rows: negative_totals });
    }

    let mut negatives: Vec<(&str, (usize, f64))> = by_category.into_iter().collect();
    // Most frequent first; ties stay alphabetical.
    negatives.sort_by(|a, b| b.1 .0.cmp(&a.1 .0));
    warnings.extend(negatives.into_iter().map(|(category, (count, min))| {
        ValidationWarning::NegativeCategory { category: category.to_string(), count, min }
    }));

    let categories = frame
        .column(cat_col)
        .collect::<std::collections::BTreeSet<_>>()
        .len();

    Ok(ValidationReport {
        table,
        rows: frame.len(),
        columns: frame.headers.clone(),
        categories: Some(categories),
        warnings,
    })
}

// ── File entry points ──────────────────────────────────────────────

pub fn check_wide_file(path: &Path, tolerance: &Tolerance) -> SomaResult<ValidationReport> {
    let frame = Frame::read_csv(path)?;
    Ok(check_wide(&frame, tolerance)?)
}

pub fn check_long_file(path: &Path) -> SomaResult<ValidationReport> {
    let frame = Frame::read_csv(path)?;
    Ok(check_long(&frame)?)
}
