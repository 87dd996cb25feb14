//! Wide and long (tidy) shapes of the weekly summary.
//!
//! Wide: one row per as-of date, one column per category plus `total`.
//! Long: one row per (as-of date, category) with a single amount.
//!
//! The long table has no source of truth of its own. It is always
//! regenerated from the wide table with `WideTable::to_long`.

use crate::{
    error::{SomaError, SomaResult},
    frame::Frame,
    types::{format_date, AsOfDate, CellValue, AMOUNT, AS_OF_DATE, CATEGORY},
};
use serde::Serialize;
use std::collections::HashMap;

/// Fill value for a column a row never had.
pub const FILL_VALUE: &str = "0";

// ── Wide record ─────────────────────────────────────────────────────

/// One normalized weekly payload, ready to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideRecord {
    pub as_of_date: AsOfDate,
    /// Non-date columns in payload order, raw cell text.
    fields:         Vec<(String, String)>,
}

impl WideRecord {
    pub fn new(as_of_date: AsOfDate) -> Self {
        Self { as_of_date, fields: Vec::new() }
    }

    /// Set a column, overwriting any earlier value for the same name.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.iter().find(|(c, _)| c == column).map(|(_, v)| v.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

// ── Wide table ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideRow {
    pub as_of_date: AsOfDate,
    /// Aligned with `WideTable::columns`.
    pub cells:      Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WideTable {
    /// Non-date columns, first-seen order.
    pub columns: Vec<String>,
    pub rows:    Vec<WideRow>,
}

impl WideTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Add a record, widening the table if it brings new columns.
    ///
    /// Union-of-columns reconciliation: older rows get `FILL_VALUE` for a
    /// new column, and this row gets it for any column it lacks.
    pub fn push_record(&mut self, record: &WideRecord) {
        self.add_columns(record.columns());
        let cells = self
            .columns
            .iter()
            .map(|c| record.get(c).unwrap_or(FILL_VALUE).to_string())
            .collect();
        self.rows.push(WideRow { as_of_date: record.as_of_date, cells });
    }

    /// Widen the table with any unseen columns, filling existing rows.
    pub fn add_columns<'a>(&mut self, columns: impl IntoIterator<Item = &'a str>) {
        for column in columns {
            if self.column_index(column).is_none() {
                self.columns.push(column.to_string());
                for row in &mut self.rows {
                    row.cells.push(FILL_VALUE.to_string());
                }
            }
        }
    }

    /// Sort ascending by date and keep the first row seen for each date.
    /// Returns the number of rows removed.
    pub fn sort_and_dedupe(&mut self) -> usize {
        let before = self.rows.len();
        // Stable: among equal dates the earliest appended row stays first.
        self.rows.sort_by_key(|r| r.as_of_date);
        self.rows.dedup_by_key(|r| r.as_of_date);
        before - self.rows.len()
    }

    pub fn last_date(&self) -> Option<AsOfDate> {
        self.rows.iter().map(|r| r.as_of_date).max()
    }

    pub fn to_frame(&self) -> Frame {
        let mut headers = Vec::with_capacity(self.columns.len() + 1);
        headers.push(AS_OF_DATE.to_string());
        headers.extend(self.columns.iter().cloned());
        let rows = self
            .rows
            .iter()
            .map(|r| {
                let mut out = Vec::with_capacity(r.cells.len() + 1);
                out.push(format_date(r.as_of_date));
                out.extend(r.cells.iter().cloned());
                out
            })
            .collect();
        Frame::new(headers, rows)
    }

    /// Numeric value of one cell, empty cells read as zero.
    pub fn amount(&self, row: usize, col: usize) -> SomaResult<f64> {
        let r = &self.rows[row];
        let raw = r.cells.get(col).map(String::as_str).unwrap_or("");
        CellValue::parse(raw).or_zero().ok_or_else(|| SomaError::NonNumeric {
            as_of_date: r.as_of_date,
            column:     self.columns[col].clone(),
            value:      raw.to_string(),
        })
    }

    /// Melt into (as_of_date, category, amount), date-major, columns in order.
    pub fn to_long(&self) -> SomaResult<LongTable> {
        let mut rows = Vec::with_capacity(self.rows.len() * self.columns.len());
        for (i, row) in self.rows.iter().enumerate() {
            for (j, category) in self.columns.iter().enumerate() {
                rows.push(LongRecord {
                    as_of_date: row.as_of_date,
                    category:   category.clone(),
                    amount:     self.amount(i, j)?,
                });
            }
        }
        Ok(LongTable { rows })
    }
}

// ── Long table ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongRecord {
    pub as_of_date: AsOfDate,
    pub category:   String,
    pub amount:     f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LongTable {
    pub rows: Vec<LongRecord>,
}

impl LongTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_frame(&self) -> Frame {
        let headers = vec![AS_OF_DATE.to_string(), CATEGORY.to_string(), AMOUNT.to_string()];
        let rows = self
            .rows
            .iter()
            .map(|r| vec![format_date(r.as_of_date), r.category.clone(), format_amount(r.amount)])
            .collect();
        Frame::new(headers, rows)
    }

    /// Pivot back to wide. Dates and categories keep first-seen order.
    pub fn to_wide(&self) -> WideTable {
        let mut table = WideTable::new();
        let mut by_date: HashMap<AsOfDate, usize> = HashMap::new();
        let mut records: Vec<WideRecord> = Vec::new();
        for r in &self.rows {
            let idx = *by_date.entry(r.as_of_date).or_insert_with(|| {
                records.push(WideRecord::new(r.as_of_date));
                records.len() - 1
            });
            records[idx].set(r.category.clone(), format_amount(r.amount));
        }
        for record in &records {
            table.push_record(record);
        }
        table
    }
}

/// Shortest text that parses back to the same number.
pub fn format_amount(v: f64) -> String {
    format!("{v}")
}
