//! Derived series behind the dashboards: weekly change, trend,
//! cumulative change since an anchor, and composition share.
//!
//! Rendering is somebody else's job. Everything here returns plain data.

use crate::{
    error::{SomaError, SomaResult},
    table::WideTable,
    types::{AsOfDate, TOTAL},
};
use chrono::Months;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub as_of_date: AsOfDate,
    pub value:      f64,
}

/// `total` over time, ascending by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TotalSeries {
    pub points: Vec<Point>,
}

impl TotalSeries {
    pub fn from_wide(wide: &WideTable) -> SomaResult<Self> {
        let col = wide.column_index(TOTAL).ok_or_else(|| missing_total(wide))?;
        let mut points = (0..wide.len())
            .map(|i| Ok(Point { as_of_date: wide.rows[i].as_of_date, value: wide.amount(i, col)? }))
            .collect::<SomaResult<Vec<_>>>()?;
        points.sort_by_key(|p| p.as_of_date);
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Net weekly change. The first week has no predecessor.
    pub fn week_over_week(&self) -> Vec<(AsOfDate, Option<f64>)> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let change = i.checked_sub(1).map(|prev| p.value - self.points[prev].value);
                (p.as_of_date, change)
            })
            .collect()
    }

    /// Trailing mean of the weekly change over `window` weeks, using
    /// however many defined changes the window holds (at least one).
    pub fn rolling_mean(&self, window: usize) -> Vec<(AsOfDate, Option<f64>)> {
        let window = window.max(1);
        let wow = self.week_over_week();
        (0..wow.len())
            .map(|i| {
                let start = (i + 1).saturating_sub(window);
                let defined: Vec<f64> = wow[start..=i].iter().filter_map(|(_, c)| *c).collect();
                let mean = if defined.is_empty() {
                    None
                } else {
                    Some(defined.iter().sum::<f64>() / defined.len() as f64)
                };
                (wow[i].0, mean)
            })
            .collect()
    }

    /// Change relative to the first point on or after `anchor`. Falls back
    /// to the first point when the anchor is past the end of the series.
    pub fn cumulative_since(&self, anchor: AsOfDate) -> (Option<AsOfDate>, Vec<Point>) {
        let start = self
            .points
            .iter()
            .position(|p| p.as_of_date >= anchor)
            .unwrap_or(0);
        let Some(base) = self.points.get(start) else {
            return (None, Vec::new());
        };
        let points = self.points[start..]
            .iter()
            .map(|p| Point { as_of_date: p.as_of_date, value: p.value - base.value })
            .collect();
        (Some(base.as_of_date), points)
    }

    /// Points within `years` years of the last date.
    pub fn trailing_years(&self, years: u32) -> TotalSeries {
        let Some(last) = self.points.last() else {
            return TotalSeries::default();
        };
        let cutoff = last
            .as_of_date
            .checked_sub_months(Months::new(years.saturating_mul(12)))
            .unwrap_or(AsOfDate::MIN);
        TotalSeries {
            points: self.points.iter().filter(|p| p.as_of_date >= cutoff).copied().collect(),
        }
    }
}

fn missing_total(wide: &WideTable) -> SomaError {
    SomaError::MissingColumn { column: TOTAL.into(), found: wide.columns.clone() }
}

/// One date's component shares of the total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareRow {
    pub as_of_date: AsOfDate,
    /// (component, share of total); zero when the total is zero.
    pub shares:     Vec<(String, f64)>,
}

/// Share of each component column in `total`, per date.
pub fn composition_share(wide: &WideTable) -> SomaResult<Vec<ShareRow>> {
    let total_col = wide.column_index(TOTAL).ok_or_else(|| missing_total(wide))?;
    let parts: Vec<usize> = (0..wide.columns.len()).filter(|c| *c != total_col).collect();
    (0..wide.len())
        .map(|i| {
            let total = wide.amount(i, total_col)?;
            let shares = parts
                .iter()
                .map(|&c| {
                    let v = wide.amount(i, c)?;
                    let share = if total == 0.0 { 0.0 } else { v / total };
                    Ok((wide.columns[c].clone(), share))
                })
                .collect::<SomaResult<Vec<_>>>()?;
            Ok(ShareRow { as_of_date: wide.rows[i].as_of_date, shares })
        })
        .collect()
}
