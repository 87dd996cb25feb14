//! Run reports: what one backfill or update did, week by week.
//!
//! Serialized as JSON by the runner. Variants are only ever added.

use crate::{
    calendar::FetchWindow,
    store::DedupeReport,
    types::{AsOfDate, RunId},
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WeekOutcome {
    Appended {
        as_of_date: AsOfDate,
        columns:    usize,
    },
    Skipped {
        as_of_date: AsOfDate,
        reason:     String,
    },
}

impl WeekOutcome {
    pub fn as_of_date(&self) -> AsOfDate {
        match self {
            WeekOutcome::Appended { as_of_date, .. } | WeekOutcome::Skipped { as_of_date, .. } => {
                *as_of_date
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Backfill,
    Update,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id:   RunId,
    pub kind:     RunKind,
    /// `None` when there was nothing to fetch.
    pub window:   Option<FetchWindow>,
    pub outcomes: Vec<WeekOutcome>,
    pub dedupe:   Option<DedupeReport>,
}

impl RunReport {
    pub fn new(kind: RunKind, window: Option<FetchWindow>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            kind,
            window,
            outcomes: Vec::new(),
            dedupe: None,
        }
    }

    pub fn appended(&self) -> Vec<AsOfDate> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, WeekOutcome::Appended { .. }))
            .map(WeekOutcome::as_of_date)
            .collect()
    }

    pub fn skipped(&self) -> Vec<AsOfDate> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, WeekOutcome::Skipped { .. }))
            .map(WeekOutcome::as_of_date)
            .collect()
    }
}
