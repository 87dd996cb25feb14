//! Run configuration.
//!
//! RULE: components never read globals. Every tunable lives here and is
//! handed to the component that needs it at construction time.

use crate::{
    error::{SomaError, SomaResult},
    store::snapshot::SnapshotBackend,
    types::AsOfDate,
};
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://markets.newyorkfed.org/read";

/// Tolerances for the component-sum vs total reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub absolute: f64,
    pub relative: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self { absolute: 1_000.0, relative: 0.005 }
    }
}

impl Tolerance {
    /// Largest discrepancy accepted for a given total.
    pub fn allowed(&self, total: f64) -> f64 {
        self.absolute.max(self.relative * total.abs())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SomaConfig {
    pub endpoint_base:     String,
    /// 0 = Monday … 6 = Sunday.
    pub anchor_weekday:    u8,
    /// Total attempts per as-of date, including the first.
    pub retries:           u32,
    pub backoff:           f64,
    pub timeout_seconds:   u64,
    pub abs_tolerance:     f64,
    pub rel_tolerance:     f64,
    pub data_dir:          PathBuf,
    pub snapshot_backend:  SnapshotBackend,
    pub user_agent:        String,
    pub backfill_start:    AsOfDate,
    pub cumulative_anchor: AsOfDate,
    pub rolling_window:    usize,
}

impl Default for SomaConfig {
    fn default() -> Self {
        Self {
            endpoint_base:     DEFAULT_ENDPOINT.into(),
            anchor_weekday:    2, // Wednesday
            retries:           3,
            backoff:           1.5,
            timeout_seconds:   60,
            abs_tolerance:     1_000.0,
            rel_tolerance:     0.005,
            data_dir:          PathBuf::from("data"),
            snapshot_backend:  SnapshotBackend::Auto,
            user_agent:        concat!("soma-core/", env!("CARGO_PKG_VERSION")).into(),
            backfill_start:    date(2025, 1, 1),
            cumulative_anchor: date(2022, 6, 1),
            rolling_window:    4,
        }
    }
}

fn date(y: i32, m: u32, d: u32) -> AsOfDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

impl SomaConfig {
    /// Load from a JSON file. Missing keys take their defaults.
    /// In tests, use SomaConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: SomaConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with no retry waits worth noticing and no snapshot mirror.
    pub fn default_test() -> Self {
        Self {
            endpoint_base:    "http://soma.test/read".into(),
            backoff:          1.0,
            timeout_seconds:  1,
            snapshot_backend: SnapshotBackend::Disabled,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> SomaResult<()> {
        if self.retries == 0 {
            return Err(SomaError::Config("retries must be at least 1".into()));
        }
        if self.backoff.is_nan() || self.backoff < 1.0 {
            return Err(SomaError::Config(format!("backoff must be >= 1.0, got {}", self.backoff)));
        }
        if self.abs_tolerance < 0.0 || self.rel_tolerance < 0.0 {
            return Err(SomaError::Config("tolerances must be non-negative".into()));
        }
        if self.rolling_window == 0 {
            return Err(SomaError::Config("rolling_window must be at least 1".into()));
        }
        self.anchor()?;
        Ok(())
    }

    pub fn anchor(&self) -> SomaResult<Weekday> {
        weekday_from_index(self.anchor_weekday).ok_or_else(|| {
            SomaError::Config(format!(
                "anchor_weekday must be 0 (Monday) ..= 6 (Sunday), got {}",
                self.anchor_weekday
            ))
        })
    }

    pub fn tolerance(&self) -> Tolerance {
        Tolerance { absolute: self.abs_tolerance, relative: self.rel_tolerance }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}
