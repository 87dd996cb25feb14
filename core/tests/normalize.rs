//! Payload normalization: canonical column names and date stamping.

use chrono::NaiveDate;
use soma_core::{
    frame::Frame,
    normalize::{normalize, normalize_column},
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Trim, lowercase, spaces to underscores.
#[test]
fn column_names_are_canonical() {
    assert_eq!(normalize_column(" Notes Bonds "), "notes_bonds");
    assert_eq!(normalize_column("TIPS Inflation Compensation"), "tips_inflation_compensation");
    assert_eq!(normalize_column("total"), "total");
}

/// The payload's own date column is dropped in favour of the requested date.
#[test]
fn requested_date_wins_over_payload_date() {
    let payload = Frame::from_csv_bytes(
        b"As Of Date,Mbs,Total\n2025-01-09,2200000,6500000\n",
    )
    .unwrap();
    let record = normalize(&payload, d(2025, 1, 8));

    assert_eq!(record.as_of_date, d(2025, 1, 8));
    assert_eq!(record.columns().collect::<Vec<_>>(), vec!["mbs", "total"]);
    assert_eq!(record.get("total"), Some("6500000"));
    assert_eq!(record.get("as_of_date"), None);
}

/// Payloads without a date column are stamped all the same.
#[test]
fn payload_without_date_column() {
    let payload = Frame::from_csv_bytes(b"Bills,Total\n 195000 ,6500000\n").unwrap();
    let record = normalize(&payload, d(2025, 1, 8));
    assert_eq!(record.as_of_date, d(2025, 1, 8));
    assert_eq!(record.get("bills"), Some("195000"));
}

/// Only the first data row is kept.
#[test]
fn extra_rows_are_ignored() {
    let payload = Frame::from_csv_bytes(b"Total\n1\n2\n").unwrap();
    let record = normalize(&payload, d(2025, 1, 8));
    assert_eq!(record.get("total"), Some("1"));
    assert_eq!(record.fields().len(), 1);
}
