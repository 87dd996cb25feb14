//! Column-name canonicalization and as-of date stamping.

use crate::{
    frame::Frame,
    table::WideRecord,
    types::{format_date, parse_date, AsOfDate, AS_OF_DATE},
};

/// `" Notes Bonds "` → `"notes_bonds"`.
pub fn normalize_column(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Turn a fetched payload into the record stored for `as_of_date`.
///
/// The caller's date always wins over any date the payload carries.
/// Only the first data row is kept; the summary feed returns one row
/// per requested date.
pub fn normalize(payload: &Frame, as_of_date: AsOfDate) -> WideRecord {
    let columns: Vec<String> = payload.headers.iter().map(|h| normalize_column(h)).collect();
    let mut record = WideRecord::new(as_of_date);

    if payload.len() > 1 {
        log::warn!(
            "payload for {as_of_date} has {} rows; keeping the first",
            payload.len()
        );
    }
    if payload.is_empty() {
        return record;
    }

    for (col, name) in columns.iter().enumerate() {
        let value = payload.cell(0, col);
        if name == AS_OF_DATE {
            match parse_date(value) {
                Some(reported) if reported != as_of_date => log::warn!(
                    "payload reports as_of_date {reported} but was requested for {}; using the requested date",
                    format_date(as_of_date)
                ),
                None if !value.trim().is_empty() => log::warn!(
                    "payload for {as_of_date} has unparseable as_of_date {value:?}"
                ),
                _ => {}
            }
            continue;
        }
        record.set(name.clone(), value.trim());
    }
    record
}
