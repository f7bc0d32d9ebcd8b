use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::trace;

use crate::attendance::tools::model::{AttendanceRecord, CorrectedTotal};

/// Computes the deduplicated cumulative attendance per identity.
///
/// Only the first record seen for an `(identity, calendar day)` pair
/// contributes its value; later same-day records add nothing. The result
/// therefore depends on input order, which must be source order.
pub fn aggregate(records: &[AttendanceRecord]) -> CorrectedTotal {
    let mut counted: HashSet<(&str, NaiveDate)> = HashSet::new();
    let mut totals = CorrectedTotal::new();

    for record in records {
        let total = totals.entry(record.identity_key.clone()).or_insert(0);
        if counted.insert((record.identity_key.as_str(), record.day())) {
            *total = total.saturating_add(record.attendance_value);
        } else {
            trace!(
                row = record.source_row_index,
                identity = %record.identity_key,
                "same-day duplicate does not count"
            );
        }
    }

    totals
}
