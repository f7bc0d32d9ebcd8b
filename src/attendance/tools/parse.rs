use std::fmt::Write as _;

use chrono::NaiveDateTime;

use crate::attendance::tools::error::ParseRejection;
use crate::attendance::tools::model::{AttendanceRecord, CellValue};

/// Fields every submission carries: timestamp, identity, name, handle and
/// one more answer.
pub const MIN_FIELDS: usize = 5;

/// Once a row has more than [`MIN_FIELDS`] fields, field 4 holds the stored
/// attendance value.
const ATTENDANCE_FIELD: usize = 4;

/// Converts one raw row into an [`AttendanceRecord`].
///
/// Blank or non-textual cells are dropped before fields are mapped by
/// position, so a gap in the sheet shifts later answers to the left. Date
/// cells are rendered with `timestamp_format`, so a typed timestamp parses
/// the same way as its textual form.
pub fn parse_row(
    cells: &[CellValue],
    row_index: usize,
    timestamp_format: &str,
) -> Result<AttendanceRecord, ParseRejection> {
    let fields: Vec<String> = cells
        .iter()
        .filter_map(|cell| field_text(cell, timestamp_format))
        .collect();

    if fields.is_empty() {
        return Err(ParseRejection::EmptyRow);
    }
    if fields.len() < MIN_FIELDS {
        return Err(ParseRejection::InsufficientFields {
            expected: MIN_FIELDS,
            found: fields.len(),
        });
    }

    let attendance_value = if fields.len() > MIN_FIELDS {
        let raw = &fields[ATTENDANCE_FIELD];
        raw.parse::<u32>()
            .map(u64::from)
            .map_err(|_| ParseRejection::InvalidAttendanceValue(raw.clone()))?
    } else {
        1
    };

    let timestamp = NaiveDateTime::parse_from_str(&fields[0], timestamp_format)
        .map_err(|_| ParseRejection::InvalidTimestamp(fields[0].clone()))?;

    let mut fields = fields.into_iter().skip(1);
    let mut next = || fields.next().unwrap_or_default();
    Ok(AttendanceRecord {
        source_row_index: row_index,
        timestamp,
        identity_key: next(),
        display_name: next(),
        membership_handle: next(),
        attendance_value,
    })
}

fn field_text(cell: &CellValue, timestamp_format: &str) -> Option<String> {
    match cell {
        CellValue::DateTime(value) => {
            let mut rendered = String::new();
            write!(rendered, "{}", value.format(timestamp_format)).ok()?;
            Some(rendered)
        }
        other => other.as_text(),
    }
}

/// Outcome of parsing a whole data range.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedRows {
    /// Valid records in source order.
    pub records: Vec<AttendanceRecord>,
    /// Rejected rows with their index and reason.
    pub rejections: Vec<(usize, ParseRejection)>,
}

/// Parses every row of a data range; the row's position becomes its index.
pub fn parse_rows(rows: &[Vec<CellValue>], timestamp_format: &str) -> ParsedRows {
    let mut parsed = ParsedRows::default();
    for (index, row) in rows.iter().enumerate() {
        match parse_row(row, index, timestamp_format) {
            Ok(record) => parsed.records.push(record),
            Err(rejection) => parsed.rejections.push((index, rejection)),
        }
    }
    parsed
}
