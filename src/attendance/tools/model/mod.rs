use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Stable per-person identifier, distinct from the display name and the
/// membership handle.
pub type IdentityKey = String;

/// Deduplicated cumulative attendance per identity for one cycle.
pub type CorrectedTotal = BTreeMap<IdentityKey, u64>;

/// Opaque value of a single cell as delivered by the tabular store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    /// Plain text cell.
    Text(String),
    /// Numeric cell.
    Number(f64),
    /// Boolean cell.
    Boolean(bool),
    /// Date or date-time cell, kept typed so it is written back as a date.
    DateTime(NaiveDateTime),
    /// Formula error such as `#N/A`, kept as its display code.
    Error(String),
    /// Cell with no content.
    Empty,
}

impl CellValue {
    /// Renders the cell as a non-blank string, or `None` when the cell has
    /// no meaningful textual form.
    ///
    /// Whole numbers render without a fractional part so that an attendance
    /// count written back as a number reads as `"3"` on the next cycle.
    /// Booleans render as `TRUE`/`FALSE`, the way the sheet shows them. Date
    /// cells render as `YYYY-MM-DD HH:MM:SS`; the row parser renders them
    /// with the configured timestamp format instead. Error cells and
    /// non-finite numbers carry no value and render as `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Text(value) => {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            CellValue::Number(value) if value.is_finite() => {
                if value.fract() == 0.0 && value.abs() < 1e15 {
                    Some(format!("{}", *value as i64))
                } else {
                    Some(value.to_string())
                }
            }
            CellValue::Boolean(value) => Some(if *value { "TRUE" } else { "FALSE" }.to_string()),
            CellValue::DateTime(value) => Some(value.format("%Y-%m-%d %H:%M:%S").to_string()),
            CellValue::Number(_) | CellValue::Error(_) | CellValue::Empty => None,
        }
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

/// One parsed, valid attendance submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Zero-based position of the row inside the data range (header excluded).
    pub source_row_index: usize,
    /// Moment the submission was made.
    pub timestamp: NaiveDateTime,
    pub identity_key: IdentityKey,
    /// Human readable name. Not used for reconciliation.
    pub display_name: String,
    /// Identifier of the person in the membership system.
    pub membership_handle: String,
    /// Attendance units currently stored on the row.
    pub attendance_value: u64,
}

impl AttendanceRecord {
    /// Calendar day the submission falls on.
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Overwrites one cell of the tabular store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOperation {
    /// Index of the record the write was derived from.
    pub source_row_index: usize,
    /// Absolute sheet row (record index offset by the header rows).
    pub row: usize,
    /// Absolute sheet column.
    pub column: usize,
    pub value: CellValue,
}

/// Instructs the store to collapse rows that are duplicates on a column span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupDirective {
    /// First absolute row covered by the directive. Rows above it (the
    /// header) are never touched.
    pub start_row: usize,
    /// First comparison column, inclusive.
    pub start_column: usize,
    /// Last comparison column, exclusive.
    pub end_column: usize,
}

/// Everything a cycle submits to the store in one atomic batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritePlan {
    pub operations: Vec<WriteOperation>,
    pub dedup: DedupDirective,
}

impl WritePlan {
    /// Number of records that receive corrected values.
    pub fn corrected_rows(&self) -> usize {
        self.operations
            .iter()
            .map(|operation| operation.source_row_index)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// A member of a group in the membership system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    /// Identifier used by the membership system when mutating the member.
    pub id: String,
    /// Handle correlated with [`AttendanceRecord::membership_handle`].
    pub handle: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl MemberInfo {
    /// Creates a member holding no roles.
    pub fn new(id: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handle: handle.into(),
            roles: BTreeSet::new(),
        }
    }

    /// Adds `role` to the member's roles.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Returns whether the member already holds `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}
