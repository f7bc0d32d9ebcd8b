use tracing::debug;

use crate::attendance::tools::config::LayoutConfig;
use crate::attendance::tools::model::{
    AttendanceRecord, CellValue, CorrectedTotal, DedupDirective, WriteOperation, WritePlan,
};

/// Builds the minimal batch that brings every row in line with the corrected
/// totals.
///
/// A record whose stored value already equals its identity's total produces
/// no writes. Every other record gets two writes on its own row: the corrected
/// count and `corrected_at` in the attendance and last-corrected columns. The
/// dedup directive is always present, even when nothing needs correcting.
pub fn plan(
    records: &[AttendanceRecord],
    totals: &CorrectedTotal,
    layout: &LayoutConfig,
    corrected_at: &str,
) -> WritePlan {
    let mut operations = Vec::new();

    for record in records {
        let Some(&total) = totals.get(&record.identity_key) else {
            continue;
        };
        if total == record.attendance_value {
            continue;
        }

        let row = record.source_row_index + layout.header_rows;
        debug!(
            row,
            identity = %record.identity_key,
            stored = record.attendance_value,
            corrected = total,
            "planning attendance correction"
        );
        operations.push(WriteOperation {
            source_row_index: record.source_row_index,
            row,
            column: layout.attendance_column,
            value: CellValue::Number(total as f64),
        });
        operations.push(WriteOperation {
            source_row_index: record.source_row_index,
            row,
            column: layout.corrected_at_column,
            value: CellValue::Text(corrected_at.to_string()),
        });
    }

    WritePlan {
        operations,
        dedup: DedupDirective {
            start_row: layout.header_rows,
            start_column: layout.identity_column,
            end_column: layout.identity_column + 1,
        },
    }
}
