use std::collections::HashSet;

use crate::attendance::tools::error::{Result, ToolError};
use crate::attendance::tools::io::RangeSpec;
use crate::attendance::tools::model::{CellValue, DedupDirective, WritePlan};

/// A sheet as a list of rows; rows may have different lengths.
pub type Grid = Vec<Vec<CellValue>>;

/// Extracts the rows of `range`, each padded or truncated to its width.
pub fn read_window(grid: &[Vec<CellValue>], range: &RangeSpec) -> Grid {
    grid.iter()
        .skip(range.start_row)
        .map(|row| {
            let mut cells: Vec<CellValue> = row.iter().take(range.width).cloned().collect();
            cells.resize(range.width, CellValue::Empty);
            cells
        })
        .collect()
}

/// Applies `plan` to a copy of `grid` and returns the result.
///
/// Cell overwrites are applied first, in order, growing the grid when a
/// write lands outside it. The dedup directive runs last. The input grid is
/// never modified, so a failure leaves the caller's state untouched.
pub fn apply_plan(grid: &[Vec<CellValue>], plan: &WritePlan) -> Result<Grid> {
    let mut next = grid.to_vec();

    for operation in &plan.operations {
        if next.len() <= operation.row {
            next.resize_with(operation.row + 1, Vec::new);
        }
        let row = &mut next[operation.row];
        if row.len() <= operation.column {
            row.resize(operation.column + 1, CellValue::Empty);
        }
        row[operation.column] = operation.value.clone();
    }

    dedup_rows(next, &plan.dedup)
}

/// Collapses rows at or after `start_row` whose comparison cells render
/// identically, keeping the first occurrence.
fn dedup_rows(grid: Grid, directive: &DedupDirective) -> Result<Grid> {
    if directive.end_column <= directive.start_column {
        return Err(ToolError::StoreWrite(format!(
            "dedup directive has an empty column span {}..{}",
            directive.start_column, directive.end_column
        )));
    }

    let mut seen: HashSet<Vec<Option<String>>> = HashSet::new();
    let mut kept = Vec::with_capacity(grid.len());

    for (index, row) in grid.into_iter().enumerate() {
        if index < directive.start_row {
            kept.push(row);
            continue;
        }
        let key: Vec<Option<String>> = (directive.start_column..directive.end_column)
            .map(|column| row.get(column).and_then(CellValue::as_text))
            .collect();
        if seen.insert(key) {
            kept.push(row);
        }
    }

    Ok(kept)
}
