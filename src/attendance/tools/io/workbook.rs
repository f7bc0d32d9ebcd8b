use std::io::Write;
use std::path::{Path, PathBuf};

use calamine::{DataType, Reader, Xlsx, open_workbook};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_xlsxwriter::{Format, Formula, Workbook};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use crate::attendance::tools::error::{Result, ToolError};
use crate::attendance::tools::io::grid::{self, Grid};
use crate::attendance::tools::io::{RangeSpec, TableReader, TableWriter};
use crate::attendance::tools::model::{CellValue, WritePlan};

/// Tabular store backed by a local `.xlsx` workbook.
///
/// Batches are applied to every sheet in memory and the whole workbook is
/// written to a sibling temporary file that then replaces the original, so a
/// failed batch never leaves a half-written workbook behind. Date cells are
/// written back as dates. Error cells become error-constant formulas whose
/// cached result is the error code.
#[derive(Debug, Clone)]
pub struct WorkbookStore {
    path: PathBuf,
}

impl WorkbookStore {
    /// Creates a store for the workbook at `path`. The file is opened on
    /// every read and batch.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing workbook.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every sheet of the workbook in file order.
    pub fn read_sheets(&self) -> Result<Vec<(String, Grid)>> {
        let mut workbook: Xlsx<_> = open_workbook(&self.path)?;
        let names = workbook.sheet_names().to_vec();
        let mut sheets = Vec::with_capacity(names.len());
        for name in names {
            let grid = read_sheet(&mut workbook, &name)?;
            sheets.push((name, grid));
        }
        Ok(sheets)
    }
}

impl TableReader for WorkbookStore {
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    fn read_range(&self, range: &RangeSpec) -> Result<Vec<Vec<CellValue>>> {
        let load = || -> Result<Grid> {
            let mut workbook: Xlsx<_> = open_workbook(&self.path)?;
            read_sheet(&mut workbook, &range.sheet)
        };
        let sheet = load().map_err(|err| ToolError::StoreRead(err.to_string()))?;
        Ok(grid::read_window(&sheet, range))
    }
}

impl TableWriter for WorkbookStore {
    #[instrument(
        level = "debug",
        skip(self, plan),
        fields(path = %self.path.display(), operations = plan.operations.len())
    )]
    fn batch_update(&mut self, sheet: &str, plan: &WritePlan) -> Result<()> {
        let apply = || -> Result<()> {
            let mut sheets = self.read_sheets()?;
            let (_, target) = sheets
                .iter_mut()
                .find(|(name, _)| name == sheet)
                .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{sheet}'")))?;
            let before = target.len();
            *target = grid::apply_plan(target, plan)?;
            debug!(
                removed_rows = before.saturating_sub(target.len()),
                "applied batch to sheet"
            );
            write_sheets(&self.path, &sheets)
        };
        apply().map_err(|err| match err {
            ToolError::StoreWrite(_) => err,
            other => ToolError::StoreWrite(other.to_string()),
        })
    }
}

/// Number format applied to date cells written back to the workbook.
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Day zero of the 1900 date system as counted by Excel serials.
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Writes `sheets` to `path`, replacing any existing file atomically.
pub fn write_sheets(path: &Path, sheets: &[(String, Grid)]) -> Result<()> {
    let mut workbook_writer = Workbook::new();
    let datetime_format = Format::new().set_num_format(DATETIME_FORMAT);

    for (name, rows) in sheets {
        let worksheet = workbook_writer.add_worksheet();
        worksheet.set_name(name)?;

        for (row_idx, row) in rows.iter().enumerate() {
            let row_idx = u32::try_from(row_idx)
                .map_err(|_| ToolError::InvalidWorkbook(format!("sheet '{name}' has too many rows")))?;
            for (col_idx, cell) in row.iter().enumerate() {
                let col_idx = u16::try_from(col_idx).map_err(|_| {
                    ToolError::InvalidWorkbook(format!("sheet '{name}' has too many columns"))
                })?;
                match cell {
                    CellValue::Text(value) => {
                        worksheet.write_string(row_idx, col_idx, value)?;
                    }
                    CellValue::Number(value) => {
                        worksheet.write_number(row_idx, col_idx, *value)?;
                    }
                    CellValue::Boolean(value) => {
                        worksheet.write_boolean(row_idx, col_idx, *value)?;
                    }
                    CellValue::DateTime(value) => {
                        worksheet.write_datetime_with_format(
                            row_idx,
                            col_idx,
                            value,
                            &datetime_format,
                        )?;
                    }
                    CellValue::Error(code) => {
                        let formula = Formula::new(format!("={code}")).set_result(code.as_str());
                        worksheet.write_formula(row_idx, col_idx, formula)?;
                    }
                    CellValue::Empty => {}
                }
            }
        }
    }

    let buffer = workbook_writer.save_to_buffer()?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(directory)?;
    staged.write_all(&buffer)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|err| ToolError::Io(err.error))?;
    Ok(())
}

fn read_sheet<R: std::io::Read + std::io::Seek>(workbook: &mut Xlsx<R>, name: &str) -> Result<Grid> {
    let range = workbook
        .worksheet_range(name)
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{name}'")))??;

    let Some((start_row, start_col)) = range.start() else {
        return Ok(Grid::new());
    };

    let mut rows: Grid = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; start_col as usize];
        cells.extend(row.iter().map(cell_to_value));
        rows.push(cells);
    }
    Ok(rows)
}

fn cell_to_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Float(value) => CellValue::Number(*value),
        DataType::Int(value) => CellValue::Number(*value as f64),
        DataType::Bool(value) => CellValue::Boolean(*value),
        DataType::DateTime(serial) => serial_to_datetime(*serial)
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Number(*serial)),
        DataType::DateTimeIso(value) => value
            .parse::<NaiveDateTime>()
            .map(CellValue::DateTime)
            .unwrap_or_else(|_| CellValue::Text(value.clone())),
        DataType::Error(code) => CellValue::Error(code.to_string()),
        DataType::Empty => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}

/// Converts an Excel serial date (days since 1899-12-30, fraction = time of
/// day) to a timestamp rounded to the millisecond.
fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let (year, month, day) = SERIAL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round();
    if millis > i64::MAX as f64 {
        return None;
    }
    epoch.checked_add_signed(Duration::milliseconds(millis as i64))
}
