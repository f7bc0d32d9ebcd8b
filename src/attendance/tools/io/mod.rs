//! Capability interfaces for the tabular store and the membership system,
//! plus the adapters that implement them.
//!
//! The engine only sees the traits below. [`workbook`] and [`directory`]
//! back them with local files, [`memory`] keeps everything in process for
//! tests and dry runs.

pub mod directory;
pub mod grid;
pub mod memory;
pub mod workbook;

use crate::attendance::tools::error::Result;
use crate::attendance::tools::model::{CellValue, MemberInfo, WritePlan};

/// Rectangular data range of one sheet, header excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSpec {
    pub sheet: String,
    /// First absolute row of the data range.
    pub start_row: usize,
    /// Number of columns returned per row, starting at column 0.
    pub width: usize,
}

/// Reads rows from the tabular store.
pub trait TableReader {
    /// Returns the rows of `range` in physical order. Row `i` of the result
    /// is absolute row `range.start_row + i`.
    fn read_range(&self, range: &RangeSpec) -> Result<Vec<Vec<CellValue>>>;
}

/// Applies write batches to the tabular store.
pub trait TableWriter {
    /// Applies every operation of `plan`, then its dedup directive, to
    /// `sheet`. Either the whole batch lands or none of it does.
    fn batch_update(&mut self, sheet: &str, plan: &WritePlan) -> Result<()>;
}

/// Lists the members of a group.
pub trait MembershipDirectory {
    fn list_members(&self, group_id: &str) -> Result<Vec<MemberInfo>>;
}

/// Grants roles to members.
pub trait MembershipMutator {
    fn grant_role(&mut self, group_id: &str, member_id: &str, role_id: &str) -> Result<()>;
}
