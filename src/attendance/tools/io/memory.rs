use std::collections::{BTreeMap, BTreeSet};

use crate::attendance::tools::error::{Result, ToolError};
use crate::attendance::tools::io::grid::{self, Grid};
use crate::attendance::tools::io::{
    MembershipDirectory, MembershipMutator, RangeSpec, TableReader, TableWriter,
};
use crate::attendance::tools::model::{CellValue, MemberInfo, WritePlan};

/// In-process tabular store with failure injection.
#[derive(Debug, Default, Clone)]
pub struct MemoryTable {
    sheets: BTreeMap<String, Grid>,
    fail_reads: bool,
    fail_writes: bool,
    batches_applied: usize,
}

impl MemoryTable {
    /// Creates a store holding one sheet.
    pub fn with_sheet(name: impl Into<String>, rows: Grid) -> Self {
        let mut table = Self::default();
        table.sheets.insert(name.into(), rows);
        table
    }

    /// Current contents of `name`.
    pub fn sheet(&self, name: &str) -> Option<&Grid> {
        self.sheets.get(name)
    }

    /// Appends a row to `sheet`, creating the sheet when missing.
    pub fn push_row(&mut self, sheet: &str, row: Vec<CellValue>) {
        self.sheets.entry(sheet.to_string()).or_default().push(row);
    }

    /// Makes `read_range` fail.
    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// Makes `batch_update` fail before touching any sheet.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Number of batches that were applied successfully.
    pub fn batches_applied(&self) -> usize {
        self.batches_applied
    }
}

impl TableReader for MemoryTable {
    fn read_range(&self, range: &RangeSpec) -> Result<Vec<Vec<CellValue>>> {
        if self.fail_reads {
            return Err(ToolError::StoreRead("injected read failure".to_string()));
        }
        let sheet = self
            .sheets
            .get(&range.sheet)
            .ok_or_else(|| ToolError::StoreRead(format!("unknown sheet '{}'", range.sheet)))?;
        Ok(grid::read_window(sheet, range))
    }
}

impl TableWriter for MemoryTable {
    fn batch_update(&mut self, sheet: &str, plan: &WritePlan) -> Result<()> {
        if self.fail_writes {
            return Err(ToolError::StoreWrite("injected write failure".to_string()));
        }
        let current = self
            .sheets
            .get(sheet)
            .ok_or_else(|| ToolError::StoreWrite(format!("unknown sheet '{sheet}'")))?;
        let next = grid::apply_plan(current, plan)?;
        self.sheets.insert(sheet.to_string(), next);
        self.batches_applied += 1;
        Ok(())
    }
}

/// Role grant recorded by [`MemoryDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub group_id: String,
    pub member_id: String,
    pub role_id: String,
}

/// In-process membership system with failure injection.
#[derive(Debug, Default, Clone)]
pub struct MemoryDirectory {
    groups: BTreeMap<String, Vec<MemberInfo>>,
    unavailable: bool,
    failing_members: BTreeSet<String>,
    grants: Vec<Grant>,
}

impl MemoryDirectory {
    /// Creates a directory holding one group.
    pub fn with_group(group_id: impl Into<String>, members: Vec<MemberInfo>) -> Self {
        let mut directory = Self::default();
        directory.groups.insert(group_id.into(), members);
        directory
    }

    /// Members of `group_id`, empty for an unknown group.
    pub fn members(&self, group_id: &str) -> &[MemberInfo] {
        self.groups.get(group_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Looks up one member by id.
    pub fn member(&self, group_id: &str, member_id: &str) -> Option<&MemberInfo> {
        self.members(group_id)
            .iter()
            .find(|member| member.id == member_id)
    }

    /// Makes `list_members` fail.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Makes every grant for `member_id` fail.
    pub fn fail_grants_for(&mut self, member_id: impl Into<String>) {
        self.failing_members.insert(member_id.into());
    }

    /// Successful grants in the order they were made.
    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }
}

impl MembershipDirectory for MemoryDirectory {
    fn list_members(&self, group_id: &str) -> Result<Vec<MemberInfo>> {
        if self.unavailable {
            return Err(ToolError::MembershipRead {
                group: group_id.to_string(),
                reason: "injected listing failure".to_string(),
            });
        }
        Ok(self.members(group_id).to_vec())
    }
}

impl MembershipMutator for MemoryDirectory {
    fn grant_role(&mut self, group_id: &str, member_id: &str, role_id: &str) -> Result<()> {
        if self.failing_members.contains(member_id) {
            return Err(ToolError::RoleGrant {
                member: member_id.to_string(),
                reason: "injected grant failure".to_string(),
            });
        }
        let member = self
            .groups
            .get_mut(group_id)
            .and_then(|members| members.iter_mut().find(|member| member.id == member_id))
            .ok_or_else(|| ToolError::RoleGrant {
                member: member_id.to_string(),
                reason: format!("not a member of group {group_id}"),
            })?;
        member.roles.insert(role_id.to_string());
        self.grants.push(Grant {
            group_id: group_id.to_string(),
            member_id: member_id.to_string(),
            role_id: role_id.to_string(),
        });
        Ok(())
    }
}
