use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::instrument;

use crate::attendance::tools::error::{Result, ToolError};
use crate::attendance::tools::io::{MembershipDirectory, MembershipMutator};
use crate::attendance::tools::model::MemberInfo;

/// On-disk layout of the member directory.
///
/// ```json
/// { "groups": { "<group id>": [ { "id": "...", "handle": "...", "roles": [] } ] } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryDocument {
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<MemberInfo>>,
}

/// Membership system backed by a JSON file.
#[derive(Debug, Clone)]
pub struct DirectoryFile {
    path: PathBuf,
}

impl DirectoryFile {
    /// Creates a directory backed by the JSON file at `path`. The file is
    /// read on every listing and grant.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and decodes the whole directory.
    pub fn load(&self) -> Result<DirectoryDocument> {
        let data = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Replaces the file contents atomically. The staged copy is flushed to
    /// disk before it is renamed over the original.
    pub fn store(&self, document: &DirectoryDocument) -> Result<()> {
        let json = serde_json::to_string_pretty(document)?;
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(directory)?;
        staged.write_all(json.as_bytes())?;
        staged.as_file().sync_all()?;
        staged
            .persist(&self.path)
            .map_err(|err| ToolError::Io(err.error))?;
        Ok(())
    }
}

impl MembershipDirectory for DirectoryFile {
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    fn list_members(&self, group_id: &str) -> Result<Vec<MemberInfo>> {
        let document = self.load().map_err(|err| ToolError::MembershipRead {
            group: group_id.to_string(),
            reason: err.to_string(),
        })?;
        document
            .groups
            .get(group_id)
            .cloned()
            .ok_or_else(|| ToolError::MembershipRead {
                group: group_id.to_string(),
                reason: "unknown group".to_string(),
            })
    }
}

impl MembershipMutator for DirectoryFile {
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    fn grant_role(&mut self, group_id: &str, member_id: &str, role_id: &str) -> Result<()> {
        let grant_error = |reason: String| ToolError::RoleGrant {
            member: member_id.to_string(),
            reason,
        };

        let mut document = self.load().map_err(|err| grant_error(err.to_string()))?;
        let member = document
            .groups
            .get_mut(group_id)
            .and_then(|members| members.iter_mut().find(|member| member.id == member_id))
            .ok_or_else(|| grant_error(format!("not a member of group {group_id}")))?;

        if member.roles.insert(role_id.to_string()) {
            self.store(&document)
                .map_err(|err| grant_error(err.to_string()))?;
        }
        Ok(())
    }
}
