use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::attendance::tools::io::MembershipMutator;
use crate::attendance::tools::model::{AttendanceRecord, MemberInfo};

/// Outcome of one synchronisation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Members that received the role during this pass.
    pub granted: Vec<String>,
    /// Attending members that already held the role.
    pub already_held: usize,
    /// Members whose grant failed, with the reason.
    pub failed: Vec<(String, String)>,
    /// Attendance handles with no matching member.
    pub unmatched_handles: usize,
}

/// Members that attended at least once and do not hold `role_id` yet.
pub fn pending_grants<'a>(
    records: &[AttendanceRecord],
    members: &'a [MemberInfo],
    role_id: &str,
) -> Vec<&'a MemberInfo> {
    let handles = attending_handles(records);
    members
        .iter()
        .filter(|member| handles.contains(member.handle.as_str()) && !member.has_role(role_id))
        .collect()
}

/// Grants `role_id` to every member whose handle appears in `records`.
///
/// Roles are only ever added. A failed grant is logged and the pass moves on
/// to the next member.
pub fn sync<M: MembershipMutator + ?Sized>(
    mutator: &mut M,
    group_id: &str,
    role_id: &str,
    records: &[AttendanceRecord],
    members: &[MemberInfo],
) -> SyncReport {
    let handles = attending_handles(records);
    let mut report = SyncReport::default();

    let known: BTreeSet<&str> = members.iter().map(|member| member.handle.as_str()).collect();
    report.unmatched_handles = handles.difference(&known).count();

    for member in members {
        if !handles.contains(member.handle.as_str()) {
            continue;
        }
        if member.has_role(role_id) {
            report.already_held += 1;
            continue;
        }
        match mutator.grant_role(group_id, &member.id, role_id) {
            Ok(()) => {
                debug!(member = %member.id, handle = %member.handle, "granted role");
                report.granted.push(member.id.clone());
            }
            Err(err) => {
                warn!(member = %member.id, handle = %member.handle, error = %err, "unable to grant role");
                report.failed.push((member.id.clone(), err.to_string()));
            }
        }
    }

    info!(
        granted = report.granted.len(),
        already_held = report.already_held,
        failed = report.failed.len(),
        unmatched = report.unmatched_handles,
        "membership synchronised"
    );
    report
}

fn attending_handles(records: &[AttendanceRecord]) -> BTreeSet<&str> {
    records
        .iter()
        .map(|record| record.membership_handle.as_str())
        .collect()
}
