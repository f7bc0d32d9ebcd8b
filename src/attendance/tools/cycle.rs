//! One reconciliation cycle: read, parse, aggregate, synchronise, plan, write.
//!
//! Nothing survives between cycles. Every call starts from a fresh read of
//! the store, so a failed cycle is retried by simply running the next one.

use std::fmt::Write as _;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::attendance::tools::aggregate::aggregate;
use crate::attendance::tools::config::EngineConfig;
use crate::attendance::tools::error::{ParseRejection, Result, ToolError};
use crate::attendance::tools::io::{
    MembershipDirectory, MembershipMutator, RangeSpec, TableReader, TableWriter,
};
use crate::attendance::tools::membership::{self, SyncReport};
use crate::attendance::tools::model::{AttendanceRecord, CorrectedTotal, WritePlan};
use crate::attendance::tools::parse::parse_rows;
use crate::attendance::tools::plan::plan;

/// What happened to the membership step of a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MembershipOutcome {
    Synced(SyncReport),
    /// The member listing failed; no grants were attempted.
    Skipped { reason: String },
}

/// Summary of a completed cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub rows_read: usize,
    pub records: usize,
    pub rejected: usize,
    pub identities: usize,
    /// Cell writes submitted in the batch, dedup directive excluded.
    pub writes: usize,
    pub membership: MembershipOutcome,
}

/// Result of a dry run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub totals: CorrectedTotal,
    pub plan: WritePlan,
    pub rejections: Vec<(usize, String)>,
}

/// Reconciliation engine bound to one group, role and sheet.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
}

struct Computation {
    rows_read: usize,
    records: Vec<AttendanceRecord>,
    rejections: Vec<(usize, ParseRejection)>,
    totals: CorrectedTotal,
    plan: WritePlan,
}

impl Engine {
    /// Creates an engine for an already validated configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Settings the engine runs with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Data range of the response sheet.
    pub fn range(&self) -> RangeSpec {
        RangeSpec {
            sheet: self.config.sheet.clone(),
            start_row: self.config.layout.header_rows,
            width: self.config.layout.width,
        }
    }

    /// Runs one full cycle.
    ///
    /// A read or batch write failure aborts the cycle with an error. A failed
    /// member listing only skips the membership step. Grants happen before
    /// the batch write; the two touch different systems, so the order has no
    /// bearing on the outcome.
    #[instrument(level = "info", skip_all, fields(sheet = %self.config.sheet, group = %self.config.group_id))]
    pub fn run_cycle<S, D>(&self, store: &mut S, directory: &mut D, now: NaiveDateTime) -> Result<CycleReport>
    where
        S: TableReader + TableWriter + ?Sized,
        D: MembershipDirectory + MembershipMutator + ?Sized,
    {
        let computation = self.compute(&*store, now)?;

        let membership = match directory.list_members(&self.config.group_id) {
            Ok(members) => {
                debug!(member_count = members.len(), "listed group members");
                MembershipOutcome::Synced(membership::sync(
                    directory,
                    &self.config.group_id,
                    &self.config.role_id,
                    &computation.records,
                    &members,
                ))
            }
            Err(err) => {
                warn!(error = %err, "skipping membership synchronisation");
                MembershipOutcome::Skipped {
                    reason: err.to_string(),
                }
            }
        };

        store.batch_update(&self.config.sheet, &computation.plan)?;
        info!(
            writes = computation.plan.operations.len(),
            corrected_rows = computation.plan.corrected_rows(),
            "attendance table updated"
        );

        Ok(CycleReport {
            rows_read: computation.rows_read,
            records: computation.records.len(),
            rejected: computation.rejections.len(),
            identities: computation.totals.len(),
            writes: computation.plan.operations.len(),
            membership,
        })
    }

    /// Computes the cycle's totals and write plan without touching either
    /// external system.
    #[instrument(level = "info", skip_all, fields(sheet = %self.config.sheet))]
    pub fn preview<S: TableReader + ?Sized>(&self, store: &S, now: NaiveDateTime) -> Result<Preview> {
        let computation = self.compute(store, now)?;
        Ok(Preview {
            totals: computation.totals,
            plan: computation.plan,
            rejections: computation
                .rejections
                .into_iter()
                .map(|(index, rejection)| (index, rejection.to_string()))
                .collect(),
        })
    }

    /// Members that would receive the role if a cycle ran now.
    pub fn pending_grants<S, D>(&self, store: &S, directory: &D) -> Result<Vec<String>>
    where
        S: TableReader + ?Sized,
        D: MembershipDirectory + ?Sized,
    {
        let rows = store.read_range(&self.range())?;
        let parsed = parse_rows(&rows, &self.config.timestamp_format);
        let members = directory.list_members(&self.config.group_id)?;
        Ok(
            membership::pending_grants(&parsed.records, &members, &self.config.role_id)
                .into_iter()
                .map(|member| member.id.clone())
                .collect(),
        )
    }

    fn compute<S: TableReader + ?Sized>(&self, store: &S, now: NaiveDateTime) -> Result<Computation> {
        let rows = store.read_range(&self.range())?;
        info!(row_count = rows.len(), "read attendance rows");

        let parsed = parse_rows(&rows, &self.config.timestamp_format);
        for (index, rejection) in &parsed.rejections {
            match rejection {
                ParseRejection::EmptyRow => debug!(row = index, "skipping empty row"),
                other => warn!(row = index, reason = %other, "skipping unparsable row"),
            }
        }

        let totals = aggregate(&parsed.records);
        let mut corrected_at = String::new();
        write!(corrected_at, "{}", now.format(&self.config.timestamp_format)).map_err(|_| {
            ToolError::InvalidConfig(format!(
                "timestamp format '{}' cannot render timestamps",
                self.config.timestamp_format
            ))
        })?;
        let plan = plan(&parsed.records, &totals, &self.config.layout, &corrected_at);
        debug!(
            records = parsed.records.len(),
            identities = totals.len(),
            writes = plan.operations.len(),
            "computed corrections"
        );

        Ok(Computation {
            rows_read: rows.len(),
            records: parsed.records,
            rejections: parsed.rejections,
            totals,
            plan,
        })
    }
}
