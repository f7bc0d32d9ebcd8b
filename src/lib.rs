//! Core library for the attendance-tools command line application.
//!
//! The library reconciles attendance submissions kept in a spreadsheet with a
//! role-based membership system. Responsibilities stay narrow and composable:
//! row parsing lives in [`attendance::tools::parse`], per-day deduplication in
//! [`attendance::tools::aggregate`], write planning in
//! [`attendance::tools::plan`], role grants in
//! [`attendance::tools::membership`], store and directory adapters under
//! [`attendance::tools::io`], and the cycle orchestration in
//! [`attendance::tools::cycle`].

pub mod attendance;

pub use attendance::tools::{
    ParseRejection, Result, ToolError, aggregate, config, cycle, error, io, membership, model,
    parse, plan,
};
