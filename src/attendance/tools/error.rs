use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the failure cases of a reconciliation cycle and the
/// adapters it drives.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised when the configuration file is not valid TOML for [`Config`](crate::config::Config).
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Raised when a parsed configuration violates a constraint.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a sheet does not follow the expected conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// The tabular store could not be read. Fatal to the cycle.
    #[error("unable to read attendance table: {0}")]
    StoreRead(String),

    /// The batch update was rejected. Nothing from the batch was applied.
    #[error("unable to update attendance table: {0}")]
    StoreWrite(String),

    /// The member listing failed; only the membership step is skipped.
    #[error("unable to list members of group {group}: {reason}")]
    MembershipRead { group: String, reason: String },

    /// A single role grant failed.
    #[error("unable to grant role to member {member}: {reason}")]
    RoleGrant { member: String, reason: String },

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

/// Reason a raw row was excluded from the cycle's record set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseRejection {
    /// Every cell in the row was blank.
    #[error("row is empty")]
    EmptyRow,

    #[error("expected at least {expected} non-blank fields, found {found}")]
    InsufficientFields { expected: usize, found: usize },

    #[error("attendance value '{0}' is not a non-negative integer")]
    InvalidAttendanceValue(String),

    #[error("timestamp '{0}' does not match the configured format")]
    InvalidTimestamp(String),
}
