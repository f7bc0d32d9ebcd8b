//! Configuration for the reconciliation engine and its adapters.
//!
//! Identifiers that used to be process-wide literals (group, role, sheet,
//! column layout) live here so that one binary can serve several groups and
//! tests can run the engine against fakes.

use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::attendance::tools::error::{Result, ToolError};

/// Default submission timestamp format: `D/M/YYYY HH:MM:SS`, no padding
/// required on the date parts.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%-d/%-m/%Y %H:%M:%S";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub store: StoreConfig,
    pub membership: MembershipConfig,
}

impl Config {
    /// Loads and validates configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()
    }
}

/// Settings consumed by [`Engine`](crate::cycle::Engine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sheet holding the attendance responses.
    pub sheet: String,
    /// Group whose members receive the role.
    pub group_id: String,
    /// Role granted to every member with recorded attendance.
    pub role_id: String,
    /// Seconds between two cycles.
    pub interval_secs: u64,
    /// `chrono` format used to parse submissions and render correction times.
    pub timestamp_format: String,
    pub layout: LayoutConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sheet: "Form Responses 1".to_string(),
            group_id: String::new(),
            role_id: String::new(),
            interval_secs: 60,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            layout: LayoutConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sheet.trim().is_empty() {
            return Err(invalid("engine.sheet must not be empty"));
        }
        if self.group_id.trim().is_empty() {
            return Err(invalid("engine.group_id must not be empty"));
        }
        if self.role_id.trim().is_empty() {
            return Err(invalid("engine.role_id must not be empty"));
        }
        if self.interval_secs == 0 {
            return Err(invalid("engine.interval_secs must be greater than zero"));
        }
        if self.timestamp_format.trim().is_empty()
            || StrftimeItems::new(&self.timestamp_format).any(|item| matches!(item, Item::Error))
        {
            return Err(invalid(&format!(
                "engine.timestamp_format '{}' is not a valid chrono format",
                self.timestamp_format
            )));
        }
        self.layout.validate()
    }
}

/// Physical column layout of the response sheet.
///
/// Columns: timestamp, identity key, display name, membership handle,
/// attendance value, last corrected timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Rows above the data range.
    pub header_rows: usize,
    /// Number of columns read per row.
    pub width: usize,
    pub identity_column: usize,
    pub attendance_column: usize,
    pub corrected_at_column: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            header_rows: 1,
            width: 6,
            identity_column: 1,
            attendance_column: 4,
            corrected_at_column: 5,
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 {
            return Err(invalid("engine.layout.width must be greater than zero"));
        }
        for (name, column) in [
            ("identity_column", self.identity_column),
            ("attendance_column", self.attendance_column),
            ("corrected_at_column", self.corrected_at_column),
        ] {
            if column >= self.width {
                return Err(invalid(&format!(
                    "engine.layout.{name} ({column}) is outside the {} column range",
                    self.width
                )));
            }
        }
        if self.attendance_column == self.corrected_at_column {
            return Err(invalid(
                "engine.layout.attendance_column and corrected_at_column must differ",
            ));
        }
        Ok(())
    }
}

/// Local workbook backing the tabular store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub workbook: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            workbook: PathBuf::from("responses.xlsx"),
        }
    }
}

/// JSON member directory backing the membership system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembershipConfig {
    pub directory: PathBuf,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("members.json"),
        }
    }
}

fn invalid(message: &str) -> ToolError {
    ToolError::InvalidConfig(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config = Config::from_toml(
            r#"
            [engine]
            group_id = "543724459476123669"
            role_id = "1113654375135584296"
            "#,
        )
        .expect("config parsed");

        assert_eq!(config.engine.interval_secs, 60);
        assert_eq!(config.engine.timestamp_format, DEFAULT_TIMESTAMP_FORMAT);
        assert_eq!(config.engine.layout, LayoutConfig::default());
        assert_eq!(config.store.workbook, PathBuf::from("responses.xlsx"));
    }

    #[test]
    fn parses_full_config() {
        let config = Config::from_toml(
            r#"
            [engine]
            sheet = "Responses"
            group_id = "g"
            role_id = "r"
            interval_secs = 300

            [engine.layout]
            header_rows = 2
            width = 8
            attendance_column = 6
            corrected_at_column = 7

            [store]
            workbook = "/srv/attendance.xlsx"

            [membership]
            directory = "/srv/members.json"
            "#,
        )
        .expect("config parsed");

        assert_eq!(config.engine.sheet, "Responses");
        assert_eq!(config.engine.layout.header_rows, 2);
        assert_eq!(config.engine.layout.identity_column, 1);
        assert_eq!(config.engine.layout.attendance_column, 6);
        assert_eq!(config.membership.directory, PathBuf::from("/srv/members.json"));
    }

    #[test]
    fn rejects_missing_role() {
        let err = Config::from_toml("[engine]\ngroup_id = \"g\"\n").unwrap_err();
        assert!(matches!(err, ToolError::InvalidConfig(message) if message.contains("role_id")));
    }

    #[test]
    fn rejects_overlapping_write_columns() {
        let err = Config::from_toml(
            r#"
            [engine]
            group_id = "g"
            role_id = "r"

            [engine.layout]
            corrected_at_column = 4
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_malformed_timestamp_format() {
        let err = Config::from_toml(
            r#"
            [engine]
            group_id = "g"
            role_id = "r"
            timestamp_format = "%Q/%m"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidConfig(message) if message.contains("timestamp_format")));
    }

    #[test]
    fn rejects_column_outside_width() {
        let layout = LayoutConfig {
            width: 5,
            ..LayoutConfig::default()
        };
        assert!(layout.validate().is_err());
    }
}
