//! Tool configuration
//!
//! Every field has a default matching the standard CPW package, so a
//! config file only needs the values that differ. Lookup order:
//! `--config`, then `$CPW_CONFIG`, then `~/.config/cpw-tool/config.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

pub const CONFIG_ENV: &str = "CPW_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpwConfig {
    /// Sheet protection password used on every protected sheet
    pub passphrase: String,
    pub folders: FolderConfig,
    pub gba: GbaConfig,
    pub team: TeamConfig,
    pub visibility: VisibilityConfig,
}

/// Folder whose position in a path anchors the package root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorConfig {
    pub name: String,
    /// Characters dropped from the end of the path prefix ending in `name`
    pub trim: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderConfig {
    pub data_processing: AnchorConfig,
    pub gba_workbooks: AnchorConfig,
    pub department_workbooks: String,
    pub old_pfp: String,
    pub new_pfp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbaConfig {
    pub template: String,
    pub sheet: String,
    pub resource_sheet: String,
    /// Template rows at and above this are kept when creating a workbook
    pub clear_from_row: u32,
    /// Fixed block cleared on creation, rows `clear_from_row..=clear_rows`
    pub clear_rows: u32,
    pub clear_cols: u32,
    /// `chrono` format of the write date column
    pub date_format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamConfig {
    pub template: String,
    /// Sheet of the GBA workbook the team export reads
    pub source_sheet: String,
    pub sheet: String,
    /// Column scanned for the first empty row
    pub anchor_column: u32,
    pub first_row: u32,
    pub search_limit: u32,
    /// First column written (B)
    pub first_col: u32,
}

/// One sheet handled by the week visibility pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityTarget {
    pub sheet: String,
    /// Named table whose headers are scanned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Header row/column span scanned when no table is named
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_span: Option<HeaderSpan>,
    /// Inclusive locked column span re-applied before protecting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_columns: Option<(u32, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSpan {
    pub row: u32,
    pub first_col: u32,
    pub last_col: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    pub targets: Vec<VisibilityTarget>,
}

impl Default for CpwConfig {
    fn default() -> Self {
        Self {
            passphrase: "1234".to_string(),
            folders: FolderConfig::default(),
            gba: GbaConfig::default(),
            team: TeamConfig::default(),
            visibility: VisibilityConfig::default(),
        }
    }
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            data_processing: AnchorConfig {
                name: "01 Data Processing".to_string(),
                trim: 19,
            },
            gba_workbooks: AnchorConfig {
                name: "02 GBA Workbooks".to_string(),
                trim: 17,
            },
            department_workbooks: "03 Department Workbooks".to_string(),
            old_pfp: "OLD PFP".to_string(),
            new_pfp: "NEW PFP".to_string(),
        }
    }
}

impl Default for GbaConfig {
    fn default() -> Self {
        Self {
            template: "CPW GBA Specific Template.xlsm".to_string(),
            sheet: "Project Plan Analysis".to_string(),
            resource_sheet: "Resource List".to_string(),
            clear_from_row: 3,
            clear_rows: 50_000,
            clear_cols: 20,
            date_format: "%d-%b-%Y".to_string(),
        }
    }
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            template: "CPW Team Specific Template.xlsm".to_string(),
            source_sheet: "Project Plan Analysis".to_string(),
            sheet: "Oracle".to_string(),
            anchor_column: 5,
            first_row: 5,
            search_limit: 5000,
            first_col: 2,
        }
    }
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        let table = |sheet: &str, table: &str| VisibilityTarget {
            sheet: sheet.to_string(),
            table: Some(table.to_string()),
            header_span: None,
            locked_columns: None,
        };

        Self {
            targets: vec![
                VisibilityTarget {
                    locked_columns: Some((1, 27)),
                    ..table("Oracle", "ProjectRaw6")
                },
                table("Opportunity | Leaves | Others", "ProjectRaw6312"),
                table("Summary Table", "Combined"),
                VisibilityTarget {
                    sheet: "Capacity Forecast %".to_string(),
                    table: None,
                    header_span: Some(HeaderSpan {
                        row: 1,
                        first_col: 1,
                        last_col: 100,
                    }),
                    locked_columns: None,
                },
            ],
        }
    }
}

impl CpwConfig {
    /// Resolve and load the config; missing default location means defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.trim().is_empty() {
                return Self::load_from(Path::new(path.trim()));
            }
        }

        match default_config_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: CpwConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.team.first_row == 0 || self.team.anchor_column == 0 || self.team.first_col == 0 {
            anyhow::bail!("team rows and columns are 1-based and must be at least 1");
        }
        if self.gba.clear_from_row < 2 {
            anyhow::bail!("gba.clear_from_row must keep the header row");
        }
        if StrftimeItems::new(&self.gba.date_format).any(|item| matches!(item, Item::Error)) {
            anyhow::bail!("gba.date_format '{}' is not a valid date format", self.gba.date_format);
        }
        for target in &self.visibility.targets {
            if target.table.is_some() == target.header_span.is_some() {
                anyhow::bail!(
                    "visibility target '{}' needs exactly one of `table` or `header_span`",
                    target.sheet
                );
            }
        }
        Ok(())
    }
}

/// `<config dir>/cpw-tool/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cpw-tool").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(CpwConfig::parse("").unwrap(), CpwConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = CpwConfig::parse(
            r#"
passphrase = "secret"

[team]
search_limit = 200

[folders.gba_workbooks]
name = "GBA"
trim = 4
"#,
        )
        .unwrap();

        assert_eq!(config.passphrase, "secret");
        assert_eq!(config.team.search_limit, 200);
        assert_eq!(config.team.first_row, 5);
        assert_eq!(config.folders.gba_workbooks.trim, 4);
        assert_eq!(config.folders.data_processing.name, "01 Data Processing");
    }

    #[test]
    fn test_default_visibility_targets() {
        let targets = CpwConfig::default().visibility.targets;
        assert_eq!(targets.len(), 4);
        assert_eq!(targets[0].sheet, "Oracle");
        assert_eq!(targets[0].locked_columns, Some((1, 27)));
        assert!(targets[1..].iter().all(|t| t.locked_columns.is_none()));
        assert_eq!(targets[3].header_span.map(|s| s.last_col), Some(100));
    }

    #[test]
    fn test_target_needs_one_scope() {
        let result = CpwConfig::parse(
            r#"
[[visibility.targets]]
sheet = "Oracle"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_bad_date_format() {
        assert!(CpwConfig::parse("[gba]\ndate_format = \"%Q\"\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gba]\nclear_rows = 10\n").unwrap();

        let config = CpwConfig::load(Some(&path)).unwrap();
        assert_eq!(config.gba.clear_rows, 10);
        assert!(CpwConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
