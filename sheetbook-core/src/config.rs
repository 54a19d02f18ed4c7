//! Configuration for the document model and codecs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::address::MAX_COLUMNS;

/// Upper bound for a single row repeat count; the table's own row cap still applies
pub const REPEAT_ROWS_LIMIT: u32 = 1_000_000;

/// How writes into the non-anchor cells of a merged region are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Silently redirect to the region's anchor cell
    #[default]
    Redirect,
    /// Fail with [`SheetError::MergeCell`](crate::SheetError::MergeCell)
    Strict,
}

/// Main codec configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodecConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub sheets: HashMap<String, SheetConfig>,
}

impl CodecConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: CodecConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges
    pub fn validate(&self) -> Result<()> {
        if self.global.max_repeated_rows == 0 || self.global.max_repeated_rows > REPEAT_ROWS_LIMIT {
            anyhow::bail!(
                "Configuration error: max_repeated_rows must be between 1 and {}",
                REPEAT_ROWS_LIMIT
            );
        }
        if self.global.max_repeated_columns == 0 || self.global.max_repeated_columns > MAX_COLUMNS
        {
            anyhow::bail!(
                "Configuration error: max_repeated_columns must be between 1 and {}",
                MAX_COLUMNS
            );
        }

        let prefix = &self.global.style_id_prefix;
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
            anyhow::bail!(
                "Configuration error: style_id_prefix '{}' must be non-empty ASCII letters",
                prefix
            );
        }
        if prefix == "Default" {
            anyhow::bail!("Configuration error: style_id_prefix may not be 'Default'");
        }

        Ok(())
    }

    /// Merge policy with fallback chain: sheet -> global
    pub fn merge_policy_for(&self, sheet_name: &str) -> MergePolicy {
        self.sheets
            .get(sheet_name)
            .and_then(|sheet| sheet.merge_policy)
            .unwrap_or(self.global.merge_policy)
    }
}

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub merge_policy: MergePolicy,
    /// Cap on `table:number-rows-repeated` expansion for rows that carry content
    #[serde(default = "default_max_repeated_rows")]
    pub max_repeated_rows: u32,
    /// Cap on `table:number-columns-repeated` expansion for cells and columns
    #[serde(default = "default_max_repeated_columns")]
    pub max_repeated_columns: u32,
    /// Prefix for generated style IDs (`s1`, `s2`, ...)
    #[serde(default = "default_style_id_prefix")]
    pub style_id_prefix: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            merge_policy: MergePolicy::default(),
            max_repeated_rows: default_max_repeated_rows(),
            max_repeated_columns: default_max_repeated_columns(),
            style_id_prefix: default_style_id_prefix(),
        }
    }
}

fn default_max_repeated_rows() -> u32 {
    REPEAT_ROWS_LIMIT
}

fn default_max_repeated_columns() -> u32 {
    100
}

fn default_style_id_prefix() -> String {
    "s".to_string()
}

/// Sheet-specific configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetConfig {
    #[serde(default)]
    pub merge_policy: Option<MergePolicy>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CodecConfig::default();
        assert_eq!(config.global.merge_policy, MergePolicy::Redirect);
        assert_eq!(config.global.max_repeated_columns, 100);
        assert_eq!(config.global.style_id_prefix, "s");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_with_sheet_override() {
        let config: CodecConfig = toml::from_str(
            r#"
            [global]
            merge_policy = "redirect"
            max_repeated_columns = 50

            [sheets."Locked Sheet"]
            merge_policy = "strict"
            "#,
        )
        .unwrap();

        assert_eq!(config.global.max_repeated_columns, 50);
        assert_eq!(config.global.max_repeated_rows, REPEAT_ROWS_LIMIT);
        assert_eq!(config.merge_policy_for("Locked Sheet"), MergePolicy::Strict);
        assert_eq!(config.merge_policy_for("Other"), MergePolicy::Redirect);
    }

    #[test]
    fn test_validation() {
        let config = CodecConfig::default();
        assert!(config.validate().is_ok());

        let mut bad_config = config.clone();
        bad_config.global.max_repeated_columns = 0;
        assert!(bad_config.validate().is_err());

        let mut bad_config = config.clone();
        bad_config.global.max_repeated_rows = REPEAT_ROWS_LIMIT + 1;
        assert!(bad_config.validate().is_err());

        let mut bad_config = config.clone();
        bad_config.global.style_id_prefix = "s-".to_string();
        assert!(bad_config.validate().is_err());

        let mut bad_config = config;
        bad_config.global.style_id_prefix = "Default".to_string();
        assert!(bad_config.validate().is_err());
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let parsed: std::result::Result<CodecConfig, _> = toml::from_str(
            r#"
            [global]
            merge_policy = "sometimes"
            "#,
        );
        assert!(parsed.is_err());
    }
}
