use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::filter::{CATEGORICAL_THRESHOLD, FilterBuilder};
use crate::data::loader::{DEFAULT_SQL_TABLE, IngestOptions};

pub const CONFIG_FILE: &str = "rusty-sift.json";
pub const CONFIG_PATH_VAR: &str = "RUSTY_SIFT_CONFIG";
pub const ORG_VAR: &str = "RUSTY_SIFT_ORG";
pub const SQL_TABLE_VAR: &str = "RUSTY_SIFT_SQL_TABLE";

// ---------------------------------------------------------------------------
// Application configuration
// ---------------------------------------------------------------------------

/// Settings read at startup: defaults, then an optional JSON file, then env vars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Substring the `DOMAIN\user` identity must contain to see the pages.
    pub org_substring: String,
    /// Table read back from uploaded SQL scripts.
    pub sql_table_name: String,
    /// Columns with fewer distinct values are filtered with a multi-select.
    pub categorical_threshold: usize,
    pub window_size: [f32; 2],
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            org_substring: "pwcglb".to_string(),
            sql_table_name: DEFAULT_SQL_TABLE.to_string(),
            categorical_threshold: CATEGORICAL_THRESHOLD,
            window_size: [1200.0, 800.0],
        }
    }
}

impl AppConfig {
    /// Load the config, falling back to defaults when the file is unusable.
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE));

        let mut config = if path.exists() {
            match Self::from_file(&path) {
                Ok(c) => {
                    log::info!("Loaded config from {}", path.display());
                    c
                }
                Err(e) => {
                    log::warn!("Ignoring config {}: {e:#}", path.display());
                    AppConfig::default()
                }
            }
        } else {
            AppConfig::default()
        };
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).context("reading config file")?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing config JSON")
    }

    /// Override fields from environment variables, looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(org) = var(ORG_VAR).filter(|v| !v.is_empty()) {
            self.org_substring = org;
        }
        if let Some(table) = var(SQL_TABLE_VAR).filter(|v| !v.is_empty()) {
            self.sql_table_name = table;
        }
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            sql_table_name: self.sql_table_name.clone(),
        }
    }

    pub fn filter_builder(&self) -> FilterBuilder {
        FilterBuilder {
            categorical_threshold: self.categorical_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = AppConfig::from_json(r#"{ "sql_table_name": "orders" }"#).unwrap();
        assert_eq!(config.sql_table_name, "orders");
        assert_eq!(config.org_substring, "pwcglb");
        assert_eq!(config.categorical_threshold, 10);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(AppConfig::from_json("{ not json").is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = AppConfig::default();
        config.apply_env(|name| match name {
            ORG_VAR => Some("contoso".to_string()),
            SQL_TABLE_VAR => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.org_substring, "contoso");
        assert_eq!(config.sql_table_name, DEFAULT_SQL_TABLE);
        assert_eq!(config.ingest_options().sql_table_name, DEFAULT_SQL_TABLE);
    }
}
