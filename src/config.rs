//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.session-insights.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working and input directories.
pub const CONFIG_FILE_NAME: &str = ".session-insights.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input sheet settings.
    #[serde(default)]
    pub input: InputConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "session_insights.md".to_string()
}

/// Where the sheets live and how their dates are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// File name of the users sheet.
    #[serde(default = "default_users_file")]
    pub users_file: String,

    /// File name of the cooking sessions sheet.
    #[serde(default = "default_sessions_file")]
    pub sessions_file: String,

    /// File name of the orders sheet.
    #[serde(default = "default_orders_file")]
    pub orders_file: String,

    /// `chrono` formats tried in order after RFC 3339.
    /// Date-only formats resolve to midnight.
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            users_file: default_users_file(),
            sessions_file: default_sessions_file(),
            orders_file: default_orders_file(),
            date_formats: default_date_formats(),
        }
    }
}

fn default_users_file() -> String {
    "UserDetails.csv".to_string()
}

fn default_sessions_file() -> String {
    "CookingSessions.csv".to_string()
}

fn default_orders_file() -> String {
    "OrderDetails.csv".to_string()
}

fn default_date_formats() -> Vec<String> {
    vec![
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M",
        "%Y-%m-%d",
        "%m/%d/%Y",
        "%d-%m-%Y",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Rows shown in the top-N sections.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Render every summary table, not only the insights.
    #[serde(default = "default_true")]
    pub include_tables: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            include_tables: true,
        }
    }
}

fn default_top_n() -> usize {
    5
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration stored next to the input sheets.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        if let Some(top) = args.top {
            self.report.top_n = top;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use std::path::PathBuf;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output, "session_insights.md");
        assert_eq!(config.input.users_file, "UserDetails.csv");
        assert_eq!(config.report.top_n, 5);
        assert!(config
            .input
            .date_formats
            .contains(&"%Y-%m-%d %H:%M:%S".to_string()));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "weekly.md"
verbose = true

[input]
orders_file = "orders_export.csv"
date_formats = ["%d.%m.%Y"]

[report]
top_n = 3
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "weekly.md");
        assert!(config.general.verbose);
        assert_eq!(config.input.orders_file, "orders_export.csv");
        assert_eq!(config.input.users_file, "UserDetails.csv");
        assert_eq!(config.input.date_formats, vec!["%d.%m.%Y"]);
        assert_eq!(config.report.top_n, 3);
        assert!(config.report.include_tables);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[input]"));
        assert!(toml_str.contains("[report]"));
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[report]\ntop_n = 2\n").unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.report.top_n, 2);

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[report\n").unwrap();
        assert!(Config::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_merge_with_args() {
        let mut config = Config::default();
        let mut args = Args::for_input(PathBuf::from("data"));
        config.merge_with_args(&args);
        assert_eq!(config.general.output, "session_insights.md");
        assert_eq!(config.report.top_n, 5);

        args.output = Some(PathBuf::from("out.json"));
        args.top = Some(10);
        args.verbose = true;
        config.merge_with_args(&args);
        assert_eq!(config.general.output, "out.json");
        assert_eq!(config.report.top_n, 10);
        assert!(config.general.verbose);
    }
}
