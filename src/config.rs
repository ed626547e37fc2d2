//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.opxdiag.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Collection settings.
    #[serde(default)]
    pub collect: CollectConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory the bundle is written into.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Exit non-zero when any collection step failed or alerted.
    #[serde(default)]
    pub strict: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            verbose: false,
            strict: false,
        }
    }
}

fn default_output_dir() -> String {
    ".".to_string()
}

/// Collection execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Fallback timeout in seconds for commands registered without one.
    /// Unset leaves those commands unbounded, matching plugin intent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timeout: Option<u64>,

    /// Cap on captured bytes per command.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Render a progress bar during collection.
    #[serde(default = "default_true")]
    pub progress: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            command_timeout: None,
            max_output_bytes: default_max_output_bytes(),
            progress: true,
        }
    }
}

fn default_max_output_bytes() -> usize {
    10 * 1024 * 1024 // 10MB per command capture
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Human report format: "markdown" or "json".
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    "markdown".to_string()
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
        let default_path = Path::new(".opxdiag.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
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
            self.general.output_dir = output.display().to_string();
        }

        if let Some(timeout) = args.cmd_timeout {
            self.collect.command_timeout = Some(timeout);
        }

        if let Some(format) = args.format {
            self.report.format = format.config_name().to_string();
        }

        if args.no_progress {
            self.collect.progress = false;
        }

        // Flags always override when set
        if args.verbose {
            self.general.verbose = true;
        }
        if args.strict {
            self.general.strict = true;
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

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output_dir, ".");
        assert_eq!(config.collect.command_timeout, None);
        assert!(config.collect.progress);
        assert_eq!(config.report.format, "markdown");
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output_dir = "/var/tmp"
strict = true

[collect]
command_timeout = 300
max_output_bytes = 1048576

[report]
format = "json"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output_dir, "/var/tmp");
        assert!(config.general.strict);
        assert_eq!(config.collect.command_timeout, Some(300));
        assert_eq!(config.collect.max_output_bytes, 1048576);
        assert_eq!(config.report.format, "json");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("[general]\nverbose = true\n").unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.general.output_dir, ".");
        assert_eq!(config.collect.max_output_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[collect]"));
        assert!(toml_str.contains("[report]"));
    }
}
