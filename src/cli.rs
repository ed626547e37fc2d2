//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// opxdiag - diagnostic bundle collector for OPX switch platforms
///
/// Runs the registered diagnostic plugins and gathers their command
/// output captures, file copies, and alerts into a bundle directory
/// for support and troubleshooting.
///
/// Examples:
///   opxdiag
///   opxdiag --output /var/tmp --label pre-upgrade
///   opxdiag --profile networking --dry-run
///   opxdiag --list-plugins
///   opxdiag --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directory the bundle is written into
    ///
    /// The bundle itself is a timestamped directory under this path.
    /// Can also be set via OPXDIAG_OUTPUT or .opxdiag.toml.
    #[arg(short, long, value_name = "DIR", env = "OPXDIAG_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Label appended to the bundle directory name
    ///
    /// Example: --label pre-upgrade
    #[arg(short, long, value_name = "NAME")]
    pub label: Option<String>,

    /// Only run plugins belonging to this profile
    ///
    /// Example: --profile networking
    #[arg(short, long, value_name = "PROFILE")]
    pub profile: Option<String>,

    /// Only run the named plugins (comma-separated)
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub only: Option<Vec<String>>,

    /// Skip the named plugins (comma-separated)
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub skip: Option<Vec<String>>,

    /// List the available plugins and exit
    #[arg(long)]
    pub list_plugins: bool,

    /// Dry run: show what would be collected without executing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Fallback timeout in seconds for commands registered without one
    ///
    /// Commands that register their own timeout keep it.
    #[arg(long, value_name = "SECS")]
    pub cmd_timeout: Option<u64>,

    /// Human report format written into the bundle (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .opxdiag.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Generate a default .opxdiag.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Exit with code 2 when any step failed, timed out, or alerted
    #[arg(long)]
    pub strict: bool,

    /// Disable the collection progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Human report format written into the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Name used for this format in `.opxdiag.toml`.
    pub fn config_name(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Json => "json",
        }
    }

    /// Parse a config-file format name, defaulting to Markdown.
    pub fn from_config_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Markdown,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.cmd_timeout {
            if timeout == 0 {
                return Err("Command timeout must be at least 1 second".to_string());
            }
        }

        // A plugin cannot be both selected and skipped
        for name in self.only_plugins() {
            if self.skip_plugins().contains(&name) {
                return Err(format!("Plugin '{}' is in both --only and --skip", name));
            }
        }

        // The label becomes part of a directory name
        if let Some(ref label) = self.label {
            if label.is_empty() || label.contains('/') || label.contains(char::is_whitespace) {
                return Err("Label must be a non-empty name without '/' or spaces".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Plugin names from --only, empty when not given.
    pub fn only_plugins(&self) -> Vec<String> {
        self.only.clone().unwrap_or_default()
    }

    /// Plugin names from --skip, empty when not given.
    pub fn skip_plugins(&self) -> Vec<String> {
        self.skip.clone().unwrap_or_default()
    }
}
