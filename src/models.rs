//! Data models for the diagnostic collector.
//!
//! This module contains all the core data structures used throughout
//! the application for representing registrations, captures, and the
//! collection report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Severity level of an operator alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Informational note, no operator action needed
    Info,
    /// Something interfered with collection; operator action suggested
    Warning,
    /// Collection was materially degraded
    Error,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::Info => write!(f, "Info"),
            AlertLevel::Warning => write!(f, "Warning"),
            AlertLevel::Error => write!(f, "Error"),
        }
    }
}

impl AlertLevel {
    /// Returns an emoji representation of the level.
    pub fn emoji(&self) -> &'static str {
        match self {
            AlertLevel::Info => "ℹ️",
            AlertLevel::Warning => "⚠️",
            AlertLevel::Error => "🔴",
        }
    }
}

/// An alert raised by a plugin for the operator running the collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Name of the plugin that raised the alert.
    pub plugin: String,
    /// Severity of the alert.
    pub level: AlertLevel,
    /// Human-readable alert text.
    pub message: String,
}

impl Alert {
    /// Creates a warning-level alert, the level plugins raise via
    /// `SetupContext::add_alert`.
    pub fn warning(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            level: AlertLevel::Warning,
            message: message.into(),
        }
    }
}

/// A shell command registered for output capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    /// The command line, run through `sh -c`.
    pub command: String,
    /// Bundle-safe tag used as the capture file name.
    pub tag: String,
    /// Per-command timeout in seconds. `None` means the command is not
    /// bounded at registration time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl CommandSpec {
    /// Creates a timeout-free command registration.
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        let tag = sanitize_tag(&command);
        Self {
            command,
            tag,
            timeout_secs: None,
        }
    }

    /// Creates a command registration with a timeout in seconds.
    pub fn with_timeout(command: impl Into<String>, timeout_secs: u64) -> Self {
        let mut spec = Self::new(command);
        spec.timeout_secs = Some(timeout_secs);
        spec
    }

    /// Returns the registered timeout as a `Duration`, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// A file or directory registered for verbatim copy into the bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopySpec {
    /// Absolute path on the host.
    pub path: String,
}

impl CopySpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Derive a bundle-safe file name from a command line.
///
/// Quotes are dropped, path separators become dots, and anything else
/// outside `[A-Za-z0-9._+-]` becomes an underscore, matching the
/// `sos_commands/` naming convention of sosreport bundles.
pub fn sanitize_tag(command: &str) -> String {
    let mangled: String = command
        .chars()
        .filter(|c| *c != '\'' && *c != '"')
        .map(|c| match c {
            '/' => '.',
            c if c.is_ascii_alphanumeric() => c,
            '.' | '_' | '+' | '-' => c,
            _ => '_',
        })
        .collect();

    mangled.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// How a registered command capture ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStatus {
    /// Command ran and exited zero
    Ok,
    /// Command ran but exited non-zero
    Failed,
    /// Command exceeded its timeout and was aborted
    TimedOut,
    /// Command could not be spawned at all
    SpawnFailed,
}

impl fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureStatus::Ok => write!(f, "ok"),
            CaptureStatus::Failed => write!(f, "failed"),
            CaptureStatus::TimedOut => write!(f, "timed out"),
            CaptureStatus::SpawnFailed => write!(f, "spawn failed"),
        }
    }
}

impl CaptureStatus {
    /// Returns an emoji representation of the status.
    pub fn emoji(&self) -> &'static str {
        match self {
            CaptureStatus::Ok => "✅",
            CaptureStatus::Failed => "❌",
            CaptureStatus::TimedOut => "⏱️",
            CaptureStatus::SpawnFailed => "🚫",
        }
    }
}

/// Execution record for one registered command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandCapture {
    /// The command line as registered.
    pub command: String,
    /// Bundle-safe tag; also the capture file name.
    pub tag: String,
    /// How the capture ended.
    pub status: CaptureStatus,
    /// Exit code, when the command ran to completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Wall-clock execution time in seconds.
    pub duration_seconds: f64,
    /// Bundle-relative path of the capture file, when one was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    /// Failure detail for spawn errors and timeouts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Execution record for one registered copy spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyOutcome {
    /// Absolute path as registered.
    pub path: String,
    /// Whether anything was copied into the bundle.
    pub copied: bool,
    /// Number of files copied (a directory spec may copy many).
    pub files_copied: usize,
    /// Omission or error note, when not fully copied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CopyOutcome {
    /// Records a path that was absent on the host. The bundle simply
    /// omits it; absence is not a collection error.
    pub fn missing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            copied: false,
            files_copied: 0,
            note: Some("not present on this system".to_string()),
        }
    }
}

/// Everything one plugin contributed to a collection pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRecord {
    /// Plugin name.
    pub name: String,
    /// Profiles the plugin belongs to.
    pub profiles: Vec<String>,
    /// Command captures in registration order.
    pub commands: Vec<CommandCapture>,
    /// Copy outcomes in registration order.
    pub files: Vec<CopyOutcome>,
    /// Alerts raised during setup.
    pub alerts: Vec<Alert>,
}

impl PluginRecord {
    /// Number of commands that did not complete cleanly.
    pub fn failed_commands(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| c.status != CaptureStatus::Ok)
            .count()
    }
}

/// Metadata about the collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Hostname of the collected system.
    pub hostname: String,
    /// Version of the collector.
    pub tool_version: String,
    /// Start time of the collection pass.
    pub collection_date: DateTime<Utc>,
    /// Duration of the collection in seconds.
    pub duration_seconds: f64,
    /// Number of plugins that ran.
    pub plugins_run: usize,
}

/// Summary statistics across all plugin records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionSummary {
    /// Total commands executed.
    pub commands_total: usize,
    /// Commands that exited non-zero or failed to spawn.
    pub commands_failed: usize,
    /// Commands aborted on timeout.
    pub commands_timed_out: usize,
    /// Files copied into the bundle.
    pub files_copied: usize,
    /// Registered paths absent on the host.
    pub files_missing: usize,
    /// Alerts raised across all plugins.
    pub alerts: usize,
}

impl CollectionSummary {
    /// Creates a summary from plugin records.
    pub fn from_records(records: &[PluginRecord]) -> Self {
        let mut summary = Self::default();

        for record in records {
            for capture in &record.commands {
                summary.commands_total += 1;
                match capture.status {
                    CaptureStatus::Ok => {}
                    CaptureStatus::TimedOut => summary.commands_timed_out += 1,
                    CaptureStatus::Failed | CaptureStatus::SpawnFailed => {
                        summary.commands_failed += 1
                    }
                }
            }

            for outcome in &record.files {
                if outcome.copied {
                    summary.files_copied += outcome.files_copied;
                } else {
                    summary.files_missing += 1;
                }
            }

            summary.alerts += record.alerts.len();
        }

        summary
    }

    /// True when every command completed cleanly and no alert was raised.
    pub fn is_clean(&self) -> bool {
        self.commands_failed == 0 && self.commands_timed_out == 0 && self.alerts == 0
    }
}

/// The complete collection report written into the bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionReport {
    /// Metadata about the run.
    pub metadata: ReportMetadata,
    /// Per-plugin execution records.
    pub plugins: Vec<PluginRecord>,
    /// Summary statistics.
    pub summary: CollectionSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(status: CaptureStatus) -> CommandCapture {
        CommandCapture {
            command: "true".to_string(),
            tag: "true".to_string(),
            status,
            exit_code: None,
            duration_seconds: 0.0,
            output_file: None,
            error: None,
        }
    }

    #[test]
    fn test_sanitize_tag_simple() {
        assert_eq!(sanitize_tag("ifconfig -a"), "ifconfig_-a");
        assert_eq!(sanitize_tag("ip link show"), "ip_link_show");
    }

    #[test]
    fn test_sanitize_tag_paths_and_quotes() {
        assert_eq!(
            sanitize_tag("/opx/bin/opx-switch-shell ps"),
            "opx.bin.opx-switch-shell_ps"
        );
        assert_eq!(
            sanitize_tag("/opx/bin/opx-switch-shell 'phy info'"),
            "opx.bin.opx-switch-shell_phy_info"
        );
    }

    #[test]
    fn test_command_spec_timeout() {
        let spec = CommandSpec::new("ifconfig -a");
        assert_eq!(spec.timeout(), None);

        let spec = CommandSpec::with_timeout("/opx/bin/opx-switch-shell ps", 10);
        assert_eq!(spec.timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_alert_warning_level() {
        let alert = Alert::warning("sai", "hshell is already running");
        assert_eq!(alert.level, AlertLevel::Warning);
        assert_eq!(alert.plugin, "sai");
    }

    #[test]
    fn test_summary_from_records() {
        let records = vec![PluginRecord {
            name: "sai".to_string(),
            profiles: vec!["networking".to_string()],
            commands: vec![
                capture(CaptureStatus::Ok),
                capture(CaptureStatus::Failed),
                capture(CaptureStatus::TimedOut),
            ],
            files: vec![
                CopyOutcome {
                    path: "/etc/opx/sai/init.xml".to_string(),
                    copied: true,
                    files_copied: 1,
                    note: None,
                },
                CopyOutcome::missing("/etc/opx/absent.conf"),
            ],
            alerts: vec![Alert::warning("sai", "test alert")],
        }];

        let summary = CollectionSummary::from_records(&records);
        assert_eq!(summary.commands_total, 3);
        assert_eq!(summary.commands_failed, 1);
        assert_eq!(summary.commands_timed_out, 1);
        assert_eq!(summary.files_copied, 1);
        assert_eq!(summary.files_missing, 1);
        assert_eq!(summary.alerts, 1);
        assert!(!summary.is_clean());
    }

    #[test]
    fn test_summary_clean() {
        let records = vec![PluginRecord {
            name: "sai".to_string(),
            profiles: vec![],
            commands: vec![capture(CaptureStatus::Ok)],
            files: vec![],
            alerts: vec![],
        }];

        assert!(CollectionSummary::from_records(&records).is_clean());
    }
}
