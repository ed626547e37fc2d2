//! Markdown and JSON report generation.
//!
//! This module renders the collection report written into the bundle
//! root alongside the captured data.

use crate::models::{CollectionReport, CollectionSummary, PluginRecord, ReportMetadata};
use anyhow::Result;

/// Generate a complete Markdown collection report.
pub fn generate_markdown_report(report: &CollectionReport) -> String {
    let mut output = String::new();

    output.push_str("# opxdiag Collection Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));

    for plugin in &report.plugins {
        output.push_str(&generate_plugin_section(plugin));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the JSON manifest for the report.
pub fn generate_json_report(report: &CollectionReport) -> Result<String> {
    let json = serde_json::to_string_pretty(report)?;
    Ok(json)
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Hostname:** {}\n", metadata.hostname));
    section.push_str(&format!(
        "- **Collection Date:** {}\n",
        metadata.collection_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Tool Version:** {}\n", metadata.tool_version));
    section.push_str(&format!("- **Plugins Run:** {}\n", metadata.plugins_run));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the summary section.
fn generate_summary_section(summary: &CollectionSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Commands | Failed | Timed Out | Files Copied | Missing | Alerts |\n");
    section.push_str("|----------|--------|-----------|--------------|---------|--------|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {} | {} |\n\n",
        summary.commands_total,
        summary.commands_failed,
        summary.commands_timed_out,
        summary.files_copied,
        summary.files_missing,
        summary.alerts
    ));

    if summary.is_clean() {
        section.push_str("All registered collection steps completed cleanly.\n\n");
    }

    section
}

/// Generate one plugin's section.
fn generate_plugin_section(plugin: &PluginRecord) -> String {
    let mut section = String::new();

    section.push_str(&format!("## Plugin: {}\n\n", plugin.name));
    if !plugin.profiles.is_empty() {
        section.push_str(&format!("Profiles: {}\n\n", plugin.profiles.join(", ")));
    }

    let failed = plugin.failed_commands();
    if failed > 0 {
        section.push_str(&format!(
            "{} of {} commands did not complete cleanly.\n\n",
            failed,
            plugin.commands.len()
        ));
    }

    if !plugin.commands.is_empty() {
        section.push_str("### Commands\n\n");
        section.push_str("| Status | Command | Duration | Output |\n");
        section.push_str("|--------|---------|----------|--------|\n");
        for capture in &plugin.commands {
            let output = capture
                .output_file
                .as_deref()
                .map(|f| format!("`{}`", f))
                .unwrap_or_else(|| "—".to_string());
            section.push_str(&format!(
                "| {} {} | `{}` | {:.1}s | {} |\n",
                capture.status.emoji(),
                capture.status,
                capture.command,
                capture.duration_seconds,
                output
            ));
        }
        section.push('\n');
    }

    if !plugin.files.is_empty() {
        section.push_str("### Files\n\n");
        for outcome in &plugin.files {
            if outcome.copied {
                section.push_str(&format!(
                    "- ✅ `{}` ({} file{})\n",
                    outcome.path,
                    outcome.files_copied,
                    if outcome.files_copied == 1 { "" } else { "s" }
                ));
            } else {
                section.push_str(&format!(
                    "- ⚠️ `{}` — {}\n",
                    outcome.path,
                    outcome.note.as_deref().unwrap_or("not copied")
                ));
            }
        }
        section.push('\n');
    }

    if !plugin.alerts.is_empty() {
        section.push_str("### Alerts\n\n");
        for alert in &plugin.alerts {
            section.push_str(&format!(
                "- {} **{}:** {}\n",
                alert.level.emoji(),
                alert.level,
                alert.message
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Generated by opxdiag*\n".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Alert, CaptureStatus, CommandCapture, CopyOutcome, ReportMetadata,
    };
    use chrono::Utc;

    fn sample_report() -> CollectionReport {
        let plugins = vec![PluginRecord {
            name: "sai".to_string(),
            profiles: vec!["networking".to_string(), "sai".to_string()],
            commands: vec![
                CommandCapture {
                    command: "ifconfig -a".to_string(),
                    tag: "ifconfig_-a".to_string(),
                    status: CaptureStatus::Ok,
                    exit_code: Some(0),
                    duration_seconds: 0.1,
                    output_file: Some("sos_commands/sai/ifconfig_-a".to_string()),
                    error: None,
                },
                CommandCapture {
                    command: "/opx/bin/opx-switch-shell ps".to_string(),
                    tag: "opx.bin.opx-switch-shell_ps".to_string(),
                    status: CaptureStatus::TimedOut,
                    exit_code: None,
                    duration_seconds: 10.0,
                    output_file: None,
                    error: Some("aborted after 10s timeout".to_string()),
                },
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
            alerts: vec![Alert::warning(
                "sai",
                "hshell is already running! halt hshell and rerun opxdiag!",
            )],
        }];

        let summary = CollectionSummary::from_records(&plugins);

        CollectionReport {
            metadata: ReportMetadata {
                hostname: "switch01".to_string(),
                tool_version: "0.1.0".to_string(),
                collection_date: Utc::now(),
                duration_seconds: 12.5,
                plugins_run: 1,
            },
            plugins,
            summary,
        }
    }

    #[test]
    fn test_markdown_report_sections() {
        let markdown = generate_markdown_report(&sample_report());

        assert!(markdown.contains("# opxdiag Collection Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("switch01"));
        assert!(markdown.contains("## Summary"));
        assert!(markdown.contains("## Plugin: sai"));
        assert!(markdown.contains("`ifconfig -a`"));
        assert!(markdown.contains("timed out"));
        assert!(markdown.contains("/etc/opx/sai/init.xml"));
        assert!(markdown.contains("hshell is already running"));
    }

    #[test]
    fn test_markdown_report_missing_file_note() {
        let markdown = generate_markdown_report(&sample_report());
        assert!(markdown.contains("/etc/opx/absent.conf"));
        assert!(markdown.contains("not present on this system"));
    }

    #[test]
    fn test_json_report_round_trips() {
        let json = generate_json_report(&sample_report()).unwrap();
        let parsed: CollectionReport = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.metadata.hostname, "switch01");
        assert_eq!(parsed.plugins.len(), 1);
        assert_eq!(parsed.summary.commands_total, 2);
        assert_eq!(parsed.summary.commands_timed_out, 1);
    }
}
