//! Bundle collection engine.
//!
//! Executes plugin registrations into a bundle directory: command output
//! captures land under `sos_commands/<plugin>/`, copied files keep their
//! host path layout, and alerts are appended to `sos_logs/alerts.log`.
//!
//! The bundle is staged in a temporary directory next to the destination
//! and only renamed into place once the pass completes, so an interrupted
//! run never leaves a half-written bundle at the destination path.

use crate::models::{
    Alert, CaptureStatus, CommandCapture, CommandSpec, CopyOutcome, CopySpec, PluginRecord,
};
use crate::plugin::Registrations;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Options controlling collection execution.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Fallback timeout for commands registered without one. `None`
    /// leaves those commands unbounded.
    pub default_timeout: Option<std::time::Duration>,
    /// Cap on captured bytes per command; output beyond this is dropped
    /// with a truncation marker.
    pub max_output_bytes: usize,
    /// Whether to render a progress bar on the console.
    pub show_progress: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            default_timeout: None,
            max_output_bytes: 10 * 1024 * 1024,
            show_progress: true,
        }
    }
}

/// One plugin's registrations, ready for execution.
pub struct PluginSetup {
    pub name: String,
    pub profiles: Vec<String>,
    pub registrations: Registrations,
}

/// Executes registrations into a staged bundle directory.
pub struct Collector {
    staging: tempfile::TempDir,
    destination: PathBuf,
    opts: CollectOptions,
}

impl Collector {
    /// Stage a bundle that will be persisted at `destination`.
    ///
    /// The staging directory is created next to the destination so the
    /// final rename stays on one filesystem.
    pub fn stage(destination: PathBuf, opts: CollectOptions) -> Result<Self> {
        if destination.exists() {
            anyhow::bail!(
                "bundle destination already exists: {}",
                destination.display()
            );
        }

        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .with_context(|| format!("failed to create output directory: {}", parent.display()))?;

        let staging = tempfile::Builder::new()
            .prefix(".opxdiag-staging-")
            .tempdir_in(&parent)
            .context("failed to create bundle staging directory")?;

        debug!("staging bundle in {}", staging.path().display());

        Ok(Self {
            staging,
            destination,
            opts,
        })
    }

    /// Root of the staged bundle tree.
    pub fn root(&self) -> &Path {
        self.staging.path()
    }

    /// Execute all registrations sequentially, in registration order.
    pub async fn collect(&self, setups: Vec<PluginSetup>) -> Result<Vec<PluginRecord>> {
        let total_steps: usize = setups
            .iter()
            .map(|s| s.registrations.commands.len() + s.registrations.copy_specs.len())
            .sum();

        let progress = if self.opts.show_progress {
            let pb = ProgressBar::new(total_steps as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut records = Vec::with_capacity(setups.len());
        let mut all_alerts: Vec<Alert> = Vec::new();

        for setup in setups {
            let mut record = PluginRecord {
                name: setup.name.clone(),
                profiles: setup.profiles,
                commands: Vec::new(),
                files: Vec::new(),
                alerts: setup.registrations.alerts.clone(),
            };

            for spec in &setup.registrations.commands {
                progress.set_message(format!("{}: {}", setup.name, spec.command));
                record.commands.push(self.run_command(&setup.name, spec).await);
                progress.inc(1);
            }

            for spec in &setup.registrations.copy_specs {
                progress.set_message(format!("{}: copying {}", setup.name, spec.path));
                record.files.push(self.copy_spec(spec));
                progress.inc(1);
            }

            all_alerts.extend(record.alerts.iter().cloned());
            records.push(record);
        }

        progress.finish_and_clear();

        if !all_alerts.is_empty() {
            self.write_alerts(&all_alerts)?;
        }

        Ok(records)
    }

    /// Write a text file at a bundle-relative path (reports, manifests).
    pub fn write_bundle_file(&self, relative: &str, contents: &str) -> Result<()> {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)
            .with_context(|| format!("failed to write bundle file: {}", path.display()))
    }

    /// Rename the staged tree to the destination. Consumes the collector;
    /// on success the staging directory is no longer temporary.
    pub fn persist(self) -> Result<PathBuf> {
        let Collector {
            staging,
            destination,
            ..
        } = self;

        let staged = staging.path().to_path_buf();
        let _ = staging.keep();

        fs::rename(&staged, &destination).with_context(|| {
            format!(
                "failed to move bundle from {} to {}",
                staged.display(),
                destination.display()
            )
        })?;

        Ok(destination)
    }

    async fn run_command(&self, plugin: &str, spec: &CommandSpec) -> CommandCapture {
        let started = Instant::now();

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&spec.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let limit = spec.timeout().or(self.opts.default_timeout);

        let outcome = match limit {
            Some(limit) => match timeout(limit, cmd.output()).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    // Dropping the output future kills the child.
                    warn!(
                        "command timed out after {}s: {}",
                        limit.as_secs(),
                        spec.command
                    );
                    return CommandCapture {
                        command: spec.command.clone(),
                        tag: spec.tag.clone(),
                        status: CaptureStatus::TimedOut,
                        exit_code: None,
                        duration_seconds: started.elapsed().as_secs_f64(),
                        output_file: None,
                        error: Some(format!("aborted after {}s timeout", limit.as_secs())),
                    };
                }
            },
            None => cmd.output().await,
        };

        let duration_seconds = started.elapsed().as_secs_f64();

        let output = match outcome {
            Ok(output) => output,
            Err(err) => {
                warn!("failed to spawn command `{}`: {}", spec.command, err);
                return CommandCapture {
                    command: spec.command.clone(),
                    tag: spec.tag.clone(),
                    status: CaptureStatus::SpawnFailed,
                    exit_code: None,
                    duration_seconds,
                    output_file: None,
                    error: Some(err.to_string()),
                };
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }
        self.truncate_output(&mut text);

        let relative = format!("sos_commands/{}/{}", plugin, spec.tag);
        let output_file = match self.write_capture(&relative, &text) {
            Ok(()) => Some(relative),
            Err(err) => {
                warn!("failed to write capture for `{}`: {}", spec.command, err);
                None
            }
        };

        let (status, error) = if output.status.success() {
            (CaptureStatus::Ok, None)
        } else {
            let detail = match output.status.code() {
                Some(code) => format!("exited with code {}", code),
                None => "terminated by signal".to_string(),
            };
            (CaptureStatus::Failed, Some(detail))
        };

        CommandCapture {
            command: spec.command.clone(),
            tag: spec.tag.clone(),
            status,
            exit_code: output.status.code(),
            duration_seconds,
            output_file,
            error,
        }
    }

    fn write_capture(&self, relative: &str, contents: &str) -> Result<()> {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(())
    }

    fn truncate_output(&self, text: &mut String) {
        let cap = self.opts.max_output_bytes;
        if text.len() <= cap {
            return;
        }

        let mut cut = cap;
        while cut > 0 && !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str(&format!("\n[truncated: output exceeded {} bytes]\n", cap));
    }

    fn copy_spec(&self, spec: &CopySpec) -> CopyOutcome {
        let source = Path::new(&spec.path);

        if !source.exists() {
            debug!("copy spec not present, omitting: {}", spec.path);
            return CopyOutcome::missing(&spec.path);
        }

        if source.is_dir() {
            return self.copy_tree(spec, source);
        }

        match self.copy_file(source) {
            Ok(()) => CopyOutcome {
                path: spec.path.clone(),
                copied: true,
                files_copied: 1,
                note: None,
            },
            Err(err) => {
                warn!("failed to copy {}: {}", spec.path, err);
                CopyOutcome {
                    path: spec.path.clone(),
                    copied: false,
                    files_copied: 0,
                    note: Some(err.to_string()),
                }
            }
        }
    }

    fn copy_tree(&self, spec: &CopySpec, source: &Path) -> CopyOutcome {
        let mut copied = 0usize;
        let mut failures = 0usize;

        for entry in WalkDir::new(source).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            match self.copy_file(entry.path()) {
                Ok(()) => copied += 1,
                Err(err) => {
                    warn!("failed to copy {}: {}", entry.path().display(), err);
                    failures += 1;
                }
            }
        }

        CopyOutcome {
            path: spec.path.clone(),
            copied: copied > 0,
            files_copied: copied,
            note: (failures > 0).then(|| format!("{} files could not be copied", failures)),
        }
    }

    /// Copy one file into the bundle, preserving its host path layout.
    fn copy_file(&self, source: &Path) -> Result<()> {
        let relative = source.strip_prefix("/").unwrap_or(source);
        let dest = self.root().join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, &dest)
            .with_context(|| format!("copying {} to {}", source.display(), dest.display()))?;
        Ok(())
    }

    fn write_alerts(&self, alerts: &[Alert]) -> Result<()> {
        let mut contents = String::new();
        for alert in alerts {
            contents.push_str(&format!(
                "{} [{}] {}\n",
                alert.level.to_string().to_uppercase(),
                alert.plugin,
                alert.message
            ));
        }
        self.write_bundle_file("sos_logs/alerts.log", &contents)
    }
}
