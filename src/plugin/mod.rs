//! Diagnostic plugins.
//!
//! A plugin contributes outputs to the bundle by registering shell
//! commands to capture, files to copy, and operator alerts against a
//! [`SetupContext`]. The collector executes the registrations; plugins
//! themselves never touch the bundle.

pub mod sai;

pub use sai::SaiPlugin;

use crate::models::{Alert, CommandSpec, CopySpec};
use anyhow::Result;

/// A unit registered with the collector that contributes diagnostic
/// outputs to a bundle.
///
/// `setup` runs exactly once per collection pass and must not execute
/// anything itself; it only registers work.
pub trait Plugin {
    /// Short stable identifier, e.g. `"sai"`.
    fn name(&self) -> &'static str;

    /// Profiles this plugin belongs to, used for selection.
    fn profiles(&self) -> &'static [&'static str];

    /// Register this plugin's commands, copy specs, and alerts.
    fn setup(&self, ctx: &mut SetupContext) -> Result<()>;
}

/// Registration sink handed to a plugin's `setup`.
#[derive(Debug)]
pub struct SetupContext {
    plugin: String,
    commands: Vec<CommandSpec>,
    copy_specs: Vec<CopySpec>,
    alerts: Vec<Alert>,
}

/// Everything a plugin registered, in registration order.
#[derive(Debug, Clone)]
pub struct Registrations {
    pub commands: Vec<CommandSpec>,
    pub copy_specs: Vec<CopySpec>,
    pub alerts: Vec<Alert>,
}

impl SetupContext {
    /// Creates an empty context for the named plugin.
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            commands: Vec::new(),
            copy_specs: Vec::new(),
            alerts: Vec::new(),
        }
    }

    /// Register a command for capture with no timeout.
    pub fn add_cmd_output(&mut self, command: &str) {
        self.commands.push(CommandSpec::new(command));
    }

    /// Register a command for capture, aborted after `timeout_secs`.
    pub fn add_cmd_output_with_timeout(&mut self, command: &str, timeout_secs: u64) {
        self.commands
            .push(CommandSpec::with_timeout(command, timeout_secs));
    }

    /// Register a verbatim copy of a file or directory.
    pub fn add_copy_spec(&mut self, path: &str) {
        self.copy_specs.push(CopySpec::new(path));
    }

    /// Raise a warning-level alert for the operator.
    pub fn add_alert(&mut self, message: &str) {
        self.alerts.push(Alert::warning(self.plugin.clone(), message));
    }

    /// Commands registered so far.
    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    /// Copy specs registered so far.
    pub fn copy_specs(&self) -> &[CopySpec] {
        &self.copy_specs
    }

    /// Alerts raised so far.
    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    /// Consume the context into its registrations.
    pub fn into_registrations(self) -> Registrations {
        Registrations {
            commands: self.commands,
            copy_specs: self.copy_specs,
            alerts: self.alerts,
        }
    }
}

/// The set of plugins known to this build of the collector.
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Creates the registry of built-in plugins.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SaiPlugin::new()));
        registry
    }

    /// Add a plugin to the registry.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// All registered plugins.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Plugin> {
        self.plugins.iter().map(|p| p.as_ref())
    }

    /// Plugins matching the given profile and include/exclude name lists.
    ///
    /// `only` and `skip` match plugin names; an empty `only` selects all.
    pub fn select(
        &self,
        profile: Option<&str>,
        only: &[String],
        skip: &[String],
    ) -> Vec<&dyn Plugin> {
        self.iter()
            .filter(|plugin| match profile {
                Some(profile) => plugin.profiles().contains(&profile),
                None => true,
            })
            .filter(|plugin| only.is_empty() || only.iter().any(|n| n == plugin.name()))
            .filter(|plugin| !skip.iter().any(|n| n == plugin.name()))
            .collect()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
