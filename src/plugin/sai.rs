//! SAI debugging information.
//!
//! Collects interface state, vendor switch-shell diagnostics, and the SAI
//! initialization config. The switch-shell queries share the NPU shell
//! session with `hshell`; when an interactive `hshell` is already open they
//! are skipped and the operator is told to halt it and rerun collection.

use super::{Plugin, SetupContext};
use crate::process;
use anyhow::Result;
use std::time::Duration;
use tracing::warn;

/// Vendor switch-shell binary used for NPU queries.
const SWITCH_SHELL: &str = "/opx/bin/opx-switch-shell";

/// Switch-shell queries hang when the NPU shell is wedged.
const SWITCH_SHELL_TIMEOUT: Duration = Duration::from_secs(10);

/// SAI initialization config copied verbatim into the bundle.
const SAI_INIT_CONFIG: &str = "/etc/opx/sai/init.xml";

/// Interactive switch-shell session that conflicts with automated queries.
const HSHELL_PROCESS: &str = "hshell";

/// Collects SAI debugging information.
pub struct SaiPlugin;

impl SaiPlugin {
    pub fn new() -> Self {
        Self
    }

    fn register(&self, ctx: &mut SetupContext, hshell_running: bool) {
        ctx.add_cmd_output("ifconfig -a");
        ctx.add_cmd_output("ip link show");

        if hshell_running {
            ctx.add_alert("hshell is already running! halt hshell and rerun opxdiag!");
        } else {
            ctx.add_cmd_output_with_timeout(
                &format!("{} ps", SWITCH_SHELL),
                SWITCH_SHELL_TIMEOUT.as_secs(),
            );
            ctx.add_cmd_output_with_timeout(
                &format!("{} 'phy info'", SWITCH_SHELL),
                SWITCH_SHELL_TIMEOUT.as_secs(),
            );
        }

        ctx.add_copy_spec(SAI_INIT_CONFIG);
    }
}

impl Default for SaiPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for SaiPlugin {
    fn name(&self) -> &'static str {
        "sai"
    }

    fn profiles(&self) -> &'static [&'static str] {
        &["networking", "dn", "sai"]
    }

    fn setup(&self, ctx: &mut SetupContext) -> Result<()> {
        let hshell_running = process::is_running(HSHELL_PROCESS).unwrap_or_else(|err| {
            // An unreadable process table should not block collection.
            warn!("process table scan failed, assuming no hshell: {}", err);
            false
        });

        self.register(ctx, hshell_running);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_hshell_registers_four_commands_no_alert() {
        let mut ctx = SetupContext::new("sai");
        SaiPlugin::new().register(&mut ctx, false);

        assert_eq!(ctx.commands().len(), 4);
        assert!(ctx.alerts().is_empty());
    }

    #[test]
    fn test_hshell_present_registers_two_commands_and_alert() {
        let mut ctx = SetupContext::new("sai");
        SaiPlugin::new().register(&mut ctx, true);

        assert_eq!(ctx.commands().len(), 2);
        assert_eq!(ctx.alerts().len(), 1);
        assert!(ctx.alerts()[0]
            .message
            .contains("hshell is already running"));
    }

    #[test]
    fn test_init_config_copied_in_both_branches() {
        for hshell_running in [false, true] {
            let mut ctx = SetupContext::new("sai");
            SaiPlugin::new().register(&mut ctx, hshell_running);

            assert_eq!(ctx.copy_specs().len(), 1);
            assert_eq!(ctx.copy_specs()[0].path, "/etc/opx/sai/init.xml");
        }
    }

    #[test]
    fn test_interface_captures_have_no_timeout() {
        let mut ctx = SetupContext::new("sai");
        SaiPlugin::new().register(&mut ctx, false);

        let commands = ctx.commands();
        assert_eq!(commands[0].command, "ifconfig -a");
        assert_eq!(commands[0].timeout_secs, None);
        assert_eq!(commands[1].command, "ip link show");
        assert_eq!(commands[1].timeout_secs, None);
    }

    #[test]
    fn test_switch_shell_captures_have_ten_second_timeout() {
        let mut ctx = SetupContext::new("sai");
        SaiPlugin::new().register(&mut ctx, false);

        let commands = ctx.commands();
        assert_eq!(commands[2].command, "/opx/bin/opx-switch-shell ps");
        assert_eq!(commands[2].timeout_secs, Some(10));
        assert_eq!(commands[3].command, "/opx/bin/opx-switch-shell 'phy info'");
        assert_eq!(commands[3].timeout_secs, Some(10));
    }

    #[test]
    fn test_live_setup_registers_interface_captures() {
        let mut ctx = SetupContext::new("sai");
        SaiPlugin::new().setup(&mut ctx).unwrap();

        // Whichever branch the live process table selects, the interface
        // captures and the config copy are always present.
        assert!(ctx.commands().len() >= 2);
        assert_eq!(ctx.commands()[0].command, "ifconfig -a");
        assert_eq!(ctx.copy_specs().len(), 1);
    }
}
