//! Real Proxmox CLI backend using `pct` and `qm`.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::exec::{display_command, run_bounded};
use crate::parse;
use crate::types::{
    ConfigUpdate, GuestConfig, GuestKind, GuestSpec, GuestStatus, GuestSummary, Timeouts,
    ToolPaths,
};
use std::time::Duration;

/// Backend that executes the real guest tools.
pub struct CliBackend {
    tools: ToolPaths,
    timeouts: Timeouts,
}

impl CliBackend {
    pub fn new(tools: ToolPaths, timeouts: Timeouts) -> Self {
        Self { tools, timeouts }
    }

    /// Run a tool command and check for success.
    fn run_checked(
        &self,
        kind: GuestKind,
        args: &[String],
        timeout: Duration,
        vmid: Option<u32>,
    ) -> Result<String> {
        let program = self.tools.for_kind(kind);
        let output = run_bounded(program, args, timeout)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::from_tool_output(
                &display_command(program, args),
                &stderr,
                vmid,
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Backend for CliBackend {
    fn is_available(&self, kind: GuestKind) -> bool {
        self.run_checked(kind, &args(&["help"]), self.timeouts.read, None)
            .is_ok()
    }

    fn list(&self, kind: GuestKind) -> Result<Vec<GuestSummary>> {
        let output = self.run_checked(kind, &args(&["list"]), self.timeouts.read, None)?;
        parse::parse_list(kind, &output)
    }

    fn config(&self, kind: GuestKind, vmid: u32) -> Result<GuestConfig> {
        let output = self.run_checked(
            kind,
            &[String::from("config"), vmid.to_string()],
            self.timeouts.read,
            Some(vmid),
        )?;
        parse::parse_config(kind, vmid, &output)
    }

    fn status(&self, kind: GuestKind, vmid: u32) -> Result<GuestStatus> {
        let output = self.run_checked(
            kind,
            &[String::from("status"), vmid.to_string()],
            self.timeouts.read,
            Some(vmid),
        )?;
        parse::parse_status(&output)
    }

    fn create(&self, spec: &GuestSpec) -> Result<()> {
        let mut argv = vec![String::from("create"), spec.vmid.to_string()];

        // pct takes the OS template positionally; qm attaches the ISO as a cdrom
        if spec.kind == GuestKind::Lxc {
            argv.push(spec.template.clone());
        }

        argv.extend(
            ConfigUpdate {
                memory_mb: Some(spec.memory_mb),
                cores: Some(spec.cores),
                name: Some(spec.name.clone()),
                net0: spec.net0.clone(),
            }
            .to_args(spec.kind),
        );

        match spec.kind {
            GuestKind::Lxc => {
                if let Some(disk) = &spec.disk {
                    argv.push("--rootfs".to_string());
                    argv.push(disk.clone());
                }
            }
            GuestKind::Qemu => {
                if let Some(disk) = &spec.disk {
                    argv.push("--scsi0".to_string());
                    argv.push(disk.clone());
                }
                argv.push("--ide2".to_string());
                argv.push(format!("{},media=cdrom", spec.template));
            }
        }

        self.run_checked(spec.kind, &argv, self.timeouts.reconfigure, Some(spec.vmid))?;
        Ok(())
    }

    fn update(&self, kind: GuestKind, vmid: u32, update: &ConfigUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let mut argv = vec![String::from("set"), vmid.to_string()];
        argv.extend(update.to_args(kind));
        self.run_checked(kind, &argv, self.timeouts.reconfigure, Some(vmid))?;
        Ok(())
    }

    fn resize(&self, kind: GuestKind, vmid: u32, disk: &str, size_mb: u64) -> Result<()> {
        let argv = vec![
            String::from("resize"),
            vmid.to_string(),
            disk.to_string(),
            format_size(size_mb),
        ];
        self.run_checked(kind, &argv, self.timeouts.reconfigure, Some(vmid))?;
        Ok(())
    }

    fn start(&self, kind: GuestKind, vmid: u32) -> Result<()> {
        self.run_checked(
            kind,
            &[String::from("start"), vmid.to_string()],
            self.timeouts.start,
            Some(vmid),
        )?;
        Ok(())
    }

    fn shutdown(&self, kind: GuestKind, vmid: u32, grace: Duration) -> Result<()> {
        let argv = vec![
            String::from("shutdown"),
            vmid.to_string(),
            "--timeout".to_string(),
            grace.as_secs().max(1).to_string(),
        ];
        self.run_checked(kind, &argv, self.timeouts.stop, Some(vmid))?;
        Ok(())
    }

    fn stop(&self, kind: GuestKind, vmid: u32) -> Result<()> {
        self.run_checked(
            kind,
            &[String::from("stop"), vmid.to_string()],
            self.timeouts.stop,
            Some(vmid),
        )?;
        Ok(())
    }
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Render a size for `resize`, preferring whole GiB.
fn format_size(size_mb: u64) -> String {
    if size_mb % 1024 == 0 {
        format!("{}G", size_mb / 1024)
    } else {
        format!("{size_mb}M")
    }
}
