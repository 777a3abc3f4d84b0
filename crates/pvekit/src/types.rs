//! Core types for Proxmox guests.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kind of Proxmox guest, one per tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestKind {
    /// LXC container, driven by `pct`
    Lxc,
    /// QEMU virtual machine, driven by `qm`
    Qemu,
}

impl GuestKind {
    /// Both kinds, in scan order.
    pub const ALL: [GuestKind; 2] = [GuestKind::Lxc, GuestKind::Qemu];

    /// Default name of the tool for this kind.
    pub fn tool(&self) -> &'static str {
        match self {
            GuestKind::Lxc => "pct",
            GuestKind::Qemu => "qm",
        }
    }

    /// Config key holding the guest's name.
    pub fn name_key(&self) -> &'static str {
        match self {
            GuestKind::Lxc => "hostname",
            GuestKind::Qemu => "name",
        }
    }
}

impl std::fmt::Display for GuestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuestKind::Lxc => write!(f, "lxc"),
            GuestKind::Qemu => write!(f, "qemu"),
        }
    }
}

/// Power status as reported by `pct status` / `qm status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuestStatus {
    Running,
    Stopped,
    /// Anything else (`paused`, `suspended`, `unknown`, ...)
    Other(String),
}

impl GuestStatus {
    /// Parse a status word.
    pub fn parse(word: &str) -> Self {
        match word.trim().to_lowercase().as_str() {
            "running" => GuestStatus::Running,
            "stopped" => GuestStatus::Stopped,
            other => GuestStatus::Other(other.to_string()),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, GuestStatus::Running)
    }
}

/// One row of `pct list` / `qm list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestSummary {
    pub vmid: u32,
    pub kind: GuestKind,
    pub status: GuestStatus,
}

/// A disk entry from a guest config (`rootfs`, `scsi0`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskEntry {
    /// Config key, e.g. `rootfs` or `scsi0`
    pub key: String,
    /// Volume string, e.g. `local-lvm:vm-100-disk-0,size=8G`
    pub value: String,
}

/// The parts of `pct config` / `qm config` this crate understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestConfig {
    pub vmid: u32,
    pub kind: GuestKind,
    /// `hostname` (lxc) or `name` (qemu)
    pub name: Option<String>,
    /// Memory in MiB; the platform default (512) when unset
    pub memory_mb: u32,
    /// Core limit; `None` only for a container without a limit
    pub cores: Option<u32>,
    /// Primary network device
    pub net0: Option<String>,
    /// Root / boot disk
    pub disk: Option<DiskEntry>,
}

/// A guest as seen by a full scan: list row plus config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestInfo {
    pub status: GuestStatus,
    pub config: GuestConfig,
}

/// Everything needed to create a guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestSpec {
    pub vmid: u32,
    pub kind: GuestKind,
    pub name: String,
    /// OS template (lxc) or installation ISO volume (qemu)
    pub template: String,
    pub memory_mb: u32,
    pub cores: u32,
    pub net0: Option<String>,
    /// Root disk allocation, e.g. `local-lvm:8`
    pub disk: Option<String>,
}

/// A set of config changes applied with a single `set` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub memory_mb: Option<u32>,
    pub cores: Option<u32>,
    pub name: Option<String>,
    pub net0: Option<String>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.memory_mb.is_none() && self.cores.is_none() && self.name.is_none() && self.net0.is_none()
    }

    /// Render as `--key value` arguments for the given tool.
    pub fn to_args(&self, kind: GuestKind) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(memory) = self.memory_mb {
            args.push("--memory".to_string());
            args.push(memory.to_string());
        }
        if let Some(cores) = self.cores {
            args.push("--cores".to_string());
            args.push(cores.to_string());
        }
        if let Some(name) = &self.name {
            args.push(format!("--{}", kind.name_key()));
            args.push(name.clone());
        }
        if let Some(net0) = &self.net0 {
            args.push("--net0".to_string());
            args.push(net0.clone());
        }
        args
    }
}

/// Time bounds for tool invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// list / config / status
    pub read: Duration,
    /// graceful shutdown and forced stop
    pub stop: Duration,
    pub start: Duration,
    /// create / set / resize
    pub reconfigure: Duration,
    /// How long the guest gets to shut down before the tool gives up
    pub graceful_stop: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(30),
            stop: Duration::from_secs(180),
            start: Duration::from_secs(180),
            reconfigure: Duration::from_secs(300),
            graceful_stop: Duration::from_secs(60),
        }
    }
}

/// Paths to the guest tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub pct: String,
    pub qm: String,
}

impl ToolPaths {
    pub fn for_kind(&self, kind: GuestKind) -> &str {
        match kind {
            GuestKind::Lxc => &self.pct,
            GuestKind::Qemu => &self.qm,
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            pct: GuestKind::Lxc.tool().to_string(),
            qm: GuestKind::Qemu.tool().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(GuestStatus::parse("running"), GuestStatus::Running);
        assert_eq!(GuestStatus::parse("Stopped\n"), GuestStatus::Stopped);
        assert_eq!(
            GuestStatus::parse("paused"),
            GuestStatus::Other("paused".to_string())
        );
    }

    #[test]
    fn test_config_update_args() {
        let update = ConfigUpdate {
            memory_mb: Some(2048),
            name: Some("web01".to_string()),
            ..Default::default()
        };
        assert_eq!(
            update.to_args(GuestKind::Lxc),
            vec!["--memory", "2048", "--hostname", "web01"]
        );
        assert_eq!(
            update.to_args(GuestKind::Qemu),
            vec!["--memory", "2048", "--name", "web01"]
        );
        assert!(ConfigUpdate::default().is_empty());
    }
}
