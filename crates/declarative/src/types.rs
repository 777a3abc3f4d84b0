//! Core types for host reconciliation

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Kind of managed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Container,
    VirtualMachine,
}

impl ResourceKind {
    /// Manifest spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::VirtualMachine => "virtualMachine",
        }
    }

    /// Parse a manifest spelling, accepting the common aliases
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "container" | "lxc" | "ct" => Some(Self::Container),
            "virtualmachine" | "vm" | "qemu" => Some(Self::VirtualMachine),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    #[default]
    Running,
    Stopped,
}

impl PowerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "running" => Some(Self::Running),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Power state observed on the host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservedPower {
    Running,
    Stopped,
    /// Anything the engine cannot reason about (paused, suspended, ...)
    Other(String),
}

impl ObservedPower {
    /// Whether the observed state satisfies a desired state
    pub fn matches(&self, desired: PowerState) -> bool {
        matches!(
            (self, desired),
            (Self::Running, PowerState::Running) | (Self::Stopped, PowerState::Stopped)
        )
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for ObservedPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Stopped => f.write_str("stopped"),
            Self::Other(s) => write!(f, "other({s})"),
        }
    }
}

/// A resource as declared in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    pub kind: ResourceKind,
    pub id: u32,
    pub hostname: String,
    /// Image/source reference, only used at creation
    pub template: Option<String>,
    #[serde(rename = "memoryMB")]
    pub memory_mb: u32,
    pub cores: u32,
    /// Opaque network device string passed through to the host
    pub network_spec: Option<String>,
    /// Root disk allocation, `<pool>:<sizeGB>`
    pub storage_spec: Option<String>,
    pub desired_power: PowerState,
}

/// A resource as observed on the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEntry {
    pub kind: ResourceKind,
    pub id: u32,
    pub actual_hostname: String,
    #[serde(rename = "actualMemoryMB")]
    pub actual_memory_mb: u32,
    /// `None` when the host has no limit configured
    pub actual_cores: Option<u32>,
    pub actual_network: Option<String>,
    pub actual_storage: Option<String>,
    pub actual_power: ObservedPower,
}

/// A single attribute change handed to the host in one reconfiguration step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "attribute", content = "value")]
pub enum AttributeChange {
    Memory(u32),
    Cores(u32),
    Hostname(String),
    Network(String),
    /// Absolute root disk size in MiB
    Storage(u64),
}

impl fmt::Display for AttributeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory(mb) => write!(f, "memory={mb}"),
            Self::Cores(n) => write!(f, "cores={n}"),
            Self::Hostname(h) => write!(f, "hostname={h}"),
            Self::Network(n) => write!(f, "network={n}"),
            Self::Storage(mb) => write!(f, "storage={}", format_mb(*mb)),
        }
    }
}

/// Render a MiB size the way Proxmox does (`8G`, `1536M`)
pub fn format_mb(mb: u64) -> String {
    if mb % 1024 == 0 {
        format!("{}G", mb / 1024)
    } else {
        format!("{mb}M")
    }
}

/// Escape control characters so a value cannot break a line-oriented report
pub(crate) fn single_line(s: &str) -> Cow<'_, str> {
    if s.chars().any(char::is_control) {
        Cow::Owned(
            s.chars()
                .map(|c| if c.is_control() { c.escape_debug().to_string() } else { c.to_string() })
                .collect(),
        )
    } else {
        Cow::Borrowed(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_aliases() {
        assert_eq!(ResourceKind::parse("lxc"), Some(ResourceKind::Container));
        assert_eq!(ResourceKind::parse("virtualMachine"), Some(ResourceKind::VirtualMachine));
        assert_eq!(ResourceKind::parse("QEMU"), Some(ResourceKind::VirtualMachine));
        assert_eq!(ResourceKind::parse("pod"), None);
    }

    #[test]
    fn test_observed_power_matches() {
        assert!(ObservedPower::Running.matches(PowerState::Running));
        assert!(!ObservedPower::Running.matches(PowerState::Stopped));
        assert!(!ObservedPower::Other("paused".into()).matches(PowerState::Running));
        assert!(!ObservedPower::Other("paused".into()).matches(PowerState::Stopped));
    }

    #[test]
    fn test_single_line_escapes_newlines() {
        assert_eq!(single_line("web01"), "web01");
        assert_eq!(single_line("a\nVERDICT X\r"), "a\\nVERDICT X\\r");
    }

    #[test]
    fn test_format_mb() {
        assert_eq!(format_mb(8192), "8G");
        assert_eq!(format_mb(1536), "1536M");
    }
}
