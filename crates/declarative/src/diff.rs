//! Drift detection between desired and actual resources

use crate::types::{
    AttributeChange, InventoryEntry, ObservedPower, PowerState, ResourceKind, ResourceSpec,
    format_mb,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a delta can be applied to a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Safe on a running resource
    Live,
    /// Needs stop, reconfigure, start
    Cold,
    /// A power transition
    Power,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => f.write_str("live"),
            Self::Cold => f.write_str("cold"),
            Self::Power => f.write_str("power"),
        }
    }
}

/// One attribute that differs between desired and actual state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "attribute")]
pub enum Delta {
    Memory {
        desired: u32,
        actual: u32,
    },
    Cores {
        desired: u32,
        actual: Option<u32>,
    },
    Hostname {
        desired: String,
        actual: String,
    },
    Network {
        desired: String,
        actual: Option<String>,
    },
    /// Root disk size in MiB
    Storage {
        desired: u64,
        actual: Option<u64>,
    },
    Power {
        desired: PowerState,
        actual: ObservedPower,
    },
}

impl Delta {
    pub fn attribute(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::Cores { .. } => "cores",
            Self::Hostname { .. } => "hostname",
            Self::Network { .. } => "network",
            Self::Storage { .. } => "storage",
            Self::Power { .. } => "power",
        }
    }

    /// The host's control plane can only rename a running resource
    pub fn strategy(&self) -> Strategy {
        match self {
            Self::Hostname { .. } => Strategy::Live,
            Self::Power { .. } => Strategy::Power,
            _ => Strategy::Cold,
        }
    }

    pub fn desired_value(&self) -> String {
        match self {
            Self::Memory { desired, .. } => format!("{desired}MB"),
            Self::Cores { desired, .. } => desired.to_string(),
            Self::Hostname { desired, .. } | Self::Network { desired, .. } => desired.clone(),
            Self::Storage { desired, .. } => format_mb(*desired),
            Self::Power { desired, .. } => desired.to_string(),
        }
    }

    pub fn actual_value(&self) -> String {
        const UNSET: &str = "unset";
        match self {
            Self::Memory { actual, .. } => format!("{actual}MB"),
            Self::Cores { actual, .. } => actual.map_or_else(|| UNSET.to_string(), |c| c.to_string()),
            Self::Hostname { actual, .. } => actual.clone(),
            Self::Network { actual, .. } => actual.clone().unwrap_or_else(|| UNSET.to_string()),
            Self::Storage { actual, .. } => actual.map_or_else(|| UNSET.to_string(), format_mb),
            Self::Power { actual, .. } => actual.to_string(),
        }
    }

    /// The reconfiguration this delta asks for; `None` for power
    pub fn change(&self) -> Option<AttributeChange> {
        match self {
            Self::Memory { desired, .. } => Some(AttributeChange::Memory(*desired)),
            Self::Cores { desired, .. } => Some(AttributeChange::Cores(*desired)),
            Self::Hostname { desired, .. } => Some(AttributeChange::Hostname(desired.clone())),
            Self::Network { desired, .. } => Some(AttributeChange::Network(desired.clone())),
            Self::Storage { desired, .. } => Some(AttributeChange::Storage(*desired)),
            Self::Power { .. } => None,
        }
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.attribute(),
            self.actual_value(),
            self.desired_value()
        )
    }
}

/// All drift of one managed resource, deltas in attribute order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDiff {
    pub kind: ResourceKind,
    pub id: u32,
    pub hostname: String,
    pub desired_power: PowerState,
    pub actual_power: ObservedPower,
    pub deltas: Vec<Delta>,
}

impl ResourceDiff {
    /// Whether any delta forces a stop/reconfigure/start cycle
    pub fn needs_cold_apply(&self) -> bool {
        self.deltas.iter().any(|d| d.strategy() == Strategy::Cold)
    }

    /// Attribute changes for the single reconfiguration step
    pub fn changes(&self) -> Vec<AttributeChange> {
        self.deltas.iter().filter_map(Delta::change).collect()
    }

    pub fn has_power_delta(&self) -> bool {
        self.deltas.iter().any(|d| matches!(d, Delta::Power { .. }))
    }

    /// The storage delta, if the disk would have to shrink
    pub fn storage_shrink(&self) -> Option<(u64, u64)> {
        self.deltas.iter().find_map(|d| match d {
            Delta::Storage {
                desired,
                actual: Some(actual),
            } if desired < actual => Some((*actual, *desired)),
            _ => None,
        })
    }
}

/// Compare a managed resource against its host counterpart.
///
/// Returns `None` when the resource has converged.
pub fn detect(spec: &ResourceSpec, actual: &InventoryEntry) -> Option<ResourceDiff> {
    let mut deltas = Vec::new();

    if spec.memory_mb != actual.actual_memory_mb {
        deltas.push(Delta::Memory {
            desired: spec.memory_mb,
            actual: actual.actual_memory_mb,
        });
    }

    if actual.actual_cores != Some(spec.cores) {
        deltas.push(Delta::Cores {
            desired: spec.cores,
            actual: actual.actual_cores,
        });
    }

    if spec.hostname != actual.actual_hostname {
        deltas.push(Delta::Hostname {
            desired: spec.hostname.clone(),
            actual: actual.actual_hostname.clone(),
        });
    }

    if let Some(desired) = &spec.network_spec {
        let converged = actual
            .actual_network
            .as_deref()
            .is_some_and(|a| network_matches(desired, a));
        if !converged {
            deltas.push(Delta::Network {
                desired: desired.clone(),
                actual: actual.actual_network.clone(),
            });
        }
    }

    if let Some(desired) = spec.storage_spec.as_deref().and_then(desired_disk_mb) {
        let current = actual.actual_storage.as_deref().and_then(disk_size_mb);
        if current != Some(desired) {
            deltas.push(Delta::Storage {
                desired,
                actual: current,
            });
        }
    }

    if !actual.actual_power.matches(spec.desired_power) {
        deltas.push(Delta::Power {
            desired: spec.desired_power,
            actual: actual.actual_power.clone(),
        });
    }

    if deltas.is_empty() {
        return None;
    }

    Some(ResourceDiff {
        kind: spec.kind,
        id: spec.id,
        hostname: spec.hostname.clone(),
        desired_power: spec.desired_power,
        actual_power: actual.actual_power.clone(),
        deltas,
    })
}

// ============================================================================
// Option strings
// ============================================================================

/// Split `a=1,b,c=3` into options; bare words have no value.
fn options(s: &str) -> BTreeMap<&str, Option<&str>> {
    s.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|o| match o.split_once('=') {
            Some((k, v)) => (k.trim(), Some(v.trim())),
            None => (o, None),
        })
        .collect()
}

/// Every desired option must appear in the actual device string.
///
/// The host adds derived options (MAC address, firewall flags) on its own,
/// so extra actual options are not drift. A desired option without a value
/// only requires the key (`virtio` matches `virtio=BC:24:11:...`).
pub fn network_matches(desired: &str, actual: &str) -> bool {
    let actual = options(actual);
    options(desired).into_iter().all(|(key, want)| match (want, actual.get(key)) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(want), Some(have)) => *have == Some(want),
    })
}

/// Desired root disk size from a manifest storage string.
///
/// Accepts `<pool>:<sizeGB>` (the allocation syntax of the host tools) or
/// an explicit `size=` option.
pub fn desired_disk_mb(spec: &str) -> Option<u64> {
    if let Some(mb) = disk_size_mb(spec) {
        return Some(mb);
    }
    let volume = spec.split(',').next()?.trim();
    let (_, size) = volume.split_once(':')?;
    size.trim().parse::<u64>().ok().map(|gb| gb * 1024)
}

/// Size from the `size=` option of a disk string
pub fn disk_size_mb(disk: &str) -> Option<u64> {
    options(disk)
        .get("size")
        .copied()
        .flatten()
        .and_then(parse_size_mb)
}

/// Parse `8G`, `512M`, `1T`, `1048576K`; a bare number is GiB.
pub fn parse_size_mb(size: &str) -> Option<u64> {
    let size = size.trim();
    let (number, factor) = match size.char_indices().last()? {
        (i, 'T' | 't') => (&size[..i], 1024.0 * 1024.0),
        (i, 'G' | 'g') => (&size[..i], 1024.0),
        (i, 'M' | 'm') => (&size[..i], 1.0),
        (i, 'K' | 'k') => (&size[..i], 1.0 / 1024.0),
        _ => (size, 1024.0),
    };
    let value: f64 = number.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * factor).round() as u64)
}
