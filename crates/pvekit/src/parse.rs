//! Parsers for `pct` / `qm` text output.

use crate::error::{Error, Result};
use crate::types::{DiskEntry, GuestConfig, GuestKind, GuestStatus, GuestSummary};

/// Memory Proxmox assumes when a config has no `memory` line.
const DEFAULT_MEMORY_MB: u32 = 512;

/// Cores Proxmox gives a VM whose config has no `cores` line.
const DEFAULT_VM_CORES: u32 = 1;

/// Disk keys probed (in order) for a VM's boot disk.
const QEMU_DISK_KEYS: [&str; 4] = ["scsi0", "virtio0", "sata0", "ide0"];

/// Parse `pct list` or `qm list`.
///
/// Both tools print a header row followed by one row per guest. VMID is the
/// first column; the status column is located by the header's `STATUS`
/// label since `pct list` leaves the lock column blank for unlocked guests.
pub fn parse_list(kind: GuestKind, output: &str) -> Result<Vec<GuestSummary>> {
    let mut lines = output.lines().filter(|l| !l.trim().is_empty());

    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    let status_col = header.to_uppercase().find("STATUS").ok_or_else(|| Error::Parse {
        what: "list header",
        line: header.to_string(),
    })?;

    let mut guests = Vec::new();
    for line in lines {
        let vmid = line
            .split_whitespace()
            .next()
            .and_then(|t| t.parse::<u32>().ok())
            .ok_or_else(|| Error::Parse {
                what: "list row",
                line: line.to_string(),
            })?;

        let status = line
            .get(status_col..)
            .and_then(|rest| rest.split_whitespace().next())
            .ok_or_else(|| Error::Parse {
                what: "list row",
                line: line.to_string(),
            })?;

        guests.push(GuestSummary {
            vmid,
            kind,
            status: GuestStatus::parse(status),
        });
    }

    Ok(guests)
}

/// Parse `pct status <id>` / `qm status <id>` (`status: running`).
pub fn parse_status(output: &str) -> Result<GuestStatus> {
    output
        .lines()
        .find_map(|l| l.trim().strip_prefix("status:"))
        .map(GuestStatus::parse)
        .ok_or_else(|| Error::Parse {
            what: "status",
            line: output.trim().to_string(),
        })
}

/// Parse `pct config <id>` / `qm config <id>`.
///
/// Only the current config is read; snapshot sections (`[name]`) and
/// everything after them are ignored.
pub fn parse_config(kind: GuestKind, vmid: u32, output: &str) -> Result<GuestConfig> {
    let mut config = GuestConfig {
        vmid,
        kind,
        name: None,
        memory_mb: DEFAULT_MEMORY_MB,
        // An unset container limit means all host cores
        cores: match kind {
            GuestKind::Lxc => None,
            GuestKind::Qemu => Some(DEFAULT_VM_CORES),
        },
        net0: None,
        disk: None,
    };
    let mut disks: Vec<DiskEntry> = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            break;
        }
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        match key {
            "memory" => config.memory_mb = parse_number(value, "memory")?,
            "cores" => config.cores = Some(parse_number(value, "cores")?),
            "net0" => config.net0 = Some(value.to_string()),
            k if k == kind.name_key() => config.name = Some(value.to_string()),
            "rootfs" if kind == GuestKind::Lxc => disks.push(disk(key, value)),
            k if kind == GuestKind::Qemu && QEMU_DISK_KEYS.contains(&k) => {
                if !value.contains("media=cdrom") {
                    disks.push(disk(key, value));
                }
            }
            _ => {}
        }
    }

    config.disk = match kind {
        GuestKind::Lxc => disks.into_iter().next(),
        GuestKind::Qemu => QEMU_DISK_KEYS
            .iter()
            .find_map(|k| disks.iter().find(|d| d.key == *k).cloned()),
    };

    Ok(config)
}

fn disk(key: &str, value: &str) -> DiskEntry {
    DiskEntry {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_number(value: &str, what: &'static str) -> Result<u32> {
    value.parse().map_err(|_| Error::Parse {
        what,
        line: value.to_string(),
    })
}
