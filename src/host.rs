//! Proxmox VE host adapter for the reconciliation engine

use anyhow::{Context, Result};
use declarative::{
    AttributeChange, HostControl, InventoryEntry, ObservedPower, ResourceKind, ResourceSpec,
};
use pvekit::{Client, ConfigUpdate, GuestInfo, GuestKind, GuestSpec, GuestStatus};

use crate::config::EngineConfig;

/// The local Proxmox host, driven through `pct` and `qm`
pub struct PveHost {
    client: Client,
}

impl PveHost {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: Client::new(config.tools(), config.timeouts()),
        }
    }

    #[cfg(test)]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Guest kinds whose tool cannot be executed
    pub fn unavailable_tools(&self) -> Vec<&'static str> {
        GuestKind::ALL
            .into_iter()
            .filter(|kind| !self.client.is_available(*kind))
            .map(|kind| kind.tool())
            .collect()
    }
}

fn guest_kind(kind: ResourceKind) -> GuestKind {
    match kind {
        ResourceKind::Container => GuestKind::Lxc,
        ResourceKind::VirtualMachine => GuestKind::Qemu,
    }
}

fn resource_kind(kind: GuestKind) -> ResourceKind {
    match kind {
        GuestKind::Lxc => ResourceKind::Container,
        GuestKind::Qemu => ResourceKind::VirtualMachine,
    }
}

fn observed(status: GuestStatus) -> ObservedPower {
    match status {
        GuestStatus::Running => ObservedPower::Running,
        GuestStatus::Stopped => ObservedPower::Stopped,
        GuestStatus::Other(state) => ObservedPower::Other(state),
    }
}

fn inventory_entry(guest: GuestInfo) -> InventoryEntry {
    let config = guest.config;
    InventoryEntry {
        kind: resource_kind(config.kind),
        id: config.vmid,
        actual_hostname: config.name.unwrap_or_default(),
        actual_memory_mb: config.memory_mb,
        actual_cores: config.cores,
        actual_network: config.net0,
        actual_storage: config.disk.map(|d| d.value),
        actual_power: observed(guest.status),
    }
}

/// Prefix a tool error with its category; transient ones log the advice
fn host_error(e: pvekit::Error) -> anyhow::Error {
    let category = e.category();
    if category.is_transient() {
        log::warn!("{}", category.advice());
    } else {
        log::debug!("{}", category.advice());
    }
    anyhow::Error::new(e).context(category.description())
}

impl HostControl for PveHost {
    fn scan(&self) -> Result<Vec<InventoryEntry>> {
        let mut entries = Vec::new();
        for kind in GuestKind::ALL {
            let guests = self
                .client
                .scan(kind)
                .map_err(host_error)
                .with_context(|| format!("Failed to list {} guests", kind.tool()))?;
            entries.extend(guests.into_iter().map(inventory_entry));
        }
        Ok(entries)
    }

    fn power(&self, kind: ResourceKind, id: u32) -> Result<ObservedPower> {
        let status = self
            .client
            .status(guest_kind(kind), id)
            .map_err(host_error)?;
        Ok(observed(status))
    }

    fn create(&self, spec: &ResourceSpec) -> Result<()> {
        let template = spec
            .template
            .clone()
            .with_context(|| format!("{} {} has no template", spec.kind, spec.id))?;
        let guest = GuestSpec {
            vmid: spec.id,
            kind: guest_kind(spec.kind),
            name: spec.hostname.clone(),
            template,
            memory_mb: spec.memory_mb,
            cores: spec.cores,
            net0: spec.network_spec.clone(),
            disk: spec.storage_spec.clone(),
        };
        self.client.create(&guest).map_err(host_error)
    }

    fn reconfigure(&self, kind: ResourceKind, id: u32, changes: &[AttributeChange]) -> Result<()> {
        let kind = guest_kind(kind);
        let mut update = ConfigUpdate::default();
        let mut disk_mb = None;

        for change in changes {
            match change {
                AttributeChange::Memory(mb) => update.memory_mb = Some(*mb),
                AttributeChange::Cores(n) => update.cores = Some(*n),
                AttributeChange::Hostname(h) => update.name = Some(h.clone()),
                AttributeChange::Network(n) => update.net0 = Some(n.clone()),
                AttributeChange::Storage(mb) => disk_mb = Some(*mb),
            }
        }

        if !update.is_empty() {
            self.client.update(kind, id, &update).map_err(host_error)?;
        }
        if let Some(mb) = disk_mb {
            self.client
                .grow_disk(kind, id, mb)
                .map_err(host_error)
                .context("Failed to grow root disk")?;
        }
        Ok(())
    }

    fn start(&self, kind: ResourceKind, id: u32) -> Result<()> {
        self.client.start(guest_kind(kind), id).map_err(host_error)
    }

    fn shutdown(&self, kind: ResourceKind, id: u32) -> Result<()> {
        self.client
            .shutdown(guest_kind(kind), id)
            .map_err(host_error)
    }

    fn force_stop(&self, kind: ResourceKind, id: u32) -> Result<()> {
        self.client.stop(guest_kind(kind), id).map_err(host_error)
    }
}
