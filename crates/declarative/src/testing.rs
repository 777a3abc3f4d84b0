//! In-memory host used by the engine tests

use crate::context::HostControl;
use crate::diff::desired_disk_mb;
use crate::types::{
    AttributeChange, InventoryEntry, ObservedPower, ResourceKind, ResourceSpec, format_mb,
};
use anyhow::{Result, bail};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// A recorded host call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Scan,
    Power(u32),
    Create(u32),
    Reconfigure(u32, Vec<AttributeChange>),
    Start(u32),
    Shutdown(u32),
    ForceStop(u32),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Scan | Self::Power(_))
    }
}

/// Host that keeps its resource table in memory and records every call
#[derive(Default)]
pub struct FakeHost {
    resources: Mutex<BTreeMap<u32, InventoryEntry>>,
    calls: Mutex<Vec<Call>>,
    /// `(operation, id)` pairs that fail
    failing: Mutex<BTreeSet<(&'static str, u32)>>,
    /// Ids that ignore graceful shutdown
    stubborn: Mutex<BTreeSet<u32>>,
    scan_error: Mutex<Option<String>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(entries: impl IntoIterator<Item = InventoryEntry>) -> Self {
        let host = Self::new();
        for entry in entries {
            host.insert(entry);
        }
        host
    }

    pub fn insert(&self, entry: InventoryEntry) {
        self.resources.lock().unwrap().insert(entry.id, entry);
    }

    pub fn get(&self, id: u32) -> Option<InventoryEntry> {
        self.resources.lock().unwrap().get(&id).cloned()
    }

    pub fn fail(&self, operation: &'static str, id: u32) {
        self.failing.lock().unwrap().insert((operation, id));
    }

    pub fn ignore_shutdown(&self, id: u32) {
        self.stubborn.lock().unwrap().insert(id);
    }

    pub fn fail_scan(&self, message: &str) {
        *self.scan_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: Call, operation: &'static str, id: u32) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(&(operation, id)) {
            bail!("{operation} {id} failed: simulated");
        }
        Ok(())
    }

    fn with_entry<T>(&self, id: u32, f: impl FnOnce(&mut InventoryEntry) -> T) -> Result<T> {
        let mut resources = self.resources.lock().unwrap();
        match resources.get_mut(&id) {
            Some(entry) => Ok(f(entry)),
            None => bail!("resource {id} does not exist"),
        }
    }
}

impl HostControl for FakeHost {
    fn scan(&self) -> Result<Vec<InventoryEntry>> {
        self.calls.lock().unwrap().push(Call::Scan);
        if let Some(message) = self.scan_error.lock().unwrap().clone() {
            bail!(message);
        }
        Ok(self.resources.lock().unwrap().values().cloned().collect())
    }

    fn power(&self, _kind: ResourceKind, id: u32) -> Result<ObservedPower> {
        self.record(Call::Power(id), "power", id)?;
        self.with_entry(id, |e| e.actual_power.clone())
    }

    fn create(&self, spec: &ResourceSpec) -> Result<()> {
        self.record(Call::Create(spec.id), "create", spec.id)?;
        let storage = spec
            .storage_spec
            .as_deref()
            .and_then(desired_disk_mb)
            .map(|mb| format!("local-lvm:vm-{}-disk-0,size={}", spec.id, format_mb(mb)));
        self.insert(InventoryEntry {
            kind: spec.kind,
            id: spec.id,
            actual_hostname: spec.hostname.clone(),
            actual_memory_mb: spec.memory_mb,
            actual_cores: Some(spec.cores),
            actual_network: spec.network_spec.clone(),
            actual_storage: storage,
            actual_power: ObservedPower::Stopped,
        });
        Ok(())
    }

    fn reconfigure(&self, _kind: ResourceKind, id: u32, changes: &[AttributeChange]) -> Result<()> {
        self.record(Call::Reconfigure(id, changes.to_vec()), "reconfigure", id)?;
        self.with_entry(id, |entry| {
            for change in changes {
                match change {
                    AttributeChange::Memory(mb) => entry.actual_memory_mb = *mb,
                    AttributeChange::Cores(n) => entry.actual_cores = Some(*n),
                    AttributeChange::Hostname(h) => entry.actual_hostname = h.clone(),
                    AttributeChange::Network(n) => entry.actual_network = Some(n.clone()),
                    AttributeChange::Storage(mb) => {
                        entry.actual_storage =
                            Some(format!("local-lvm:vm-{id}-disk-0,size={}", format_mb(*mb)));
                    }
                }
            }
        })
    }

    fn start(&self, _kind: ResourceKind, id: u32) -> Result<()> {
        self.record(Call::Start(id), "start", id)?;
        self.with_entry(id, |e| e.actual_power = ObservedPower::Running)
    }

    fn shutdown(&self, _kind: ResourceKind, id: u32) -> Result<()> {
        self.record(Call::Shutdown(id), "shutdown", id)?;
        if self.stubborn.lock().unwrap().contains(&id) {
            return Ok(());
        }
        self.with_entry(id, |e| e.actual_power = ObservedPower::Stopped)
    }

    fn force_stop(&self, _kind: ResourceKind, id: u32) -> Result<()> {
        self.record(Call::ForceStop(id), "force_stop", id)?;
        self.with_entry(id, |e| e.actual_power = ObservedPower::Stopped)
    }
}
