//! Partition manifest and inventory by id

use crate::manifest::ConfigError;
use crate::types::{InventoryEntry, ResourceSpec};
use std::collections::BTreeMap;

/// A manifest resource that exists on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Managed {
    pub spec: ResourceSpec,
    pub actual: InventoryEntry,
}

/// Three-way partition of every id seen in the manifest or on the host.
///
/// All lists are sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub managed: Vec<Managed>,
    /// On the host, not in the manifest
    pub foreign: Vec<InventoryEntry>,
    /// In the manifest, not on the host
    pub missing: Vec<ResourceSpec>,
    /// Problems only visible once the manifest meets the host
    pub errors: Vec<ConfigError>,
}

impl Classification {
    /// Managed resources whose kind agrees with the host
    pub fn comparable(&self) -> impl Iterator<Item = &Managed> {
        self.managed.iter().filter(|m| m.spec.kind == m.actual.kind)
    }
}

/// Classify by numeric id equality only.
pub fn classify(specs: &[ResourceSpec], inventory: &[InventoryEntry]) -> Classification {
    let desired: BTreeMap<u32, &ResourceSpec> = specs.iter().map(|s| (s.id, s)).collect();
    let actual: BTreeMap<u32, &InventoryEntry> = inventory.iter().map(|e| (e.id, e)).collect();

    let mut result = Classification::default();

    for (id, entry) in &actual {
        match desired.get(id) {
            Some(spec) => {
                if spec.kind != entry.kind {
                    result.errors.push(ConfigError::resource(
                        *id,
                        format!(
                            "declared as {} but the host has a {} with this id",
                            spec.kind, entry.kind
                        ),
                    ));
                }
                result.managed.push(Managed {
                    spec: (*spec).clone(),
                    actual: (*entry).clone(),
                });
            }
            None => result.foreign.push((*entry).clone()),
        }
    }

    for (id, spec) in &desired {
        if actual.contains_key(id) {
            continue;
        }
        if spec.template.is_none() {
            result.errors.push(ConfigError::resource(
                *id,
                "missing on the host and has no template to create it from",
            ));
        }
        result.missing.push((*spec).clone());
    }

    result
}
