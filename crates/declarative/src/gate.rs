//! Safety gate: decide whether a run may mutate the host

use crate::manifest::{ConfigError, ManifestEntry, to_toml_fragment};
use crate::types::InventoryEntry;
use serde::{Deserialize, Serialize};

/// Gate decision for the whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Proceed,
    Block,
}

/// A host resource the manifest does not declare
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignResource {
    #[serde(flatten)]
    pub entry: InventoryEntry,
    /// Manifest fragment that would bring the resource under management
    pub adoption: String,
}

impl ForeignResource {
    pub fn new(entry: InventoryEntry) -> Self {
        let adoption = to_toml_fragment(&ManifestEntry::from(&entry));
        Self { entry, adoption }
    }
}

/// Any foreign resource or configuration error blocks the run.
pub fn evaluate(foreign: &[ForeignResource], errors: &[ConfigError]) -> Decision {
    if !foreign.is_empty() {
        log::info!("{} foreign resource(s) on the host, blocking", foreign.len());
        return Decision::Block;
    }
    if !errors.is_empty() {
        log::info!("{} configuration error(s), blocking", errors.len());
        return Decision::Block;
    }
    Decision::Proceed
}
