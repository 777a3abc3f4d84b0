//! # Declarative
//!
//! Desired-state reconciliation for a virtualization host.
//!
//! This crate holds the engine: it compares a manifest of containers and
//! virtual machines against the host's inventory and drives the host toward
//! the manifest without ever acting on a host it does not fully understand.
//!
//! ## Core Concepts
//!
//! - **Manifest**: the desired resources, validated as a whole
//! - **Classification**: every id is managed, foreign or missing
//! - **Diff**: per managed resource, the attributes that drifted
//! - **Gate**: foreign resources or configuration errors block the run
//! - **Executor**: applies a plan one resource at a time, stopping a
//!   resource only when an attribute cannot change while it runs
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{Mode, NoProgress, manifest, run};
//!
//! let loaded = manifest::load("hosts.toml".as_ref())?;
//! let report = run(&loaded, &host, Mode::Dry, &mut NoProgress)?;
//! print!("{}", report.render_text());
//! ```
//!
//! ## Provider Traits
//!
//! - [`HostControl`]: the host's query and mutation surface
//! - [`ProgressCallback`]: receives progress while mutations run

pub mod classify;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod gate;
pub mod inventory;
pub mod manifest;
pub mod planner;
pub mod report;
pub mod run;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use classify::{Classification, Managed, classify};
pub use context::{HostControl, NoProgress, ProgressCallback};
pub use diff::{Delta, ResourceDiff, Strategy, detect};
pub use error::{Error, Result};
pub use executor::{Action, MutationOutcome, Step, StepFailure, execute};
pub use gate::{Decision, ForeignResource};
pub use manifest::{ConfigError, LoadedManifest, Manifest, ManifestFormat};
pub use planner::ExecutionPlan;
pub use report::{Mode, RunReport, Verdict};
pub use run::{Assessment, assess, run};
pub use types::{
    AttributeChange, InventoryEntry, ObservedPower, PowerState, ResourceKind, ResourceSpec,
};
