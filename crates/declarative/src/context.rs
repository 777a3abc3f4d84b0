//! Host control and progress traits
//!
//! These traits allow the engine to be driven without depending on a
//! specific virtualization host or terminal UI.

use crate::executor::{MutationOutcome, Step};
use crate::types::{AttributeChange, InventoryEntry, ObservedPower, ResourceKind, ResourceSpec};
use anyhow::Result;

/// The host's control interface
///
/// Implementations bound every call in time; a call that does not finish
/// returns an error instead of blocking the run.
pub trait HostControl: Send + Sync {
    /// Every container and virtual machine currently on the host
    fn scan(&self) -> Result<Vec<InventoryEntry>>;

    /// Current power state of one resource
    fn power(&self, kind: ResourceKind, id: u32) -> Result<ObservedPower>;

    /// Create a resource (left stopped)
    fn create(&self, spec: &ResourceSpec) -> Result<()>;

    /// Apply all changes in one reconfiguration step
    fn reconfigure(&self, kind: ResourceKind, id: u32, changes: &[AttributeChange]) -> Result<()>;

    fn start(&self, kind: ResourceKind, id: u32) -> Result<()>;

    /// Graceful stop, waiting at most the configured grace period
    fn shutdown(&self, kind: ResourceKind, id: u32) -> Result<()>;

    /// Immediate stop
    fn force_stop(&self, kind: ResourceKind, id: u32) -> Result<()>;
}

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called before the first resource is touched
    fn on_batch_start(&mut self, count: usize);

    /// Called when starting to apply a single resource
    fn on_resource_start(&mut self, id: u32, description: &str);

    /// Called before each host-affecting step
    fn on_step(&mut self, id: u32, step: Step);

    /// Called when a resource application completes
    fn on_resource_complete(&mut self, outcome: &MutationOutcome);

    /// Called after the last resource
    fn on_batch_complete(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _count: usize) {}
    fn on_resource_start(&mut self, _id: u32, _description: &str) {}
    fn on_step(&mut self, _id: u32, _step: Step) {}
    fn on_resource_complete(&mut self, _outcome: &MutationOutcome) {}
    fn on_batch_complete(&mut self) {}
}
