//! Backend abstraction for guest tool operations.
//!
//! The [`Backend`] trait defines the interface for interacting with the
//! Proxmox guest tools, allowing for different implementations (real CLI,
//! in-memory fakes for testing).

pub mod cli;

use crate::error::Result;
use crate::types::{ConfigUpdate, GuestConfig, GuestKind, GuestSpec, GuestStatus, GuestSummary};
use std::time::Duration;

/// Backend trait for guest operations.
///
/// Every method is expected to be bounded in time; an implementation that
/// shells out must kill a child that exceeds its bound.
pub trait Backend: Send + Sync {
    /// Check if the tool for this kind can be executed.
    fn is_available(&self, kind: GuestKind) -> bool;

    /// List all guests of a kind with their power status.
    fn list(&self, kind: GuestKind) -> Result<Vec<GuestSummary>>;

    /// Read a guest's current config.
    fn config(&self, kind: GuestKind, vmid: u32) -> Result<GuestConfig>;

    /// Query a guest's power status.
    fn status(&self, kind: GuestKind, vmid: u32) -> Result<GuestStatus>;

    /// Create a guest (left stopped).
    fn create(&self, spec: &GuestSpec) -> Result<()>;

    /// Apply config changes in one `set` call.
    fn update(&self, kind: GuestKind, vmid: u32, update: &ConfigUpdate) -> Result<()>;

    /// Grow a disk to an absolute size in MiB.
    fn resize(&self, kind: GuestKind, vmid: u32, disk: &str, size_mb: u64) -> Result<()>;

    /// Start a guest.
    fn start(&self, kind: GuestKind, vmid: u32) -> Result<()>;

    /// Ask the guest OS to shut down, giving it `grace` to comply.
    fn shutdown(&self, kind: GuestKind, vmid: u32, grace: Duration) -> Result<()>;

    /// Stop a guest immediately.
    fn stop(&self, kind: GuestKind, vmid: u32) -> Result<()>;
}

