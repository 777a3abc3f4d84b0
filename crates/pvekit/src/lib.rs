//! # pvekit
//!
//! Pure Rust wrapper around the Proxmox VE guest tools.
//!
//! This crate provides functionality for:
//! - Listing containers (`pct`) and virtual machines (`qm`) with their config
//! - Creating, reconfiguring, starting and stopping guests
//! - Bounding every tool invocation in time, killing commands that hang
//!
//! ## Example
//!
//! ```no_run
//! use pvekit::{Client, GuestKind};
//!
//! let client = Client::new(Default::default(), Default::default());
//!
//! for guest in client.scan(GuestKind::Lxc).expect("scan failed") {
//!     println!("{} {:?}", guest.config.vmid, guest.status);
//! }
//! ```

#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod exec;
pub mod parse;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use types::{
    ConfigUpdate, DiskEntry, GuestConfig, GuestInfo, GuestKind, GuestSpec, GuestStatus,
    GuestSummary, Timeouts, ToolPaths,
};

use backend::{Backend, cli::CliBackend};
use std::time::Duration;

/// High-level client for guest operations.
///
/// The client wraps a backend and adds the multi-call operations the tools
/// do not offer directly (full scans, disk growth by logical name).
pub struct Client {
    backend: Box<dyn Backend>,
    graceful_stop: Duration,
}

impl Client {
    /// Create a client driving the real tools.
    pub fn new(tools: ToolPaths, timeouts: Timeouts) -> Self {
        Self {
            backend: Box::new(CliBackend::new(tools, timeouts)),
            graceful_stop: timeouts.graceful_stop,
        }
    }

    /// Create a client with a custom backend (useful for testing).
    pub fn with_backend(backend: Box<dyn Backend>, graceful_stop: Duration) -> Self {
        Self {
            backend,
            graceful_stop,
        }
    }

    /// Check if the tool for a kind is available.
    pub fn is_available(&self, kind: GuestKind) -> bool {
        self.backend.is_available(kind)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// List every guest of a kind together with its config.
    ///
    /// A guest that vanishes between the list and the config read is
    /// skipped; any other failure fails the whole scan.
    pub fn scan(&self, kind: GuestKind) -> Result<Vec<GuestInfo>> {
        let mut guests = Vec::new();
        for summary in self.backend.list(kind)? {
            match self.backend.config(kind, summary.vmid) {
                Ok(config) => guests.push(GuestInfo {
                    status: summary.status,
                    config,
                }),
                Err(e) if e.is_not_found() => {
                    log::debug!("{kind} {} disappeared during scan", summary.vmid);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(guests)
    }

    /// Query a guest's power status.
    pub fn status(&self, kind: GuestKind, vmid: u32) -> Result<GuestStatus> {
        self.backend.status(kind, vmid)
    }

    /// Read a guest's config.
    pub fn config(&self, kind: GuestKind, vmid: u32) -> Result<GuestConfig> {
        self.backend.config(kind, vmid)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create a guest.
    pub fn create(&self, spec: &GuestSpec) -> Result<()> {
        self.backend.create(spec)
    }

    /// Apply config changes with a single call.
    pub fn update(&self, kind: GuestKind, vmid: u32, update: &ConfigUpdate) -> Result<()> {
        self.backend.update(kind, vmid, update)
    }

    /// Grow the guest's root/boot disk to `size_mb`.
    pub fn grow_disk(&self, kind: GuestKind, vmid: u32, size_mb: u64) -> Result<()> {
        let config = self.backend.config(kind, vmid)?;
        let disk = config
            .disk
            .ok_or_else(|| Error::Invalid(format!("{kind} {vmid} has no root disk")))?;
        self.backend.resize(kind, vmid, &disk.key, size_mb)
    }

    /// Start a guest.
    pub fn start(&self, kind: GuestKind, vmid: u32) -> Result<()> {
        self.backend.start(kind, vmid)
    }

    /// Graceful shutdown using the configured grace period.
    pub fn shutdown(&self, kind: GuestKind, vmid: u32) -> Result<()> {
        self.backend.shutdown(kind, vmid, self.graceful_stop)
    }

    /// Immediate stop.
    pub fn stop(&self, kind: GuestKind, vmid: u32) -> Result<()> {
        self.backend.stop(kind, vmid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory backend with one container whose config read can be made to fail.
    struct FakeBackend {
        config_error: Mutex<Option<Error>>,
        resized: Mutex<Vec<(String, u64)>>,
    }

    impl FakeBackend {
        fn new(config_error: Option<Error>) -> Self {
            Self {
                config_error: Mutex::new(config_error),
                resized: Mutex::new(Vec::new()),
            }
        }
    }

    impl Backend for FakeBackend {
        fn is_available(&self, _kind: GuestKind) -> bool {
            true
        }

        fn list(&self, kind: GuestKind) -> Result<Vec<GuestSummary>> {
            Ok(vec![GuestSummary {
                vmid: 100,
                kind,
                status: GuestStatus::Running,
            }])
        }

        fn config(&self, kind: GuestKind, vmid: u32) -> Result<GuestConfig> {
            if let Some(e) = self.config_error.lock().unwrap().take() {
                return Err(e);
            }
            Ok(GuestConfig {
                vmid,
                kind,
                name: Some("web01".to_string()),
                memory_mb: 1024,
                cores: Some(2),
                net0: None,
                disk: Some(DiskEntry {
                    key: "rootfs".to_string(),
                    value: "local-lvm:vm-100-disk-0,size=8G".to_string(),
                }),
            })
        }

        fn status(&self, _kind: GuestKind, _vmid: u32) -> Result<GuestStatus> {
            Ok(GuestStatus::Running)
        }

        fn create(&self, _spec: &GuestSpec) -> Result<()> {
            Ok(())
        }

        fn update(&self, _kind: GuestKind, _vmid: u32, _update: &ConfigUpdate) -> Result<()> {
            Ok(())
        }

        fn resize(&self, _kind: GuestKind, _vmid: u32, disk: &str, size_mb: u64) -> Result<()> {
            self.resized.lock().unwrap().push((disk.to_string(), size_mb));
            Ok(())
        }

        fn start(&self, _kind: GuestKind, _vmid: u32) -> Result<()> {
            Ok(())
        }

        fn shutdown(&self, _kind: GuestKind, _vmid: u32, _grace: Duration) -> Result<()> {
            Ok(())
        }

        fn stop(&self, _kind: GuestKind, _vmid: u32) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_scan_joins_list_and_config() {
        let client = Client::with_backend(Box::new(FakeBackend::new(None)), Duration::from_secs(1));
        let guests = client.scan(GuestKind::Lxc).unwrap();
        assert_eq!(guests.len(), 1);
        assert_eq!(guests[0].config.memory_mb, 1024);
        assert!(guests[0].status.is_running());
    }

    #[test]
    fn test_scan_skips_vanished_guest() {
        let backend = FakeBackend::new(Some(Error::NotFound { vmid: 100 }));
        let client = Client::with_backend(Box::new(backend), Duration::from_secs(1));
        assert!(client.scan(GuestKind::Lxc).unwrap().is_empty());
    }

    #[test]
    fn test_scan_fails_on_other_errors() {
        let backend = FakeBackend::new(Some(Error::Timeout {
            command: "pct config 100".to_string(),
            after: Duration::from_secs(30),
        }));
        let client = Client::with_backend(Box::new(backend), Duration::from_secs(1));
        assert!(client.scan(GuestKind::Lxc).is_err());
    }

    #[test]
    fn test_grow_disk_uses_config_disk_key() {
        let client = Client::with_backend(Box::new(FakeBackend::new(None)), Duration::from_secs(1));
        client.grow_disk(GuestKind::Lxc, 100, 16384).unwrap();
    }
}
