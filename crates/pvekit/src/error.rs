//! Error types for Proxmox guest tool operations.
//!
//! Errors are categorized so callers can tell a missing guest apart from a
//! guest that is locked by another task, or from a command that simply hung.
//! Each error carries enough context to show the operator what failed.

use std::time::Duration;
use thiserror::Error;

/// Categories of guest tool errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The command did not finish within its time bound
    Timeout,
    /// The guest (or its configuration file) does not exist
    NotFound,
    /// The guest is locked by another task (backup, migration, ...)
    Locked,
    /// `pct` or `qm` is not installed or not executable
    ToolNotFound,
    /// Tool output could not be understood
    Parse,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether the condition is likely to clear up on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Locked)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Timeout => "Command timed out",
            Self::NotFound => "Guest not found",
            Self::Locked => "Guest is locked",
            Self::ToolNotFound => "Proxmox tools not installed",
            Self::Parse => "Unexpected tool output",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Timeout => "Check the guest console; the next run will retry",
            Self::NotFound => "The guest may have been removed concurrently",
            Self::Locked => "Wait for the running task to finish (see the Proxmox task log)",
            Self::ToolNotFound => "Run on a Proxmox VE host or configure the tool paths",
            Self::Parse => "Check the Proxmox VE version; output format may have changed",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while driving `pct` / `qm`.
#[derive(Debug, Error)]
pub enum Error {
    /// A command exceeded its time bound and was killed
    #[error("`{command}` timed out after {}s", .after.as_secs())]
    Timeout {
        /// The command line that was running
        command: String,
        /// The bound that was exceeded
        after: Duration,
    },

    /// Guest does not exist
    #[error("guest {vmid} not found")]
    NotFound {
        /// Guest id
        vmid: u32,
    },

    /// Guest is locked by another task
    #[error("guest {vmid} is locked: {message}")]
    Locked {
        /// Guest id
        vmid: u32,
        /// Lock reason reported by the tool
        message: String,
    },

    /// The tool binary could not be executed
    #[error("{0} not found. Is this a Proxmox VE host?")]
    ToolNotFound(String),

    /// Tool output could not be parsed
    #[error("could not parse {what}: {line}")]
    Parse {
        /// What was being parsed
        what: &'static str,
        /// The offending line
        line: String,
    },

    /// Command exited with a failure status
    #[error("{message}: {stderr}")]
    CommandFailed {
        /// Description of what command failed
        message: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// Refused before running anything
    #[error("{0}")]
    Invalid(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Locked { .. } => ErrorCategory::Locked,
            Error::ToolNotFound(_) => ErrorCategory::ToolNotFound,
            Error::Parse { .. } => ErrorCategory::Parse,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is a missing guest.
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// Create an error from `pct`/`qm` stderr.
    ///
    /// Analyzes stderr to categorize the error appropriately.
    pub fn from_tool_output(command: &str, stderr: &str, vmid: Option<u32>) -> Self {
        let stderr_lower = stderr.to_lowercase();

        if let Some(vmid) = vmid {
            // "Configuration file 'nodes/pve/lxc/123.conf' does not exist"
            if stderr_lower.contains("does not exist") || stderr_lower.contains("no such vm") {
                return Error::NotFound { vmid };
            }

            // "CT is locked (backup)", "VM is locked (migrate)",
            // "can't lock file '/var/lock/qemu-server/lock-100.conf' - got timeout"
            if stderr_lower.contains("is locked") || stderr_lower.contains("can't lock file") {
                return Error::Locked {
                    vmid,
                    message: stderr.trim().to_string(),
                };
            }
        }

        Error::CommandFailed {
            message: format!("`{command}` failed"),
            stderr: stderr.trim().to_string(),
        }
    }
}

/// Result type for guest tool operations.
pub type Result<T> = std::result::Result<T, Error>;
