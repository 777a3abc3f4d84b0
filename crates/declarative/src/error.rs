//! Error types for the reconciliation engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors that end a run before any decision is made
#[derive(Error, Debug)]
pub enum Error {
    /// Manifest file could not be read at all
    #[error("cannot read manifest {}: {source}", .path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Host inventory could not be obtained
    #[error("host query failed: {0}")]
    HostQuery(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;
