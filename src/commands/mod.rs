pub mod inventory;
pub mod reconcile;
pub mod validate;

use std::process::ExitCode;

/// Unrecoverable error before any decision was made
pub const EXIT_FATAL: u8 = 1;
/// The safety gate refused the run
pub const EXIT_BLOCKED: u8 = 2;
/// Another run holds the lock
pub const EXIT_LOCK_TIMEOUT: u8 = 3;
/// Applied, but at least one resource failed
pub const EXIT_PARTIAL: u8 = 4;

pub fn exit(code: u8) -> ExitCode {
    ExitCode::from(code)
}
