//! Process-wide run lock
//!
//! One exclusive `flock` on a well-known file. The kernel drops the lock
//! when the holder dies, so a killed run never wedges the next one.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another run holds {} (pid {holder}); gave up after {}s", .path.display(), .waited.as_secs())]
    Timeout {
        path: PathBuf,
        waited: Duration,
        holder: String,
    },

    #[error("cannot open lock file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Held lock; released on drop
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Acquire the lock, polling until `wait` has elapsed.
    pub fn acquire(path: &Path, wait: Duration) -> Result<Self, LockError> {
        let io_error = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        // Not truncated here: the current holder's pid stays readable
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(io_error)?;

        let deadline = Instant::now() + wait;
        loop {
            if try_flock(&file) {
                record_pid(&mut file).map_err(io_error)?;
                log::debug!("acquired run lock {}", path.display());
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }

            if Instant::now() >= deadline {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited: wait,
                    holder: read_holder(&mut file),
                });
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // SAFETY: the descriptor is owned by `self.file` and still open.
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        log::debug!("released run lock {}", self.path.display());
    }
}

fn try_flock(file: &File) -> bool {
    // SAFETY: flock only inspects the descriptor, which `file` keeps open.
    unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) == 0 }
}

fn record_pid(file: &mut File) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())?;
    file.flush()
}

fn read_holder(file: &mut File) -> String {
    let mut content = String::new();
    if file.seek(SeekFrom::Start(0)).is_ok() && file.read_to_string(&mut content).is_ok() {
        let pid = content.trim();
        if !pid.is_empty() {
            return pid.to_string();
        }
    }
    "unknown".to_string()
}
