//! Bounded command execution.
//!
//! Every tool call goes through [`run_bounded`]. A child that outlives its
//! bound is killed and reaped, and the call returns [`Error::Timeout`].

use crate::error::{Error, Result};
use std::io::Read;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run `program args...` and wait at most `timeout` for it to exit.
///
/// Output pipes are drained on helper threads so a chatty child cannot
/// block on a full pipe while we poll.
pub fn run_bounded(program: &str, args: &[String], timeout: Duration) -> Result<Output> {
    let display = display_command(program, args);
    log::debug!("exec: {display} (bound {}s)", timeout.as_secs());

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ToolNotFound(program.to_string()),
            _ => Error::Io(e),
        })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(e) => {
                log::warn!("lost track of `{display}` ({e}), killing it");
                reap(&mut child);
                return Err(Error::Io(e));
            }
        }
        if started.elapsed() >= timeout {
            log::warn!("killing `{display}` after {}s", timeout.as_secs());
            reap(&mut child);
            return Err(Error::Timeout {
                command: display,
                after: timeout,
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(Output {
        status,
        stdout: stdout.map(join_drain).unwrap_or_default(),
        stderr: stderr.map(join_drain).unwrap_or_default(),
    })
}

/// Render a command line for logs and error messages.
pub fn display_command(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Kill a child and wait for it so no zombie is left behind.
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_drain(handle: thread::JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_run_bounded_captures_output() {
        let output = run_bounded("sh", &args(&["-c", "echo out; echo err >&2"]), Duration::from_secs(10))
            .unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "out\n");
        assert_eq!(String::from_utf8_lossy(&output.stderr), "err\n");
    }

    #[test]
    fn test_run_bounded_times_out() {
        let started = Instant::now();
        let err = run_bounded("sleep", &args(&["5"]), Duration::from_millis(200)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_run_bounded_missing_tool() {
        let err = run_bounded("/nonexistent/pct", &[], Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ToolNotFound);
    }

    #[test]
    fn test_run_bounded_reports_failure_status() {
        let output = run_bounded("sh", &args(&["-c", "exit 3"]), Duration::from_secs(10)).unwrap();
        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn test_reap_leaves_no_running_child() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        reap(&mut child);
        assert!(child.try_wait().unwrap().is_some());
    }

    #[test]
    fn test_display_command() {
        assert_eq!(display_command("qm", &args(&["start", "100"])), "qm start 100");
        assert_eq!(display_command("pct", &[]), "pct");
    }
}
