//! `hostsync reconcile` - one dry or live run under the run lock

use anyhow::{Context as _, Result};
use declarative::{Mode, RunReport, Verdict};
use std::path::Path;
use std::process::ExitCode;

use super::{EXIT_BLOCKED, EXIT_PARTIAL, exit};
use crate::Context;
use crate::cli::Format;
use crate::config::EngineConfig;
use crate::host::PveHost;
use crate::lock::RunLock;
use crate::ui::{self, TermProgress};

pub fn run(ctx: &Context, manifest: &Path, live: bool, format: Format) -> Result<ExitCode> {
    let config = EngineConfig::load(ctx.config.as_deref())?;

    // Held until this function returns, on every path
    let lock = RunLock::acquire(&config.lock_path(), config.lock_wait())?;
    log::info!("holding {}", lock.path().display());

    let loaded = declarative::manifest::load(manifest)?;
    let host = PveHost::new(&config);
    for tool in host.unavailable_tools() {
        log::warn!("{tool} is not available; the scan will fail");
    }

    let mode = if live { Mode::Live } else { Mode::Dry };
    let mut progress = TermProgress::new(ctx.quiet);
    let report = declarative::run(&loaded, &host, mode, &mut progress)
        .context("Reconciliation aborted before any decision")?;

    match format {
        Format::Text => print!("{}", report.render_text()),
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if !ctx.quiet {
        summarize(&report);
    }
    Ok(exit(exit_code(&report)))
}

fn exit_code(report: &RunReport) -> u8 {
    match report.verdict {
        Verdict::Blocked => EXIT_BLOCKED,
        Verdict::Applied if report.failures() > 0 => EXIT_PARTIAL,
        _ => 0,
    }
}

fn summarize(report: &RunReport) {
    match report.verdict {
        Verdict::Blocked => ui::warn(&format!(
            "Blocked: {} foreign resource(s), {} configuration error(s); nothing was changed",
            report.foreign.len(),
            report.errors.len()
        )),
        Verdict::Proceed => ui::info(&format!(
            "Dry run: {} to create, {} to update; rerun with --live to apply",
            report.missing.len(),
            report.diffs.len()
        )),
        Verdict::Converged => ui::success("Host matches the manifest"),
        Verdict::Applied => {
            let failed = report.failures();
            let applied = report.outcomes.len() - failed;
            if failed == 0 {
                ui::success(&format!("Applied {applied} resource(s)"));
            } else {
                ui::error(&format!("Applied {applied} resource(s), {failed} failed"));
                for outcome in report.outcomes.iter().filter(|o| !o.succeeded()) {
                    ui::dim(&format!("{} {}", outcome.kind, outcome.id));
                }
            }
        }
    }
}
