//! `hostsync validate` - manifest checks only, no host access

use anyhow::Result;
use declarative::LoadedManifest;
use declarative::report::MARKER_ERROR;
use std::path::Path;
use std::process::ExitCode;

use super::{EXIT_BLOCKED, exit};
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, manifest: &Path) -> Result<ExitCode> {
    let loaded = declarative::manifest::load(manifest)?;

    print!("{}", render(&loaded));

    if loaded.manifest.is_valid() {
        if !ctx.quiet {
            ui::success(&format!(
                "{} resource(s), {:?} manifest {}",
                loaded.manifest.specs.len(),
                loaded.format,
                loaded.digest
            ));
        }
        Ok(ExitCode::SUCCESS)
    } else {
        if !ctx.quiet {
            ui::error(&format!(
                "{} configuration error(s); a reconcile run would be blocked",
                loaded.manifest.errors.len()
            ));
        }
        Ok(exit(EXIT_BLOCKED))
    }
}

fn render(loaded: &LoadedManifest) -> String {
    let mut errors = loaded.manifest.errors.clone();
    errors.sort();
    errors
        .iter()
        .map(|e| format!("{MARKER_ERROR} {e}\n"))
        .collect()
}
