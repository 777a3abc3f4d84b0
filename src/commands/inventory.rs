//! `hostsync inventory` - print what the host has

use anyhow::Result;
use declarative::InventoryEntry;
use std::fmt::Write;
use std::process::ExitCode;

use crate::Context;
use crate::cli::Format;
use crate::config::EngineConfig;
use crate::host::PveHost;
use crate::ui;

pub fn run(ctx: &Context, format: Format) -> Result<ExitCode> {
    let config = EngineConfig::load(ctx.config.as_deref())?;
    let host = PveHost::new(&config);
    let entries = declarative::inventory::scan(&host)?;

    match format {
        Format::Text => print!("{}", render(&entries)),
        Format::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
    }

    if !ctx.quiet {
        ui::info(&format!("{} resource(s) on this host", entries.len()));
    }
    Ok(ExitCode::SUCCESS)
}

fn render(entries: &[InventoryEntry]) -> String {
    let mut out = String::new();
    for e in entries {
        let cores = e.actual_cores.map_or_else(|| "-".to_string(), |c| c.to_string());
        // Writing to a String cannot fail
        let _ = writeln!(
            out,
            "{:<15} {:>6}  {:<10} {:>7}M  cores={:<3} {}",
            e.kind.as_str(),
            e.id,
            e.actual_power.to_string(),
            e.actual_memory_mb,
            cores,
            e.actual_hostname
        );
    }
    out
}
