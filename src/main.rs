mod cli;
mod commands;
mod config;
mod host;
mod lock;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        quiet: cli.quiet,
        config: cli.config,
    };

    match dispatch(&ctx, cli.command) {
        Ok(code) => code,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            let lock_timeout = matches!(
                e.downcast_ref::<lock::LockError>(),
                Some(lock::LockError::Timeout { .. })
            );
            if lock_timeout {
                commands::exit(commands::EXIT_LOCK_TIMEOUT)
            } else {
                commands::exit(commands::EXIT_FATAL)
            }
        }
    }
}

fn dispatch(ctx: &Context, command: Command) -> Result<ExitCode> {
    match command {
        Command::Reconcile {
            manifest,
            live,
            format,
        } => commands::reconcile::run(ctx, &manifest, live, format),
        Command::Validate { manifest } => commands::validate::run(ctx, &manifest),
        Command::Inventory { format } => commands::inventory::run(ctx, format),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "hostsync", &mut io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}
