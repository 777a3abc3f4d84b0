use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hostsync")]
#[command(version)]
#[command(about = "Reconcile a Proxmox host with a manifest of containers and VMs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Engine config file
    #[arg(short, long, global = true, env = "HOSTSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compare the host against a manifest and, with --live, apply it
    Reconcile {
        /// Manifest file (TOML or JSON)
        manifest: PathBuf,

        /// Apply changes (default is a read-only dry run)
        #[arg(long)]
        live: bool,

        /// Report format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Check a manifest without touching the host
    Validate {
        /// Manifest file (TOML or JSON)
        manifest: PathBuf,
    },

    /// Show the containers and VMs on this host
    Inventory {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}
