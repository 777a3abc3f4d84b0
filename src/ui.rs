//! Terminal output on stderr
//!
//! stdout carries the report only, so everything here goes to stderr.

use colored::Colorize;
use declarative::{MutationOutcome, ProgressCallback, Step};
use indicatif::{ProgressBar, ProgressStyle};

/// Print an info message
pub fn info(msg: &str) {
    eprintln!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    eprintln!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    eprintln!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    eprintln!("  {}", msg.dimmed());
}

// ============================================================================
// Live Progress
// ============================================================================

/// Progress bar over the resources of a live run
pub struct TermProgress {
    bar: ProgressBar,
    quiet: bool,
}

impl TermProgress {
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: ProgressBar::hidden(),
            quiet,
        }
    }
}

impl ProgressCallback for TermProgress {
    fn on_batch_start(&mut self, count: usize) {
        if self.quiet {
            return;
        }
        let bar = ProgressBar::new(count as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        self.bar = bar;
    }

    fn on_resource_start(&mut self, _id: u32, description: &str) {
        self.bar.set_message(description.to_string());
    }

    fn on_step(&mut self, id: u32, step: Step) {
        self.bar.set_message(format!("{id}: {step}"));
    }

    fn on_resource_complete(&mut self, outcome: &MutationOutcome) {
        if !self.quiet {
            let line = match &outcome.failure {
                None => format!("  {} {} {}", "✓".green(), outcome.kind, outcome.id),
                Some(failure) => format!(
                    "  {} {} {} ({}: {})",
                    "✗".red(),
                    outcome.kind,
                    outcome.id,
                    failure.step,
                    failure.message
                ),
            };
            self.bar.suspend(|| eprintln!("{line}"));
        }
        self.bar.inc(1);
    }

    fn on_batch_complete(&mut self) {
        self.bar.finish_and_clear();
    }
}
