//! Run report and its text serialization
//!
//! The text form is read by the external scheduler: each finding is one
//! line starting with an uppercase marker, the run ends with a `VERDICT`
//! line. Markers are stable; new information goes into new markers.

use crate::diff::ResourceDiff;
use crate::executor::MutationOutcome;
use crate::gate::ForeignResource;
use crate::manifest::ConfigError;
use crate::types::{ResourceSpec, single_line};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

pub const MARKER_MISSING: &str = "MISSING";
pub const MARKER_DRIFT: &str = "DRIFT";
pub const MARKER_FOREIGN: &str = "FOREIGN";
pub const MARKER_ERROR: &str = "ERROR";
pub const MARKER_APPLIED: &str = "APPLIED";
pub const MARKER_FAILED: &str = "FAILED";
pub const MARKER_VERDICT: &str = "VERDICT";

/// Run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Dry,
    Live,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dry => f.write_str("dry"),
            Self::Live => f.write_str("live"),
        }
    }
}

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// The gate refused; nothing was changed
    Blocked,
    /// Dry run, the gate would let a live run apply pending work
    Proceed,
    /// Nothing to do
    Converged,
    /// A live run attempted mutations
    Applied,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Blocked => "BLOCKED",
            Self::Proceed => "PROCEED",
            Self::Converged => "CONVERGED",
            Self::Applied => "APPLIED",
        })
    }
}

/// Everything one run found and did
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub mode: Mode,
    pub manifest: String,
    pub digest: String,
    pub missing: Vec<ResourceSpec>,
    pub diffs: Vec<ResourceDiff>,
    pub foreign: Vec<ForeignResource>,
    pub errors: Vec<ConfigError>,
    /// Managed resources without drift
    pub converged: usize,
    pub outcomes: Vec<MutationOutcome>,
    pub verdict: Verdict,
}

impl RunReport {
    /// Number of resources whose mutation failed
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded()).count()
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> fmt::Result {
        writeln!(
            out,
            "# hostsync {} run, manifest {} ({})",
            self.mode,
            single_line(&self.manifest),
            self.digest
        )?;

        for error in &self.errors {
            writeln!(out, "{MARKER_ERROR} {error}")?;
        }

        for foreign in &self.foreign {
            let entry = &foreign.entry;
            writeln!(
                out,
                "{MARKER_FOREIGN} {} {} {} ({})",
                entry.kind,
                entry.id,
                single_line(&entry.actual_hostname),
                entry.actual_power
            )?;
            for line in foreign.adoption.lines() {
                writeln!(out, "  | {line}")?;
            }
        }

        for spec in &self.missing {
            writeln!(
                out,
                "{MARKER_MISSING} {} {} {} memory={}MB cores={} power={}",
                spec.kind, spec.id, spec.hostname, spec.memory_mb, spec.cores, spec.desired_power
            )?;
        }

        for diff in &self.diffs {
            for delta in &diff.deltas {
                writeln!(
                    out,
                    "{MARKER_DRIFT} {} {} {} [{}]",
                    diff.kind,
                    diff.id,
                    delta,
                    delta.strategy()
                )?;
            }
        }

        for outcome in &self.outcomes {
            let steps = outcome
                .steps
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            match &outcome.failure {
                None => writeln!(
                    out,
                    "{MARKER_APPLIED} {} {} {}",
                    outcome.kind, outcome.id, steps
                )?,
                Some(failure) => writeln!(
                    out,
                    "{MARKER_FAILED} {} {} {}: {} [completed: {}]",
                    outcome.kind,
                    outcome.id,
                    failure.step,
                    single_line(&failure.message),
                    if steps.is_empty() { "none" } else { steps.as_str() }
                )?,
            }
        }

        writeln!(
            out,
            "# missing={} drifted={} converged={} foreign={} errors={}",
            self.missing.len(),
            self.diffs.len(),
            self.converged,
            self.foreign.len(),
            self.errors.len()
        )?;
        writeln!(out, "{MARKER_VERDICT} {}", self.verdict)
    }
}
