//! Run coordinator: one dry pass, then mutation if the gate allows it

use crate::classify::classify;
use crate::context::{HostControl, ProgressCallback};
use crate::diff::{ResourceDiff, detect};
use crate::error::Result;
use crate::executor::execute;
use crate::gate::{self, Decision, ForeignResource};
use crate::inventory;
use crate::manifest::{ConfigError, LoadedManifest, Manifest};
use crate::planner::ExecutionPlan;
use crate::report::{Mode, RunReport, Verdict};
use crate::types::{InventoryEntry, ResourceSpec};

/// Everything the dry pass decides, computed without touching the host
#[derive(Debug, Clone)]
pub struct Assessment {
    pub missing: Vec<ResourceSpec>,
    pub diffs: Vec<ResourceDiff>,
    pub foreign: Vec<ForeignResource>,
    pub errors: Vec<ConfigError>,
    pub converged: usize,
    pub decision: Decision,
}

impl Assessment {
    pub fn has_pending_work(&self) -> bool {
        !self.missing.is_empty() || !self.diffs.is_empty()
    }
}

/// Classify, diff and gate a manifest against an inventory snapshot.
pub fn assess(manifest: &Manifest, inventory: &[InventoryEntry]) -> Assessment {
    let classification = classify(&manifest.specs, inventory);

    let mut errors = manifest.errors.clone();
    errors.extend(classification.errors.iter().cloned());

    let mut diffs = Vec::new();
    let mut converged = 0;
    for managed in classification.comparable() {
        match detect(&managed.spec, &managed.actual) {
            Some(diff) => diffs.push(diff),
            None => converged += 1,
        }
    }

    let foreign: Vec<_> = classification
        .foreign
        .into_iter()
        .map(ForeignResource::new)
        .collect();
    let decision = gate::evaluate(&foreign, &errors);

    Assessment {
        missing: classification.missing,
        diffs,
        foreign,
        errors,
        converged,
        decision,
    }
}

/// Run one reconciliation.
///
/// The caller holds the run lock. Only a failed host scan is an `Err`;
/// per-resource mutation failures are part of the report.
pub fn run<H, P>(
    loaded: &LoadedManifest,
    host: &H,
    mode: Mode,
    progress: &mut P,
) -> Result<RunReport>
where
    H: HostControl + ?Sized,
    P: ProgressCallback,
{
    let inventory = inventory::scan(host)?;
    let assessment = assess(&loaded.manifest, &inventory);

    log::info!(
        "{} missing, {} drifted, {} converged, {} foreign, {} config error(s)",
        assessment.missing.len(),
        assessment.diffs.len(),
        assessment.converged,
        assessment.foreign.len(),
        assessment.errors.len()
    );

    let (outcomes, verdict) = match (assessment.decision, mode) {
        (Decision::Block, _) => (Vec::new(), Verdict::Blocked),
        (Decision::Proceed, _) if !assessment.has_pending_work() => {
            (Vec::new(), Verdict::Converged)
        }
        (Decision::Proceed, Mode::Dry) => (Vec::new(), Verdict::Proceed),
        (Decision::Proceed, Mode::Live) => {
            let plan =
                ExecutionPlan::from_parts(assessment.missing.clone(), assessment.diffs.clone());
            log::info!(
                "applying {} resource(s), {} disruptive",
                plan.total_resources(),
                plan.disruptive()
            );
            (execute(&plan, host, progress), Verdict::Applied)
        }
    };

    Ok(RunReport {
        mode,
        manifest: loaded.path.display().to_string(),
        digest: loaded.digest.clone(),
        missing: assessment.missing,
        diffs: assessment.diffs,
        foreign: assessment.foreign,
        errors: assessment.errors,
        converged: assessment.converged,
        outcomes,
        verdict,
    })
}
