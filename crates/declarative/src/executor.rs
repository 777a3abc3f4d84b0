//! Mutation sequencer - applies a plan resource by resource
//!
//! Resources are handled strictly one after another. A failing step ends
//! the work on that resource only; the next resource starts regardless.

use crate::context::{HostControl, ProgressCallback};
use crate::diff::ResourceDiff;
use crate::planner::ExecutionPlan;
use crate::types::{PowerState, ResourceKind, ResourceSpec, format_mb};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A host-affecting step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    Create,
    Shutdown,
    ForceStop,
    Reconfigure,
    Start,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Shutdown => "shutdown",
            Self::ForceStop => "force-stop",
            Self::Reconfigure => "reconfigure",
            Self::Start => "start",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
}

/// The step that ended work on a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: Step,
    pub message: String,
}

impl StepFailure {
    fn new(step: Step, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }
}

/// What happened to one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome {
    pub kind: ResourceKind,
    pub id: u32,
    pub action: Action,
    /// Steps that completed, in order
    pub steps: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StepFailure>,
}

impl MutationOutcome {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Apply a plan: creations first, then updates.
pub fn execute<H, P>(plan: &ExecutionPlan, host: &H, progress: &mut P) -> Vec<MutationOutcome>
where
    H: HostControl + ?Sized,
    P: ProgressCallback,
{
    let mut outcomes = Vec::with_capacity(plan.total_resources());
    if plan.is_empty() {
        return outcomes;
    }

    progress.on_batch_start(plan.total_resources());

    for spec in &plan.creates {
        progress.on_resource_start(spec.id, &format!("create {} {}", spec.kind, spec.hostname));
        let mut seq = Sequence::new(host, progress, spec.kind, spec.id);
        let result = create_steps(&mut seq, spec);
        let outcome = seq.finish(Action::Create, result);
        progress.on_resource_complete(&outcome);
        outcomes.push(outcome);
    }

    for diff in &plan.updates {
        let description = diff
            .deltas
            .iter()
            .map(|d| d.attribute())
            .collect::<Vec<_>>()
            .join(", ");
        progress.on_resource_start(diff.id, &format!("update {} ({description})", diff.hostname));
        let mut seq = Sequence::new(host, progress, diff.kind, diff.id);
        let result = update_steps(&mut seq, diff);
        let outcome = seq.finish(Action::Update, result);
        progress.on_resource_complete(&outcome);
        outcomes.push(outcome);
    }

    progress.on_batch_complete();
    outcomes
}

fn create_steps<H, P>(seq: &mut Sequence<'_, H, P>, spec: &ResourceSpec) -> Result<(), StepFailure>
where
    H: HostControl + ?Sized,
    P: ProgressCallback,
{
    seq.run(Step::Create, |h| h.create(spec))?;
    if spec.desired_power == PowerState::Running {
        seq.start()?;
    }
    Ok(())
}

fn update_steps<H, P>(seq: &mut Sequence<'_, H, P>, diff: &ResourceDiff) -> Result<(), StepFailure>
where
    H: HostControl + ?Sized,
    P: ProgressCallback,
{
    if let Some((actual, desired)) = diff.storage_shrink() {
        return Err(StepFailure::new(
            Step::Reconfigure,
            format!(
                "refusing to shrink root disk from {} to {}",
                format_mb(actual),
                format_mb(desired)
            ),
        ));
    }

    let changes = diff.changes();
    let (kind, id) = (diff.kind, diff.id);

    if diff.needs_cold_apply() {
        if !diff.actual_power.is_stopped() {
            seq.stop()?;
        }
        seq.run(Step::Reconfigure, |h| h.reconfigure(kind, id, &changes))?;
        if diff.desired_power == PowerState::Running {
            seq.start()?;
        }
        return Ok(());
    }

    if !changes.is_empty() {
        seq.run(Step::Reconfigure, |h| h.reconfigure(kind, id, &changes))?;
    }
    if diff.has_power_delta() {
        match diff.desired_power {
            PowerState::Running => seq.start()?,
            PowerState::Stopped => seq.stop()?,
        }
    }
    Ok(())
}

/// Steps issued against one resource
struct Sequence<'a, H: ?Sized, P> {
    host: &'a H,
    progress: &'a mut P,
    kind: ResourceKind,
    id: u32,
    steps: Vec<Step>,
}

impl<'a, H, P> Sequence<'a, H, P>
where
    H: HostControl + ?Sized,
    P: ProgressCallback,
{
    fn new(host: &'a H, progress: &'a mut P, kind: ResourceKind, id: u32) -> Self {
        Self {
            host,
            progress,
            kind,
            id,
            steps: Vec::new(),
        }
    }

    fn run(&mut self, step: Step, f: impl FnOnce(&H) -> anyhow::Result<()>) -> Result<(), StepFailure> {
        self.progress.on_step(self.id, step);
        log::info!("{} {}: {step}", self.kind, self.id);
        f(self.host).map_err(|e| StepFailure::new(step, format!("{e:#}")))?;
        self.steps.push(step);
        Ok(())
    }

    fn start(&mut self) -> Result<(), StepFailure> {
        let (kind, id) = (self.kind, self.id);
        self.run(Step::Start, |h| h.start(kind, id))
    }

    /// Graceful stop, then forced stop if the resource is still up.
    fn stop(&mut self) -> Result<(), StepFailure> {
        let (kind, id) = (self.kind, self.id);

        self.progress.on_step(id, Step::Shutdown);
        log::info!("{kind} {id}: shutdown");
        match self.host.shutdown(kind, id) {
            Ok(()) => self.steps.push(Step::Shutdown),
            Err(e) => log::warn!("graceful shutdown of {kind} {id} failed: {e:#}"),
        }

        match self.host.power(kind, id) {
            Ok(power) if power.is_stopped() => return Ok(()),
            Ok(power) => log::warn!("{kind} {id} still {power} after shutdown, forcing stop"),
            Err(e) => log::warn!("cannot confirm {kind} {id} stopped ({e:#}), forcing stop"),
        }

        self.run(Step::ForceStop, |h| h.force_stop(kind, id))?;

        match self.host.power(kind, id) {
            Ok(power) if power.is_stopped() => Ok(()),
            Ok(power) => Err(StepFailure::new(
                Step::ForceStop,
                format!("still {power} after forced stop"),
            )),
            Err(e) => Err(StepFailure::new(
                Step::ForceStop,
                format!("cannot confirm stop: {e:#}"),
            )),
        }
    }

    fn finish(self, action: Action, result: Result<(), StepFailure>) -> MutationOutcome {
        if let Err(failure) = &result {
            log::warn!(
                "{} {}: {} failed: {}",
                self.kind,
                self.id,
                failure.step,
                failure.message
            );
        }
        MutationOutcome {
            kind: self.kind,
            id: self.id,
            action,
            steps: self.steps,
            failure: result.err(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::diff::detect;
    use crate::testing::{Call, FakeHost};
    use crate::types::{AttributeChange, InventoryEntry, ObservedPower};

    fn spec(id: u32) -> ResourceSpec {
        ResourceSpec {
            kind: ResourceKind::Container,
            id,
            hostname: format!("ct{id}"),
            template: Some("local:vztmpl/debian.tar.zst".to_string()),
            memory_mb: 1024,
            cores: 2,
            network_spec: None,
            storage_spec: None,
            desired_power: PowerState::Running,
        }
    }

    fn running(id: u32) -> InventoryEntry {
        InventoryEntry {
            kind: ResourceKind::Container,
            id,
            actual_hostname: format!("ct{id}"),
            actual_memory_mb: 1024,
            actual_cores: Some(2),
            actual_network: None,
            actual_storage: None,
            actual_power: ObservedPower::Running,
        }
    }

    fn plan_for(host: &FakeHost, specs: &[ResourceSpec]) -> ExecutionPlan {
        let mut creates = Vec::new();
        let mut updates = Vec::new();
        for spec in specs {
            match host.get(spec.id) {
                Some(actual) => updates.extend(detect(spec, &actual)),
                None => creates.push(spec.clone()),
            }
        }
        ExecutionPlan::from_parts(creates, updates)
    }

    #[test]
    fn test_cold_apply_stop_reconfigure_start() {
        let host = FakeHost::with([running(100)]);
        let mut desired = spec(100);
        desired.memory_mb = 2048;

        let outcomes = execute(&plan_for(&host, &[desired]), &host, &mut NoProgress);

        assert_eq!(
            host.mutations(),
            vec![
                Call::Shutdown(100),
                Call::Reconfigure(100, vec![AttributeChange::Memory(2048)]),
                Call::Start(100),
            ]
        );
        assert!(outcomes[0].succeeded());
        assert_eq!(
            outcomes[0].steps,
            vec![Step::Shutdown, Step::Reconfigure, Step::Start]
        );
        assert_eq!(host.get(100).unwrap().actual_memory_mb, 2048);
    }

    #[test]
    fn test_cold_apply_without_start_when_desired_stopped() {
        let host = FakeHost::with([running(100)]);
        let mut desired = spec(100);
        desired.cores = 4;
        desired.desired_power = PowerState::Stopped;

        execute(&plan_for(&host, &[desired]), &host, &mut NoProgress);

        assert_eq!(
            host.mutations(),
            vec![
                Call::Shutdown(100),
                Call::Reconfigure(100, vec![AttributeChange::Cores(4)]),
            ]
        );
    }

    #[test]
    fn test_cold_apply_on_stopped_resource_skips_stop() {
        let mut entry = running(100);
        entry.actual_power = ObservedPower::Stopped;
        let host = FakeHost::with([entry]);
        let mut desired = spec(100);
        desired.memory_mb = 4096;

        execute(&plan_for(&host, &[desired]), &host, &mut NoProgress);

        assert_eq!(
            host.mutations(),
            vec![
                Call::Reconfigure(100, vec![AttributeChange::Memory(4096)]),
                Call::Start(100),
            ]
        );
    }

    #[test]
    fn test_stubborn_resource_is_force_stopped() {
        let host = FakeHost::with([running(100)]);
        host.ignore_shutdown(100);
        let mut desired = spec(100);
        desired.memory_mb = 2048;

        let outcomes = execute(&plan_for(&host, &[desired]), &host, &mut NoProgress);

        assert_eq!(
            host.mutations(),
            vec![
                Call::Shutdown(100),
                Call::ForceStop(100),
                Call::Reconfigure(100, vec![AttributeChange::Memory(2048)]),
                Call::Start(100),
            ]
        );
        assert_eq!(
            outcomes[0].steps,
            vec![Step::Shutdown, Step::ForceStop, Step::Reconfigure, Step::Start]
        );
    }

    #[test]
    fn test_failed_shutdown_is_not_a_completed_step() {
        let host = FakeHost::with([running(100)]);
        host.fail("shutdown", 100);
        let mut desired = spec(100);
        desired.memory_mb = 2048;

        let outcomes = execute(&plan_for(&host, &[desired]), &host, &mut NoProgress);

        assert!(outcomes[0].succeeded());
        assert_eq!(
            outcomes[0].steps,
            vec![Step::ForceStop, Step::Reconfigure, Step::Start]
        );
        assert_eq!(
            host.mutations(),
            vec![
                Call::Shutdown(100),
                Call::ForceStop(100),
                Call::Reconfigure(100, vec![AttributeChange::Memory(2048)]),
                Call::Start(100),
            ]
        );
    }

    #[test]
    fn test_live_only_change_does_not_stop() {
        let host = FakeHost::with([running(100)]);
        let mut desired = spec(100);
        desired.hostname = "renamed".to_string();

        execute(&plan_for(&host, &[desired]), &host, &mut NoProgress);

        assert_eq!(
            host.mutations(),
            vec![Call::Reconfigure(
                100,
                vec![AttributeChange::Hostname("renamed".to_string())]
            )]
        );
    }

    #[test]
    fn test_power_only_stop() {
        let host = FakeHost::with([running(100)]);
        let mut desired = spec(100);
        desired.desired_power = PowerState::Stopped;

        execute(&plan_for(&host, &[desired]), &host, &mut NoProgress);

        assert_eq!(host.mutations(), vec![Call::Shutdown(100)]);
        assert!(host.get(100).unwrap().actual_power.is_stopped());
    }

    #[test]
    fn test_create_then_start() {
        let host = FakeHost::new();
        let mut stopped = spec(101);
        stopped.desired_power = PowerState::Stopped;

        let outcomes = execute(&plan_for(&host, &[spec(100), stopped]), &host, &mut NoProgress);

        assert_eq!(
            host.mutations(),
            vec![Call::Create(100), Call::Start(100), Call::Create(101)]
        );
        assert!(outcomes.iter().all(MutationOutcome::succeeded));
        assert_eq!(outcomes[0].action, Action::Create);
    }

    #[test]
    fn test_failure_is_isolated_per_resource() {
        let host = FakeHost::with([running(100), running(101)]);
        host.fail("reconfigure", 100);
        let mut first = spec(100);
        first.memory_mb = 2048;
        let mut second = spec(101);
        second.memory_mb = 2048;

        let outcomes = execute(&plan_for(&host, &[first, second]), &host, &mut NoProgress);

        assert_eq!(
            host.mutations(),
            vec![
                Call::Shutdown(100),
                Call::Reconfigure(100, vec![AttributeChange::Memory(2048)]),
                Call::Shutdown(101),
                Call::Reconfigure(101, vec![AttributeChange::Memory(2048)]),
                Call::Start(101),
            ]
        );
        let failure = outcomes[0].failure.as_ref().unwrap();
        assert_eq!(failure.step, Step::Reconfigure);
        assert!(outcomes[1].succeeded());
    }

    #[test]
    fn test_failed_create_is_not_started() {
        let host = FakeHost::new();
        host.fail("create", 100);

        let outcomes = execute(&plan_for(&host, &[spec(100)]), &host, &mut NoProgress);

        assert_eq!(host.mutations(), vec![Call::Create(100)]);
        assert_eq!(outcomes[0].failure.as_ref().unwrap().step, Step::Create);
        assert!(outcomes[0].steps.is_empty());
    }

    #[test]
    fn test_storage_shrink_refused_before_stop() {
        let mut entry = running(100);
        entry.actual_storage = Some("local-lvm:vm-100-disk-0,size=16G".to_string());
        let host = FakeHost::with([entry]);
        let mut desired = spec(100);
        desired.storage_spec = Some("local-lvm:8".to_string());

        let outcomes = execute(&plan_for(&host, &[desired]), &host, &mut NoProgress);

        assert!(host.mutations().is_empty());
        let failure = outcomes[0].failure.as_ref().unwrap();
        assert!(failure.message.contains("shrink"));
    }

    #[test]
    fn test_force_stop_that_does_not_stop_fails() {
        let host = FakeHost::with([running(100)]);
        host.ignore_shutdown(100);
        host.fail("force_stop", 100);
        let mut desired = spec(100);
        desired.cores = 8;

        let outcomes = execute(&plan_for(&host, &[desired]), &host, &mut NoProgress);

        assert_eq!(
            host.mutations(),
            vec![Call::Shutdown(100), Call::ForceStop(100)]
        );
        assert_eq!(outcomes[0].failure.as_ref().unwrap().step, Step::ForceStop);
    }
}
