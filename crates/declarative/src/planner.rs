//! Execution planner - orders the work the sequencer will do

use crate::diff::ResourceDiff;
use crate::types::ResourceSpec;

/// Work for one live run: creations first, then updates, each by ascending id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Resources to create
    pub creates: Vec<ResourceSpec>,
    /// Managed resources with drift
    pub updates: Vec<ResourceDiff>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a plan from missing resources and diffs
    pub fn from_parts(mut creates: Vec<ResourceSpec>, mut updates: Vec<ResourceDiff>) -> Self {
        creates.sort_by_key(|s| s.id);
        updates.sort_by_key(|d| d.id);
        Self { creates, updates }
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.creates.len() + self.updates.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty()
    }

    /// Number of updates that will stop a resource
    pub fn disruptive(&self) -> usize {
        self.updates.iter().filter(|d| d.needs_cold_apply()).count()
    }
}
