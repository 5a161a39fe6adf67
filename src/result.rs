//! Per-job result accumulator.
//!
//! A [`BulkUpdateResult`] is created empty when a processing job starts,
//! only ever grows while the job runs, and is persisted exactly once as the
//! job's terminal result or as the partial result attached to its failure.

use crate::error::OrchestrationResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counts per resource type.
pub type ResourceCounts = BTreeMap<String, u64>;

/// Outcome counts of one processing job.
///
/// The three count maps are disjoint per resource instance: every resource a
/// job touched is counted in exactly one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkUpdateResult {
    pub resources_updated: ResourceCounts,
    pub resources_ignored: ResourceCounts,
    pub resources_patch_failed: ResourceCounts,
    pub issues: Vec<String>,
}

impl BulkUpdateResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_updated(&mut self, resource_type: &str, count: u64) {
        add_count(&mut self.resources_updated, resource_type, count);
    }

    pub fn record_ignored(&mut self, resource_type: &str, count: u64) {
        add_count(&mut self.resources_ignored, resource_type, count);
    }

    pub fn record_patch_failed(&mut self, resource_type: &str, count: u64) {
        add_count(&mut self.resources_patch_failed, resource_type, count);
    }

    pub fn add_issue(&mut self, issue: impl Into<String>) {
        self.issues.push(issue.into());
    }

    /// Total number of updated resources across all types.
    pub fn total_updated(&self) -> u64 {
        self.resources_updated.values().sum()
    }

    /// Whether any resource failed to patch (a soft failure).
    pub fn has_patch_failures(&self) -> bool {
        self.resources_patch_failed.values().any(|count| *count > 0)
    }

    /// Whether nothing was counted and no issue was raised.
    pub fn is_empty(&self) -> bool {
        self.resources_updated.is_empty()
            && self.resources_ignored.is_empty()
            && self.resources_patch_failed.is_empty()
            && self.issues.is_empty()
    }

    /// Fold another result into this one.
    pub fn merge(&mut self, other: &BulkUpdateResult) {
        for (resource_type, count) in &other.resources_updated {
            self.record_updated(resource_type, *count);
        }
        for (resource_type, count) in &other.resources_ignored {
            self.record_ignored(resource_type, *count);
        }
        for (resource_type, count) in &other.resources_patch_failed {
            self.record_patch_failed(resource_type, *count);
        }
        self.issues.extend(other.issues.iter().cloned());
    }

    /// Resource types with at least one successful update.
    pub fn updated_resource_types(&self) -> impl Iterator<Item = &str> {
        self.resources_updated
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(resource_type, _)| resource_type.as_str())
    }

    pub fn to_json(&self) -> OrchestrationResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> OrchestrationResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn add_count(counts: &mut ResourceCounts, resource_type: &str, count: u64) {
    if count == 0 {
        return;
    }
    *counts.entry(resource_type.to_string()).or_insert(0) += count;
}
