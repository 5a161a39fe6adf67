//! Folding the jobs of a group into one status report.
//!
//! [`aggregate`] is a pure function over job records read with their results.
//! It is used by the status query and, through [`updated_resource_types`], by
//! the cancellation path and the last-job profile refresh.
//!
//! Status precedence: any failed job (soft or hard) makes the group an
//! internal server error; otherwise any job still waiting or running makes it
//! accepted; otherwise it is ok. Issues are additive and reported whenever
//! their condition holds, so a report may say both "in progress" and
//! "unhandled exception".

use crate::context::{IssueSeverity, OperationIssue};
use crate::queue::{JobInfo, JobStatus};
use crate::result::{BulkUpdateResult, ResourceCounts};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub const RESOURCE_UPDATED: &str = "ResourceUpdated";
pub const RESOURCE_IGNORED: &str = "ResourceIgnored";
pub const RESOURCE_PATCH_FAILED: &str = "ResourcePatchFailed";

pub const PATCH_FAILED_MESSAGE: &str =
    "Please use FHIR Patch endpoint for detailed error on Patch failed resources.";
pub const UNHANDLED_EXCEPTION_MESSAGE: &str =
    "Encountered an unhandled exception. The job will be marked as failed.";
pub const IN_PROGRESS_MESSAGE: &str = "Job In Progress";
pub const CANCELED_MESSAGE: &str = "Job Canceled";

/// Overall state of a job group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateStatus {
    /// Every job finished and none failed
    Ok,
    /// Some job is still waiting or running
    Accepted,
    /// Some job failed
    InternalServerError,
}

impl AggregateStatus {
    pub fn http_status_code(&self) -> u16 {
        match self {
            AggregateStatus::Ok => 200,
            AggregateStatus::Accepted => 202,
            AggregateStatus::InternalServerError => 500,
        }
    }
}

/// Aggregated view of a job group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUpdateStatusReport {
    pub status: AggregateStatus,
    /// Counts per category and resource type; empty categories are omitted.
    pub results: BTreeMap<String, ResourceCounts>,
    pub issues: Vec<OperationIssue>,
}

impl BulkUpdateStatusReport {
    /// Counts of one category, if it is present.
    pub fn category(&self, name: &str) -> Option<&ResourceCounts> {
        self.results.get(name)
    }

    pub fn has_issue(&self, diagnostics: &str) -> bool {
        self.issues.iter().any(|issue| issue.diagnostics == diagnostics)
    }
}

/// Parse the stored result of a job, skipping jobs without a readable one.
pub fn job_result(job: &JobInfo) -> Option<BulkUpdateResult> {
    let raw = job.result.as_deref()?;
    match BulkUpdateResult::from_json(raw) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!("Ignoring unreadable result of job {}: {}", job.id, e);
            None
        }
    }
}

/// Fold every job of a group into one report.
pub fn aggregate(jobs: &[JobInfo]) -> BulkUpdateStatusReport {
    let mut totals = BulkUpdateResult::new();
    let mut patch_failed = false;
    let mut hard_failed = false;
    let mut any_failed = false;
    let mut in_progress = false;
    let mut cancelled = false;

    for job in jobs {
        let result = job_result(job);
        if let Some(result) = &result {
            totals.merge(result);
        }
        let soft = result.as_ref().is_some_and(BulkUpdateResult::has_patch_failures);
        patch_failed |= soft;

        match job.status {
            JobStatus::Failed => {
                any_failed = true;
                hard_failed |= !soft;
            }
            JobStatus::Created | JobStatus::Running => in_progress = true,
            JobStatus::Cancelled => cancelled = true,
            JobStatus::Completed => {}
        }
        cancelled |= job.cancel_requested;
    }

    let mut issues = Vec::new();
    if patch_failed {
        issues.push(OperationIssue::new(
            IssueSeverity::Warning,
            "processing",
            PATCH_FAILED_MESSAGE,
        ));
    }
    if hard_failed {
        issues.push(OperationIssue::new(
            IssueSeverity::Error,
            "exception",
            UNHANDLED_EXCEPTION_MESSAGE,
        ));
    }
    if in_progress {
        issues.push(OperationIssue::new(
            IssueSeverity::Information,
            "informational",
            IN_PROGRESS_MESSAGE,
        ));
    }
    if cancelled {
        issues.push(OperationIssue::new(
            IssueSeverity::Warning,
            "informational",
            CANCELED_MESSAGE,
        ));
    }

    let status = if any_failed {
        AggregateStatus::InternalServerError
    } else if in_progress {
        AggregateStatus::Accepted
    } else {
        AggregateStatus::Ok
    };

    let mut results = BTreeMap::new();
    for (name, counts) in [
        (RESOURCE_UPDATED, totals.resources_updated),
        (RESOURCE_IGNORED, totals.resources_ignored),
        (RESOURCE_PATCH_FAILED, totals.resources_patch_failed),
    ] {
        if !counts.is_empty() {
            results.insert(name.to_string(), counts);
        }
    }

    BulkUpdateStatusReport {
        status,
        results,
        issues,
    }
}

/// Resource types with successful updates in any of the given jobs.
pub fn updated_resource_types<'a, I>(jobs: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a JobInfo>,
{
    jobs.into_iter()
        .filter_map(job_result)
        .flat_map(|result| {
            result
                .updated_resource_types()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Whether any updated type invalidates the profile cache.
pub fn touches_profile_types(updated: &BTreeSet<String>, profile_types: &HashSet<String>) -> bool {
    updated.iter().any(|resource_type| profile_types.contains(resource_type))
}
