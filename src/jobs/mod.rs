//! Bulk update job execution.
//!
//! A bulk update group holds one orchestrator job and any number of
//! processing jobs. Which strategy runs is decided by the definition's
//! [`JobKind`]; the [`BulkUpdateWorker`] leases jobs from the queue,
//! dispatches them and records their [`JobOutcome`].
//!
//! Outcomes are explicit values rather than error types: a soft failure and a
//! hard failure with partial progress both keep their [`BulkUpdateResult`], and
//! only failures with nothing to preserve travel as `Err`.

mod orchestrator;
mod processing;
mod worker;

pub use orchestrator::OrchestratorJob;
pub use processing::{ProcessingJob, build_query_parameters, read_up_to};
pub use worker::{BulkUpdateWorker, WorkerRun};

use crate::config::BulkUpdateConfig;
use crate::definition::{BulkUpdateDefinition, JobKind};
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::queue::{JobInfo, JobStatus};
use crate::result::BulkUpdateResult;
use thiserror::Error;

/// Terminal failure of a job that may still carry partial progress.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct JobExecutionError {
    pub message: String,
    pub partial: Option<BulkUpdateResult>,
}

impl JobExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            partial: None,
        }
    }

    pub fn with_partial(message: impl Into<String>, partial: BulkUpdateResult) -> Self {
        Self {
            message: message.into(),
            partial: Some(partial),
        }
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Everything matched was updated or ignored.
    Completed(BulkUpdateResult),
    /// Some resources failed to patch; the counts are complete.
    SoftFailure {
        result: BulkUpdateResult,
        message: String,
    },
    /// The job failed; whatever finished before the fault is attached.
    HardFailure(JobExecutionError),
}

impl JobOutcome {
    /// Status the queue should record for this outcome.
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed(_) => JobStatus::Completed,
            JobOutcome::SoftFailure { .. } | JobOutcome::HardFailure(_) => JobStatus::Failed,
        }
    }

    /// Counts accumulated by the job, partial or complete.
    pub fn result(&self) -> Option<&BulkUpdateResult> {
        match self {
            JobOutcome::Completed(result) | JobOutcome::SoftFailure { result, .. } => Some(result),
            JobOutcome::HardFailure(error) => error.partial.as_ref(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }

    pub fn is_soft_failure(&self) -> bool {
        matches!(self, JobOutcome::SoftFailure { .. })
    }

    /// Serialized result stored with the job record.
    pub fn persisted_result(&self) -> OrchestrationResult<Option<String>> {
        self.result().map(BulkUpdateResult::to_json).transpose()
    }
}

/// Page size requested by the definition, or the configured default.
pub fn resolve_page_size(definition: &BulkUpdateDefinition, config: &BulkUpdateConfig) -> u32 {
    match definition.maximum_number_of_resources_per_query {
        0 => config.default_max_resources_per_query,
        size => size,
    }
}

/// Value of the `_count` parameter for one page.
///
/// A bounded scan (global end known) uses the requested page size verbatim;
/// otherwise the page size is capped by the processing batch size.
pub fn resolve_count(definition: &BulkUpdateDefinition, config: &BulkUpdateConfig) -> u32 {
    let page_size = resolve_page_size(definition, config);
    if definition.global_end_surrogate_id.is_some() {
        page_size
    } else {
        page_size.min(config.processing_batch_size)
    }
}

pub(crate) fn parse_definition(
    job: &JobInfo,
    expected: JobKind,
) -> OrchestrationResult<BulkUpdateDefinition> {
    if job.definition.trim().is_empty() {
        return Err(OrchestrationError::invalid_job(format!(
            "job {} has no definition",
            job.id
        )));
    }
    let definition = BulkUpdateDefinition::from_json(&job.definition)?;
    if definition.job_kind != expected {
        return Err(OrchestrationError::invalid_job(format!(
            "job {} is a {:?} job, expected {:?}",
            job.id, definition.job_kind, expected
        )));
    }
    Ok(definition)
}
