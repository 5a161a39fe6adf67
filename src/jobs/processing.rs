//! Processing job: applies the update operation to one partition.

use super::{JobExecutionError, JobOutcome, parse_definition, resolve_count};
use crate::aggregation::{touches_profile_types, updated_resource_types};
use crate::collaborators::{
    BulkUpdateMetricsNotification, MetricsSink, ProfileStore, UpdateEngine, UpdateEngineError,
    UpdateMultipleRequest,
};
use crate::config::BulkUpdateConfig;
use crate::context::RequestContext;
use crate::definition::{BulkUpdateDefinition, JobKind, SearchParam, query_params};
use crate::error::OrchestrationResult;
use crate::queue::{JobInfo, JobStatus, QueueClient};
use crate::result::BulkUpdateResult;
use log::{debug, info, warn};

const SOFT_FAILURE_MESSAGE: &str = "Exception encounted while updating resources";

/// Runs the update engine over the partition described by a processing definition.
pub struct ProcessingJob<Q, E, P, M> {
    queue: Q,
    engine: E,
    profiles: P,
    metrics: M,
    config: BulkUpdateConfig,
}

impl<Q, E, P, M> ProcessingJob<Q, E, P, M>
where
    Q: QueueClient,
    E: UpdateEngine,
    P: ProfileStore,
    M: MetricsSink,
{
    pub fn new(queue: Q, engine: E, profiles: P, metrics: M, config: BulkUpdateConfig) -> Self {
        Self {
            queue,
            engine,
            profiles,
            metrics,
            config,
        }
    }

    /// Process the partition and report how it ended.
    ///
    /// Soft failures and update engine faults that carry partial progress are
    /// returned as outcomes. Every other failure propagates as `Err`, without
    /// metrics or a profile refresh.
    pub async fn execute(
        &self,
        job: &JobInfo,
        context: &RequestContext,
    ) -> OrchestrationResult<JobOutcome> {
        let definition = parse_definition(job, JobKind::Processing)?;
        let request = UpdateMultipleRequest {
            resource_type: definition.effective_resource_type().map(str::to_string),
            operation: definition.parameters.clone(),
            is_parallel: definition.is_parallel,
            read_up_to: read_up_to(&definition),
            single_page: !definition.read_next_page,
            query_parameters: build_query_parameters(&definition, &self.config),
            context: bundle_context(&definition, context),
        };

        info!(
            "Processing job {} of group {} ({})",
            job.id,
            job.group_id,
            request.resource_type.as_deref().unwrap_or("all types")
        );

        let outcome = match self.engine.update_multiple(request).await {
            Ok(result) if result.has_patch_failures() => {
                self.publish(job.id, result.total_updated()).await?;
                let message = format!(
                    "{}: {}",
                    SOFT_FAILURE_MESSAGE,
                    patch_failure_diagnostic(&result)
                );
                warn!("Job {} finished with a soft failure: {}", job.id, message);
                JobOutcome::SoftFailure { result, message }
            }
            Ok(result) => {
                if result.total_updated() > 0 {
                    self.publish(job.id, result.total_updated()).await?;
                }
                info!(
                    "Job {} completed, {} resource(s) updated",
                    job.id,
                    result.total_updated()
                );
                JobOutcome::Completed(result)
            }
            Err(UpdateEngineError::IncompleteOperation { message, partial }) => {
                self.publish(job.id, partial.total_updated()).await?;
                let mut message = message;
                if !partial.issues.is_empty() {
                    message = format!("{} {}", message, partial.issues.join(" "));
                }
                warn!("Job {} failed after partial progress: {}", job.id, message);
                return Ok(JobOutcome::HardFailure(JobExecutionError::with_partial(
                    message, partial,
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(result) = outcome.result() {
            self.refresh_profiles_if_last(job, result).await?;
        }
        Ok(outcome)
    }

    async fn publish(&self, job_id: i64, resources_updated: u64) -> OrchestrationResult<()> {
        self.metrics
            .publish(BulkUpdateMetricsNotification {
                job_id,
                resources_updated,
            })
            .await?;
        Ok(())
    }

    /// Refresh the profile cache when this is the last job of its group to finish.
    ///
    /// Two jobs finishing together may both see themselves as last; refresh
    /// is idempotent so the redundant call is tolerated.
    async fn refresh_profiles_if_last(
        &self,
        job: &JobInfo,
        result: &BulkUpdateResult,
    ) -> OrchestrationResult<()> {
        let group = self
            .queue
            .get_jobs_by_group_id(self.config.queue_type, job.group_id, true)
            .await?;
        let siblings: Vec<&JobInfo> = group.iter().filter(|other| other.id != job.id).collect();

        let is_last = siblings
            .iter()
            .all(|other| matches!(other.status, JobStatus::Completed | JobStatus::Failed));
        if !is_last {
            debug!(
                "Job {} is not the last of group {}, skipping profile refresh",
                job.id, job.group_id
            );
            return Ok(());
        }

        let mut updated = updated_resource_types(siblings);
        updated.extend(result.updated_resource_types().map(str::to_string));

        let profile_types = self.profiles.get_profile_types().await?;
        if touches_profile_types(&updated, &profile_types) {
            info!(
                "Group {} updated profile resources, refreshing profiles",
                job.group_id
            );
            self.profiles.refresh().await?;
        }
        Ok(())
    }
}

/// Query parameters handed to the update engine, in their fixed order.
///
/// Partition parameters come first (type, global end, end, global start,
/// start, count), then the caller's search parameters. A caller parameter is
/// left out only when the partition already supplied the same name.
pub fn build_query_parameters(
    definition: &BulkUpdateDefinition,
    config: &BulkUpdateConfig,
) -> Vec<SearchParam> {
    let partition = [
        (query_params::TYPE, definition.partition_type.as_deref()),
        (
            query_params::GLOBAL_END_SURROGATE_ID,
            definition.global_end_surrogate_id.as_deref(),
        ),
        (
            query_params::END_SURROGATE_ID,
            definition.end_surrogate_id.as_deref(),
        ),
        (
            query_params::GLOBAL_START_SURROGATE_ID,
            definition.global_start_surrogate_id.as_deref(),
        ),
        (
            query_params::START_SURROGATE_ID,
            definition.start_surrogate_id.as_deref(),
        ),
    ];

    let mut parameters: Vec<SearchParam> = partition
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| SearchParam::new(name, value)))
        .collect();
    parameters.push(SearchParam::new(
        query_params::COUNT,
        resolve_count(definition, config).to_string(),
    ));

    let produced: Vec<String> = parameters.iter().map(|p| p.name.clone()).collect();
    parameters.extend(
        definition
            .search_parameters
            .iter()
            .flatten()
            .filter(|p| !produced.contains(&p.name))
            .cloned(),
    );
    parameters
}

/// Number of continuation cursors already consumed to reach this page.
pub fn read_up_to(definition: &BulkUpdateDefinition) -> u32 {
    u32::from(definition.continuation_token().is_some())
        + u32::from(definition.includes_continuation_token().is_some())
}

/// Context handed to the update engine, with provenance from the definition.
fn bundle_context(definition: &BulkUpdateDefinition, context: &RequestContext) -> RequestContext {
    let mut context = context.clone();
    if context.url.is_none() {
        context.url = definition.url.clone();
    }
    if context.base_url.is_none() {
        context.base_url = definition.base_url.clone();
    }
    if context.correlation_id.is_none() {
        context.correlation_id = definition.correlation_id.clone();
    }
    context
}

fn patch_failure_diagnostic(result: &BulkUpdateResult) -> String {
    result
        .resources_patch_failed
        .iter()
        .map(|(resource_type, count)| format!("{} {} resource(s) failed to patch", count, resource_type))
        .collect::<Vec<_>>()
        .join(", ")
}
