//! Orchestrator job: fans a bulk update request out into processing jobs.

use super::{parse_definition, resolve_count, resolve_page_size};
use crate::collaborators::{SearchService, SurrogateIdRange};
use crate::config::BulkUpdateConfig;
use crate::context::RequestContext;
use crate::definition::{BulkUpdateDefinition, JobKind, SearchParam, query_params};
use crate::error::OrchestrationResult;
use crate::queue::{JobInfo, QueueClient};
use crate::surrogate_id::ScanBounds;
use log::{debug, info};

/// Partitions the scope of a bulk update and enqueues its processing jobs.
///
/// Partitioning strategy, by definition shape:
///
/// - not parallel: one processing job pages through the whole scope
/// - parallel with a resource type and search parameters: one job per
///   search page, following truncated includes page by page
/// - otherwise: one job per surrogate id range of each resource type, and a
///   whole-type job for types whose range discovery came back empty
///
/// All processing jobs are enqueued into the orchestrator's own group.
pub struct OrchestratorJob<Q, S> {
    queue: Q,
    search: S,
    config: BulkUpdateConfig,
}

impl<Q, S> OrchestratorJob<Q, S>
where
    Q: QueueClient,
    S: SearchService,
{
    pub fn new(queue: Q, search: S, config: BulkUpdateConfig) -> Self {
        Self {
            queue,
            search,
            config,
        }
    }

    /// Partition the job and return the processing jobs that were enqueued.
    pub async fn execute(
        &self,
        job: &JobInfo,
        context: &RequestContext,
    ) -> OrchestrationResult<Vec<JobInfo>> {
        let definition = parse_definition(job, JobKind::Orchestrator)?;
        info!(
            "Orchestrating bulk update group {} (job {}, parallel: {})",
            job.group_id, job.id, definition.is_parallel
        );

        let definitions = if !definition.is_parallel {
            vec![definition.paging_processing()]
        } else if definition.resource_type.is_some() && definition.has_search_parameters() {
            self.page_definitions(&definition, context).await?
        } else {
            self.range_definitions(&definition, job).await?
        };

        if definitions.is_empty() {
            info!("Bulk update group {} has nothing to process", job.group_id);
            return Ok(Vec::new());
        }

        let serialized = definitions
            .iter()
            .map(BulkUpdateDefinition::to_json)
            .collect::<OrchestrationResult<Vec<_>>>()?;
        let enqueued = self
            .queue
            .enqueue(self.config.queue_type, serialized, Some(job.group_id), false)
            .await?;

        info!(
            "Enqueued {} processing job(s) for bulk update group {}",
            enqueued.len(),
            job.group_id
        );
        Ok(enqueued)
    }

    /// One processing definition per search page.
    async fn page_definitions(
        &self,
        definition: &BulkUpdateDefinition,
        context: &RequestContext,
    ) -> OrchestrationResult<Vec<BulkUpdateDefinition>> {
        // Issues accumulate on a private copy; the caller's context is never touched.
        let mut context = context.clone();
        let count = resolve_count(definition, &self.config).to_string();

        let mut matched: Option<String> = None;
        let mut included: Option<String> = None;
        let mut next_matched: Option<String> = None;
        let mut definitions = Vec::new();

        loop {
            let parameters =
                page_parameters(definition, &count, matched.as_deref(), included.as_deref());
            let page = self
                .search
                .search(
                    definition.resource_type.as_deref(),
                    &parameters,
                    included.is_some(),
                    &context,
                )
                .await?;
            for issue in &page.issues {
                context.add_issue(issue.clone());
            }

            if page.is_exhausted() {
                if included.is_none() {
                    debug!("Search exhausted after {} page(s)", definitions.len());
                    break;
                }
            } else {
                definitions
                    .push(definition.page_processing(matched.as_deref(), included.as_deref()));
            }

            if included.is_none() {
                next_matched = page.continuation_token.clone();
            }

            let next_included = if context.has_truncated_includes() {
                page.includes_continuation_token.clone()
            } else {
                None
            };

            if next_included.is_some() {
                included = next_included;
                continue;
            }

            match next_matched.take() {
                Some(token) => {
                    matched = Some(token);
                    included = None;
                }
                None => break,
            }
        }

        Ok(definitions)
    }

    /// One processing definition per surrogate id range of every resource type in scope.
    async fn range_definitions(
        &self,
        definition: &BulkUpdateDefinition,
        job: &JobInfo,
    ) -> OrchestrationResult<Vec<BulkUpdateDefinition>> {
        let resource_types: Vec<String> = match &definition.resource_type {
            Some(resource_type) => vec![resource_type.clone()],
            None => self.search.get_used_resource_types().await?,
        }
        .into_iter()
        .filter(|resource_type| {
            let excluded = self.config.is_excluded_resource_type(resource_type);
            if excluded {
                debug!("Skipping excluded resource type {}", resource_type);
            }
            !excluded
        })
        .collect();
        if resource_types.is_empty() {
            info!("No resource types in use, nothing to partition");
            return Ok(Vec::new());
        }

        let bounds = ScanBounds::before(job.create_date);
        let range_size = resolve_page_size(definition, &self.config);
        let mut definitions = Vec::new();

        for resource_type in &resource_types {
            let ranges = self.discover_ranges(resource_type, bounds, range_size).await?;
            if ranges.is_empty() {
                debug!(
                    "No surrogate id ranges for {}, processing the whole type",
                    resource_type
                );
                definitions.push(definition.whole_type_processing(resource_type));
                continue;
            }

            debug!("{} range(s) discovered for {}", ranges.len(), resource_type);
            definitions.extend(ranges.iter().map(|range| {
                definition.range_processing(
                    resource_type,
                    range.start_id,
                    range.end_id,
                    bounds.start,
                    bounds.end,
                )
            }));
        }

        Ok(definitions)
    }

    async fn discover_ranges(
        &self,
        resource_type: &str,
        bounds: ScanBounds,
        range_size: u32,
    ) -> OrchestrationResult<Vec<SurrogateIdRange>> {
        let max_ranges = self.config.max_ranges_per_query;
        let mut start = bounds.start;
        let mut ranges = Vec::new();

        loop {
            let batch = self
                .search
                .get_surrogate_id_ranges(
                    resource_type,
                    start,
                    bounds.end,
                    range_size,
                    max_ranges,
                    true,
                )
                .await?;
            let Some(last_end) = batch.iter().map(|range| range.end_id).max() else {
                break;
            };
            let full_batch = batch.len() >= max_ranges as usize;
            ranges.extend(batch);

            if !full_batch || last_end >= bounds.end || last_end < start {
                break;
            }
            start = last_end + 1;
        }

        Ok(ranges)
    }
}

/// Search parameters of one orchestrator page request.
fn page_parameters(
    definition: &BulkUpdateDefinition,
    count: &str,
    continuation_token: Option<&str>,
    includes_continuation_token: Option<&str>,
) -> Vec<SearchParam> {
    let mut parameters: Vec<SearchParam> = definition
        .search_parameters
        .iter()
        .flatten()
        .filter(|p| {
            p.name != query_params::COUNT
                && p.name != query_params::CONTINUATION_TOKEN
                && p.name != query_params::INCLUDES_CONTINUATION_TOKEN
        })
        .cloned()
        .collect();
    parameters.push(SearchParam::new(query_params::COUNT, count));
    if let Some(token) = continuation_token {
        parameters.push(SearchParam::new(query_params::CONTINUATION_TOKEN, token));
    }
    if let Some(token) = includes_continuation_token {
        parameters.push(SearchParam::new(
            query_params::INCLUDES_CONTINUATION_TOKEN,
            token,
        ));
    }
    parameters
}
