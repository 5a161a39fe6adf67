//! Worker loop: lease a job, run the matching strategy, record the outcome.

use super::{JobOutcome, OrchestratorJob, ProcessingJob};
use crate::collaborators::{MetricsSink, ProfileStore, SearchService, UpdateEngine};
use crate::config::BulkUpdateConfig;
use crate::context::RequestContext;
use crate::definition::{BulkUpdateDefinition, JobKind};
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::queue::{JobInfo, JobStatus, QueueClient, QueueType};
use crate::result::BulkUpdateResult;
use log::{info, warn};

/// What happened to one leased job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRun {
    pub job_id: i64,
    pub group_id: i64,
    pub status: JobStatus,
    /// `None` when the job was cancelled before it ran
    pub outcome: Option<JobOutcome>,
}

/// Executes bulk update jobs leased from the queue.
pub struct BulkUpdateWorker<Q, S, E, P, M> {
    name: String,
    queue: Q,
    queue_type: QueueType,
    orchestrator: OrchestratorJob<Q, S>,
    processing: ProcessingJob<Q, E, P, M>,
}

impl<Q, S, E, P, M> BulkUpdateWorker<Q, S, E, P, M>
where
    Q: QueueClient + Clone,
    S: SearchService,
    E: UpdateEngine,
    P: ProfileStore,
    M: MetricsSink,
{
    pub fn new(
        name: impl Into<String>,
        queue: Q,
        search: S,
        engine: E,
        profiles: P,
        metrics: M,
        config: BulkUpdateConfig,
    ) -> Self {
        Self {
            name: name.into(),
            queue_type: config.queue_type,
            orchestrator: OrchestratorJob::new(queue.clone(), search, config.clone()),
            processing: ProcessingJob::new(queue.clone(), engine, profiles, metrics, config),
            queue,
        }
    }

    /// Run a job with the strategy its definition names.
    ///
    /// An orchestrator job completes with an empty result once its
    /// processing jobs are enqueued.
    pub async fn execute(
        &self,
        job: &JobInfo,
        context: &RequestContext,
    ) -> OrchestrationResult<JobOutcome> {
        let definition = BulkUpdateDefinition::from_json(&job.definition)?;
        match definition.job_kind {
            JobKind::Orchestrator => {
                self.orchestrator.execute(job, context).await?;
                Ok(JobOutcome::Completed(BulkUpdateResult::new()))
            }
            JobKind::Processing => self.processing.execute(job, context).await,
        }
    }

    /// Lease and run the next waiting job, if there is one.
    ///
    /// Failures that carry no result are recorded as `Failed` and then
    /// returned to the caller.
    pub async fn run_next(&self, context: &RequestContext) -> OrchestrationResult<Option<WorkerRun>> {
        let Some(job) = self.queue.dequeue(self.queue_type, &self.name).await? else {
            return Ok(None);
        };

        if job.cancel_requested {
            info!("Job {} was cancelled before it ran", job.id);
            self.queue
                .complete_job(job.id, JobStatus::Cancelled, None)
                .await?;
            return Ok(Some(WorkerRun {
                job_id: job.id,
                group_id: job.group_id,
                status: JobStatus::Cancelled,
                outcome: None,
            }));
        }

        match self.execute(&job, context).await {
            Ok(outcome) => {
                let status = outcome.status();
                self.queue
                    .complete_job(job.id, status, outcome.persisted_result()?)
                    .await?;
                Ok(Some(WorkerRun {
                    job_id: job.id,
                    group_id: job.group_id,
                    status,
                    outcome: Some(outcome),
                }))
            }
            Err(e) => {
                warn!("Job {} of group {} failed: {}", job.id, job.group_id, e);
                self.queue
                    .complete_job(job.id, JobStatus::Failed, None)
                    .await?;
                Err(e)
            }
        }
    }

    /// Run jobs until the queue has nothing waiting.
    ///
    /// Failed jobs are logged and recorded; the loop carries on with the
    /// next job. Queue failures end the loop. Returns the number of jobs leased.
    pub async fn run_until_idle(&self, context: &RequestContext) -> OrchestrationResult<usize> {
        let mut leased = 0;
        loop {
            match self.run_next(context).await {
                Ok(Some(_)) => leased += 1,
                Ok(None) => return Ok(leased),
                Err(e @ OrchestrationError::Queue(_)) => return Err(e),
                Err(_) => leased += 1,
            }
        }
    }
}
