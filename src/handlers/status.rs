use super::BulkUpdateHandler;
use crate::aggregation::{BulkUpdateStatusReport, aggregate};
use crate::collaborators::{Authorizer, ProfileStore};
use crate::context::RequestContext;
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::queue::QueueClient;
use log::debug;

impl<Q, P, A> BulkUpdateHandler<Q, P, A>
where
    Q: QueueClient,
    P: ProfileStore,
    A: Authorizer,
{
    /// Aggregated status of a job group.
    pub async fn status(
        &self,
        group_id: i64,
        context: &RequestContext,
    ) -> OrchestrationResult<BulkUpdateStatusReport> {
        self.authorize(context)?;

        let jobs = self
            .queue
            .get_jobs_by_group_id(self.config.queue_type, group_id, true)
            .await?;
        if jobs.is_empty() {
            return Err(OrchestrationError::not_found(group_id));
        }

        let report = aggregate(&jobs);
        debug!(
            "Bulk update group {} has {} job(s), status {:?}",
            group_id,
            jobs.len(),
            report.status
        );
        Ok(report)
    }
}
