//! Cancellation of bulk update job groups.

use super::{BulkUpdateHandler, CancelBulkUpdateResponse};
use crate::aggregation::{job_result, touches_profile_types, updated_resource_types};
use crate::collaborators::{Authorizer, ProfileStore};
use crate::context::RequestContext;
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::queue::{JobInfo, JobStatus, QueueClient};
use log::{debug, info};

impl<Q, P, A> BulkUpdateHandler<Q, P, A>
where
    Q: QueueClient,
    P: ProfileStore,
    A: Authorizer,
{
    /// Request cancellation of every job in a group.
    ///
    /// A group whose jobs have all finished can only be cancelled when one of
    /// them is a soft failure that recorded counts. The profile cache is
    /// refreshed when the group already updated profile resources.
    pub async fn cancel(
        &self,
        group_id: i64,
        context: &RequestContext,
    ) -> OrchestrationResult<CancelBulkUpdateResponse> {
        self.authorize(context)?;

        let jobs = self
            .queue
            .get_jobs_by_group_id(self.config.queue_type, group_id, true)
            .await?;
        if jobs.is_empty() {
            return Err(OrchestrationError::not_found(group_id));
        }

        if jobs.iter().all(|job| job.status.is_terminal()) && !jobs.iter().any(is_soft_failure) {
            return Err(OrchestrationError::conflict(format!(
                "Bulk update job {} has already finished",
                group_id
            )));
        }

        self.queue
            .cancel_jobs_by_group_id(self.config.queue_type, group_id)
            .await?;
        info!(
            "Cancellation of bulk update group {} requested by {}",
            group_id, context.request_id
        );

        let updated = updated_resource_types(&jobs);
        let mut profiles_refreshed = false;
        if !updated.is_empty() {
            let profile_types = self.profiles.get_profile_types().await?;
            if touches_profile_types(&updated, &profile_types) {
                self.profiles.refresh().await?;
                profiles_refreshed = true;
            } else {
                debug!("Group {} touched no profile resources", group_id);
            }
        }

        Ok(CancelBulkUpdateResponse {
            group_id,
            profiles_refreshed,
        })
    }
}

fn is_soft_failure(job: &JobInfo) -> bool {
    job.status == JobStatus::Failed
        && job_result(job)
            .is_some_and(|result| result.has_patch_failures() || result.total_updated() > 0)
}
