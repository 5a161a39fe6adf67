//! Admission of new bulk update requests.

use super::{BulkUpdateHandler, CreateBulkUpdateRequest, CreateBulkUpdateResponse};
use crate::collaborators::{Authorizer, ProfileStore};
use crate::context::RequestContext;
use crate::definition::{BulkUpdateDefinition, SearchParam, query_params};
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::queue::QueueClient;
use chrono::{SecondsFormat, Utc};
use log::{info, warn};
use serde_json::Value;

impl<Q, P, A> BulkUpdateHandler<Q, P, A>
where
    Q: QueueClient,
    P: ProfileStore,
    A: Authorizer,
{
    /// Admit a bulk update as a new job group holding one orchestrator job.
    ///
    /// Fails with a job conflict while another bulk update group is active.
    pub async fn create(
        &self,
        request: CreateBulkUpdateRequest,
        context: &RequestContext,
    ) -> OrchestrationResult<CreateBulkUpdateResponse> {
        self.authorize(context)?;

        self.reject_excluded_types(&request)?;
        self.validate_operations(&request.parameters)?;

        let mut search_parameters = request.search_parameters;
        if !search_parameters
            .iter()
            .any(|p| p.name == query_params::LAST_UPDATED)
        {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            search_parameters.push(SearchParam::new(
                query_params::LAST_UPDATED,
                format!("le{}", now),
            ));
        }

        let definition = BulkUpdateDefinition::orchestrator(
            request.resource_type,
            Some(search_parameters),
            Some(request.parameters),
            request.is_parallel,
            request.maximum_number_of_resources_per_query,
        )
        .with_provenance(
            context.url.clone(),
            context.base_url.clone(),
            Some(context.effective_correlation_id().to_string()),
        );

        let enqueued = match self
            .queue
            .enqueue(self.config.queue_type, vec![definition.to_json()?], None, true)
            .await
        {
            Ok(jobs) => jobs,
            Err(e) if e.is_conflict() => {
                warn!("Rejected bulk update request {}: {}", context.request_id, e);
                return Err(OrchestrationError::job_conflict());
            }
            Err(e) => return Err(e.into()),
        };

        let job = enqueued.first().ok_or_else(|| {
            OrchestrationError::invalid_job("the queue accepted the orchestrator job but returned no record")
        })?;
        info!(
            "Admitted bulk update request {} as job {} in group {}",
            context.request_id, job.id, job.group_id
        );
        Ok(CreateBulkUpdateResponse {
            job_id: job.id,
            group_id: job.group_id,
        })
    }

    /// Reject the requested type, or any type named by a caller `_type`
    /// filter, when bulk update is disabled for it.
    fn reject_excluded_types(&self, request: &CreateBulkUpdateRequest) -> OrchestrationResult<()> {
        let type_filters = request
            .search_parameters
            .iter()
            .filter(|p| p.name == query_params::TYPE)
            .flat_map(|p| p.value.split(','))
            .map(str::trim);

        let excluded = request
            .resource_type
            .as_deref()
            .into_iter()
            .chain(type_filters)
            .find(|resource_type| self.config.is_excluded_resource_type(resource_type));

        match excluded {
            Some(resource_type) => {
                warn!("Rejected bulk update of excluded type {}", resource_type);
                Err(OrchestrationError::bad_request(format!(
                    "Bulk update is not supported for resource type {}",
                    resource_type
                )))
            }
            None => Ok(()),
        }
    }

    fn validate_operations(&self, parameters: &Value) -> OrchestrationResult<()> {
        let types = operation_types(parameters);
        if types.is_empty() {
            return Err(OrchestrationError::bad_request(
                "The request must contain at least one FHIR Patch operation",
            ));
        }

        let unsupported: Vec<&str> = types
            .iter()
            .map(String::as_str)
            .filter(|op| !self.config.is_supported_operation(op))
            .collect();
        if !unsupported.is_empty() {
            return Err(OrchestrationError::bad_request(format!(
                "Unsupported operation type(s): {}. Supported: {}",
                unsupported.join(", "),
                self.config.supported_operation_types.join(", ")
            )));
        }
        Ok(())
    }
}

/// Operation types named by a FHIR `Parameters` patch payload.
///
/// Each `parameter` entry named `operation` contributes the `valueCode` of
/// its `type` part. An operation without a type contributes an empty string
/// so it is rejected as unsupported.
pub fn operation_types(parameters: &Value) -> Vec<String> {
    let Some(entries) = parameters.get("parameter").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter(|entry| entry.get("name").and_then(Value::as_str) == Some("operation"))
        .map(|entry| {
            entry
                .get("part")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .find(|part| part.get("name").and_then(Value::as_str) == Some("type"))
                .and_then(|part| part.get("valueCode").and_then(Value::as_str))
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}
