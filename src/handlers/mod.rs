//! Request handlers for bulk update jobs.
//!
//! [`BulkUpdateHandler`] is the transport-agnostic entry point the outer
//! request layer calls into. It admits new bulk updates, cancels running ones
//! and answers status queries; failures are reported as
//! [`OrchestrationError`](crate::OrchestrationError) values whose
//! `http_status_code()` the transport can answer with.
//!
//! # Examples
//!
//! ```rust,no_run
//! use fhir_bulk_update::handlers::{BulkUpdateHandler, CreateBulkUpdateRequest};
//! use fhir_bulk_update::{BulkUpdateConfig, InMemoryQueueClient, RequestContext};
//! # use fhir_bulk_update::collaborators::{ProfileStore, ProfileStoreError};
//! # use std::collections::HashSet;
//! # struct NoProfiles;
//! # impl ProfileStore for NoProfiles {
//! #     async fn get_profile_types(&self) -> Result<HashSet<String>, ProfileStoreError> { Ok(HashSet::new()) }
//! #     async fn refresh(&self) -> Result<(), ProfileStoreError> { Ok(()) }
//! # }
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handler = BulkUpdateHandler::new(InMemoryQueueClient::new(), NoProfiles, BulkUpdateConfig::default())?;
//!
//! let payload = json!({
//!     "resourceType": "Parameters",
//!     "parameter": [{
//!         "name": "operation",
//!         "part": [{"name": "type", "valueCode": "upsert"}]
//!     }]
//! });
//! let request = CreateBulkUpdateRequest::new(payload).with_resource_type("Patient");
//! let created = handler.create(request, &RequestContext::with_generated_id()).await?;
//!
//! let report = handler.status(created.group_id, &RequestContext::with_generated_id()).await?;
//! println!("status {}", report.status.http_status_code());
//! # Ok(())
//! # }
//! ```

mod cancel;
mod create;
mod status;

pub use create::operation_types;

use crate::collaborators::{AllowAll, Authorizer, ProfileStore};
use crate::config::BulkUpdateConfig;
use crate::context::RequestContext;
use crate::definition::SearchParam;
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::queue::QueueClient;
use log::warn;
use serde_json::Value;

/// Admission, cancellation and status handler for bulk update job groups.
pub struct BulkUpdateHandler<Q, P, A = AllowAll> {
    queue: Q,
    profiles: P,
    authorizer: A,
    config: BulkUpdateConfig,
}

impl<Q, P> BulkUpdateHandler<Q, P, AllowAll>
where
    Q: QueueClient,
    P: ProfileStore,
{
    /// Create a handler that admits every caller.
    pub fn new(queue: Q, profiles: P, config: BulkUpdateConfig) -> OrchestrationResult<Self> {
        Self::with_authorizer(queue, profiles, AllowAll, config)
    }
}

impl<Q, P, A> BulkUpdateHandler<Q, P, A>
where
    Q: QueueClient,
    P: ProfileStore,
    A: Authorizer,
{
    /// Create a handler that checks callers with `authorizer`.
    pub fn with_authorizer(
        queue: Q,
        profiles: P,
        authorizer: A,
        config: BulkUpdateConfig,
    ) -> OrchestrationResult<Self> {
        config.validate()?;
        Ok(Self {
            queue,
            profiles,
            authorizer,
            config,
        })
    }

    pub fn config(&self) -> &BulkUpdateConfig {
        &self.config
    }

    fn authorize(&self, context: &RequestContext) -> OrchestrationResult<()> {
        if self.authorizer.can_bulk_update(context) {
            Ok(())
        } else {
            warn!("Request {} is not allowed to run bulk updates", context.request_id);
            Err(OrchestrationError::unauthorized(
                "The caller is not authorized to perform bulk updates",
            ))
        }
    }
}

/// A request to start a bulk update.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateBulkUpdateRequest {
    /// Resource type to update; `None` updates every type in use
    pub resource_type: Option<String>,
    pub search_parameters: Vec<SearchParam>,
    /// FHIR `Parameters` resource describing the patch operations
    pub parameters: Value,
    pub is_parallel: bool,
    /// Page size; 0 uses the configured default
    pub maximum_number_of_resources_per_query: u32,
}

impl CreateBulkUpdateRequest {
    pub fn new(parameters: Value) -> Self {
        Self {
            resource_type: None,
            search_parameters: Vec::new(),
            parameters,
            is_parallel: true,
            maximum_number_of_resources_per_query: 0,
        }
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn with_search_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.search_parameters.push(SearchParam::new(name, value));
        self
    }

    pub fn with_parallel(mut self, is_parallel: bool) -> Self {
        self.is_parallel = is_parallel;
        self
    }

    pub fn with_maximum_resources_per_query(mut self, maximum: u32) -> Self {
        self.maximum_number_of_resources_per_query = maximum;
        self
    }
}

/// The orchestrator job a bulk update was admitted as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBulkUpdateResponse {
    pub job_id: i64,
    pub group_id: i64,
}

/// Result of an accepted cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelBulkUpdateResponse {
    pub group_id: i64,
    /// Whether the profile cache was refreshed
    pub profiles_refreshed: bool,
}
