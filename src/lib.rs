//! FHIR bulk update job orchestration for Rust.
//!
//! Splits a large resource-update request into a group of independently
//! executable, resumable jobs on a durable queue, runs them, and folds their
//! partial results (including partial failures) into one reportable status.
//!
//! # Core Components
//!
//! - [`BulkUpdateHandler`] - Admits, cancels and reports on bulk update job groups
//! - [`OrchestratorJob`] - Partitions a request into processing jobs
//! - [`ProcessingJob`] - Runs the update engine over one partition
//! - [`BulkUpdateWorker`] - Leases jobs from the queue and records their outcome
//! - [`aggregation::aggregate`] - Folds a job group into a status report
//! - [`QueueClient`] and the [`collaborators`] traits - Seams to the job queue,
//!   search service, update engine, profile store and metrics bus
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use fhir_bulk_update::{BulkUpdateConfig, BulkUpdateWorker, InMemoryQueueClient, RequestContext};
//! # use fhir_bulk_update::collaborators::*;
//! # use fhir_bulk_update::{BulkUpdateResult, SearchParam};
//! # use std::collections::HashSet;
//! # struct Search; struct Engine; struct Profiles; struct Metrics;
//! # impl SearchService for Search {
//! #     async fn search(&self, _: Option<&str>, _: &[SearchParam], _: bool, _: &RequestContext) -> Result<SearchPage, SearchError> { Ok(SearchPage::default()) }
//! #     async fn get_used_resource_types(&self) -> Result<Vec<String>, SearchError> { Ok(vec![]) }
//! #     async fn get_surrogate_id_ranges(&self, _: &str, _: i64, _: i64, _: u32, _: u32, _: bool) -> Result<Vec<SurrogateIdRange>, SearchError> { Ok(vec![]) }
//! # }
//! # impl UpdateEngine for Engine {
//! #     async fn update_multiple(&self, _: UpdateMultipleRequest) -> Result<BulkUpdateResult, UpdateEngineError> { Ok(BulkUpdateResult::new()) }
//! # }
//! # impl ProfileStore for Profiles {
//! #     async fn get_profile_types(&self) -> Result<HashSet<String>, ProfileStoreError> { Ok(HashSet::new()) }
//! #     async fn refresh(&self) -> Result<(), ProfileStoreError> { Ok(()) }
//! # }
//! # impl MetricsSink for Metrics {
//! #     async fn publish(&self, _: BulkUpdateMetricsNotification) -> Result<(), PublishError> { Ok(()) }
//! # }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = InMemoryQueueClient::new();
//! let worker = BulkUpdateWorker::new(
//!     "worker-1",
//!     queue.clone(),
//!     Search,
//!     Engine,
//!     Profiles,
//!     Metrics,
//!     BulkUpdateConfig::default(),
//! );
//! let processed = worker.run_until_idle(&RequestContext::with_generated_id()).await?;
//! # Ok(())
//! # }
//! ```

pub mod aggregation;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod definition;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod queue;
pub mod result;
pub mod surrogate_id;

// Re-export commonly used types for convenience
pub use aggregation::{AggregateStatus, BulkUpdateStatusReport};
pub use config::{BulkUpdateConfig, ConfigurationError};
pub use context::{IssueSeverity, OperationIssue, RequestContext};
pub use definition::{BulkUpdateDefinition, JobKind, SearchParam};
pub use error::{OrchestrationError, OrchestrationResult};
pub use result::{BulkUpdateResult, ResourceCounts};

pub use handlers::{
    BulkUpdateHandler, CancelBulkUpdateResponse, CreateBulkUpdateRequest, CreateBulkUpdateResponse,
};
pub use jobs::{
    BulkUpdateWorker, JobExecutionError, JobOutcome, OrchestratorJob, ProcessingJob, WorkerRun,
};
pub use queue::{InMemoryQueueClient, JobInfo, JobStatus, QueueClient, QueueError, QueueType};
