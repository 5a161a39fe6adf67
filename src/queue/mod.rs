//! Durable job queue contract.
//!
//! Bulk update jobs never share in-process state: every cross-job decision
//! (is this group active, am I the last job to finish, what did my siblings
//! update) is made from a snapshot read through [`QueueClient`].
//!
//! # Example Usage
//!
//! ```rust
//! use fhir_bulk_update::queue::{InMemoryQueueClient, JobStatus, QueueClient, QueueType};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = InMemoryQueueClient::new();
//!
//! let jobs = queue
//!     .enqueue(QueueType::BulkUpdate, vec!["{}".to_string()], None, true)
//!     .await?;
//! let group_id = jobs[0].group_id;
//!
//! let running = queue.dequeue(QueueType::BulkUpdate, "worker-1").await?.unwrap();
//! queue.complete_job(running.id, JobStatus::Completed, Some("{}".to_string())).await?;
//!
//! let group = queue.get_jobs_by_group_id(QueueType::BulkUpdate, group_id, true).await?;
//! assert!(group.iter().all(|job| job.status.is_terminal()));
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod in_memory;

pub use errors::QueueError;
pub use in_memory::{InMemoryQueueClient, InMemoryQueueStats};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

/// Queues served by the job engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QueueType {
    Export,
    Import,
    BulkDelete,
    BulkUpdate,
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueueType::Export => "Export",
            QueueType::Import => "Import",
            QueueType::BulkDelete => "BulkDelete",
            QueueType::BulkUpdate => "BulkUpdate",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of a job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether the job will not change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// A job record as stored by the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: i64,
    pub group_id: i64,
    pub queue_type: QueueType,
    pub status: JobStatus,
    /// Serialized job definition
    pub definition: String,
    /// Serialized terminal result, when requested and available
    pub result: Option<String>,
    pub cancel_requested: bool,
    pub create_date: DateTime<Utc>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl JobInfo {
    /// Create a freshly enqueued job record.
    pub fn new(id: i64, group_id: i64, queue_type: QueueType, definition: impl Into<String>) -> Self {
        Self {
            id,
            group_id,
            queue_type,
            status: JobStatus::Created,
            definition: definition.into(),
            result: None,
            cancel_requested: false,
            create_date: Utc::now(),
            start_date: None,
            end_date: None,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    /// Whether the job is still waiting or running and no cancel was requested.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal() && !self.cancel_requested
    }
}

/// Contract of the durable job queue.
///
/// Implementations persist job records, group them, and move them through
/// their lifecycle. Retries and leases are the implementation's concern.
pub trait QueueClient: Send + Sync {
    /// Enqueue serialized definitions.
    ///
    /// With `group_id` set the jobs join that group; otherwise a new group is
    /// created. With `force_one_active_job_group` the call fails with
    /// [`QueueError::JobConflict`] while another group of the same queue is
    /// active.
    fn enqueue(
        &self,
        queue_type: QueueType,
        definitions: Vec<String>,
        group_id: Option<i64>,
        force_one_active_job_group: bool,
    ) -> impl Future<Output = Result<Vec<JobInfo>, QueueError>> + Send;

    /// Snapshot of every job in a group, ordered by id.
    fn get_jobs_by_group_id(
        &self,
        queue_type: QueueType,
        group_id: i64,
        include_results: bool,
    ) -> impl Future<Output = Result<Vec<JobInfo>, QueueError>> + Send;

    /// Request cancellation of every job in a group.
    fn cancel_jobs_by_group_id(
        &self,
        queue_type: QueueType,
        group_id: i64,
    ) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// Lease the next created job, marking it running.
    fn dequeue(
        &self,
        queue_type: QueueType,
        worker: &str,
    ) -> impl Future<Output = Result<Option<JobInfo>, QueueError>> + Send;

    /// Record the terminal status and result of a job.
    fn complete_job(
        &self,
        job_id: i64,
        status: JobStatus,
        result: Option<String>,
    ) -> impl Future<Output = Result<(), QueueError>> + Send;
}
