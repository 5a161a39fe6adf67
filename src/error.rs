//! Error types for bulk update orchestration.
//!
//! Soft failures and hard failures that carry a partial result are not errors
//! in this crate; they are reported through [`crate::jobs::JobOutcome`]. The
//! [`OrchestrationError`] type covers everything that must propagate unchanged:
//! malformed job records, collaborator failures, and request rejections raised
//! by the admission and cancellation handlers.

use crate::collaborators::{ProfileStoreError, PublishError, SearchError, UpdateEngineError};
use crate::config::ConfigurationError;
use crate::queue::QueueError;

/// Main error type for bulk update orchestration.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    /// The job record handed to a job was missing or unusable
    #[error("Invalid job: {message}")]
    InvalidJob { message: String },

    /// A job definition or result could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors from the durable job queue
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Errors from the search service
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Errors from the update engine that carry no partial result
    #[error("Update engine error: {0}")]
    UpdateEngine(#[from] UpdateEngineError),

    /// Errors from the profile store
    #[error("Profile store error: {0}")]
    ProfileStore(#[from] ProfileStoreError),

    /// Errors while publishing metrics notifications
    #[error("Metrics publish error: {0}")]
    Publish(#[from] PublishError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The caller may not run bulk updates
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// The request was rejected during admission
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// Another bulk update job group is still active
    #[error("{message}")]
    JobConflict { message: String },

    /// The requested job group does not exist
    #[error("Bulk update job {group_id} not found")]
    NotFound { group_id: i64 },

    /// The requested state change is not possible for the job group
    #[error("Conflict: {message}")]
    Conflict { message: String },
}

impl OrchestrationError {
    /// Create a new InvalidJob error.
    pub fn invalid_job(message: impl Into<String>) -> Self {
        Self::InvalidJob {
            message: message.into(),
        }
    }

    /// Create a new Unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a new BadRequest error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create the caller-facing error for a colliding job group.
    pub fn job_conflict() -> Self {
        Self::JobConflict {
            message: "A bulk update job is already running.".to_string(),
        }
    }

    /// Create a new NotFound error.
    pub fn not_found(group_id: i64) -> Self {
        Self::NotFound { group_id }
    }

    /// Create a new Conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Check if this error is a request rejection rather than a failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized { .. }
                | Self::BadRequest { .. }
                | Self::JobConflict { .. }
                | Self::NotFound { .. }
                | Self::Conflict { .. }
        )
    }

    /// HTTP status code the outer request layer should answer with.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } | Self::InvalidJob { .. } => 400,
            Self::Unauthorized { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::JobConflict { .. } | Self::Conflict { .. } => 409,
            _ => 500,
        }
    }
}

/// Result type for orchestration operations.
pub type OrchestrationResult<T> = Result<T, OrchestrationError>;
