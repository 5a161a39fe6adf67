//! Queue-specific error types.
//!
//! These errors describe failures of the durable job queue itself. The
//! distinguished [`QueueError::JobConflict`] is raised when a new job group
//! would run alongside an active group in the same queue.

use thiserror::Error;

/// Errors that can occur during queue operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// Another job group is active and only one may run at a time.
    #[error("Job conflict: {message}")]
    JobConflict { message: String },

    /// The referenced job does not exist.
    #[error("Job {job_id} not found")]
    JobNotFound { job_id: i64 },

    /// The queue backend is temporarily unavailable.
    #[error("Queue unavailable: {message}")]
    Unavailable { message: String },

    /// A job record could not be encoded or decoded.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal queue error.
    #[error("Internal queue error: {message}")]
    Internal { message: String },
}

impl QueueError {
    /// Create a new JobConflict error.
    pub fn job_conflict(message: impl Into<String>) -> Self {
        Self::JobConflict {
            message: message.into(),
        }
    }

    /// Create a new JobNotFound error.
    pub fn job_not_found(job_id: i64) -> Self {
        Self::JobNotFound { job_id }
    }

    /// Create a new Unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a new Serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a new Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is an active-group collision.
    pub fn is_conflict(&self) -> bool {
        matches!(self, QueueError::JobConflict { .. })
    }

    /// Check if this error indicates a temporary failure that might succeed on retry.
    pub fn is_temporary(&self) -> bool {
        matches!(self, QueueError::Unavailable { .. })
    }
}
