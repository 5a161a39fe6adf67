//! Error types raised by external collaborators.
//!
//! These errors are independent of any concrete backend. Only
//! [`UpdateEngineError::IncompleteOperation`] is handled specially by the
//! processing job: it carries the work finished before the fault so that the
//! partial result is never lost.

use crate::result::BulkUpdateResult;
use thiserror::Error;

/// Errors from the search service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("Invalid search: {message}")]
    InvalidSearch {
        /// Description of what made the search invalid
        message: String,
    },

    #[error("Search unavailable: {message}")]
    Unavailable {
        /// Description of the outage
        message: String,
    },

    #[error("Internal search error: {message}")]
    Internal {
        /// Description of the failure
        message: String,
    },
}

impl SearchError {
    pub fn invalid_search(message: impl Into<String>) -> Self {
        Self::InvalidSearch {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Errors from the update engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpdateEngineError {
    /// The engine stopped part-way; `partial` holds what was already done.
    #[error("Incomplete operation: {message}")]
    IncompleteOperation {
        message: String,
        partial: BulkUpdateResult,
    },

    #[error("Update failed: {message}")]
    Failed {
        /// Description of the failure
        message: String,
    },
}

impl UpdateEngineError {
    pub fn incomplete(message: impl Into<String>, partial: BulkUpdateResult) -> Self {
        Self::IncompleteOperation {
            message: message.into(),
            partial,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Work completed before the fault, if the engine reported any.
    pub fn partial_result(&self) -> Option<&BulkUpdateResult> {
        match self {
            Self::IncompleteOperation { partial, .. } => Some(partial),
            Self::Failed { .. } => None,
        }
    }
}

/// Errors from the profile store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Profile store error: {message}")]
pub struct ProfileStoreError {
    pub message: String,
}

impl ProfileStoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors while publishing a notification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Publish failed: {message}")]
pub struct PublishError {
    pub message: String,
}

impl PublishError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
