//! Request context for bulk update operations.
//!
//! The context travels with a request from admission through every job that
//! works on it. It carries provenance (request URL, base URL, correlation id)
//! and the operation issues raised while handling the request, and it is handed
//! to the update engine as the bundle context of each page update.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Issue code used by the search layer when included results were cut short.
pub const TRUNCATED_INCLUDE_CODE: &str = "truncated-include";

/// Severity of an [`OperationIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

/// A diagnostic attached to a request or to a status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationIssue {
    pub severity: IssueSeverity,
    pub code: String,
    pub diagnostics: String,
}

impl OperationIssue {
    /// Create a new issue.
    pub fn new(
        severity: IssueSeverity,
        code: impl Into<String>,
        diagnostics: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            diagnostics: diagnostics.into(),
        }
    }

    /// The warning the search layer raises when `_include` results exceed their limit.
    pub fn truncated_include() -> Self {
        Self::new(
            IssueSeverity::Warning,
            TRUNCATED_INCLUDE_CODE,
            "Included items are truncated. Use the included-results continuation token to read the rest.",
        )
    }
}

/// Request context for bulk update operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Unique identifier for this request
    pub request_id: String,
    /// Correlation id threaded through for audit
    pub correlation_id: Option<String>,
    /// Full request URL
    pub url: Option<String>,
    /// Server base URL
    pub base_url: Option<String>,
    /// Issues raised while handling the request
    pub issues: Vec<OperationIssue>,
}

impl RequestContext {
    /// Create a new request context with a specific request ID.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ..Self::default()
        }
    }

    /// Create a new request context with a generated request ID.
    pub fn with_generated_id() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Set the correlation id.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Set the request and base URLs.
    pub fn with_urls(mut self, url: impl Into<String>, base_url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self.base_url = Some(base_url.into());
        self
    }

    /// Record an issue on the request.
    pub fn add_issue(&mut self, issue: OperationIssue) {
        self.issues.push(issue);
    }

    /// Whether the search layer reported truncated included results.
    pub fn has_truncated_includes(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.code == TRUNCATED_INCLUDE_CODE)
    }

    /// Correlation id, falling back to the request id.
    pub fn effective_correlation_id(&self) -> &str {
        self.correlation_id.as_deref().unwrap_or(&self.request_id)
    }
}
