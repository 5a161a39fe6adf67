//! Tunables for bulk update orchestration.
//!
//! A [`BulkUpdateConfig`] is shared by the orchestrator, processing jobs and
//! request handlers. It can be built in code or deserialized from JSON:
//!
//! ```rust
//! use fhir_bulk_update::BulkUpdateConfig;
//!
//! let config: BulkUpdateConfig = serde_json::from_str(r#"{"processingBatchSize": 500}"#).unwrap();
//! assert_eq!(config.processing_batch_size, 500);
//! assert_eq!(config.default_max_resources_per_query, 10_000);
//! ```

use crate::queue::QueueType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a configuration cannot be used.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A numeric tunable was zero
    #[error("Configuration value '{field}' must be greater than zero")]
    ZeroValue { field: &'static str },

    /// No FHIR Patch operation type is accepted
    #[error("At least one supported operation type must be configured")]
    NoSupportedOperations,
}

/// Configuration for bulk update jobs and handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkUpdateConfig {
    /// Upper bound on the page size of a processing job whose global scan end is unknown.
    pub processing_batch_size: u32,

    /// Page size used when a definition leaves `maximumNumberOfResourcesPerQuery` unset.
    pub default_max_resources_per_query: u32,

    /// Maximum number of surrogate id ranges requested per discovery call.
    pub max_ranges_per_query: u32,

    /// FHIR Patch operation types accepted by admission.
    pub supported_operation_types: Vec<String>,

    /// Resource types that may not be bulk updated.
    pub excluded_resource_types: Vec<String>,

    /// Queue the jobs are written to.
    pub queue_type: QueueType,
}

impl Default for BulkUpdateConfig {
    fn default() -> Self {
        Self {
            processing_batch_size: 1000,
            default_max_resources_per_query: 10_000,
            max_ranges_per_query: 100,
            supported_operation_types: vec!["upsert".to_string(), "replace".to_string()],
            excluded_resource_types: vec!["SearchParameter".to_string()],
            queue_type: QueueType::BulkUpdate,
        }
    }
}

impl BulkUpdateConfig {
    /// Set the processing batch size ceiling.
    pub fn with_processing_batch_size(mut self, size: u32) -> Self {
        self.processing_batch_size = size;
        self
    }

    /// Set the default page size.
    pub fn with_default_max_resources_per_query(mut self, size: u32) -> Self {
        self.default_max_resources_per_query = size;
        self
    }

    /// Set the number of ranges requested per discovery call.
    pub fn with_max_ranges_per_query(mut self, ranges: u32) -> Self {
        self.max_ranges_per_query = ranges;
        self
    }

    /// Replace the accepted FHIR Patch operation types.
    pub fn with_supported_operation_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_operation_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the excluded resource types.
    pub fn with_excluded_resource_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_resource_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Check that the configuration can drive jobs.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.processing_batch_size == 0 {
            return Err(ConfigurationError::ZeroValue {
                field: "processingBatchSize",
            });
        }
        if self.default_max_resources_per_query == 0 {
            return Err(ConfigurationError::ZeroValue {
                field: "defaultMaxResourcesPerQuery",
            });
        }
        if self.max_ranges_per_query == 0 {
            return Err(ConfigurationError::ZeroValue {
                field: "maxRangesPerQuery",
            });
        }
        if self.supported_operation_types.is_empty() {
            return Err(ConfigurationError::NoSupportedOperations);
        }
        Ok(())
    }

    /// Whether `operation_type` is an accepted FHIR Patch operation (case-insensitive).
    pub fn is_supported_operation(&self, operation_type: &str) -> bool {
        self.supported_operation_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(operation_type))
    }

    /// Whether `resource_type` is excluded from bulk updates.
    pub fn is_excluded_resource_type(&self, resource_type: &str) -> bool {
        self.excluded_resource_types
            .iter()
            .any(|t| t == resource_type)
    }
}
