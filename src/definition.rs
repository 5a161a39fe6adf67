//! Job definitions for bulk update jobs.
//!
//! A [`BulkUpdateDefinition`] is the immutable payload persisted with every job
//! in a bulk update group. The orchestrator's definition is built at admission;
//! processing definitions are derived from it during fan-out and are never
//! changed afterwards.

use crate::error::OrchestrationResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known query parameter names.
pub mod query_params {
    pub const TYPE: &str = "_type";
    pub const COUNT: &str = "_count";
    pub const LAST_UPDATED: &str = "_lastUpdated";
    pub const CONTINUATION_TOKEN: &str = "ct";
    pub const INCLUDES_CONTINUATION_TOKEN: &str = "ict";
    pub const START_SURROGATE_ID: &str = "_startSurrogateId";
    pub const END_SURROGATE_ID: &str = "_endSurrogateId";
    pub const GLOBAL_START_SURROGATE_ID: &str = "_globalStartSurrogateId";
    pub const GLOBAL_END_SURROGATE_ID: &str = "_globalEndSurrogateId";
}

/// Discriminates the two job strategies of a bulk update group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// Fans a request out into processing jobs
    Orchestrator,
    /// Updates one partition or page of resources
    Processing,
}

/// A single `(name, value)` search parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchParam {
    pub name: String,
    pub value: String,
}

impl SearchParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl<N: Into<String>, V: Into<String>> From<(N, V)> for SearchParam {
    fn from((name, value): (N, V)) -> Self {
        Self::new(name, value)
    }
}

/// Persisted definition of one job in a bulk update group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateDefinition {
    pub job_kind: JobKind,

    /// Requested resource type; `None` means every resource type in use.
    pub resource_type: Option<String>,

    pub search_parameters: Option<Vec<SearchParam>>,

    pub url: Option<String>,
    pub base_url: Option<String>,
    pub correlation_id: Option<String>,

    /// Opaque patch payload handed to the update engine.
    pub parameters: Option<Value>,

    pub is_parallel: bool,

    /// Keep paging through results instead of working a bounded range.
    pub read_next_page: bool,

    /// Effective resource type of a processing partition.
    #[serde(rename = "type")]
    pub partition_type: Option<String>,

    pub start_surrogate_id: Option<String>,
    pub end_surrogate_id: Option<String>,
    pub global_start_surrogate_id: Option<String>,
    pub global_end_surrogate_id: Option<String>,

    /// Caller page size; zero means the configured default.
    #[serde(default)]
    pub maximum_number_of_resources_per_query: u32,
}

impl BulkUpdateDefinition {
    /// Create the orchestrator definition for a new bulk update request.
    pub fn orchestrator(
        resource_type: Option<String>,
        search_parameters: Option<Vec<SearchParam>>,
        parameters: Option<Value>,
        is_parallel: bool,
        maximum_number_of_resources_per_query: u32,
    ) -> Self {
        Self {
            job_kind: JobKind::Orchestrator,
            resource_type,
            search_parameters,
            url: None,
            base_url: None,
            correlation_id: None,
            parameters,
            is_parallel,
            read_next_page: false,
            partition_type: None,
            start_surrogate_id: None,
            end_surrogate_id: None,
            global_start_surrogate_id: None,
            global_end_surrogate_id: None,
            maximum_number_of_resources_per_query,
        }
    }

    /// Attach request provenance.
    pub fn with_provenance(
        mut self,
        url: Option<String>,
        base_url: Option<String>,
        correlation_id: Option<String>,
    ) -> Self {
        self.url = url;
        self.base_url = base_url;
        self.correlation_id = correlation_id;
        self
    }

    /// Processing copy that pages through the whole request scope.
    pub fn paging_processing(&self) -> Self {
        Self {
            job_kind: JobKind::Processing,
            read_next_page: true,
            ..self.clone()
        }
    }

    /// Processing definition covering one surrogate id range of `resource_type`.
    pub fn range_processing(
        &self,
        resource_type: &str,
        start_id: i64,
        end_id: i64,
        global_start_id: i64,
        global_end_id: i64,
    ) -> Self {
        Self {
            job_kind: JobKind::Processing,
            read_next_page: false,
            partition_type: Some(resource_type.to_string()),
            start_surrogate_id: Some(start_id.to_string()),
            end_surrogate_id: Some(end_id.to_string()),
            global_start_surrogate_id: Some(global_start_id.to_string()),
            global_end_surrogate_id: Some(global_end_id.to_string()),
            ..self.clone()
        }
    }

    /// Processing definition covering a whole resource type when no ranges exist.
    pub fn whole_type_processing(&self, resource_type: &str) -> Self {
        Self {
            job_kind: JobKind::Processing,
            read_next_page: true,
            partition_type: Some(resource_type.to_string()),
            ..self.clone()
        }
    }

    /// Processing definition for one search page addressed by continuation tokens.
    pub fn page_processing(
        &self,
        continuation_token: Option<&str>,
        includes_continuation_token: Option<&str>,
    ) -> Self {
        let mut search_parameters: Vec<SearchParam> = self
            .search_parameters
            .iter()
            .flatten()
            .filter(|p| !is_continuation_param(&p.name))
            .cloned()
            .collect();
        if let Some(token) = continuation_token {
            search_parameters.push(SearchParam::new(query_params::CONTINUATION_TOKEN, token));
        }
        if let Some(token) = includes_continuation_token {
            search_parameters.push(SearchParam::new(
                query_params::INCLUDES_CONTINUATION_TOKEN,
                token,
            ));
        }

        Self {
            job_kind: JobKind::Processing,
            read_next_page: false,
            search_parameters: Some(search_parameters),
            ..self.clone()
        }
    }

    /// Resource type the update engine should work on.
    pub fn effective_resource_type(&self) -> Option<&str> {
        self.partition_type
            .as_deref()
            .or(self.resource_type.as_deref())
    }

    /// Whether any search parameters were supplied.
    pub fn has_search_parameters(&self) -> bool {
        self.search_parameters
            .as_ref()
            .is_some_and(|params| !params.is_empty())
    }

    /// First value of the named search parameter.
    pub fn search_parameter(&self, name: &str) -> Option<&str> {
        self.search_parameters
            .iter()
            .flatten()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn continuation_token(&self) -> Option<&str> {
        self.search_parameter(query_params::CONTINUATION_TOKEN)
    }

    pub fn includes_continuation_token(&self) -> Option<&str> {
        self.search_parameter(query_params::INCLUDES_CONTINUATION_TOKEN)
    }

    /// Serialize for persistence in a job record.
    pub fn to_json(&self) -> OrchestrationResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a persisted definition.
    pub fn from_json(json: &str) -> OrchestrationResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn is_continuation_param(name: &str) -> bool {
    name == query_params::CONTINUATION_TOKEN || name == query_params::INCLUDES_CONTINUATION_TOKEN
}
