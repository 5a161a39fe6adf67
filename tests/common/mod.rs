//! Shared test utilities for bulk update integration tests.
//!
//! Provides recording collaborator stubs, request fixtures and helpers that
//! put job groups into a known state on the in-memory queue.


pub use stubs::{
    DenyAll, FailingQueue, RecordingEngine, RecordingMetrics, RecordingProfiles, RecordingSearch,
};

use fhir_bulk_update::collaborators::SearchPage;
use fhir_bulk_update::context::OperationIssue;
use fhir_bulk_update::queue::{InMemoryQueueClient, JobInfo, JobStatus, QueueClient, QueueType};
use fhir_bulk_update::{BulkUpdateDefinition, BulkUpdateResult, RequestContext, SearchParam};
use serde_json::{Value, json};

/// Route library logs to the test output once.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn test_context() -> RequestContext {
    RequestContext::new("test-request")
        .with_correlation_id("test-correlation")
        .with_urls("https://fhir.example.com/$bulk-update", "https://fhir.example.com/")
}

/// A FHIR `Parameters` payload with one operation per type.
pub fn patch_parameters(operation_types: &[&str]) -> Value {
    let parameter: Vec<Value> = operation_types
        .iter()
        .map(|op| {
            json!({
                "name": "operation",
                "part": [
                    {"name": "type", "valueCode": op},
                    {"name": "path", "valueString": "Patient.active"},
                    {"name": "value", "valueBoolean": true}
                ]
            })
        })
        .collect();
    json!({"resourceType": "Parameters", "parameter": parameter})
}

/// Orchestrator definition over one type, optionally with search parameters.
pub fn orchestrator_definition(
    resource_type: Option<&str>,
    search_parameters: &[(&str, &str)],
    is_parallel: bool,
    maximum_per_query: u32,
) -> BulkUpdateDefinition {
    let search_parameters = if search_parameters.is_empty() {
        None
    } else {
        Some(
            search_parameters
                .iter()
                .map(|(name, value)| SearchParam::new(*name, *value))
                .collect(),
        )
    };
    BulkUpdateDefinition::orchestrator(
        resource_type.map(str::to_string),
        search_parameters,
        Some(patch_parameters(&["upsert"])),
        is_parallel,
        maximum_per_query,
    )
}

/// Enqueue an orchestrator job as a new group.
pub async fn enqueue_orchestrator(
    queue: &InMemoryQueueClient,
    definition: &BulkUpdateDefinition,
) -> JobInfo {
    let jobs = queue
        .enqueue(
            QueueType::BulkUpdate,
            vec![definition.to_json().unwrap()],
            None,
            true,
        )
        .await
        .unwrap();
    jobs.into_iter().next().unwrap()
}

/// Enqueue processing definitions into an existing group.
pub async fn enqueue_processing(
    queue: &InMemoryQueueClient,
    group_id: i64,
    definitions: &[BulkUpdateDefinition],
) -> Vec<JobInfo> {
    let serialized = definitions.iter().map(|d| d.to_json().unwrap()).collect();
    queue
        .enqueue(QueueType::BulkUpdate, serialized, Some(group_id), false)
        .await
        .unwrap()
}

/// Lease the next job and record it with the given status and result.
pub async fn finish_next(
    queue: &InMemoryQueueClient,
    status: JobStatus,
    result: Option<&BulkUpdateResult>,
) -> JobInfo {
    let job = queue
        .dequeue(QueueType::BulkUpdate, "test-worker")
        .await
        .unwrap()
        .expect("a waiting job");
    let result = result.map(|r| r.to_json().unwrap());
    queue.complete_job(job.id, status, result).await.unwrap();
    job
}

/// Lease the next job without finishing it.
pub async fn lease_next(queue: &InMemoryQueueClient) -> JobInfo {
    queue
        .dequeue(QueueType::BulkUpdate, "test-worker")
        .await
        .unwrap()
        .expect("a waiting job")
}

pub fn updated(counts: &[(&str, u64)]) -> BulkUpdateResult {
    let mut result = BulkUpdateResult::new();
    for (resource_type, count) in counts {
        result.record_updated(resource_type, *count);
    }
    result
}

/// A search page with matches and optional cursors.
pub fn page(match_count: usize, ct: Option<&str>, ict: Option<&str>) -> SearchPage {
    SearchPage {
        match_count,
        continuation_token: ct.map(str::to_string),
        includes_continuation_token: ict.map(str::to_string),
        issues: Vec::new(),
    }
}

/// A search page that also reports truncated included results.
pub fn truncated_page(match_count: usize, ct: Option<&str>, ict: Option<&str>) -> SearchPage {
    SearchPage {
        issues: vec![OperationIssue::truncated_include()],
        ..page(match_count, ct, ict)
    }
}

pub fn parse_definitions(jobs: &[JobInfo]) -> Vec<BulkUpdateDefinition> {
    jobs.iter()
        .map(|job| BulkUpdateDefinition::from_json(&job.definition).unwrap())
        .collect()
}
