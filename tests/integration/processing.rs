//! Processing job tests: outcomes, metrics and the last-job profile refresh.

use crate::common::*;
use fhir_bulk_update::collaborators::{
    BulkUpdateMetricsNotification, ProfileStoreError, PublishError, UpdateEngineError,
};
use fhir_bulk_update::definition::query_params;
use fhir_bulk_update::queue::{InMemoryQueueClient, JobInfo, JobStatus};
use fhir_bulk_update::{
    BulkUpdateConfig, BulkUpdateDefinition, BulkUpdateResult, JobOutcome, OrchestrationError,
    ProcessingJob,
};

type TestProcessingJob =
    ProcessingJob<InMemoryQueueClient, RecordingEngine, RecordingProfiles, RecordingMetrics>;

struct Fixture {
    queue: InMemoryQueueClient,
    engine: RecordingEngine,
    profiles: RecordingProfiles,
    metrics: RecordingMetrics,
    orchestrator: BulkUpdateDefinition,
}

impl Fixture {
    fn new(engine: RecordingEngine) -> Self {
        init_logging();
        Self {
            queue: InMemoryQueueClient::new(),
            engine,
            profiles: RecordingProfiles::new().with_profile_types(&["ValueSet", "StructureDefinition"]),
            metrics: RecordingMetrics::new(),
            orchestrator: orchestrator_definition(None, &[], true, 0),
        }
    }

    fn job(&self) -> TestProcessingJob {
        ProcessingJob::new(
            self.queue.clone(),
            self.engine.clone(),
            self.profiles.clone(),
            self.metrics.clone(),
            BulkUpdateConfig::default(),
        )
    }

    /// A finished orchestrator plus the given processing definitions, all waiting.
    async fn group(&self, definitions: &[BulkUpdateDefinition]) -> Vec<JobInfo> {
        let orchestrator = enqueue_orchestrator(&self.queue, &self.orchestrator).await;
        finish_next(&self.queue, JobStatus::Completed, Some(&BulkUpdateResult::new())).await;
        enqueue_processing(&self.queue, orchestrator.group_id, definitions).await
    }

    fn range(&self, start: i64, end: i64) -> BulkUpdateDefinition {
        self.orchestrator
            .range_processing("Patient", start, end, 0, 1_000_000)
    }
}

#[tokio::test]
async fn test_soft_failure_keeps_full_result_and_publishes_once() {
    let mut result = updated(&[("Patient", 3)]);
    result.record_patch_failed("Patient", 1);
    let fixture = Fixture::new(RecordingEngine::new().returning(result.clone()));
    let jobs = fixture.group(&[fixture.range(1, 10)]).await;
    let job = lease_next(&fixture.queue).await;

    let outcome = fixture.job().execute(&job, &test_context()).await.unwrap();

    match &outcome {
        JobOutcome::SoftFailure {
            result: kept,
            message,
        } => {
            assert_eq!(kept, &result);
            assert!(message.starts_with("Exception encounted while updating resources"));
            assert!(message.contains("Patient"));
        }
        other => panic!("expected a soft failure, got {:?}", other),
    }
    assert_eq!(outcome.status(), JobStatus::Failed);
    assert_eq!(
        fixture.metrics.published(),
        vec![BulkUpdateMetricsNotification {
            job_id: jobs[0].id,
            resources_updated: 3,
        }]
    );
}

#[tokio::test]
async fn test_success_publishes_total_updated() {
    let fixture = Fixture::new(
        RecordingEngine::new().returning(updated(&[("Patient", 2), ("Observation", 1)])),
    );
    fixture.group(&[fixture.range(1, 10)]).await;
    let job = lease_next(&fixture.queue).await;

    let outcome = fixture.job().execute(&job, &test_context()).await.unwrap();

    assert!(outcome.is_completed());
    assert_eq!(fixture.metrics.published()[0].resources_updated, 3);
}

#[tokio::test]
async fn test_nothing_updated_publishes_nothing() {
    let fixture = Fixture::new(RecordingEngine::new());
    fixture.group(&[fixture.range(1, 10)]).await;
    let job = lease_next(&fixture.queue).await;

    let outcome = fixture.job().execute(&job, &test_context()).await.unwrap();

    assert_eq!(outcome, JobOutcome::Completed(BulkUpdateResult::new()));
    assert!(fixture.metrics.published().is_empty());
}

#[tokio::test]
async fn test_incomplete_operation_keeps_partial_result() {
    let mut partial = updated(&[("ValueSet", 4)]);
    partial.add_issue("page 3 could not be read");
    let fixture = Fixture::new(
        RecordingEngine::new().failing(UpdateEngineError::incomplete("timed out", partial.clone())),
    );
    fixture.group(&[fixture.range(1, 10)]).await;
    let job = lease_next(&fixture.queue).await;

    let outcome = fixture.job().execute(&job, &test_context()).await.unwrap();

    let JobOutcome::HardFailure(error) = &outcome else {
        panic!("expected a hard failure, got {:?}", outcome);
    };
    assert_eq!(error.partial.as_ref(), Some(&partial));
    assert!(error.message.contains("timed out"));
    assert!(error.message.contains("page 3 could not be read"));
    assert_eq!(fixture.metrics.published()[0].resources_updated, 4);
    // Hard failures never refresh, even as the last job touching a profile type
    assert_eq!(fixture.profiles.type_queries(), 0);
    assert_eq!(fixture.profiles.refresh_count(), 0);
}

#[tokio::test]
async fn test_unexpected_engine_error_propagates() {
    let fixture = Fixture::new(RecordingEngine::new().failing(UpdateEngineError::failed("db down")));
    fixture.group(&[fixture.range(1, 10)]).await;
    let job = lease_next(&fixture.queue).await;

    let error = fixture.job().execute(&job, &test_context()).await.unwrap_err();

    assert!(matches!(
        error,
        OrchestrationError::UpdateEngine(UpdateEngineError::Failed { .. })
    ));
    assert!(fixture.metrics.published().is_empty());
    assert_eq!(fixture.profiles.refresh_count(), 0);
}

#[tokio::test]
async fn test_count_is_capped_without_global_end() {
    let fixture = Fixture::new(RecordingEngine::new());
    let paging = orchestrator_definition(Some("Patient"), &[("name", "smith")], false, 1500)
        .paging_processing();
    fixture.group(&[paging]).await;
    let job = lease_next(&fixture.queue).await;

    fixture.job().execute(&job, &test_context()).await.unwrap();

    let request = &fixture.engine.requests()[0];
    let count = request
        .query_parameters
        .iter()
        .find(|p| p.name == query_params::COUNT)
        .map(|p| p.value.as_str());
    assert_eq!(count, Some("1000"));
    assert!(!request.single_page);
    assert_eq!(request.read_up_to, 0);
    assert_eq!(request.resource_type.as_deref(), Some("Patient"));
}

#[tokio::test]
async fn test_range_request_shape() {
    let fixture = Fixture::new(RecordingEngine::new());
    fixture.group(&[fixture.range(11, 20)]).await;
    let job = lease_next(&fixture.queue).await;

    fixture.job().execute(&job, &test_context()).await.unwrap();

    let request = &fixture.engine.requests()[0];
    let names: Vec<&str> = request
        .query_parameters
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "_type",
            "_globalEndSurrogateId",
            "_endSurrogateId",
            "_globalStartSurrogateId",
            "_startSurrogateId",
            "_count",
        ]
    );
    assert_eq!(request.query_parameters[5].value, "10000");
    assert!(request.single_page);
    assert!(request.is_parallel);
    assert_eq!(request.operation, fixture.orchestrator.parameters);
    assert_eq!(request.context.correlation_id.as_deref(), Some("test-correlation"));
}

#[tokio::test]
async fn test_reexecution_yields_same_result() {
    let fixture = Fixture::new(RecordingEngine::new().returning(updated(&[("Patient", 5)])));
    fixture.group(&[fixture.range(1, 10), fixture.range(11, 20)]).await;
    let job = lease_next(&fixture.queue).await;
    let processing = fixture.job();

    let first = processing.execute(&job, &test_context()).await.unwrap();
    let second = processing.execute(&job, &test_context()).await.unwrap();

    assert_eq!(first, second);
    let requests = fixture.engine.requests();
    assert_eq!(requests[0], requests[1]);
}

#[tokio::test]
async fn test_last_job_refreshes_profiles_once() {
    let fixture = Fixture::new(
        RecordingEngine::new().returning(updated(&[("ValueSet", 1), ("Patient", 1)])),
    );
    fixture.group(&[fixture.range(1, 10), fixture.range(11, 20)]).await;
    finish_next(
        &fixture.queue,
        JobStatus::Completed,
        Some(&updated(&[("Patient", 1)])),
    )
    .await;
    let last = lease_next(&fixture.queue).await;

    fixture.job().execute(&last, &test_context()).await.unwrap();

    assert_eq!(fixture.profiles.refresh_count(), 1);
}

#[tokio::test]
async fn test_refresh_considers_sibling_updates() {
    let fixture = Fixture::new(RecordingEngine::new().returning(updated(&[("Patient", 1)])));
    fixture.group(&[fixture.range(1, 10), fixture.range(11, 20)]).await;
    let mut soft = updated(&[("StructureDefinition", 2)]);
    soft.record_patch_failed("StructureDefinition", 1);
    finish_next(&fixture.queue, JobStatus::Failed, Some(&soft)).await;
    let last = lease_next(&fixture.queue).await;

    fixture.job().execute(&last, &test_context()).await.unwrap();

    assert_eq!(fixture.profiles.refresh_count(), 1);
}

#[tokio::test]
async fn test_no_refresh_when_not_last() {
    let fixture = Fixture::new(RecordingEngine::new().returning(updated(&[("ValueSet", 1)])));
    fixture.group(&[fixture.range(1, 10), fixture.range(11, 20)]).await;
    let first = lease_next(&fixture.queue).await;

    fixture.job().execute(&first, &test_context()).await.unwrap();

    assert_eq!(fixture.profiles.type_queries(), 0);
    assert_eq!(fixture.profiles.refresh_count(), 0);
}

#[tokio::test]
async fn test_no_refresh_without_profile_types() {
    let fixture = Fixture::new(RecordingEngine::new().returning(updated(&[("Patient", 7)])));
    fixture.group(&[fixture.range(1, 10)]).await;
    let job = lease_next(&fixture.queue).await;

    fixture.job().execute(&job, &test_context()).await.unwrap();

    assert_eq!(fixture.profiles.type_queries(), 1);
    assert_eq!(fixture.profiles.refresh_count(), 0);
}

#[tokio::test]
async fn test_soft_failure_as_last_job_still_refreshes() {
    let mut result = updated(&[("ValueSet", 2)]);
    result.record_patch_failed("ValueSet", 1);
    let fixture = Fixture::new(RecordingEngine::new().returning(result));
    fixture.group(&[fixture.range(1, 10)]).await;
    let job = lease_next(&fixture.queue).await;

    let outcome = fixture.job().execute(&job, &test_context()).await.unwrap();

    assert!(outcome.is_soft_failure());
    assert_eq!(fixture.profiles.refresh_count(), 1);
}

#[tokio::test]
async fn test_profile_store_failure_propagates() {
    let mut fixture = Fixture::new(RecordingEngine::new().returning(updated(&[("ValueSet", 1)])));
    fixture.profiles = RecordingProfiles::new().failing(ProfileStoreError::new("cache locked"));
    fixture.group(&[fixture.range(1, 10)]).await;
    let job = lease_next(&fixture.queue).await;

    let error = fixture.job().execute(&job, &test_context()).await.unwrap_err();

    assert!(matches!(error, OrchestrationError::ProfileStore(_)));
}

#[tokio::test]
async fn test_publish_failure_propagates() {
    let mut fixture = Fixture::new(RecordingEngine::new().returning(updated(&[("Patient", 1)])));
    fixture.metrics = RecordingMetrics::new().failing(PublishError::new("bus full"));
    fixture.group(&[fixture.range(1, 10)]).await;
    let job = lease_next(&fixture.queue).await;

    let error = fixture.job().execute(&job, &test_context()).await.unwrap_err();

    assert!(matches!(error, OrchestrationError::Publish(_)));
    assert_eq!(fixture.profiles.refresh_count(), 0);
}

#[tokio::test]
async fn test_orchestrator_definition_is_rejected() {
    let fixture = Fixture::new(RecordingEngine::new());
    let job = enqueue_orchestrator(&fixture.queue, &fixture.orchestrator).await;

    let error = fixture.job().execute(&job, &test_context()).await.unwrap_err();

    assert!(matches!(error, OrchestrationError::InvalidJob { .. }));
    assert!(fixture.engine.requests().is_empty());
}
