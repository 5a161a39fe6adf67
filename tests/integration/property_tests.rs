//! Property-based tests for bulk update invariants.
//!
//! Uses proptest to check count resolution, definition persistence,
//! aggregation sums and queue grouping over generated inputs.

use crate::common::*;
use fhir_bulk_update::aggregation::{RESOURCE_IGNORED, RESOURCE_UPDATED, aggregate};
use fhir_bulk_update::jobs::{read_up_to, resolve_count};
use fhir_bulk_update::queue::{InMemoryQueueClient, JobInfo, JobStatus, QueueClient, QueueType};
use fhir_bulk_update::{AggregateStatus, BulkUpdateConfig, BulkUpdateDefinition, BulkUpdateResult};
use proptest::prelude::*;
use std::collections::BTreeMap;

const TYPES: [&str; 4] = ["Patient", "Observation", "ValueSet", "Encounter"];

fn status_strategy() -> impl Strategy<Value = JobStatus> {
    prop_oneof![
        Just(JobStatus::Created),
        Just(JobStatus::Running),
        Just(JobStatus::Completed),
        Just(JobStatus::Failed),
        Just(JobStatus::Cancelled),
    ]
}

fn result_strategy() -> impl Strategy<Value = BulkUpdateResult> {
    (
        prop::collection::vec((0..TYPES.len(), 0u64..1000), 0..4),
        prop::collection::vec((0..TYPES.len(), 0u64..1000), 0..4),
    )
        .prop_map(|(updated, ignored)| {
            let mut result = BulkUpdateResult::new();
            for (index, count) in updated {
                result.record_updated(TYPES[index], count);
            }
            for (index, count) in ignored {
                result.record_ignored(TYPES[index], count);
            }
            result
        })
}

fn optional_id() -> impl Strategy<Value = Option<i64>> {
    prop::option::of(0i64..i64::MAX)
}

proptest! {
    #[test]
    fn test_count_never_exceeds_batch_without_global_end(
        maximum in 0u32..50_000,
        batch in 1u32..5_000,
    ) {
        let config = BulkUpdateConfig::default().with_processing_batch_size(batch);
        let definition = orchestrator_definition(Some("Patient"), &[], false, maximum)
            .paging_processing();

        let count = resolve_count(&definition, &config);
        let expected = if maximum == 0 { config.default_max_resources_per_query } else { maximum };
        prop_assert_eq!(count, expected.min(batch));
    }

    #[test]
    fn test_count_is_verbatim_with_global_end(maximum in 1u32..50_000, batch in 1u32..5_000) {
        let config = BulkUpdateConfig::default().with_processing_batch_size(batch);
        let definition = orchestrator_definition(None, &[], true, maximum)
            .range_processing("Patient", 1, 2, 0, 3);

        prop_assert_eq!(resolve_count(&definition, &config), maximum);
    }

    #[test]
    fn test_definition_survives_persistence(
        start in optional_id(),
        end in optional_id(),
        ct in prop::option::of("[a-zA-Z0-9]{1,12}"),
        ict in prop::option::of("[a-zA-Z0-9]{1,12}"),
        is_parallel in any::<bool>(),
        maximum in any::<u32>(),
    ) {
        let mut definition = orchestrator_definition(Some("Patient"), &[("name", "smith")], is_parallel, maximum)
            .page_processing(ct.as_deref(), ict.as_deref());
        definition.start_surrogate_id = start.map(|id| id.to_string());
        definition.end_surrogate_id = end.map(|id| id.to_string());

        let restored = BulkUpdateDefinition::from_json(&definition.to_json().unwrap()).unwrap();
        prop_assert_eq!(read_up_to(&restored), u32::from(ct.is_some()) + u32::from(ict.is_some()));
        prop_assert_eq!(restored, definition);
    }

    #[test]
    fn test_aggregation_sums_every_job(
        jobs in prop::collection::vec((status_strategy(), result_strategy()), 1..12)
    ) {
        let records: Vec<JobInfo> = jobs
            .iter()
            .enumerate()
            .map(|(i, (status, result))| {
                JobInfo::new(i as i64 + 1, 1, QueueType::BulkUpdate, "{}")
                    .with_status(*status)
                    .with_result(result.to_json().unwrap())
            })
            .collect();

        let mut expected_updated = BTreeMap::new();
        let mut expected_ignored = BTreeMap::new();
        for (_, result) in &jobs {
            for (resource_type, count) in &result.resources_updated {
                *expected_updated.entry(resource_type.clone()).or_insert(0u64) += count;
            }
            for (resource_type, count) in &result.resources_ignored {
                *expected_ignored.entry(resource_type.clone()).or_insert(0u64) += count;
            }
        }

        let report = aggregate(&records);
        prop_assert_eq!(report.category(RESOURCE_UPDATED).cloned().unwrap_or_default(), expected_updated);
        prop_assert_eq!(report.category(RESOURCE_IGNORED).cloned().unwrap_or_default(), expected_ignored);

        let any_failed = jobs.iter().any(|(status, _)| *status == JobStatus::Failed);
        let any_waiting = jobs
            .iter()
            .any(|(status, _)| matches!(status, JobStatus::Created | JobStatus::Running));
        let expected_status = if any_failed {
            AggregateStatus::InternalServerError
        } else if any_waiting {
            AggregateStatus::Accepted
        } else {
            AggregateStatus::Ok
        };
        prop_assert_eq!(report.status, expected_status);
    }

    #[test]
    fn test_group_holds_every_enqueued_definition(children in 0usize..20) {
        tokio_test::block_on(async {
            let queue = InMemoryQueueClient::new();
            let orchestrator = enqueue_orchestrator(
                &queue,
                &orchestrator_definition(None, &[], true, 0),
            )
            .await;
            let definitions: Vec<String> = (0..children).map(|i| format!("{{\"child\":{}}}", i)).collect();
            queue
                .enqueue(QueueType::BulkUpdate, definitions, Some(orchestrator.group_id), false)
                .await
                .unwrap();

            let group = queue
                .get_jobs_by_group_id(QueueType::BulkUpdate, orchestrator.group_id, false)
                .await
                .unwrap();
            assert_eq!(group.len(), children + 1);
            assert!(group.iter().all(|job| job.group_id == orchestrator.group_id));
        });
    }
}
