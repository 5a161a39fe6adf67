//! In-memory job queue.
//!
//! A thread-safe implementation of [`QueueClient`] for tests, demos and
//! single-process deployments. Jobs live in an ordered map guarded by a tokio
//! `RwLock`; ids are assigned sequentially and a new group takes the id of
//! its first job.
//!
//! Definitions are fingerprinted (SHA-256, base64) on enqueue. Enqueueing a
//! definition that already exists in the target group returns the existing
//! job instead of creating a duplicate, so an orchestrator that is re-run
//! after a crash does not fan out twice.

use crate::queue::{JobInfo, JobStatus, QueueClient, QueueError, QueueType};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use log::{debug, info};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct QueueState {
    jobs: BTreeMap<i64, JobInfo>,
    // (queue, group, definition hash) -> job id
    fingerprints: HashMap<(QueueType, i64, String), i64>,
    next_id: i64,
}

impl QueueState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn has_active_group(&self, queue_type: QueueType) -> Option<i64> {
        self.jobs
            .values()
            .find(|job| job.queue_type == queue_type && job.is_active())
            .map(|job| job.group_id)
    }
}

/// Thread-safe in-memory job queue.
#[derive(Clone, Default)]
pub struct InMemoryQueueClient {
    state: Arc<RwLock<QueueState>>,
}

impl InMemoryQueueClient {
    /// Create a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a single job, including its result.
    pub async fn get_job(&self, job_id: i64) -> Option<JobInfo> {
        self.state.read().await.jobs.get(&job_id).cloned()
    }

    /// All jobs of a queue, ordered by id.
    pub async fn jobs(&self, queue_type: QueueType) -> Vec<JobInfo> {
        self.state
            .read()
            .await
            .jobs
            .values()
            .filter(|job| job.queue_type == queue_type)
            .cloned()
            .collect()
    }

    /// Counts per status for debugging and monitoring.
    pub async fn stats(&self) -> InMemoryQueueStats {
        let state = self.state.read().await;
        let mut stats = InMemoryQueueStats::default();
        for job in state.jobs.values() {
            stats.total_jobs += 1;
            match job.status {
                JobStatus::Created => stats.created += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Remove every job (useful for testing).
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.jobs.clear();
        state.fingerprints.clear();
    }

    fn fingerprint(definition: &str) -> String {
        STANDARD.encode(Sha256::digest(definition.as_bytes()))
    }
}

impl QueueClient for InMemoryQueueClient {
    async fn enqueue(
        &self,
        queue_type: QueueType,
        definitions: Vec<String>,
        group_id: Option<i64>,
        force_one_active_job_group: bool,
    ) -> Result<Vec<JobInfo>, QueueError> {
        let mut state = self.state.write().await;

        if force_one_active_job_group {
            if let Some(active_group) = state.has_active_group(queue_type) {
                return Err(QueueError::job_conflict(format!(
                    "job group {} is still active in queue {}",
                    active_group, queue_type
                )));
            }
        }

        let mut group_id = group_id;
        let mut enqueued = Vec::with_capacity(definitions.len());

        for definition in definitions {
            let hash = Self::fingerprint(&definition);

            if let Some(group) = group_id {
                if let Some(existing_id) = state.fingerprints.get(&(queue_type, group, hash.clone())) {
                    if let Some(existing) = state.jobs.get(existing_id) {
                        debug!("Job {} already enqueued in group {}, skipping duplicate", existing_id, group);
                        enqueued.push(existing.clone());
                        continue;
                    }
                }
            }

            let id = state.allocate_id();
            let group = *group_id.get_or_insert(id);
            let job = JobInfo::new(id, group, queue_type, definition);
            state.fingerprints.insert((queue_type, group, hash), id);
            state.jobs.insert(id, job.clone());
            enqueued.push(job);
        }

        if let Some(group) = group_id {
            info!(
                "Enqueued {} job(s) into group {} of queue {}",
                enqueued.len(),
                group,
                queue_type
            );
        }
        Ok(enqueued)
    }

    async fn get_jobs_by_group_id(
        &self,
        queue_type: QueueType,
        group_id: i64,
        include_results: bool,
    ) -> Result<Vec<JobInfo>, QueueError> {
        let state = self.state.read().await;
        let jobs = state
            .jobs
            .values()
            .filter(|job| job.queue_type == queue_type && job.group_id == group_id)
            .map(|job| {
                let mut job = job.clone();
                if !include_results {
                    job.result = None;
                }
                job
            })
            .collect();
        Ok(jobs)
    }

    async fn cancel_jobs_by_group_id(
        &self,
        queue_type: QueueType,
        group_id: i64,
    ) -> Result<(), QueueError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut cancelled = 0;

        for job in state
            .jobs
            .values_mut()
            .filter(|job| job.queue_type == queue_type && job.group_id == group_id)
        {
            if job.status.is_terminal() {
                continue;
            }
            job.cancel_requested = true;
            if job.status == JobStatus::Created {
                job.status = JobStatus::Cancelled;
                job.end_date = Some(now);
                cancelled += 1;
            }
        }

        info!(
            "Cancel requested for group {} of queue {} ({} waiting job(s) cancelled)",
            group_id, queue_type, cancelled
        );
        Ok(())
    }

    async fn dequeue(
        &self,
        queue_type: QueueType,
        worker: &str,
    ) -> Result<Option<JobInfo>, QueueError> {
        let mut state = self.state.write().await;
        let next = state
            .jobs
            .values_mut()
            .find(|job| job.queue_type == queue_type && job.status == JobStatus::Created);

        Ok(next.map(|job| {
            job.status = JobStatus::Running;
            job.start_date = Some(Utc::now());
            debug!("Worker '{}' leased job {} of group {}", worker, job.id, job.group_id);
            job.clone()
        }))
    }

    async fn complete_job(
        &self,
        job_id: i64,
        status: JobStatus,
        result: Option<String>,
    ) -> Result<(), QueueError> {
        let mut state = self.state.write().await;
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| QueueError::job_not_found(job_id))?;

        job.status = status;
        job.result = result;
        job.end_date = Some(Utc::now());
        Ok(())
    }
}

/// Job counts of an [`InMemoryQueueClient`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryQueueStats {
    pub total_jobs: usize,
    pub created: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}
