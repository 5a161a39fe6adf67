//! Contracts of the external collaborators bulk update jobs consume.
//!
//! The search engine, the resource update engine, the profile store, the
//! metrics bus and authorization all live outside this crate. Jobs and
//! handlers reach them only through the traits defined here, which keeps the
//! orchestration logic testable against recording stubs.
//!
//! All traits follow the same async-first shape: methods return
//! `impl Future<Output = Result<_, _>> + Send` so implementations may use
//! plain `async fn`.

pub mod errors;

pub use errors::{ProfileStoreError, PublishError, SearchError, UpdateEngineError};

use crate::context::{OperationIssue, RequestContext};
use crate::definition::SearchParam;
use crate::result::BulkUpdateResult;
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;

/// One page returned by the search service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    /// Number of matched resources on the page
    pub match_count: usize,
    /// Cursor for the next page of matched resources
    pub continuation_token: Option<String>,
    /// Cursor for the next page of included resources of the current matched page
    pub includes_continuation_token: Option<String>,
    /// Issues the search raised while producing the page
    pub issues: Vec<OperationIssue>,
}

impl SearchPage {
    /// Whether the page neither matched anything nor points anywhere further.
    pub fn is_exhausted(&self) -> bool {
        self.match_count == 0
            && self.continuation_token.is_none()
            && self.includes_continuation_token.is_none()
    }
}

/// Inclusive surrogate id range of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurrogateIdRange {
    pub start_id: i64,
    pub end_id: i64,
}

impl SurrogateIdRange {
    pub fn new(start_id: i64, end_id: i64) -> Self {
        Self { start_id, end_id }
    }
}

/// Search engine contract.
pub trait SearchService: Send + Sync {
    /// Run one page of a search.
    ///
    /// With `includes_only` set, the page returns the next included resources
    /// of the matched page addressed by the `ict` parameter.
    fn search(
        &self,
        resource_type: Option<&str>,
        parameters: &[SearchParam],
        includes_only: bool,
        context: &RequestContext,
    ) -> impl Future<Output = Result<SearchPage, SearchError>> + Send;

    /// Resource types that currently have stored resources.
    fn get_used_resource_types(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, SearchError>> + Send;

    /// Split `[start_id, end_id]` of a resource type into ranges of about
    /// `range_size` resources, at most `max_ranges` of them, ascending when
    /// `up` is set.
    fn get_surrogate_id_ranges(
        &self,
        resource_type: &str,
        start_id: i64,
        end_id: i64,
        range_size: u32,
        max_ranges: u32,
        up: bool,
    ) -> impl Future<Output = Result<Vec<SurrogateIdRange>, SearchError>> + Send;
}

/// A request to update one bounded page of resources.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateMultipleRequest {
    pub resource_type: Option<String>,
    /// Opaque patch payload from the job definition
    pub operation: Option<Value>,
    pub is_parallel: bool,
    /// Number of continuation cursors already consumed before this page
    pub read_up_to: u32,
    /// Work only the addressed page instead of paging onwards
    pub single_page: bool,
    /// Query parameters in their deterministic order
    pub query_parameters: Vec<SearchParam>,
    pub context: RequestContext,
}

/// Resource update engine contract.
pub trait UpdateEngine: Send + Sync {
    /// Apply the operation to the matched page and count the outcome per type.
    fn update_multiple(
        &self,
        request: UpdateMultipleRequest,
    ) -> impl Future<Output = Result<BulkUpdateResult, UpdateEngineError>> + Send;
}

/// Conformance profile cache contract.
pub trait ProfileStore: Send + Sync {
    /// Resource types whose changes invalidate the profile cache.
    fn get_profile_types(
        &self,
    ) -> impl Future<Output = Result<HashSet<String>, ProfileStoreError>> + Send;

    /// Invalidate the cache. Must be idempotent.
    fn refresh(&self) -> impl Future<Output = Result<(), ProfileStoreError>> + Send;
}

/// Notification published after a processing job updated resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkUpdateMetricsNotification {
    pub job_id: i64,
    pub resources_updated: u64,
}

/// Metrics and notification bus contract.
pub trait MetricsSink: Send + Sync {
    fn publish(
        &self,
        notification: BulkUpdateMetricsNotification,
    ) -> impl Future<Output = Result<(), PublishError>> + Send;
}

/// Access check performed before a bulk update is admitted or cancelled.
pub trait Authorizer: Send + Sync {
    fn can_bulk_update(&self, context: &RequestContext) -> bool;
}

/// Authorizer that admits every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn can_bulk_update(&self, _context: &RequestContext) -> bool {
        true
    }
}
