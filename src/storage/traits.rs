//! Storage traits and error types
//!
//! This module defines the work queue and job store contracts consumed by the
//! orchestrator, plus their shared error type. Any durable backend that honors
//! these contracts can replace the bundled SQLite implementation.

use crate::storage::{CrawlJob, WorkItem};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable, priority-ordered work queue with visibility-timeout claiming
///
/// Delivery is at-least-once: a claimed item that is never deleted becomes
/// visible again once its lease expires, and may be claimed by another
/// invocation. Items are only ever removed by an explicit `delete`.
pub trait WorkQueue {
    /// Enqueues a URL for a job
    ///
    /// # Arguments
    ///
    /// * `job_id` - The owning crawl job
    /// * `url` - Raw URL to crawl (canonicalized at processing time)
    /// * `depth` - Link hops from the seed
    /// * `priority` - Higher values are claimed first
    ///
    /// # Returns
    ///
    /// The queue-assigned message id
    fn enqueue(&mut self, job_id: i64, url: &str, depth: u32, priority: u32)
        -> StorageResult<i64>;

    /// Claims up to `max_items` visible items, leasing each for
    /// `visibility_timeout`
    ///
    /// Claimed items are hidden from other claimants until the lease expires
    /// or the item is deleted. Items are returned highest priority first,
    /// oldest first within a priority. An empty result is a normal outcome.
    fn claim(
        &mut self,
        visibility_timeout: Duration,
        max_items: usize,
    ) -> StorageResult<Vec<WorkItem>>;

    /// Deletes (acknowledges) a claimed item
    ///
    /// Deleting a message that no longer exists is a no-op: under
    /// at-least-once delivery another invocation may already have deleted it.
    fn delete(&mut self, msg_id: i64) -> StorageResult<()>;

    /// Counts items still in the queue for a job, leased items included
    fn pending_items(&self, job_id: i64) -> StorageResult<u64>;
}

/// Persistent record of crawl jobs and their progress
///
/// All counter updates are additive so that concurrent invocations compose
/// correctly; nothing here overwrites a counter.
pub trait JobStore {
    /// Creates a new crawl job with `urls_queued = 1` (the seed)
    fn create_job(&mut self, website_id: &str) -> StorageResult<CrawlJob>;

    /// Gets a job with its progress counters and crawled-URL audit trail
    fn get_job(&self, job_id: i64) -> StorageResult<CrawlJob>;

    /// Records a successfully crawled page
    ///
    /// Appends `url` to the job's crawled list and bumps `urls_processed`,
    /// `urls_completed`, and `urls_queued` (by `links_found`, the number of
    /// newly enqueued links).
    fn record_success(
        &mut self,
        job_id: i64,
        url: &str,
        path: &str,
        depth: u32,
        links_found: u64,
    ) -> StorageResult<()>;

    /// Records a page that could not be crawled
    ///
    /// Bumps `urls_processed` and `urls_failed`. The URL is not retried.
    fn record_failure(&mut self, job_id: i64, url: &str, error_message: &str)
        -> StorageResult<()>;

    /// Checks whether a job has no work left
    ///
    /// A job is complete when every queued URL has been processed and the
    /// queue holds no items for it, visible or leased. On the first true
    /// result the job transitions from `Running` to `Completed`; the check
    /// is idempotent afterwards.
    fn is_complete(&mut self, job_id: i64) -> StorageResult<bool>;
}
