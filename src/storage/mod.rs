//! Storage module for crawl jobs and queued work
//!
//! This module handles all database operations for the crawler, including:
//! - Crawl job records and their aggregate progress counters
//! - The durable work queue with visibility-timeout claiming
//! - Per-page success and failure audit records

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{JobStore, StorageError, StorageResult, WorkQueue};

use serde::Serialize;

/// A queue message: one URL waiting to be crawled for a job
///
/// Identity is the queue-assigned `msg_id`, not the payload; the same URL may
/// legitimately be enqueued more than once for a job.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub msg_id: i64,
    pub job_id: i64,
    /// Raw URL as discovered; canonicalized at processing time
    pub url: String,
    /// Link hops from the seed (0 = seed)
    pub depth: u32,
    /// Higher values are claimed first
    pub priority: u32,
    pub queued_at: String,
}

/// Aggregate progress counters for a crawl job
///
/// All counters are monotonically non-decreasing; `crawled_urls` is the
/// append-only audit trail of canonical URLs that were successfully fetched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlProgress {
    pub urls_queued: u64,
    pub urls_processed: u64,
    pub urls_completed: u64,
    pub urls_failed: u64,
    pub crawled_urls: Vec<String>,
}

/// One crawl job: a single website enumeration request
#[derive(Debug, Clone, Serialize)]
pub struct CrawlJob {
    pub id: i64,
    pub website_id: String,
    pub status: JobStatus,
    pub started_at: String,
    pub progress: CrawlProgress,
}

/// Status of a crawl job
///
/// `Failed` is representable for the calling system but the core never sets
/// it; completion is the only terminal transition performed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_roundtrip() {
        for status in &[JobStatus::Running, JobStatus::Completed, JobStatus::Failed] {
            let db_str = status.to_db_string();
            let parsed = JobStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_job_status_invalid() {
        assert_eq!(JobStatus::from_db_string("paused"), None);
    }
}
