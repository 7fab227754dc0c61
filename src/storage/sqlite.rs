//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the WorkQueue and
//! JobStore traits, backed by a single database file. The two contracts share
//! a connection so the completion check can see the queue directly.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{JobStore, StorageError, StorageResult, WorkQueue};
use crate::storage::{CrawlJob, CrawlProgress, JobStatus, WorkItem};
use crate::ScoutError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

/// SQLite storage backend for the work queue and job store
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(ScoutError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, ScoutError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    ///
    /// Useful for tests and for callers that want the queue/job-store
    /// contracts without durability.
    pub fn new_in_memory() -> Result<Self, ScoutError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn read_job_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(CrawlJob, String)> {
        let job = CrawlJob {
            id: row.get(0)?,
            website_id: row.get(1)?,
            status: JobStatus::from_db_string(&row.get::<_, String>(2)?)
                .unwrap_or(JobStatus::Running),
            started_at: row.get(3)?,
            progress: CrawlProgress {
                urls_queued: row.get(4)?,
                urls_processed: row.get(5)?,
                urls_completed: row.get(6)?,
                urls_failed: row.get(7)?,
                crawled_urls: Vec::new(),
            },
        };
        let crawled_json: String = row.get(8)?;
        Ok((job, crawled_json))
    }
}

impl WorkQueue for SqliteStorage {
    fn enqueue(
        &mut self,
        job_id: i64,
        url: &str,
        depth: u32,
        priority: u32,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO work_items (job_id, url, depth, priority, queued_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![job_id, url, depth, priority, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn claim(
        &mut self,
        visibility_timeout: Duration,
        max_items: usize,
    ) -> StorageResult<Vec<WorkItem>> {
        let now_ms = Utc::now().timestamp_millis();
        let locked_until = now_ms + visibility_timeout.as_millis() as i64;

        // Select and lease inside one transaction so concurrent claimants
        // cannot hand out the same item twice.
        let tx = self.conn.transaction()?;

        let mut items = Vec::new();
        {
            let mut stmt = tx.prepare(
                "SELECT msg_id, job_id, url, depth, priority, queued_at
                 FROM work_items
                 WHERE locked_until IS NULL OR locked_until <= ?1
                 ORDER BY priority DESC, msg_id ASC
                 LIMIT ?2",
            )?;

            let rows = stmt.query_map(params![now_ms, max_items as i64], |row| {
                Ok(WorkItem {
                    msg_id: row.get(0)?,
                    job_id: row.get(1)?,
                    url: row.get(2)?,
                    depth: row.get(3)?,
                    priority: row.get(4)?,
                    queued_at: row.get(5)?,
                })
            })?;

            for row in rows {
                items.push(row?);
            }
        }

        for item in &items {
            tx.execute(
                "UPDATE work_items SET locked_until = ?1 WHERE msg_id = ?2",
                params![locked_until, item.msg_id],
            )?;
        }

        tx.commit()?;
        Ok(items)
    }

    fn delete(&mut self, msg_id: i64) -> StorageResult<()> {
        // Zero rows affected is fine: the item may already be gone after a
        // redelivered duplicate was acknowledged first.
        self.conn.execute(
            "DELETE FROM work_items WHERE msg_id = ?1",
            params![msg_id],
        )?;
        Ok(())
    }

    fn pending_items(&self, job_id: i64) -> StorageResult<u64> {
        let count: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM work_items WHERE job_id = ?1",
            params![job_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl JobStore for SqliteStorage {
    fn create_job(&mut self, website_id: &str) -> StorageResult<CrawlJob> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_jobs (website_id, status, started_at, urls_queued)
             VALUES (?1, ?2, ?3, 1)",
            params![website_id, JobStatus::Running.to_db_string(), now],
        )?;
        let job_id = self.conn.last_insert_rowid();
        self.get_job(job_id)
    }

    fn get_job(&self, job_id: i64) -> StorageResult<CrawlJob> {
        let row = self
            .conn
            .query_row(
                "SELECT id, website_id, status, started_at, urls_queued, urls_processed,
                 urls_completed, urls_failed, crawled_urls
                 FROM crawl_jobs WHERE id = ?1",
                params![job_id],
                Self::read_job_row,
            )
            .optional()?;

        let (mut job, crawled_json) = row.ok_or(StorageError::JobNotFound(job_id))?;
        job.progress.crawled_urls = serde_json::from_str(&crawled_json)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(job)
    }

    fn record_success(
        &mut self,
        job_id: i64,
        url: &str,
        path: &str,
        depth: u32,
        links_found: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();

        let updated = self.conn.execute(
            "UPDATE crawl_jobs SET
                 urls_processed = urls_processed + 1,
                 urls_completed = urls_completed + 1,
                 urls_queued = urls_queued + ?1,
                 crawled_urls = json_insert(crawled_urls, '$[#]', ?2)
             WHERE id = ?3",
            params![links_found, url, job_id],
        )?;

        if updated == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }

        self.conn.execute(
            "INSERT INTO crawled_pages (job_id, url, path, depth, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![job_id, url, path, depth, now],
        )?;

        Ok(())
    }

    fn record_failure(
        &mut self,
        job_id: i64,
        url: &str,
        error_message: &str,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();

        let updated = self.conn.execute(
            "UPDATE crawl_jobs SET
                 urls_processed = urls_processed + 1,
                 urls_failed = urls_failed + 1
             WHERE id = ?1",
            params![job_id],
        )?;

        if updated == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }

        self.conn.execute(
            "INSERT INTO crawl_failures (job_id, url, error_message, failed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![job_id, url, error_message, now],
        )?;

        Ok(())
    }

    fn is_complete(&mut self, job_id: i64) -> StorageResult<bool> {
        let counts: Option<(u64, u64)> = self
            .conn
            .query_row(
                "SELECT urls_queued, urls_processed FROM crawl_jobs WHERE id = ?1",
                params![job_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (queued, processed) = counts.ok_or(StorageError::JobNotFound(job_id))?;
        let outstanding = self.pending_items(job_id)?;

        if queued != processed || outstanding != 0 {
            return Ok(false);
        }

        self.conn.execute(
            "UPDATE crawl_jobs SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![
                JobStatus::Completed.to_db_string(),
                job_id,
                JobStatus::Running.to_db_string()
            ],
        )?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> SqliteStorage {
        SqliteStorage::new_in_memory().unwrap()
    }

    #[test]
    fn test_create_job_initial_state() {
        let mut storage = storage();
        let job = storage.create_job("site-42").unwrap();

        assert_eq!(job.website_id, "site-42");
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.progress.urls_queued, 1);
        assert_eq!(job.progress.urls_processed, 0);
        assert!(job.progress.crawled_urls.is_empty());
        assert!(!job.started_at.is_empty());
    }

    #[test]
    fn test_get_job_not_found() {
        let storage = storage();
        let result = storage.get_job(999);
        assert!(matches!(result, Err(StorageError::JobNotFound(999))));
    }

    #[test]
    fn test_claim_orders_by_priority_then_age() {
        let mut storage = storage();
        let job = storage.create_job("site").unwrap();

        storage.enqueue(job.id, "https://a.test/deep", 2, 8).unwrap();
        storage.enqueue(job.id, "https://a.test/", 0, 100).unwrap();
        storage.enqueue(job.id, "https://a.test/mid", 1, 9).unwrap();

        let first = storage.claim(Duration::from_secs(30), 1).unwrap();
        assert_eq!(first[0].url, "https://a.test/");

        let second = storage.claim(Duration::from_secs(30), 1).unwrap();
        assert_eq!(second[0].url, "https://a.test/mid");

        let third = storage.claim(Duration::from_secs(30), 1).unwrap();
        assert_eq!(third[0].url, "https://a.test/deep");
    }

    #[test]
    fn test_claimed_item_is_invisible() {
        let mut storage = storage();
        let job = storage.create_job("site").unwrap();
        storage.enqueue(job.id, "https://a.test/", 0, 100).unwrap();

        let claimed = storage.claim(Duration::from_secs(30), 1).unwrap();
        assert_eq!(claimed.len(), 1);

        let again = storage.claim(Duration::from_secs(30), 1).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_expired_lease_is_reclaimable() {
        let mut storage = storage();
        let job = storage.create_job("site").unwrap();
        storage.enqueue(job.id, "https://a.test/", 0, 100).unwrap();

        // Zero-length lease expires immediately
        let claimed = storage.claim(Duration::ZERO, 1).unwrap();
        assert_eq!(claimed.len(), 1);

        let redelivered = storage.claim(Duration::from_secs(30), 1).unwrap();
        assert_eq!(redelivered.len(), 1);
        assert_eq!(redelivered[0].msg_id, claimed[0].msg_id);
    }

    #[test]
    fn test_claim_empty_queue() {
        let mut storage = storage();
        let items = storage.claim(Duration::from_secs(30), 1).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut storage = storage();
        let job = storage.create_job("site").unwrap();
        let msg_id = storage.enqueue(job.id, "https://a.test/", 0, 100).unwrap();

        storage.delete(msg_id).unwrap();
        storage.delete(msg_id).unwrap();

        assert_eq!(storage.pending_items(job.id).unwrap(), 0);
    }

    #[test]
    fn test_pending_items_counts_leased() {
        let mut storage = storage();
        let job = storage.create_job("site").unwrap();
        storage.enqueue(job.id, "https://a.test/", 0, 100).unwrap();

        storage.claim(Duration::from_secs(30), 1).unwrap();

        // Leased but not deleted: still outstanding
        assert_eq!(storage.pending_items(job.id).unwrap(), 1);
    }

    #[test]
    fn test_record_success_increments() {
        let mut storage = storage();
        let job = storage.create_job("site").unwrap();

        storage
            .record_success(job.id, "https://a.test/", "/", 0, 3)
            .unwrap();

        let job = storage.get_job(job.id).unwrap();
        assert_eq!(job.progress.urls_processed, 1);
        assert_eq!(job.progress.urls_completed, 1);
        assert_eq!(job.progress.urls_queued, 4); // seed + 3 found links
        assert_eq!(job.progress.urls_failed, 0);
        assert_eq!(job.progress.crawled_urls, vec!["https://a.test/"]);
    }

    #[test]
    fn test_record_failure_increments() {
        let mut storage = storage();
        let job = storage.create_job("site").unwrap();

        storage
            .record_failure(job.id, "https://a.test/broken", "HTTP 500")
            .unwrap();

        let job = storage.get_job(job.id).unwrap();
        assert_eq!(job.progress.urls_processed, 1);
        assert_eq!(job.progress.urls_failed, 1);
        assert_eq!(job.progress.urls_completed, 0);
        assert!(job.progress.crawled_urls.is_empty());
    }

    #[test]
    fn test_duplicate_crawled_urls_allowed() {
        let mut storage = storage();
        let job = storage.create_job("site").unwrap();

        storage
            .record_success(job.id, "https://a.test/", "/", 0, 0)
            .unwrap();
        storage
            .record_success(job.id, "https://a.test/", "/", 0, 0)
            .unwrap();

        let job = storage.get_job(job.id).unwrap();
        assert_eq!(job.progress.crawled_urls.len(), 2);
    }

    #[test]
    fn test_is_complete_transitions_job() {
        let mut storage = storage();
        let job = storage.create_job("site").unwrap();
        let msg_id = storage.enqueue(job.id, "https://a.test/", 0, 100).unwrap();

        assert!(!storage.is_complete(job.id).unwrap());

        storage.claim(Duration::from_secs(30), 1).unwrap();
        storage
            .record_success(job.id, "https://a.test/", "/", 0, 0)
            .unwrap();
        storage.delete(msg_id).unwrap();

        assert!(storage.is_complete(job.id).unwrap());
        assert_eq!(storage.get_job(job.id).unwrap().status, JobStatus::Completed);

        // Idempotent afterwards
        assert!(storage.is_complete(job.id).unwrap());
    }

    #[test]
    fn test_is_complete_false_with_outstanding_items() {
        let mut storage = storage();
        let job = storage.create_job("site").unwrap();
        storage.enqueue(job.id, "https://a.test/", 0, 100).unwrap();
        storage
            .record_success(job.id, "https://a.test/", "/", 0, 0)
            .unwrap();

        // Counters balance (1 queued, 1 processed) but the item was never
        // deleted from the queue
        assert!(!storage.is_complete(job.id).unwrap());
    }
}
