//! Crawl orchestrator - the per-invocation state machine
//!
//! Each invocation claims at most one work item from the queue and runs it
//! end-to-end: fetch, extract links, enqueue discoveries, record progress,
//! acknowledge the item, and check the owning job for completion. Throughput
//! comes from running many invocations concurrently against the same
//! storage; a single invocation never processes more than one item.
//!
//! Every external call after the claim is individually guarded. A failure in
//! one step is logged and the remaining steps still run; in particular the
//! claimed item is always acknowledged, so redelivery only ever happens
//! through visibility-timeout expiry (crash recovery), never through
//! deliberate abstention.

use crate::config::Config;
use crate::crawler::extractor::{extract_links, FoundLink};
use crate::crawler::fetcher::{build_http_client, fetch_html};
use crate::storage::{CrawlJob, JobStore, WorkItem, WorkQueue};
use crate::url::{canonicalize, CanonicalUrl};
use crate::ScoutError;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Priority assigned to seed URLs; higher than any extracted link can get,
/// so the seed always wins ties
pub const SEED_PRIORITY: u32 = 100;

/// What happened to the one item an invocation claimed
#[derive(Debug, Clone, Serialize)]
pub struct ItemSummary {
    pub processed_url: String,
    pub crawl_job_id: i64,
    pub links_found: u64,
    pub processing_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one claim-and-process cycle
#[derive(Debug)]
pub enum TickOutcome {
    /// The queue had nothing available; callers poll again later
    Idle,

    /// One item was claimed and run to the end of the pipeline
    Processed(ItemSummary),
}

/// Crawl orchestrator over a work queue and job store
pub struct Orchestrator<S: WorkQueue + JobStore> {
    config: Config,
    storage: S,
    client: Client,
}

impl<S: WorkQueue + JobStore> Orchestrator<S> {
    /// Creates a new orchestrator
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `storage` - The backing work queue and job store
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Successfully created orchestrator
    /// * `Err(ScoutError)` - Failed to build the HTTP client
    pub fn new(config: Config, storage: S) -> Result<Self, ScoutError> {
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawler.fetch_timeout_secs),
        )?;

        Ok(Self {
            config,
            storage,
            client,
        })
    }

    /// Starts a new crawl job
    ///
    /// Creates the job record (with the seed already counted in
    /// `urls_queued`) and enqueues the seed URL at depth 0 with the highest
    /// priority.
    ///
    /// # Arguments
    ///
    /// * `website_id` - Identifier of the site being crawled, owned by the
    ///   calling system
    /// * `url` - The seed URL
    ///
    /// # Returns
    ///
    /// The id of the new crawl job
    pub fn start_crawl(&mut self, website_id: &str, url: &str) -> Result<i64, ScoutError> {
        let seed = Url::parse(url)?;

        let job = self.storage.create_job(website_id)?;
        self.storage
            .enqueue(job.id, seed.as_str(), 0, SEED_PRIORITY)?;

        tracing::info!("Started crawl job {} for {} ({})", job.id, seed, website_id);
        Ok(job.id)
    }

    /// Runs one claim-and-process cycle
    ///
    /// # Per-invocation algorithm
    ///
    /// 1. Claim one item, leasing it for the configured visibility timeout
    /// 2. No item available: return `Idle`
    /// 3. Fetch the page
    /// 4. Extract same-origin links (skipped on fetch failure)
    /// 5. Enqueue every found link, best-effort per link
    /// 6. Record success or failure on the job
    /// 7. Delete (acknowledge) the claimed item
    /// 8. Check the job for completion
    ///
    /// Only the claim itself can fail this function; everything after it is
    /// guarded and reported through the returned summary.
    pub async fn process_next(&mut self) -> Result<TickOutcome, ScoutError> {
        let visibility = Duration::from_secs(self.config.crawler.visibility_timeout_secs);

        let mut claimed = self.storage.claim(visibility, 1)?;
        let item = match claimed.pop() {
            Some(item) => item,
            None => {
                tracing::debug!("Queue is empty, nothing to process");
                return Ok(TickOutcome::Idle);
            }
        };

        Ok(TickOutcome::Processed(self.process_item(item).await))
    }

    /// Processes the queue until a claim comes back empty
    ///
    /// Convenience for single-worker operation; concurrent deployments call
    /// `process_next` from many invocations instead.
    ///
    /// # Returns
    ///
    /// The number of items processed before the queue went idle
    pub async fn run_until_idle(&mut self) -> Result<u64, ScoutError> {
        let start = std::time::Instant::now();
        let mut processed = 0u64;

        loop {
            match self.process_next().await? {
                TickOutcome::Idle => break,
                TickOutcome::Processed(_) => {
                    processed += 1;

                    if processed % 10 == 0 {
                        let rate = processed as f64 / start.elapsed().as_secs_f64();
                        tracing::info!(
                            "Progress: {} items processed, {:.2} items/sec",
                            processed,
                            rate
                        );
                    }
                }
            }
        }

        tracing::info!(
            "Queue drained: {} items processed in {:?}",
            processed,
            start.elapsed()
        );
        Ok(processed)
    }

    /// Gets a job with its progress counters
    pub fn job(&self, job_id: i64) -> Result<CrawlJob, ScoutError> {
        Ok(self.storage.get_job(job_id)?)
    }

    /// Runs one claimed item through fetch, fan-out, bookkeeping, and ack
    async fn process_item(&mut self, item: WorkItem) -> ItemSummary {
        tracing::debug!(
            "Processing {} (job {}, depth {}, priority {})",
            item.url,
            item.job_id,
            item.depth,
            item.priority
        );

        let summary = match self.crawl_page(&item).await {
            Ok((canonical, links_found)) => {
                if let Err(e) = self.storage.record_success(
                    item.job_id,
                    canonical.url.as_str(),
                    &canonical.path,
                    item.depth,
                    links_found,
                ) {
                    tracing::error!("Failed to record success for {}: {}", item.url, e);
                }

                ItemSummary {
                    processed_url: canonical.url.to_string(),
                    crawl_job_id: item.job_id,
                    links_found,
                    processing_success: true,
                    error: None,
                }
            }
            Err(message) => {
                tracing::warn!("Failed to crawl {}: {}", item.url, message);

                if let Err(e) = self
                    .storage
                    .record_failure(item.job_id, &item.url, &message)
                {
                    tracing::error!("Failed to record failure for {}: {}", item.url, e);
                }

                ItemSummary {
                    processed_url: item.url.clone(),
                    crawl_job_id: item.job_id,
                    links_found: 0,
                    processing_success: false,
                    error: Some(message),
                }
            }
        };

        // Acknowledge unconditionally; leaving the item to its lease would
        // turn an application-level failure into an endless redelivery loop.
        if let Err(e) = self.storage.delete(item.msg_id) {
            tracing::error!("Failed to delete work item {}: {}", item.msg_id, e);
        }

        match self.storage.is_complete(item.job_id) {
            Ok(true) => tracing::info!("Crawl job {} is complete", item.job_id),
            Ok(false) => {}
            Err(e) => tracing::warn!("Completion check failed for job {}: {}", item.job_id, e),
        }

        summary
    }

    /// Fetches one page and enqueues its links
    ///
    /// Returns the page's canonical URL and the number of links actually
    /// enqueued. The error string is what gets recorded on the job.
    async fn crawl_page(&mut self, item: &WorkItem) -> Result<(CanonicalUrl, u64), String> {
        let base = Url::parse(&item.url).map_err(|e| format!("Invalid URL: {}", e))?;
        let canonical =
            canonicalize(base.as_str(), &base).map_err(|e| format!("Invalid URL: {}", e))?;

        let html = fetch_html(&self.client, &base)
            .await
            .map_err(|e| e.to_string())?;

        let links = extract_links(&html, &base, item.depth, self.config.crawler.max_depth);
        let links = self.apply_page_limit(item.job_id, links);

        let mut enqueued = 0u64;
        for link in &links {
            match self
                .storage
                .enqueue(item.job_id, link.url.as_str(), link.depth, link.priority)
            {
                Ok(_) => enqueued += 1,
                Err(e) => {
                    // Best-effort fan-out: one bad enqueue must not sink the
                    // rest of the batch
                    tracing::warn!("Failed to enqueue {}: {}", link.url, e);
                }
            }
        }

        Ok((canonical, enqueued))
    }

    /// Truncates the fan-out so the job's queued total stays under max-pages
    fn apply_page_limit(&mut self, job_id: i64, mut links: Vec<FoundLink>) -> Vec<FoundLink> {
        let max_pages = match self.config.crawler.max_pages {
            Some(max) => max,
            None => return links,
        };

        match self.storage.get_job(job_id) {
            Ok(job) => {
                let remaining = max_pages.saturating_sub(job.progress.urls_queued);
                if (links.len() as u64) > remaining {
                    tracing::debug!(
                        "Job {} near page ceiling: enqueueing {} of {} links",
                        job_id,
                        remaining,
                        links.len()
                    );
                    links.truncate(remaining as usize);
                }
                links
            }
            Err(e) => {
                tracing::warn!("Could not read job {} for page limit: {}", job_id, e);
                links
            }
        }
    }
}
