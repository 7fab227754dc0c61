//! Request/response surface for the surrounding application
//!
//! The crawler is driven by an external scheduler through two HTTP-style
//! requests: a job-initiation request carrying `action: "start_crawl"`, and
//! a bare request (no action) that runs one claim-and-process cycle. Both
//! answer with a uniform envelope; the transport itself is the caller's
//! concern (the CLI prints the envelope as JSON).

use crate::crawler::{Orchestrator, TickOutcome};
use crate::storage::{JobStore, WorkQueue};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlRequest {
    /// Create a job and enqueue its seed URL
    StartCrawl { website_id: String, url: String },

    /// Run one claim-and-process cycle
    ProcessNext,
}

#[derive(Debug, Deserialize)]
struct RawRequest {
    action: Option<String>,
    website_id: Option<String>,
    url: Option<String>,
}

/// Parses a JSON request body
///
/// A missing `action` field selects the claim-and-process cycle; an unknown
/// action is an error.
pub fn parse_request(body: &str) -> Result<CrawlRequest, String> {
    let raw: RawRequest =
        serde_json::from_str(body).map_err(|e| format!("Invalid request body: {}", e))?;

    match raw.action.as_deref() {
        Some("start_crawl") => {
            let website_id = raw
                .website_id
                .ok_or_else(|| "start_crawl requires website_id".to_string())?;
            let url = raw
                .url
                .ok_or_else(|| "start_crawl requires url".to_string())?;
            Ok(CrawlRequest::StartCrawl { website_id, url })
        }
        Some(other) => Err(format!("Unknown action: {}", other)),
        None => Ok(CrawlRequest::ProcessNext),
    }
}

/// Error payload inside an envelope
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// The uniform response envelope
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Envelope {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                message: message.into(),
                details,
            }),
        }
    }
}

/// Dispatches a parsed request against an orchestrator
///
/// Item-level failures never surface here: a tick whose item failed still
/// answers with a success envelope describing the failure. Only claim,
/// storage, and configuration problems produce an error envelope.
pub async fn dispatch<S: WorkQueue + JobStore>(
    orchestrator: &mut Orchestrator<S>,
    request: CrawlRequest,
) -> Envelope {
    match request {
        CrawlRequest::StartCrawl { website_id, url } => {
            match orchestrator.start_crawl(&website_id, &url) {
                Ok(job_id) => Envelope::ok(json!({ "crawl_job_id": job_id })),
                Err(e) => Envelope::error("Failed to start crawl", Some(e.to_string())),
            }
        }
        CrawlRequest::ProcessNext => match orchestrator.process_next().await {
            Ok(TickOutcome::Idle) => Envelope::ok(json!({ "status": "idle" })),
            Ok(TickOutcome::Processed(summary)) => match serde_json::to_value(&summary) {
                Ok(value) => Envelope::ok(value),
                Err(e) => Envelope::error("Failed to serialize summary", Some(e.to_string())),
            },
            Err(e) => Envelope::error("Failed to process queue item", Some(e.to_string())),
        },
    }
}
