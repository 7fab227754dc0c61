//! Site-Scout main entry point
//!
//! This is the command-line interface for the Site-Scout crawler. Every mode
//! answers with the same JSON envelope the HTTP-style API uses, so an
//! external scheduler can invoke the binary directly and parse stdout.

use anyhow::Result;
use clap::Parser;
use site_scout::api::{dispatch, parse_request, CrawlRequest, Envelope};
use site_scout::config::load_config;
use site_scout::crawler::Orchestrator;
use site_scout::storage::{JobStore, SqliteStorage};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Site-Scout: a queue-driven website page crawler
///
/// Site-Scout enumerates the pages of a website through a durable work
/// queue. Invoke it with --start-url to begin a crawl; invoke it bare,
/// repeatedly and possibly concurrently, to drain the queue one item per
/// invocation.
#[derive(Parser, Debug)]
#[command(name = "site-scout")]
#[command(version = "1.0.0")]
#[command(about = "A queue-driven website page crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Raw JSON request body, as the HTTP-style API would receive it
    #[arg(long, value_name = "JSON", conflicts_with_all = ["start_url", "drain", "job_status"])]
    request: Option<String>,

    /// Seed URL to start a new crawl job from
    #[arg(long, requires = "website_id")]
    start_url: Option<String>,

    /// Identifier of the website being crawled (with --start-url)
    #[arg(long, requires = "start_url")]
    website_id: Option<String>,

    /// Process items until the queue is idle instead of claiming just one
    #[arg(long, conflicts_with_all = ["start_url", "job_status"])]
    drain: bool,

    /// Print a crawl job's status and progress, then exit
    #[arg(long, value_name = "JOB_ID", conflicts_with = "start_url")]
    job_status: Option<i64>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    // Configuration problems are fatal before any work happens
    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            print_envelope(&Envelope::error(
                "Configuration error",
                Some(e.to_string()),
            ))?;
            std::process::exit(1);
        }
    };

    let storage = match SqliteStorage::new(Path::new(&config.storage.database_path)) {
        Ok(storage) => storage,
        Err(e) => {
            print_envelope(&Envelope::error("Storage error", Some(e.to_string())))?;
            std::process::exit(1);
        }
    };

    if let Some(job_id) = cli.job_status {
        return handle_job_status(storage, job_id);
    }

    let mut orchestrator = Orchestrator::new(config, storage)?;

    let envelope = if let Some(body) = &cli.request {
        match parse_request(body) {
            Ok(request) => dispatch(&mut orchestrator, request).await,
            Err(message) => Envelope::error("Invalid request", Some(message)),
        }
    } else if let (Some(url), Some(website_id)) = (&cli.start_url, &cli.website_id) {
        dispatch(
            &mut orchestrator,
            CrawlRequest::StartCrawl {
                website_id: website_id.clone(),
                url: url.clone(),
            },
        )
        .await
    } else if cli.drain {
        handle_drain(&mut orchestrator).await
    } else {
        dispatch(&mut orchestrator, CrawlRequest::ProcessNext).await
    };

    print_envelope(&envelope)?;

    if !envelope.success {
        std::process::exit(1);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_scout=info,warn"),
            1 => EnvFilter::new("site_scout=debug,info"),
            2 => EnvFilter::new("site_scout=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        // Logs go to stderr so stdout stays parseable envelope JSON
        .with_writer(std::io::stderr)
        .init();
}

/// Handles the --job-status mode
fn handle_job_status(storage: SqliteStorage, job_id: i64) -> Result<()> {
    let envelope = match storage.get_job(job_id) {
        Ok(job) => match serde_json::to_value(&job) {
            Ok(value) => Envelope::ok(value),
            Err(e) => Envelope::error("Failed to serialize job", Some(e.to_string())),
        },
        Err(e) => Envelope::error("Failed to load job", Some(e.to_string())),
    };

    print_envelope(&envelope)?;

    if !envelope.success {
        std::process::exit(1);
    }

    Ok(())
}

/// Handles the --drain mode: claim-and-process until the queue is idle
async fn handle_drain(orchestrator: &mut Orchestrator<SqliteStorage>) -> Envelope {
    match orchestrator.run_until_idle().await {
        Ok(processed) => Envelope::ok(serde_json::json!({ "items_processed": processed })),
        Err(e) => Envelope::error("Drain failed", Some(e.to_string())),
    }
}

fn print_envelope(envelope: &Envelope) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    Ok(())
}
