use serde::Deserialize;

/// Main configuration structure for Site-Scout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum link-hop depth from the seed URL
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Hard timeout for a single page fetch (seconds)
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// How long a claimed queue item stays invisible to other claimants (seconds)
    #[serde(
        rename = "visibility-timeout-secs",
        default = "default_visibility_timeout"
    )]
    pub visibility_timeout_secs: u64,

    /// Ceiling on the number of URLs queued per job; absent means unbounded
    #[serde(rename = "max-pages")]
    pub max_pages: Option<u64>,
}

fn default_max_depth() -> u32 {
    2
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_visibility_timeout() -> u64 {
    30
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file backing the queue and job store
    #[serde(rename = "database-path")]
    pub database_path: String,
}
