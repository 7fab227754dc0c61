//! Link extractor for crawled pages
//!
//! Scans fetched HTML for anchor tags and reduces them to the set of
//! same-origin, crawlable links, each carrying the depth and priority the
//! work queue schedules by. The scan is error-recovering: malformed or
//! partial HTML still yields whatever anchors can be salvaged.

use crate::url::canonicalize;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// A crawlable link discovered on a page
#[derive(Debug, Clone)]
pub struct FoundLink {
    /// Canonical absolute URL
    pub url: Url,

    /// Canonical path component
    pub path: String,

    /// One hop deeper than the page it was found on
    pub depth: u32,

    /// Scheduling priority; links from shallower pages rank uniformly higher
    pub priority: u32,
}

/// File extensions that never point at crawlable pages
const SKIPPED_EXTENSIONS: &[&str] = &[
    // Images
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".ico", ".bmp", ".avif",
    // Documents
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".odt", ".rtf",
    // Archives
    ".zip", ".tar", ".gz", ".tgz", ".rar", ".7z",
    // Executables and installers
    ".exe", ".msi", ".dmg", ".apk", ".bin",
    // Audio/video
    ".mp3", ".mp4", ".avi", ".mov", ".wmv", ".webm", ".ogg", ".wav",
    // Data interchange
    ".json", ".xml", ".csv", ".rss", ".atom", ".yaml", ".yml",
    // Assets
    ".css", ".js", ".mjs", ".woff", ".woff2", ".ttf", ".eot",
];

/// Extracts the crawlable links from a page
///
/// # Extraction Rules
///
/// - Returns an empty list immediately when `current_depth >= max_depth`
///   (the depth ceiling bounds total fan-out)
/// - Collects `href` values from `<a>` tags
/// - Drops `javascript:`, `mailto:`, `tel:` and `data:` links, fragment-only
///   links, and links whose path ends in a non-page file extension
/// - Canonicalizes survivors against `base_url`; unresolvable hrefs are
///   dropped silently
/// - Keeps only links sharing `base_url`'s origin (no cross-domain crawling)
/// - De-duplicates by canonical URL within this call only
///
/// Every returned link gets `depth = current_depth + 1` and
/// `priority = max(0, 10 - current_depth)`: priority is a function of the
/// parent's depth, so links discovered on shallower pages always outrank
/// links discovered deeper.
///
/// # Arguments
///
/// * `html` - The HTML content to scan
/// * `base_url` - The fetched page's URL, used to resolve relative links
/// * `current_depth` - The fetched page's depth
/// * `max_depth` - The crawl's depth ceiling
pub fn extract_links(
    html: &str,
    base_url: &Url,
    current_depth: u32,
    max_depth: u32,
) -> Vec<FoundLink> {
    if current_depth >= max_depth {
        return Vec::new();
    }

    let document = Html::parse_document(html);

    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let depth = current_depth + 1;
    let priority = 10u32.saturating_sub(current_depth);

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        if let Some(href) = element.value().attr("href") {
            if let Some((url, path)) = resolve_link(href, base_url) {
                if !seen.insert(url.to_string()) {
                    continue;
                }
                links.push(FoundLink {
                    url,
                    path,
                    depth,
                    priority,
                });
            }
        }
    }

    links
}

/// Resolves an href to its canonical same-origin URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel:, data: schemes
/// - Fragment-only links (same page anchors)
/// - Non-page file extensions
/// - Unresolvable or non-HTTP(S) URLs
/// - Different origin than the base
fn resolve_link(href: &str, base_url: &Url) -> Option<(Url, String)> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    if href.starts_with('#') {
        return None;
    }

    let canonical = canonicalize(href, base_url).ok()?;

    if has_skipped_extension(&canonical.path) {
        return None;
    }

    if canonical.url.origin() != base_url.origin() {
        return None;
    }

    Some((canonical.url, canonical.path))
}

fn has_skipped_extension(path: &str) -> bool {
    let lower = path.to_lowercase();
    SKIPPED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}
