use crate::UrlError;
use url::Url;

/// A URL reduced to its stable crawl identity
///
/// Two links that differ only in fragment, query string, or trailing slash
/// canonicalize to the same `CanonicalUrl`, which is what the job store and
/// the extractor's dedup use as identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalUrl {
    /// The canonical absolute URL
    pub url: Url,

    /// The canonical path component (always starts with `/`)
    pub path: String,
}

/// Canonicalizes a URL against a base
///
/// # Canonicalization Steps
///
/// 1. Resolve `href` against `base` to an absolute URL; reject if malformed
/// 2. Reject schemes other than HTTP and HTTPS
/// 3. Remove the fragment (everything after #)
/// 4. Remove the query string
/// 5. Normalize the path: empty or `/` becomes `/`; any other path has its
///    trailing slash stripped
///
/// Canonicalizing an already-canonical URL is a no-op.
///
/// # Arguments
///
/// * `href` - The URL to canonicalize (absolute or relative)
/// * `base` - The base URL relative references are resolved against
///
/// # Returns
///
/// * `Ok(CanonicalUrl)` - The canonical URL and its path
/// * `Err(UrlError)` - The input does not resolve to a usable HTTP(S) URL;
///   callers treat this as "not a link", not a hard error
///
/// # Examples
///
/// ```
/// use site_scout::url::canonicalize;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/").unwrap();
/// let canonical = canonicalize("/about/#team", &base).unwrap();
/// assert_eq!(canonical.url.as_str(), "https://example.com/about");
/// assert_eq!(canonical.path, "/about");
/// ```
pub fn canonicalize(href: &str, base: &Url) -> Result<CanonicalUrl, UrlError> {
    // Step 1: Resolve against the base
    let mut url = base
        .join(href)
        .map_err(|e| UrlError::Parse(e.to_string()))?;

    // Step 2: Validate scheme
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    // Steps 3 & 4: Drop fragment and query
    url.set_fragment(None);
    url.set_query(None);

    // Step 5: Normalize the path
    let path = normalize_path(url.path());
    url.set_path(&path);

    Ok(CanonicalUrl { url, path })
}

/// Normalizes a path: root stays `/`, anything else loses its trailing slash
fn normalize_path(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }

    if let Some(stripped) = path.strip_suffix('/') {
        stripped.to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[test]
    fn test_absolute_url_passthrough() {
        let result = canonicalize("https://example.com/page", &base()).unwrap();
        assert_eq!(result.url.as_str(), "https://example.com/page");
        assert_eq!(result.path, "/page");
    }

    #[test]
    fn test_relative_path_resolved() {
        let result = canonicalize("/about", &base()).unwrap();
        assert_eq!(result.url.as_str(), "https://example.com/about");
    }

    #[test]
    fn test_relative_reference_resolved() {
        let base = Url::parse("https://example.com/docs/intro").unwrap();
        let result = canonicalize("setup", &base).unwrap();
        assert_eq!(result.url.as_str(), "https://example.com/docs/setup");
    }

    #[test]
    fn test_fragment_removed() {
        let result = canonicalize("https://example.com/page#section", &base()).unwrap();
        assert_eq!(result.url.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_query_removed() {
        let result = canonicalize("https://example.com/page?a=1&b=2", &base()).unwrap();
        assert_eq!(result.url.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_trailing_slash_stripped() {
        let result = canonicalize("https://example.com/page/", &base()).unwrap();
        assert_eq!(result.url.as_str(), "https://example.com/page");
        assert_eq!(result.path, "/page");
    }

    #[test]
    fn test_root_slash_kept() {
        let result = canonicalize("https://example.com/", &base()).unwrap();
        assert_eq!(result.url.as_str(), "https://example.com/");
        assert_eq!(result.path, "/");
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let result = canonicalize("https://example.com", &base()).unwrap();
        assert_eq!(result.path, "/");
    }

    #[test]
    fn test_invalid_scheme_rejected() {
        let result = canonicalize("ftp://example.com/file", &base());
        assert!(matches!(result, Err(UrlError::InvalidScheme(_))));
    }

    #[test]
    fn test_mailto_rejected() {
        let result = canonicalize("mailto:test@example.com", &base());
        assert!(result.is_err());
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "https://example.com/page/",
            "/about#team",
            "https://example.com/a/b?q=1#frag",
            "/",
        ];

        for input in inputs {
            let once = canonicalize(input, &base()).unwrap();
            let twice = canonicalize(once.url.as_str(), &base()).unwrap();
            assert_eq!(once, twice, "canonicalize not idempotent for {}", input);
        }
    }

    #[test]
    fn test_fragment_and_slash_collapse_to_same_identity() {
        let a = canonicalize("https://example.com/about#team", &base()).unwrap();
        let b = canonicalize("/about/", &base()).unwrap();
        assert_eq!(a.url, b.url);
    }
}
