//! Path classification.
//!
//! # Responsibilities
//! - Decide whether a path is public, a static asset, an API route or a
//!   protected application page
//! - Recognise speculative prefetch requests from their headers
//! - Normalise paths before anything else looks at them
//!
//! # Design Decisions
//! - Pure: the same path and headers always classify the same way
//! - Matching is case-sensitive for paths, case-insensitive for extensions
//! - No regex; prefix and suffix checks only
//! - Check order: prefetch, static, public, API, protected

use std::collections::HashSet;
use std::fmt;

use axum::http::{HeaderMap, HeaderName};
use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, CONTROLS};

use crate::config::PathsConfig;

/// What kind of path a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathClassification {
    Public,
    StaticAsset,
    ApiRoute,
    Protected,
}

impl PathClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::StaticAsset => "static",
            Self::ApiRoute => "api",
            Self::Protected => "protected",
        }
    }
}

impl fmt::Display for PathClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for matching a normalised path against a condition.
pub trait PathMatcher: Send + Sync + fmt::Debug {
    fn matches(&self, path: &str) -> bool;
}

/// Matches a path and everything below it (`/about` matches `/about/team`
/// but not `/aboutus`).
#[derive(Debug, Clone)]
pub struct SubtreeMatcher {
    root: String,
}

impl SubtreeMatcher {
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let root = match root.trim_end_matches('/') {
            "" => "/".to_string(),
            trimmed => trimmed.to_string(),
        };
        Self { root }
    }
}

impl PathMatcher for SubtreeMatcher {
    fn matches(&self, path: &str) -> bool {
        if self.root == "/" {
            return path == "/";
        }
        match path.strip_prefix(self.root.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Matches a raw string prefix.
#[derive(Debug, Clone)]
pub struct PrefixMatcher {
    prefix: String,
}

impl PrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl PathMatcher for PrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// Matches when the last path segment has one of the given extensions.
#[derive(Debug, Clone)]
pub struct ExtensionMatcher {
    extensions: HashSet<String>,
}

impl ExtensionMatcher {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }
}

impl PathMatcher for ExtensionMatcher {
    fn matches(&self, path: &str) -> bool {
        let segment = path.rsplit('/').next().unwrap_or(path);
        match segment.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                self.extensions.contains(&ext.to_ascii_lowercase())
            }
            _ => false,
        }
    }
}

/// Combines matchers with OR semantics.
#[derive(Debug, Default)]
pub struct AnyMatcher {
    matchers: Vec<Box<dyn PathMatcher>>,
}

impl AnyMatcher {
    pub fn new(matchers: Vec<Box<dyn PathMatcher>>) -> Self {
        Self { matchers }
    }
}

impl PathMatcher for AnyMatcher {
    fn matches(&self, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(path))
    }
}

/// Bytes escaped when a decoded segment is written back out.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Canonical form of a request path.
///
/// Percent-escapes are decoded, `.` and `..` segments are resolved (never
/// above `/`), repeated slashes collapse and a trailing slash is dropped.
/// Each segment is then re-escaped, so the result is a valid URI path and
/// normalising it again is a no-op. The gate classifies this form and
/// forwards this form, so the upstream cannot resolve a path differently.
pub fn normalize_path(path: &str) -> String {
    let decoded: Vec<u8> = percent_decode_str(path).collect();

    let mut segments: Vec<&[u8]> = Vec::new();
    for segment in decoded.split(|b| *b == b'/') {
        match segment {
            b"" | b"." => {}
            b".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(path.len());
    for segment in segments {
        out.push('/');
        out.extend(percent_encode(segment, PATH_SEGMENT));
    }
    out
}

/// Classifies request paths. Compiled once from [`PathsConfig`].
#[derive(Debug)]
pub struct PathClassifier {
    static_assets: AnyMatcher,
    public: AnyMatcher,
    api: SubtreeMatcher,
    prefetch_headers: Vec<HeaderName>,
}

impl PathClassifier {
    pub fn from_config(config: &PathsConfig) -> Self {
        let mut static_matchers: Vec<Box<dyn PathMatcher>> = config
            .static_prefixes
            .iter()
            .map(|p| Box::new(PrefixMatcher::new(p.clone())) as Box<dyn PathMatcher>)
            .collect();
        static_matchers.push(Box::new(ExtensionMatcher::new(&config.static_extensions)));

        let public = config
            .public
            .iter()
            .map(|p| Box::new(SubtreeMatcher::new(normalize_path(p))) as Box<dyn PathMatcher>)
            .collect();

        let prefetch_headers = config
            .prefetch_headers
            .iter()
            .filter_map(|name| match HeaderName::from_bytes(name.as_bytes()) {
                Ok(name) => Some(name),
                Err(_) => {
                    tracing::warn!(header = %name, "Ignoring invalid prefetch header name");
                    None
                }
            })
            .collect();

        Self {
            static_assets: AnyMatcher::new(static_matchers),
            public: AnyMatcher::new(public),
            api: SubtreeMatcher::new(normalize_path(&config.api_prefix)),
            prefetch_headers,
        }
    }

    /// Classify a normalised path.
    pub fn classify(&self, path: &str) -> PathClassification {
        if self.static_assets.matches(path) {
            PathClassification::StaticAsset
        } else if self.public.matches(path) {
            PathClassification::Public
        } else if self.api.matches(path) {
            PathClassification::ApiRoute
        } else {
            PathClassification::Protected
        }
    }

    /// Classify a request; prefetches are public whatever their path.
    pub fn classify_request(&self, path: &str, headers: &HeaderMap) -> PathClassification {
        if self.is_prefetch(headers) {
            return PathClassification::Public;
        }
        self.classify(path)
    }

    pub fn is_prefetch(&self, headers: &HeaderMap) -> bool {
        if self.prefetch_headers.iter().any(|h| headers.contains_key(h)) {
            return true;
        }
        ["purpose", "sec-purpose"].iter().any(|name| {
            headers
                .get_all(*name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .any(|v| v.to_ascii_lowercase().contains("prefetch"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn classifier() -> PathClassifier {
        PathClassifier::from_config(&PathsConfig::default())
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("//"), "/");
        assert_eq!(normalize_path("/admin-dashboard/"), "/admin-dashboard");
        assert_eq!(normalize_path("//admin-dashboard//users"), "/admin-dashboard/users");
    }

    #[test]
    fn test_normalize_resolves_dot_segments() {
        assert_eq!(normalize_path("/sign-in/../admin-dashboard"), "/admin-dashboard");
        assert_eq!(normalize_path("/_next/../admin-dashboard/users"), "/admin-dashboard/users");
        assert_eq!(normalize_path("/about/%2e%2e/admin-dashboard"), "/admin-dashboard");
        assert_eq!(normalize_path("/about/.%2E/admin-dashboard"), "/admin-dashboard");
        assert_eq!(normalize_path("/about%2F..%2Fadmin-dashboard"), "/admin-dashboard");
        assert_eq!(normalize_path("/./student-dashboard/."), "/student-dashboard");
        assert_eq!(normalize_path("/../../etc"), "/etc");
        assert_eq!(normalize_path("/.."), "/");
    }

    #[test]
    fn test_normalize_reescapes() {
        assert_eq!(normalize_path("/proposals/a%20b"), "/proposals/a%20b");
        assert_eq!(normalize_path("/proposals/%7euser"), "/proposals/~user");
        assert_eq!(normalize_path("/files/100%25"), "/files/100%25");
        assert_eq!(normalize_path("/files/%252e%252e"), "/files/%252e%252e");
        assert_eq!(normalize_path("/\u{fc}ber"), "/%C3%BCber");
        for raw in ["/a%20b/../c", "/%2e%2e/x", "/files/%252e", "/q%3Fx"] {
            let once = normalize_path(raw);
            assert_eq!(normalize_path(&once), once, "{raw}");
        }
    }

    #[test]
    fn test_dot_segments_cannot_escape_into_public_subtrees() {
        let c = classifier();
        for raw in [
            "/sign-in/../admin-dashboard",
            "/_next/../admin-dashboard/users",
            "/about/%2e%2e/admin-dashboard",
            "/static/%2E%2E/admin-dashboard",
        ] {
            assert_eq!(c.classify(&normalize_path(raw)), PathClassification::Protected, "{raw}");
        }
    }

    #[test]
    fn test_subtree_matcher() {
        let m = SubtreeMatcher::new("/about");
        assert!(m.matches("/about"));
        assert!(m.matches("/about/team"));
        assert!(!m.matches("/aboutus"));
        assert!(!m.matches("/"));

        let root = SubtreeMatcher::new("/");
        assert!(root.matches("/"));
        assert!(!root.matches("/anything"));
    }

    #[test]
    fn test_extension_matcher() {
        let m = ExtensionMatcher::new(["css", ".PNG"]);
        assert!(m.matches("/styles/site.css"));
        assert!(m.matches("/img/logo.png"));
        assert!(m.matches("/img/LOGO.Png"));
        assert!(!m.matches("/img/logo"));
        assert!(!m.matches("/.css"));
        assert!(!m.matches("/files.css/report"));
    }

    #[test]
    fn test_classify_static() {
        let c = classifier();
        assert_eq!(c.classify("/_next/static/chunks/main.js"), PathClassification::StaticAsset);
        assert_eq!(c.classify("/_next/image"), PathClassification::StaticAsset);
        assert_eq!(c.classify("/favicon.ico"), PathClassification::StaticAsset);
        assert_eq!(c.classify("/admin-dashboard/logo.svg"), PathClassification::StaticAsset);
    }

    #[test]
    fn test_classify_public() {
        let c = classifier();
        assert_eq!(c.classify("/sign-in"), PathClassification::Public);
        assert_eq!(c.classify("/sign-up"), PathClassification::Public);
        assert_eq!(c.classify("/health"), PathClassification::Public);
        assert_eq!(c.classify("/about/team"), PathClassification::Public);
        assert_eq!(c.classify("/sign-inx"), PathClassification::Protected);
    }

    #[test]
    fn test_classify_api_and_protected() {
        let c = classifier();
        assert_eq!(c.classify("/api"), PathClassification::ApiRoute);
        assert_eq!(c.classify("/api/proposals/42"), PathClassification::ApiRoute);
        assert_eq!(c.classify("/apiary"), PathClassification::Protected);
        assert_eq!(c.classify("/"), PathClassification::Protected);
        assert_eq!(c.classify("/admin-dashboard/users"), PathClassification::Protected);
    }

    #[test]
    fn test_prefetch_is_public() {
        let c = classifier();
        let mut headers = HeaderMap::new();
        assert_eq!(c.classify_request("/admin-dashboard", &headers), PathClassification::Protected);

        headers.insert("next-router-prefetch", HeaderValue::from_static("1"));
        assert_eq!(c.classify_request("/admin-dashboard", &headers), PathClassification::Public);

        let mut headers = HeaderMap::new();
        headers.insert("sec-purpose", HeaderValue::from_static("prefetch;prerender"));
        assert_eq!(c.classify_request("/api/users", &headers), PathClassification::Public);
    }
}
