//! URL helpers shared by extraction, fetching, and the frontier.

use url::Url;

/// Extensions identifying binary or document resources that are never crawled.
const EXCLUDED_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".pdf", ".doc", ".docx", ".xls", ".xlsx",
    ".zip", ".rar",
];

/// Path marker preceding an article name on wiki sites.
const ARTICLE_PATH_MARKER: &str = "/wiki/";

/// True when `host` is the site domain itself or one of its subdomains.
pub fn in_site_family(host: &str, site_domain: &str) -> bool {
    host == site_domain || host.ends_with(&format!(".{}", site_domain))
}

/// Percent-decode a URL into its canonical stored form.
/// Input that does not decode to valid UTF-8 is returned unchanged.
pub fn decode_url(url: &str) -> String {
    urlencoding::decode(url)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| url.to_string())
}

/// The page-identifying segment after the last `/wiki/`, percent-decoded.
/// Paths without the marker yield the whole path.
pub fn topic_of(url: &Url) -> String {
    let path = url.path();
    let tail = match path.rfind(ARTICLE_PATH_MARKER) {
        Some(idx) => &path[idx + ARTICLE_PATH_MARKER.len()..],
        None => path,
    };
    decode_url(tail)
}

/// Namespace pages (Category:, Talk:, Template:, ...) carry a colon-qualified topic.
pub fn is_namespace_topic(topic: &str) -> bool {
    topic.contains(':')
}

pub fn has_excluded_extension(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    EXCLUDED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Edit and visual-edit links carry an `action`/`veaction` query parameter.
pub fn has_action_param(url: &Url) -> bool {
    url.query_pairs()
        .any(|(key, _)| key == "action" || key == "veaction")
}
