//! Link extraction and filtering for wiki pages.

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

use crate::topics::TopicSet;
use crate::url_utils;

/// Host scope a crawl must stay inside: the site domain and its subdomains.
#[derive(Debug, Clone)]
pub struct CrawlScope {
    site_domain: String,
}

impl CrawlScope {
    pub fn new(site_domain: impl Into<String>) -> Self {
        Self {
            site_domain: site_domain.into(),
        }
    }

    pub fn site_domain(&self) -> &str {
        &self.site_domain
    }

    pub fn contains(&self, url: &Url) -> bool {
        url.host_str()
            .map_or(false, |host| url_utils::in_site_family(host, &self.site_domain))
    }
}

/// Extract the in-scope article links from one page.
///
/// Accepted URLs are absolute, inside the scope's site family, free of
/// edit-action parameters, excluded extensions, and namespace topics, and
/// their topic was unseen until this call. Results are percent-decoded.
/// Malformed markup yields fewer or no links, never an error.
pub fn extract_links(
    html: &str,
    base_url: &Url,
    scope: &CrawlScope,
    topics: &TopicSet,
) -> HashSet<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("Invalid CSS selector");

    let mut links = HashSet::new();

    for element in document.select(&selector) {
        let href = match element.value().attr("href") {
            Some(href) => href.trim(),
            None => continue,
        };

        // Same-page anchors never leave the page.
        if href.is_empty() || href.starts_with('#') {
            continue;
        }

        let resolved = match base_url.join(href) {
            Ok(resolved) => resolved,
            Err(_) => continue,
        };

        if !scope.contains(&resolved) {
            continue;
        }

        if url_utils::has_action_param(&resolved) {
            continue;
        }

        let topic = url_utils::topic_of(&resolved);
        if url_utils::is_namespace_topic(&topic) {
            continue;
        }

        // First-seen-wins: the topic is claimed before the trailing checks,
        // so a rejected variant still shadows later duplicates.
        if !topics.insert(&topic) {
            continue;
        }

        if url_utils::has_excluded_extension(&resolved) {
            continue;
        }

        let decoded = url_utils::decode_url(resolved.as_str());
        if decoded.contains("&amp") {
            continue;
        }

        links.insert(decoded);
    }

    links
}
