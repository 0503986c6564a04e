//! Link extraction for link-following sources
//!
//! This module turns a fetched page into frontier entries:
//! - Collects `<a href>` targets with `scraper`
//! - Drops fragment-only, script, mail, phone and data targets
//! - Resolves relative references against the page URL
//! - Canonicalizes and keeps only hosts matching the source's `link-domain`
//!
//! Discovered links are the only way the frontier grows past its seeds.

use crate::config::SourceConfig;
use crate::storage::{Storage, StorageResult};
use crate::url::{canonicalize, url_matches};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracts canonical in-scope links from an HTML page
///
/// Links are returned in document order without duplicates.
///
/// # Example
///
/// ```
/// use frontier_crawl::crawler::extract_links;
/// use url::Url;
///
/// let html = r#"<a href="/b.txt">b</a><a href="http://elsewhere.org/">x</a>"#;
/// let base = Url::parse("http://az.lib.ru/a/").unwrap();
/// assert_eq!(extract_links(html, &base, "*.lib.ru"), vec!["http://az.lib.ru/b.txt"]);
/// ```
pub fn extract_links(html: &str, base_url: &Url, domain_pattern: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(absolute) = resolve_link(href, base_url) else {
            continue;
        };
        if !url_matches(domain_pattern, &absolute) {
            continue;
        }
        match canonicalize(absolute.as_str()) {
            Ok(canonical) => {
                if seen.insert(canonical.clone()) {
                    links.push(canonical);
                }
            }
            Err(e) => tracing::trace!("Dropping link {}: {}", absolute, e),
        }
    }

    links
}

/// Resolves an href against the page URL
///
/// Returns None for targets that never name a fetchable page.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    base_url
        .join(href)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// Enqueues the in-scope links of a fetched page for a link-following source
///
/// Returns how many links were new to the frontier. Sources without
/// `follows-links` or without a `link-domain` add nothing.
pub fn follow_links<S: Storage>(
    storage: &mut S,
    source: &SourceConfig,
    html: &str,
    page_url: &str,
    now: i64,
) -> StorageResult<usize> {
    let pattern = match (&source.link_domain, source.follows_links) {
        (Some(pattern), true) => pattern,
        _ => return Ok(0),
    };

    let base_url = match Url::parse(page_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!("Cannot resolve links of {}: {}", page_url, e);
            return Ok(0);
        }
    };

    let mut added = 0;
    for link in extract_links(html, &base_url, pattern) {
        if storage.enqueue(&source.name, &link, source.link_priority, None, now)? {
            added += 1;
        }
    }

    if added > 0 {
        tracing::debug!("Discovered {} new links on {}", added, page_url);
    }
    Ok(added)
}
