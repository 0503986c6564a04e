//! Paginated listing API seeder
//!
//! Walks a MediaWiki-style `action=query&list=...` endpoint. Each response
//! carries a `query.<list>` array of items and, while more pages remain, a
//! `continue` object whose fields are merged into the next request.

use crate::config::{PaginatedSeed, SourceConfig};
use crate::now_ts;
use crate::seed::SeedReport;
use crate::storage::{Storage, StorageError};
use crate::CrawlError;
use reqwest::Client;
use serde_json::{Map, Value};

/// Progress is logged every this many listed items
const LOG_EVERY: u64 = 1_000;

/// Harvests page titles from a listing API into the frontier
///
/// Stops when `limit` items have been listed, when a response has no
/// `continue` object, or when a request or its decoding fails. Items already
/// enqueued are kept in every case.
pub async fn seed_paginated<S: Storage>(
    storage: &mut S,
    client: &Client,
    source: &SourceConfig,
    seed: &PaginatedSeed,
) -> Result<SeedReport, CrawlError> {
    let mut report = SeedReport::default();
    let mut continuation: Map<String, Value> = Map::new();

    while report.listed < seed.limit {
        let page = match fetch_page(client, seed, &continuation).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(
                    "Seeding {} stopped after {} items: {}",
                    source.name,
                    report.listed,
                    e
                );
                break;
            }
        };

        let now = now_ts();
        for title in page_titles(&page, seed) {
            if report.listed >= seed.limit {
                break;
            }
            report.listed += 1;

            let url = title_url(&seed.url_base, title);
            match storage.enqueue(&source.name, &url, source.priority, None, now) {
                Ok(true) => report.added += 1,
                Ok(false) => {}
                Err(StorageError::InvalidUrl(e)) => {
                    tracing::debug!("Skipping listed title {:?}: {}", title, e)
                }
                Err(e) => return Err(e.into()),
            }

            if report.listed % LOG_EVERY == 0 {
                tracing::info!("{}: {} items listed", source.name, report.listed);
            }
        }

        match page.get("continue").and_then(Value::as_object) {
            Some(next) => continuation = next.clone(),
            None => break,
        }
    }

    Ok(report)
}

/// Fetches one listing page
async fn fetch_page(
    client: &Client,
    seed: &PaginatedSeed,
    continuation: &Map<String, Value>,
) -> Result<Value, CrawlError> {
    let mut query: Vec<(String, String)> = vec![
        ("action".to_string(), "query".to_string()),
        ("format".to_string(), "json".to_string()),
        ("list".to_string(), seed.list.clone()),
    ];
    query.extend(seed.params.iter().map(|(k, v)| (k.clone(), v.clone())));
    for (key, value) in continuation {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        query.retain(|(k, _)| k != key);
        query.push((key.clone(), value));
    }

    let response = client
        .get(&seed.api_url)
        .query(&query)
        .send()
        .await
        .map_err(|source| CrawlError::Http {
            url: seed.api_url.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(CrawlError::HttpStatus {
            url: seed.api_url.clone(),
            status: status.as_u16(),
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|source| CrawlError::Http {
            url: seed.api_url.clone(),
            source,
        })
}

/// Titles listed in one response, in order
fn page_titles<'a>(page: &'a Value, seed: &'a PaginatedSeed) -> impl Iterator<Item = &'a str> {
    page.get("query")
        .and_then(|q| q.get(&seed.list))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get(&seed.title_field).and_then(Value::as_str))
}

/// Builds a page URL from a title the way MediaWiki links them
///
/// Spaces become underscores; `?` and `#` are escaped so they stay part of
/// the title instead of starting a query or fragment.
fn title_url(url_base: &str, title: &str) -> String {
    let path: String = title
        .chars()
        .map(|c| match c {
            ' ' => "_".to_string(),
            '?' => "%3F".to_string(),
            '#' => "%23".to_string(),
            other => other.to_string(),
        })
        .collect();
    format!("{}{}", url_base, path)
}
