//! Integration tests for the crawler
//!
//! These tests run the worker pool against wiremock servers and share one
//! SQLite file between several connections, the way a real crawl does.

mod crawl_tests;
mod frontier_tests;

use frontier_crawl::config::{load_config, Config};
use std::io::Write;
use std::path::Path;

/// Writes a full configuration file and loads it through validation
///
/// `sources` holds `[[source]]` tables; `{uri}` in it is replaced by the
/// mock server address and `crawler_extra` is appended to `[crawler]`.
pub fn load_test_config(db: &Path, uri: &str, crawler_extra: &str, sources: &str) -> Config {
    let content = format!(
        r#"
[database]
path = "{db}"

[crawler]
workers = 2
request-timeout-secs = 5
max-retries = 3
delay-ms = 5
poll-interval-ms = 25
idle-sleep-ms = 10
idle-backoff-ms = 25
{crawler_extra}

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

{sources}
"#,
        db = db.display(),
        crawler_extra = crawler_extra,
        sources = sources.replace("{uri}", uri),
    );

    let dir = db.parent().expect("database path has a parent");
    let path = dir.join("crawl.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();

    load_config(&path).unwrap()
}
