use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Frontier-Crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    /// Sources in dispatch order
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Looks up a source by name
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Sum of all per-source targets
    pub fn total_target(&self) -> u64 {
        self.sources.iter().map(|s| s.target).sum()
    }
}

/// Database location
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of concurrent workers
    pub workers: u32,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Failures tolerated before a job becomes terminal
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Pause after every processed job (milliseconds)
    #[serde(rename = "delay-ms")]
    pub delay_ms: u64,

    /// Fixed delay before a failed job is retried (seconds)
    #[serde(rename = "retry-delay-secs", default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Delay before a job deferred by quota is retried (seconds)
    #[serde(rename = "quota-deferral-secs", default = "default_quota_deferral_secs")]
    pub quota_deferral_secs: u64,

    /// Delay before a successfully fetched job is revisited (seconds)
    #[serde(rename = "revisit-interval-secs", default = "default_revisit_interval_secs")]
    pub revisit_interval_secs: u64,

    /// Coordinator progress check interval (milliseconds)
    #[serde(rename = "poll-interval-ms", default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How often the progress report is logged (seconds)
    #[serde(rename = "progress-interval-secs", default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,

    /// Worker sleep after an empty claim (milliseconds)
    #[serde(rename = "idle-sleep-ms", default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,

    /// Worker sleep after several consecutive empty claims (milliseconds)
    #[serde(rename = "idle-backoff-ms", default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    /// Age after which an orphaned in-progress claim is released (seconds)
    #[serde(rename = "stale-claim-secs", default = "default_stale_claim_secs")]
    pub stale_claim_secs: u64,

    /// Pending backlog below which a lagging source gets supplemental seeds
    #[serde(rename = "supplement-backlog", default = "default_supplement_backlog")]
    pub supplement_backlog: u64,

    /// Fraction of its target a source must reach before others are supplemented
    #[serde(rename = "supplement-ratio", default = "default_supplement_ratio")]
    pub supplement_ratio: f64,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

fn default_retry_delay_secs() -> u64 {
    60
}

fn default_quota_deferral_secs() -> u64 {
    300
}

fn default_revisit_interval_secs() -> u64 {
    60 * 60 * 24 * 30
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_progress_interval_secs() -> u64 {
    60
}

fn default_idle_sleep_ms() -> u64 {
    2_000
}

fn default_idle_backoff_ms() -> u64 {
    5_000
}

fn default_stale_claim_secs() -> u64 {
    600
}

fn default_supplement_backlog() -> u64 {
    1_000
}

fn default_supplement_ratio() -> f64 {
    0.9
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

impl UserAgentConfig {
    /// Renders the `User-Agent` header value: `Name/Version (+url; email)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// A named document source with its quota and seeding strategy
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Source tag stored on every job and document
    pub name: String,

    /// Target document count, also the dispatch quota
    pub target: u64,

    /// Priority of seeded jobs (lower is more urgent)
    #[serde(default = "default_priority")]
    pub priority: i64,

    /// Whether fetched pages feed their links back into the frontier
    #[serde(rename = "follows-links", default)]
    pub follows_links: bool,

    /// Host pattern discovered links must match (e.g. "*.lib.ru")
    #[serde(rename = "link-domain", default)]
    pub link_domain: Option<String>,

    /// Priority given to discovered links
    #[serde(rename = "link-priority", default = "default_priority")]
    pub link_priority: i64,

    pub seed: SeedConfig,
}

fn default_priority() -> i64 {
    2
}

/// How a source's frontier is first populated
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum SeedConfig {
    /// Walk a MediaWiki-style listing API with continuation tokens
    Paginated(PaginatedSeed),

    /// Enqueue a fixed list of URLs
    Static(StaticSeed),
}

/// Paginated listing API parameters
#[derive(Debug, Clone, Deserialize)]
pub struct PaginatedSeed {
    /// Listing endpoint, e.g. `https://ru.wikisource.org/w/api.php`
    #[serde(rename = "api-url")]
    pub api_url: String,

    /// Prefix joined with each listed title to form the page URL
    #[serde(rename = "url-base")]
    pub url_base: String,

    /// Name of the list in the `query` object of each response
    #[serde(default = "default_list")]
    pub list: String,

    /// Field of each list item holding the page title
    #[serde(rename = "title-field", default = "default_title_field")]
    pub title_field: String,

    /// Stop after this many listed items
    #[serde(default = "default_seed_limit")]
    pub limit: u64,

    /// Extra query parameters merged into every listing request
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

fn default_list() -> String {
    "allpages".to_string()
}

fn default_title_field() -> String {
    "title".to_string()
}

fn default_seed_limit() -> u64 {
    40_000
}

/// Literal seed URL list
#[derive(Debug, Clone, Deserialize)]
pub struct StaticSeed {
    pub urls: Vec<String>,
}
