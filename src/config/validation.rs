use crate::config::types::{Config, CrawlerConfig, SeedConfig, SourceConfig, UserAgentConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Longest delay accepted for any `*-secs` scheduling setting (ten years)
const MAX_DELAY_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_database_path(&config.database.path)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_sources(&config.sources)?;
    Ok(())
}

fn validate_database_path(path: &str) -> Result<(), ConfigError> {
    if path.is_empty() {
        return Err(ConfigError::Validation(
            "database path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 100 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 100, got {}",
            config.workers
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "poll-interval-ms must be >= 1".to_string(),
        ));
    }

    for (key, value) in [
        ("retry-delay-secs", config.retry_delay_secs),
        ("quota-deferral-secs", config.quota_deferral_secs),
        ("revisit-interval-secs", config.revisit_interval_secs),
        ("stale-claim-secs", config.stale_claim_secs),
    ] {
        if value > MAX_DELAY_SECS {
            return Err(ConfigError::Validation(format!(
                "{} must be at most {}, got {}",
                key, MAX_DELAY_SECS, value
            )));
        }
    }

    if !(0.0..=1.0).contains(&config.supplement_ratio) {
        return Err(ConfigError::Validation(format!(
            "supplement-ratio must be within 0.0..=1.0, got {}",
            config.supplement_ratio
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates the ordered source list
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[source]] must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for source in sources {
        if source.name.is_empty() {
            return Err(ConfigError::Validation(
                "source name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                source.name
            )));
        }

        if source.target == 0 {
            return Err(ConfigError::Validation(format!(
                "source '{}' must have a target >= 1",
                source.name
            )));
        }

        match (&source.link_domain, source.follows_links) {
            (Some(pattern), _) => validate_domain_pattern(pattern)?,
            (None, true) => {
                return Err(ConfigError::Validation(format!(
                    "source '{}' follows links but has no link-domain",
                    source.name
                )))
            }
            (None, false) => {}
        }

        validate_seed(&source.name, &source.seed)?;
    }

    Ok(())
}

fn validate_seed(source: &str, seed: &SeedConfig) -> Result<(), ConfigError> {
    match seed {
        SeedConfig::Paginated(p) => {
            validate_http_url(&p.api_url, source, "api-url")?;
            validate_http_url(&p.url_base, source, "url-base")?;
            if p.list.is_empty() || p.title_field.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "source '{}' paginated seed needs non-empty list and title-field",
                    source
                )));
            }
        }
        SeedConfig::Static(s) => {
            if s.urls.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "source '{}' static seed must list at least one URL",
                    source
                )));
            }
            for url in &s.urls {
                validate_http_url(url, source, "seed URL")?;
            }
        }
    }
    Ok(())
}

fn validate_http_url(raw: &str, source: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "source '{}' has invalid {} '{}': {}",
            source, what, raw, e
        ))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "source '{}' {} '{}' must use http or https",
            source, what, raw
        )));
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    let domain = pattern.strip_prefix("*.").unwrap_or(pattern);

    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain pattern '{}' is empty",
            pattern
        )));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with(['.', '-']) || domain.ends_with(['.', '-']) || domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' is malformed",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'lib.ru')",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::Validation(format!("Invalid contact-email: '{}'", email));

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(invalid());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{DatabaseConfig, StaticSeed};
    use crate::config::PaginatedSeed;
    use std::collections::BTreeMap;

    fn crawler() -> CrawlerConfig {
        CrawlerConfig {
            workers: 4,
            request_timeout_secs: 20,
            max_retries: 3,
            delay_ms: 500,
            retry_delay_secs: 60,
            quota_deferral_secs: 300,
            revisit_interval_secs: 2_592_000,
            poll_interval_ms: 5_000,
            progress_interval_secs: 60,
            idle_sleep_ms: 2_000,
            idle_backoff_ms: 5_000,
            stale_claim_secs: 600,
            supplement_backlog: 1_000,
            supplement_ratio: 0.9,
        }
    }

    fn static_source(name: &str) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            target: 10,
            priority: 2,
            follows_links: false,
            link_domain: None,
            link_priority: 2,
            seed: SeedConfig::Static(StaticSeed {
                urls: vec!["http://lib.ru/".to_string()],
            }),
        }
    }

    fn config(sources: Vec<SourceConfig>) -> Config {
        Config {
            database: DatabaseConfig {
                path: "corpus.db".to_string(),
            },
            crawler: crawler(),
            user_agent: UserAgentConfig {
                crawler_name: "CorpusBot".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            sources,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&config(vec![static_source("libru")])).is_ok());
    }

    #[test]
    fn test_requires_a_source() {
        assert!(validate(&config(vec![])).is_err());
    }

    #[test]
    fn test_rejects_duplicate_source_names() {
        let cfg = config(vec![static_source("libru"), static_source("libru")]);
        assert!(matches!(validate(&cfg), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_zero_target() {
        let mut source = static_source("libru");
        source.target = 0;
        assert!(validate(&config(vec![source])).is_err());
    }

    #[test]
    fn test_follows_links_requires_link_domain() {
        let mut source = static_source("libru");
        source.follows_links = true;
        assert!(validate(&config(vec![source.clone()])).is_err());

        source.link_domain = Some("*.lib.ru".to_string());
        assert!(validate(&config(vec![source])).is_ok());
    }

    #[test]
    fn test_rejects_bad_seed_urls() {
        let mut source = static_source("libru");
        source.seed = SeedConfig::Static(StaticSeed {
            urls: vec!["ftp://lib.ru/".to_string()],
        });
        assert!(matches!(
            validate(&config(vec![source])),
            Err(ConfigError::InvalidUrl(_))
        ));

        let mut paginated = static_source("wiki");
        paginated.seed = SeedConfig::Paginated(PaginatedSeed {
            api_url: "not a url".to_string(),
            url_base: "https://ru.wikisource.org/wiki/".to_string(),
            list: "allpages".to_string(),
            title_field: "title".to_string(),
            limit: 10,
            params: BTreeMap::new(),
        });
        assert!(validate(&config(vec![paginated])).is_err());
    }

    #[test]
    fn test_rejects_worker_bounds() {
        let mut cfg = config(vec![static_source("libru")]);
        cfg.crawler.workers = 101;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_rejects_delays_that_overflow_timestamps() {
        let mut cfg = config(vec![static_source("libru")]);
        cfg.crawler.revisit_interval_secs = u64::MAX;
        assert!(matches!(validate(&cfg), Err(ConfigError::Validation(_))));

        let mut cfg = config(vec![static_source("libru")]);
        cfg.crawler.retry_delay_secs = MAX_DELAY_SECS + 1;
        assert!(validate(&cfg).is_err());

        let mut cfg = config(vec![static_source("libru")]);
        cfg.crawler.quota_deferral_secs = MAX_DELAY_SECS;
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_validate_domain_pattern() {
        assert!(validate_domain_pattern("lib.ru").is_ok());
        assert!(validate_domain_pattern("*.lib.ru").is_ok());

        assert!(validate_domain_pattern("").is_err());
        assert!(validate_domain_pattern("*.").is_err());
        assert!(validate_domain_pattern("librus").is_err());
        assert!(validate_domain_pattern(".lib.ru").is_err());
        assert!(validate_domain_pattern("lib..ru").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
        assert!(validate_email("a@b@c.com").is_err());
    }
}
