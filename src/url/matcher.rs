use url::Url;

/// Checks if a host matches a domain pattern
///
/// Two pattern shapes are supported:
/// 1. Exact: `"lib.ru"` matches only `lib.ru`
/// 2. Wildcard: `"*.lib.ru"` matches `lib.ru` itself and any subdomain of it
///
/// Hosts are expected lowercased, which canonical URLs already guarantee.
///
/// # Examples
///
/// ```
/// use frontier_crawl::url::matches_wildcard;
///
/// assert!(matches_wildcard("lib.ru", "lib.ru"));
/// assert!(!matches_wildcard("lib.ru", "az.lib.ru"));
/// assert!(matches_wildcard("*.lib.ru", "az.lib.ru"));
/// assert!(!matches_wildcard("*.lib.ru", "mylib.ru"));
/// ```
pub fn matches_wildcard(pattern: &str, host: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            host == base
                || host
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => host == pattern,
    }
}

/// Returns true if the URL's host satisfies the pattern
pub fn url_matches(pattern: &str, url: &Url) -> bool {
    url.host_str()
        .is_some_and(|host| matches_wildcard(pattern, host))
}
