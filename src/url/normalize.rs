use crate::UrlError;
use url::{ParseError, Url};

/// Scheme assumed when a URL arrives without one
const DEFAULT_SCHEME: &str = "https";

/// Canonicalizes a URL into the key used by both stores
///
/// # Canonicalization Steps
///
/// 1. Drop the fragment (everything after `#`)
/// 2. Default the scheme to `https` when absent (`//host/...` or `host/...`)
/// 3. Lowercase scheme and host
/// 4. Empty path becomes `/`
/// 5. Keep the query parameters and their order
///
/// Two URLs differing only in fragment or host letter-case produce the same key.
///
/// The key is the WHATWG serialization from the `url` crate, so it also drops
/// the scheme's default port, resolves `.` and `..` path segments and
/// percent-encodes characters outside the URL code points, in the query as
/// well (`?q=a b` becomes `?q=a%20b`). Spellings of one resource that differ
/// only in those respects share a key.
///
/// Relative references (`/wiki/Foo`, `./a`, `?q=1`) have no host to anchor
/// them and are rejected with [`UrlError::MissingHost`]; resolve them against
/// the page URL first.
///
/// # Examples
///
/// ```
/// use frontier_crawl::url::canonicalize;
///
/// let key = canonicalize("HTTPS://Ex.COM/a?b=1#frag").unwrap();
/// assert_eq!(key, "https://ex.com/a?b=1");
/// ```
pub fn canonicalize(url_str: &str) -> Result<String, UrlError> {
    let trimmed = url_str.trim();
    let without_fragment = trimmed.split('#').next().unwrap_or_default();

    let mut url = match Url::parse(without_fragment) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) => parse_with_default_scheme(without_fragment)?,
        Err(e) => return Err(UrlError::Parse(format!("{}: {}", url_str, e))),
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    // The url crate lowercases scheme and host and gives special schemes a "/" path
    if url.path().is_empty() {
        url.set_path("/");
    }
    url.set_fragment(None);

    Ok(url.to_string())
}

fn parse_with_default_scheme(raw: &str) -> Result<Url, UrlError> {
    let candidate = if raw.starts_with("//") {
        format!("{}:{}", DEFAULT_SCHEME, raw)
    } else if raw.starts_with(['/', '.', '?']) {
        return Err(UrlError::MissingHost);
    } else {
        format!("{}://{}", DEFAULT_SCHEME, raw)
    };

    Url::parse(&candidate).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_fragment() {
        assert_eq!(
            canonicalize("https://ex.com/a#frag").unwrap(),
            "https://ex.com/a"
        );
    }

    #[test]
    fn test_fragment_variants_share_key() {
        let a = canonicalize("https://ex.com/a").unwrap();
        let b = canonicalize("https://ex.com/a#frag").unwrap();
        let c = canonicalize("https://EX.com/a#other").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_lowercases_scheme_and_host() {
        assert_eq!(
            canonicalize("HTTP://WWW.Example.COM/Page").unwrap(),
            "http://www.example.com/Page"
        );
    }

    #[test]
    fn test_keeps_path_case() {
        assert_eq!(
            canonicalize("https://example.com/CaseSensitive/Path").unwrap(),
            "https://example.com/CaseSensitive/Path"
        );
    }

    #[test]
    fn test_empty_path_becomes_root() {
        assert_eq!(
            canonicalize("https://example.com").unwrap(),
            "https://example.com/"
        );
    }

    #[test]
    fn test_preserves_query() {
        assert_eq!(
            canonicalize("https://example.com/index.php?title=Main&b=2").unwrap(),
            "https://example.com/index.php?title=Main&b=2"
        );
    }

    #[test]
    fn test_query_order_is_not_changed() {
        assert_ne!(
            canonicalize("https://example.com/?a=1&b=2").unwrap(),
            canonicalize("https://example.com/?b=2&a=1").unwrap()
        );
    }

    #[test]
    fn test_defaults_missing_scheme() {
        assert_eq!(
            canonicalize("example.com/page").unwrap(),
            "https://example.com/page"
        );
        assert_eq!(
            canonicalize("//Example.com/page").unwrap(),
            "https://example.com/page"
        );
    }

    #[test]
    fn test_http_scheme_is_kept() {
        assert_eq!(
            canonicalize("http://lib.ru/PROZA/").unwrap(),
            "http://lib.ru/PROZA/"
        );
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(matches!(
            canonicalize("ftp://example.com/file"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(canonicalize("mailto:someone@example.com").is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(canonicalize("https://").is_err());
        assert!(canonicalize("").is_err());
    }

    #[test]
    fn test_rejects_relative_references() {
        for relative in ["/wiki/Foo", "/", "./a.html", "../up/b.html", "?page=2"] {
            assert!(
                matches!(canonicalize(relative), Err(UrlError::MissingHost)),
                "{} should have no host",
                relative
            );
        }
    }

    #[test]
    fn test_serialization_normalizes_port_dots_and_encoding() {
        assert_eq!(
            canonicalize("https://ex.com:443/a/../b").unwrap(),
            "https://ex.com/b"
        );
        assert_eq!(
            canonicalize("http://ex.com:8080/a").unwrap(),
            "http://ex.com:8080/a"
        );
        assert_eq!(
            canonicalize("https://ex.com/s?q=a b&t=1").unwrap(),
            "https://ex.com/s?q=a%20b&t=1"
        );
    }

    #[test]
    fn test_is_deterministic() {
        let input = "https://Ru.Wikisource.org/wiki/Война_и_мир#Глава";
        assert_eq!(canonicalize(input).unwrap(), canonicalize(input).unwrap());
    }
}
