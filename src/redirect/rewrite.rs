//! Redirect URL construction and the same-host check.
//!
//! # Responsibilities
//! - Swap the host, clear the explicit port
//! - Strip the control keys from the query, keep every other pair verbatim
//! - Decide whether the current host already satisfies the target
//!
//! # Design Decisions
//! - Query pairs are filtered as raw text; nothing is re-encoded
//! - Suffix matching is label-aware: `notexample.com` never matches `example.com`

use thiserror::Error;
use url::{form_urlencoded, Url};

/// Errors raised while rewriting a URL.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("URL {0} cannot carry a host")]
    CannotBeABase(String),

    #[error("invalid redirect host `{host}`: {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: url::ParseError,
    },
}

/// Builds the redirect URL from the original request URL.
#[derive(Debug, Clone)]
pub struct UrlRewriter {
    strip_keys: Vec<String>,
}

impl UrlRewriter {
    /// Rewriter that strips the force and skip keys.
    pub fn new(force_key: impl Into<String>, skip_key: impl Into<String>) -> Self {
        Self {
            strip_keys: vec![force_key.into(), skip_key.into()],
        }
    }

    /// Rewrite `original` to point at `new_hostname`.
    ///
    /// `None` keeps the original host and only clears the port and the
    /// control keys. Scheme, path and fragment are left untouched.
    pub fn rewrite(&self, original: &Url, new_hostname: Option<&str>) -> Result<Url, RewriteError> {
        let mut url = original.clone();

        url.set_port(None)
            .map_err(|_| RewriteError::CannotBeABase(original.to_string()))?;

        if let Some(host) = new_hostname {
            url.set_host(Some(host)).map_err(|source| RewriteError::InvalidHost {
                host: host.to_string(),
                source,
            })?;
        }

        let query = url.query().map(|q| self.strip_query(q));
        url.set_query(query.as_deref().filter(|q| !q.is_empty()));

        Ok(url)
    }

    fn strip_query(&self, query: &str) -> String {
        query
            .split('&')
            .filter(|pair| !pair.is_empty() && !self.is_control_pair(pair))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn is_control_pair(&self, pair: &str) -> bool {
        form_urlencoded::parse(pair.as_bytes())
            .next()
            .map(|(key, _)| self.strip_keys.iter().any(|k| *k == key))
            .unwrap_or(false)
    }
}

impl Default for UrlRewriter {
    fn default() -> Self {
        Self::new("redirect", "skip_geo")
    }
}

/// Whether a request on `current_host` should be redirected to `target`.
///
/// No target always redirects (only the query gets rewritten). A forced
/// redirect always redirects. Otherwise the current host must not already
/// be `target` or a subdomain of it.
pub fn should_redirect(current_host: &str, target: Option<&str>, rewrite_origin_host: bool) -> bool {
    match target {
        None => true,
        Some(_) if rewrite_origin_host => true,
        Some(target) => !host_matches(current_host, target),
    }
}

fn host_matches(current_host: &str, target: &str) -> bool {
    let host = normalize_host(strip_port(current_host));
    let target = normalize_host(target);
    if target.is_empty() {
        return false;
    }

    host == target
        || host
            .strip_suffix(target.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn strip_port(host: &str) -> &str {
    let host = host.trim();
    if let Some(rest) = host.strip_prefix('[') {
        // [v6]:port
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_rewrite_swaps_host_and_clears_port() {
        let rewriter = UrlRewriter::default();
        let out = rewriter
            .rewrite(&url("https://b.example.co.il:8443/path/to?x=1#frag"), Some("a.example.com"))
            .unwrap();
        assert_eq!(out.as_str(), "https://a.example.com/path/to?x=1#frag");
    }

    #[test]
    fn test_rewrite_strips_force_key_and_keeps_order() {
        let rewriter = UrlRewriter::default();
        let out = rewriter
            .rewrite(&url("http://b.example.co.il/?b=2&redirect=1&a=%20x&c"), Some("b.example.co.il"))
            .unwrap();
        assert_eq!(out.query(), Some("b=2&a=%20x&c"));
    }

    #[test]
    fn test_rewrite_drops_empty_query() {
        let rewriter = UrlRewriter::default();
        let out = rewriter.rewrite(&url("http://b.example.co.il/?redirect=1"), None).unwrap();
        assert_eq!(out.as_str(), "http://b.example.co.il/");
        assert_eq!(out.query(), None);
    }

    #[test]
    fn test_rewrite_keeps_host_when_none() {
        let rewriter = UrlRewriter::default();
        let out = rewriter
            .rewrite(&url("http://b.example.co.il:3000/x?redirect&skip_geo=1&keep=yes"), None)
            .unwrap();
        assert_eq!(out.as_str(), "http://b.example.co.il/x?keep=yes");
    }

    #[test]
    fn test_rewrite_custom_keys() {
        let rewriter = UrlRewriter::new("go", "stay");
        let out = rewriter
            .rewrite(&url("http://a.example.com/?go=1&redirect=1"), None)
            .unwrap();
        assert_eq!(out.query(), Some("redirect=1"));
    }

    #[test]
    fn test_rewrite_rejects_invalid_host() {
        let rewriter = UrlRewriter::default();
        let err = rewriter
            .rewrite(&url("http://a.example.com/"), Some("bad host"))
            .unwrap_err();
        assert!(matches!(err, RewriteError::InvalidHost { .. }));
    }

    #[test]
    fn test_should_redirect_suffix_is_label_aware() {
        assert!(!should_redirect("example.com", Some("example.com"), false));
        assert!(!should_redirect("foo.example.com", Some("example.com"), false));
        assert!(!should_redirect("FOO.Example.COM:8080", Some("example.com"), false));
        assert!(should_redirect("notexample.com", Some("example.com"), false));
        assert!(should_redirect("example.com.evil.net", Some("example.com"), false));
    }

    #[test]
    fn test_should_redirect_force_and_missing_target() {
        assert!(should_redirect("b.example.co.il", Some("b.example.co.il"), true));
        assert!(should_redirect("b.example.co.il", None, false));
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("a.example.com:8080"), "a.example.com");
        assert_eq!(strip_port("a.example.com"), "a.example.com");
        assert_eq!(strip_port("[::1]:8080"), "::1");
    }
}
