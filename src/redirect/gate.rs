//! Pre-engine bypass checks.
//!
//! # Responsibilities
//! - Skip flag in the query string (always wins)
//! - Include allow-list and exclude deny-list (exact path matches)
//! - Caller-supplied predicate
//!
//! # Design Decisions
//! - Paths compare exactly: no globbing, query string ignored
//! - Checks run cheapest first

use std::fmt;
use std::sync::Arc;

use crate::redirect::RequestContext;

/// Caller-supplied bypass predicate.
pub type SkipPredicate = Arc<dyn Fn(&RequestContext) -> bool + Send + Sync>;

/// Why a request bypassed the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The skip key was present in the query string.
    Flag,
    /// An include list is configured and the path is not on it.
    NotIncluded,
    /// The path is on the exclude list.
    Excluded,
    /// The predicate returned true.
    Predicate,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Flag => "flag",
            SkipReason::NotIncluded => "not_included",
            SkipReason::Excluded => "excluded",
            SkipReason::Predicate => "predicate",
        }
    }
}

/// Bypass rules evaluated before any decision is made.
#[derive(Clone)]
pub struct Gate {
    skip_key: String,
    include: Vec<String>,
    exclude: Vec<String>,
    skip_if: Option<SkipPredicate>,
}

impl Gate {
    pub fn new(skip_key: impl Into<String>) -> Self {
        Self {
            skip_key: skip_key.into(),
            include: Vec::new(),
            exclude: Vec::new(),
            skip_if: None,
        }
    }

    pub fn include<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn skip_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RequestContext) -> bool + Send + Sync + 'static,
    {
        self.skip_if = Some(Arc::new(predicate));
        self
    }

    pub fn should_skip(&self, ctx: &RequestContext) -> bool {
        self.skip_reason(ctx).is_some()
    }

    /// First rule that bypasses `ctx`, if any.
    pub fn skip_reason(&self, ctx: &RequestContext) -> Option<SkipReason> {
        if ctx.has_query_key(&self.skip_key) {
            return Some(SkipReason::Flag);
        }

        let path = ctx.path();
        if !self.include.is_empty() && !self.include.iter().any(|p| p == path) {
            return Some(SkipReason::NotIncluded);
        }
        if self.exclude.iter().any(|p| p == path) {
            return Some(SkipReason::Excluded);
        }

        match &self.skip_if {
            Some(predicate) if predicate(ctx) => Some(SkipReason::Predicate),
            _ => None,
        }
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new("skip_geo")
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("skip_key", &self.skip_key)
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .field("skip_if", &self.skip_if.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn ctx(url: &str) -> RequestContext {
        RequestContext::new(Url::parse(url).unwrap())
    }

    #[test]
    fn test_skip_flag() {
        let gate = Gate::default();
        assert_eq!(gate.skip_reason(&ctx("http://a.example.com/?skip_geo=true")), Some(SkipReason::Flag));
        assert_eq!(gate.skip_reason(&ctx("http://a.example.com/?skip_geo")), Some(SkipReason::Flag));
        assert!(!gate.should_skip(&ctx("http://a.example.com/?other=1")));
    }

    #[test]
    fn test_skip_flag_wins_over_include() {
        let gate = Gate::default().include(["/include_me"]);
        assert_eq!(
            gate.skip_reason(&ctx("http://a.example.com/include_me?skip_geo=1")),
            Some(SkipReason::Flag)
        );
    }

    #[test]
    fn test_include_list() {
        let gate = Gate::default().include(["/include_me", "/include_me/too"]);
        assert!(!gate.should_skip(&ctx("http://a.example.com/include_me?query_param=value")));
        assert!(!gate.should_skip(&ctx("http://a.example.com/include_me/too")));
        assert_eq!(
            gate.skip_reason(&ctx("http://a.example.com/dont_include_me?query_param=value")),
            Some(SkipReason::NotIncluded)
        );
        // exact match only
        assert!(gate.should_skip(&ctx("http://a.example.com/include_me/not")));
    }

    #[test]
    fn test_exclude_list() {
        let gate = Gate::default().exclude(["/exclude_me"]);
        assert_eq!(
            gate.skip_reason(&ctx("http://a.example.com/exclude_me?query_param=value")),
            Some(SkipReason::Excluded)
        );
        assert!(!gate.should_skip(&ctx("http://a.example.com/dont_exclude_me?query_param=value")));
    }

    #[test]
    fn test_predicate() {
        let gate = Gate::default().skip_if(|ctx| ctx.path().starts_with("/assets"));
        assert_eq!(
            gate.skip_reason(&ctx("http://a.example.com/assets/app.js")),
            Some(SkipReason::Predicate)
        );
        assert!(!gate.should_skip(&ctx("http://a.example.com/")));

        let never = Gate::default().skip_if(|_| false);
        assert!(!never.should_skip(&ctx("http://a.example.com/")));
    }
}
