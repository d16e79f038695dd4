//! Root request extraction
//!
//! A viewer page is opened as `?iiif-content=<uri>` (or `?data-uri=<uri>`)
//! with optional `resolve-references` and `deep-traversal` switches.

use crate::config::{parse_bool, ResolverConfig};
use url::form_urlencoded;

/// Query parameters naming the root document, in priority order
pub const ROOT_PARAMS: [&str; 2] = ["iiif-content", "data-uri"];

pub const RESOLVE_PARAM: &str = "resolve-references";
pub const DEEP_PARAM: &str = "deep-traversal";

/// Root URI plus the two optional traversal switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRequest {
    pub uri: String,
    pub resolve_references: Option<bool>,
    pub deep_traversal: Option<bool>,
}

impl RootRequest {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            resolve_references: None,
            deep_traversal: None,
        }
    }

    /// Parse a query string (with or without the leading `?`)
    pub fn from_query_string(query: &str) -> Option<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let lookup = |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };

        let uri = ROOT_PARAMS
            .iter()
            .find_map(|name| lookup(*name).filter(|v| !v.trim().is_empty()))?;

        Some(Self {
            uri: uri.trim().to_string(),
            resolve_references: lookup(RESOLVE_PARAM).and_then(parse_bool),
            deep_traversal: lookup(DEEP_PARAM).and_then(parse_bool),
        })
    }

    /// Parse a full viewer URL; a URL without a root parameter is taken as
    /// the root document itself
    pub fn from_viewer_url(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if let Ok(url) = url::Url::parse(input) {
            if let Some(request) = url.query().and_then(Self::from_query_string) {
                return Some(request);
            }
        }
        Some(Self::new(input))
    }

    /// Apply the request's switches on top of `config`
    pub fn apply_to(&self, config: ResolverConfig) -> ResolverConfig {
        let mut config = config;
        if let Some(resolve) = self.resolve_references {
            config.resolve_references = resolve;
        }
        if let Some(deep) = self.deep_traversal {
            config.deep_traversal = deep;
        }
        config
    }
}
