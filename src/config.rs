//! Resolver configuration
//!
//! Loads traversal limits and switches from defaults, an optional YAML
//! file, and `NAVPLACE_*` environment variables (in that order).

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// Default ceiling for network fetches per session
pub const DEFAULT_MAX_FETCHES: usize = 1000;

/// Default ceiling for visited nodes plus harvested results per session
pub const DEFAULT_MAX_VISITS: usize = 1000;

/// Default number of fetches allowed in flight at once
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 5;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration for one resolver (shared by all its sessions)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Dereference referenced resources and geometry
    pub resolve_references: bool,
    /// Descend below the immediate children of the root
    pub deep_traversal: bool,
    /// Maximum network fetches per session
    pub max_fetches: usize,
    /// Maximum visited nodes plus harvested results per session
    pub max_visits: usize,
    /// Maximum simultaneous in-flight fetches
    pub max_concurrent_fetches: usize,
    /// HTTP request timeout
    pub request_timeout_secs: u64,
    /// Also strip the query string when building cache keys
    pub strip_query_from_keys: bool,
    /// Geometry property to search for; chosen from the root kind when unset
    pub geometry_property: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            resolve_references: true,
            deep_traversal: true,
            max_fetches: DEFAULT_MAX_FETCHES,
            max_visits: DEFAULT_MAX_VISITS,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            strip_query_from_keys: false,
            geometry_property: None,
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a YAML file. Missing keys keep their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ResolverConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `NAVPLACE_*` environment variable overrides
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("NAVPLACE_RESOLVE_REFERENCES") {
            self.resolve_references = parse_flag("NAVPLACE_RESOLVE_REFERENCES", &v)?;
        }
        if let Some(v) = lookup("NAVPLACE_DEEP_TRAVERSAL") {
            self.deep_traversal = parse_flag("NAVPLACE_DEEP_TRAVERSAL", &v)?;
        }
        if let Some(v) = lookup("NAVPLACE_MAX_FETCHES") {
            self.max_fetches = parse_count("NAVPLACE_MAX_FETCHES", &v)?;
        }
        if let Some(v) = lookup("NAVPLACE_MAX_VISITS") {
            self.max_visits = parse_count("NAVPLACE_MAX_VISITS", &v)?;
        }
        if let Some(v) = lookup("NAVPLACE_MAX_CONCURRENT_FETCHES") {
            self.max_concurrent_fetches = parse_count("NAVPLACE_MAX_CONCURRENT_FETCHES", &v)?;
        }
        if let Some(v) = lookup("NAVPLACE_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs =
                parse_count("NAVPLACE_REQUEST_TIMEOUT_SECS", &v)? as u64;
        }
        if let Some(v) = lookup("NAVPLACE_GEOMETRY_PROPERTY") {
            if !v.trim().is_empty() {
                self.geometry_property = Some(v.trim().to_string());
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn with_resolve_references(mut self, resolve: bool) -> Self {
        self.resolve_references = resolve;
        self
    }

    pub fn with_deep_traversal(mut self, deep: bool) -> Self {
        self.deep_traversal = deep;
        self
    }

    pub fn with_max_fetches(mut self, max: usize) -> Self {
        self.max_fetches = max;
        self
    }

    pub fn with_max_visits(mut self, max: usize) -> Self {
        self.max_visits = max;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max;
        self
    }

    pub fn with_geometry_property(mut self, property: impl Into<String>) -> Self {
        self.geometry_property = Some(property.into());
        self
    }

    pub fn with_strip_query_from_keys(mut self, strip: bool) -> Self {
        self.strip_query_from_keys = strip;
        self
    }

    /// Reject settings that would make every session a no-op or hang forever
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_fetches", self.max_fetches),
            ("max_visits", self.max_visits),
            ("max_concurrent_fetches", self.max_concurrent_fetches),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Parse a boolean switch as written in query strings and env files
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_flag(field: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: format!("expected a boolean, got '{}'", value),
    })
}

fn parse_count(field: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|e| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("{} ('{}')", e, value),
        })
}
