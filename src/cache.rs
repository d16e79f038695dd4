//! Resolution cache
//!
//! Maps canonicalized URIs to fetched documents for one traversal session.
//! A body is registered under both the requested URI and its own declared
//! identity, so two references that land on the same resource share one
//! entry. Failed fetches are remembered too, so a dead URI is requested at
//! most once per session.

use crate::resource::identity;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Canonical cache key for a URI
///
/// The fragment is always dropped; the query string only when
/// `strip_query` is set. Unparseable input is trimmed at the first `#`.
pub fn canonicalize(uri: &str, strip_query: bool) -> String {
    let trimmed = uri.trim();
    match url::Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            if strip_query {
                url.set_query(None);
            }
            url.to_string()
        }
        Err(_) => {
            let without_fragment = trimmed.split('#').next().unwrap_or(trimmed);
            if strip_query {
                without_fragment
                    .split('?')
                    .next()
                    .unwrap_or(without_fragment)
                    .to_string()
            } else {
                without_fragment.to_string()
            }
        }
    }
}

/// Result of a cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// Previously fetched body
    Hit(Value),
    /// Previously attempted and failed
    Failed,
    /// Never attempted in this session
    Miss,
}

#[derive(Debug)]
struct CacheEntry {
    /// `None` for a failed fetch
    body: Option<Value>,
    /// Logical lookups served by this entry, including the first fetch
    fetch_count: usize,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: Vec<CacheEntry>,
    keys: HashMap<String, usize>,
    hits: usize,
}

/// Per-session resolution cache
#[derive(Debug, Default)]
pub struct ResolutionCache {
    strip_query: bool,
    state: Mutex<CacheState>,
}

impl ResolutionCache {
    pub fn new(strip_query: bool) -> Self {
        Self {
            strip_query,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn key(&self, uri: &str) -> String {
        canonicalize(uri, self.strip_query)
    }

    /// Look up a URI as part of a logical dereference
    ///
    /// Bumps the entry's fetch count. The first lookup of a warmed entry
    /// stands in for its fetch and is not counted as a hit.
    pub fn lookup(&self, uri: &str) -> CacheLookup {
        let key = self.key(uri);
        let Ok(mut state) = self.state.lock() else {
            return CacheLookup::Miss;
        };
        let Some(&index) = state.keys.get(&key) else {
            return CacheLookup::Miss;
        };
        if state.entries[index].fetch_count > 0 {
            state.hits += 1;
        }
        let entry = &mut state.entries[index];
        entry.fetch_count += 1;
        match &entry.body {
            Some(body) => CacheLookup::Hit(body.clone()),
            None => CacheLookup::Failed,
        }
    }

    /// Whether a URI has been attempted, without counting a lookup
    pub fn contains(&self, uri: &str) -> bool {
        let key = self.key(uri);
        self.state
            .lock()
            .map(|state| state.keys.contains_key(&key))
            .unwrap_or(false)
    }

    /// Store a fetched body under the requested URI and its declared identity
    ///
    /// `counted` records the store as a logical lookup (a direct
    /// dereference) rather than a cache warm-up.
    pub fn store(&self, requested: &str, body: Value, counted: bool) {
        let mut keys = vec![self.key(requested)];
        if let Some(declared) = identity(&body) {
            let declared = self.key(declared);
            if !keys.contains(&declared) {
                keys.push(declared);
            }
        }
        self.insert(keys, Some(body), counted);
    }

    /// Remember that fetching `requested` failed
    pub fn store_failure(&self, requested: &str, counted: bool) {
        self.insert(vec![self.key(requested)], None, counted);
    }

    fn insert(&self, keys: Vec<String>, body: Option<Value>, counted: bool) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        // A concurrent fetch may already have filled one of the keys; the
        // later body replaces it and inherits its count.
        let existing = keys.iter().find_map(|k| state.keys.get(k).copied());
        let index = match existing {
            Some(index) => {
                let entry = &mut state.entries[index];
                if body.is_some() {
                    entry.body = body;
                }
                index
            }
            None => {
                state.entries.push(CacheEntry {
                    body,
                    fetch_count: 0,
                });
                state.entries.len() - 1
            }
        };
        if counted {
            state.entries[index].fetch_count += 1;
        }
        for key in keys {
            state.keys.insert(key, index);
        }
    }

    /// Repeat lookups served this session
    pub fn hits(&self) -> usize {
        self.state.lock().map(|s| s.hits).unwrap_or(0)
    }

    /// Number of distinct resources held
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Logical lookups per cache key
    pub fn fetch_counts(&self) -> HashMap<String, usize> {
        let Ok(state) = self.state.lock() else {
            return HashMap::new();
        };
        state
            .keys
            .iter()
            .map(|(key, &index)| (key.clone(), state.entries[index].fetch_count))
            .collect()
    }
}
