//! Graph walker
//!
//! Depth-first descent over a IIIF / Web Annotation document. For every
//! supported resource the walker dereferences referenced children, descends
//! through `items` and `structures`, and harvests the geometry property.
//!
//! All mutable traversal state (cache, ceilings, switches) lives in one
//! `TraversalSession`, created per top-level call. The walker owns the
//! working copy of the document and rewrites it in place: resolved
//! children and geometry replace their references, so a second pass over
//! the same subtree costs nothing.
//!
//! Pending work is kept on an explicit stack of paths into the working
//! copy rather than on the call stack, so nesting depth is bounded only by
//! the visit ceiling.

use crate::cache::{CacheLookup, ResolutionCache};
use crate::collect::{denormalize, FeatureCollector, Provenance};
use crate::config::ResolverConfig;
use crate::error::FetchError;
use crate::fetch::JsonFetcher;
use crate::guard::{FetchGate, TraversalGuard};
use crate::resource::{
    geometry_reference, has_geometry_content, pending_reference, ResourceKind, ITEMS_KEY,
    RECURSE_KEYS, STRUCTURES_KEY,
};
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tokio::sync::Semaphore;

/// Outcome of dereferencing one URI
#[derive(Debug, Clone, PartialEq)]
pub enum Dereferenced {
    /// Fetched now or served from the cache
    Resolved(Value),
    /// The fetch failed; the reference is treated as empty
    Unreachable,
    /// Fetching is disabled or the fetch ceiling was reached
    Skipped,
}

/// Counters reported at the end of a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    /// Network fetch attempts (successful or not)
    pub network_fetches: usize,
    /// Repeat dereferences answered from the cache. The first lookup of a
    /// prefetched URI counts as its fetch, not as a hit.
    pub cache_hits: usize,
    /// Visited nodes plus harvested results
    pub nodes_visited: usize,
    /// Harvested geometry values before flattening
    pub harvested: usize,
    pub fetch_limit_reached: bool,
    pub visit_limit_reached: bool,
    /// Logical lookups per canonical URI
    pub reference_counts: HashMap<String, usize>,
}

/// One step from the root of the working copy towards a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Key(&'static str),
    Index(usize),
}

type Path = Vec<Step>;

fn child(path: &[Step], step: Step) -> Path {
    let mut child = Vec::with_capacity(path.len() + 1);
    child.extend_from_slice(path);
    child.push(step);
    child
}

fn node_at<'v>(root: &'v mut Value, path: &[Step]) -> Option<&'v mut Value> {
    path.iter().try_fold(root, |node, step| match *step {
        Step::Key(key) => node.get_mut(key),
        Step::Index(index) => node.get_mut(index),
    })
}

/// Unit of pending work, popped in document order
#[derive(Debug)]
enum Task {
    /// Walk the array or resource at the path
    Visit(Path),
    /// Dereference one array element, then walk or harvest it
    Item(Path),
    /// Harvest the geometry property of the resource at the path
    Harvest(Path, ResourceKind),
}

/// State for one traversal of one root document
pub struct TraversalSession<'f> {
    fetcher: &'f dyn JsonFetcher,
    deep: bool,
    cache: ResolutionCache,
    gate: FetchGate,
    guard: TraversalGuard,
    limiter: Semaphore,
    max_concurrent: usize,
}

impl<'f> TraversalSession<'f> {
    pub fn new(fetcher: &'f dyn JsonFetcher, config: &ResolverConfig) -> Self {
        let max_concurrent = config.max_concurrent_fetches.max(1);
        Self {
            fetcher,
            deep: config.deep_traversal,
            cache: ResolutionCache::new(config.strip_query_from_keys),
            gate: FetchGate::new(config.resolve_references, config.max_fetches),
            guard: TraversalGuard::new(config.max_visits),
            limiter: Semaphore::new(max_concurrent),
            max_concurrent,
        }
    }

    /// Resolve a URI through the cache, fetching it at most once
    ///
    /// Counts as one logical lookup of the URI.
    pub async fn dereference(&self, uri: &str) -> Dereferenced {
        if !self.gate.is_enabled() {
            return Dereferenced::Skipped;
        }
        match self.cache.lookup(uri) {
            CacheLookup::Hit(body) => {
                tracing::debug!(uri = %uri, "Served reference from cache");
                return Dereferenced::Resolved(body);
            }
            CacheLookup::Failed => return Dereferenced::Unreachable,
            CacheLookup::Miss => {}
        }
        self.fetch(uri, true).await
    }

    /// Fetch the root document
    ///
    /// Bypasses the resolve-references switch but still counts against the
    /// fetch ceiling and seeds the cache, so references back to the root
    /// are never fetched again.
    pub async fn load_root(&self, uri: &str) -> Result<Value, FetchError> {
        self.gate.record_fetch();
        let body = self.fetcher.fetch_json(uri).await?;
        self.cache.store(uri, body.clone(), true);
        Ok(body)
    }

    /// Fetch into the cache without counting a logical lookup
    async fn warm(&self, uri: String) {
        if self.cache.contains(&uri) || !self.guard.should_continue() {
            return;
        }
        let _ = self.fetch(&uri, false).await;
    }

    async fn fetch(&self, uri: &str, counted: bool) -> Dereferenced {
        let Ok(_permit) = self.limiter.acquire().await else {
            return Dereferenced::Skipped;
        };
        // Another branch may have filled the entry while this one waited.
        if self.cache.contains(uri) {
            if !counted {
                return Dereferenced::Skipped;
            }
            return match self.cache.lookup(uri) {
                CacheLookup::Hit(body) => Dereferenced::Resolved(body),
                CacheLookup::Failed => Dereferenced::Unreachable,
                CacheLookup::Miss => Dereferenced::Skipped,
            };
        }
        if !self.gate.try_acquire() {
            return Dereferenced::Skipped;
        }

        tracing::debug!(uri = %uri, "Fetching reference");
        match self.fetcher.fetch_json(uri).await {
            Ok(body) => {
                self.cache.store(uri, body.clone(), counted);
                Dereferenced::Resolved(body)
            }
            Err(e) => {
                tracing::warn!(uri = %uri, error = %e, "Reference did not resolve");
                self.cache.store_failure(uri, counted);
                Dereferenced::Unreachable
            }
        }
    }

    /// Fetch sibling references concurrently so the in-order pass below
    /// is served from the cache
    ///
    /// Every dereferenced sibling costs at least one visit, so no more
    /// siblings are warmed than the visit ceiling still allows.
    async fn prefetch(&self, items: &[Value]) {
        if !self.gate.is_enabled() {
            return;
        }
        let budget = self.guard.remaining();
        let mut seen = HashSet::new();
        let uris: Vec<String> = items
            .iter()
            .filter_map(pending_reference)
            .filter(|uri| seen.insert(self.cache.key(uri)))
            .filter(|uri| !self.cache.contains(uri))
            .take(budget)
            .collect();
        if uris.len() < 2 {
            return;
        }
        tracing::debug!(count = uris.len(), "Prefetching sibling references");
        stream::iter(uris)
            .map(|uri| self.warm(uri))
            .buffer_unordered(self.max_concurrent)
            .collect::<Vec<()>>()
            .await;
    }

    /// Walk `root`, harvesting `property` into `acc`
    pub async fn walk(&self, root: &mut Value, property: &str, acc: &mut FeatureCollector) {
        let mut stack = vec![Task::Visit(Path::new())];

        while let Some(task) = stack.pop() {
            if !self.guard.should_continue() {
                return;
            }
            match task {
                Task::Visit(path) => self.visit(root, path, property, &mut stack).await,
                Task::Item(path) => self.visit_item(root, path, property, acc, &mut stack).await,
                Task::Harvest(path, kind) => {
                    if let Some(owner) = node_at(root, &path) {
                        self.harvest(owner, kind, property, acc).await;
                    }
                }
            }
        }
    }

    async fn visit(&self, root: &mut Value, path: Path, property: &str, stack: &mut Vec<Task>) {
        let Some(node) = node_at(root, &path) else {
            return;
        };
        if let Some(items) = node.as_array() {
            if self.deep {
                self.prefetch(items).await;
            }
            let len = items.len();
            stack.extend((0..len).rev().map(|i| Task::Item(child(&path, Step::Index(i)))));
        } else if node.is_object() {
            self.expand_resource(node, &path, property, stack);
        }
    }

    /// Record the visit and queue the resource's keys in document order
    fn expand_resource(&self, node: &Value, path: &[Step], property: &str, stack: &mut Vec<Task>) {
        self.guard.record_visit();

        // Objects of any other type are inert.
        let Some(kind) = ResourceKind::of(node) else {
            return;
        };
        let Some(map) = node.as_object() else {
            return;
        };
        let skip_items = kind.prefers_structures()
            && map.get(ITEMS_KEY).map(Value::is_array).unwrap_or(false)
            && map
                .get(STRUCTURES_KEY)
                .and_then(Value::as_array)
                .map(|s| !s.is_empty())
                .unwrap_or(false);

        let mut pending = Vec::new();
        for key in map.keys() {
            if key == property {
                pending.push(Task::Harvest(path.to_vec(), kind));
                continue;
            }
            let Some(recurse) = RECURSE_KEYS.into_iter().find(|k| *k == key.as_str()) else {
                continue;
            };
            if recurse == ITEMS_KEY && skip_items {
                tracing::debug!(kind = %kind, "Structures take precedence over items");
                continue;
            }
            if map.get(recurse).map(Value::is_array).unwrap_or(false) {
                pending.push(Task::Visit(child(path, Step::Key(recurse))));
            }
        }
        stack.extend(pending.into_iter().rev());
    }

    async fn visit_item(
        &self,
        root: &mut Value,
        path: Path,
        property: &str,
        acc: &mut FeatureCollector,
        stack: &mut Vec<Task>,
    ) {
        let Some(item) = node_at(root, &path) else {
            return;
        };
        if let Some(uri) = pending_reference(item) {
            match self.dereference(&uri).await {
                Dereferenced::Resolved(body) => *item = body,
                Dereferenced::Unreachable => *item = Value::Object(Map::new()),
                Dereferenced::Skipped => {}
            }
        }
        if self.deep {
            stack.push(Task::Visit(path));
        } else if let Some(kind) = ResourceKind::of(item) {
            self.guard.record_visit();
            self.harvest(item, kind, property, acc).await;
        }
    }

    /// Harvest `owner[property]`, dereferencing it first when it is a
    /// reference. A value that still has no content is dropped.
    async fn harvest(
        &self,
        owner: &mut Value,
        kind: ResourceKind,
        property: &str,
        acc: &mut FeatureCollector,
    ) {
        let Some(value) = owner.get(property) else {
            return;
        };
        if let Some(uri) = geometry_reference(value) {
            let resolved = match self.dereference(&uri).await {
                Dereferenced::Resolved(body) => body,
                Dereferenced::Unreachable => Value::Object(Map::new()),
                Dereferenced::Skipped => return,
            };
            if let Some(slot) = owner.get_mut(property) {
                *slot = resolved;
            }
        }

        let provenance = Provenance::of(kind, owner);
        let Some(geometry) = owner.get_mut(property) else {
            return;
        };
        if !has_geometry_content(geometry) {
            tracing::debug!(
                kind = %kind,
                property = %property,
                "Dropping geometry without content"
            );
            return;
        }
        denormalize(geometry, &provenance);
        acc.push(geometry.clone(), provenance);
        self.guard.record_result();
    }

    pub fn stats(&self, harvested: usize) -> SessionStats {
        SessionStats {
            network_fetches: self.gate.attempts(),
            cache_hits: self.cache.hits(),
            nodes_visited: self.guard.visits(),
            harvested,
            fetch_limit_reached: self.gate.limit_reached(),
            visit_limit_reached: self.guard.limit_reached(),
            reference_counts: self.cache.fetch_counts(),
        }
    }
}
