//! navPlace resolver
//!
//! Turns a IIIF Presentation 3 resource or a Web Annotation resource into a
//! flat, order-stable list of GeoJSON features gathered from anywhere in the
//! document graph.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  NavPlaceResolver::resolve_uri / resolve_document           │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  TraversalSession (walker)                                  │
//! │    items / structures descent, geometry harvest             │
//! └─────────────────────────────────────────────────────────────┘
//!          │                                      │
//!          ▼                                      ▼
//! ┌──────────────────────────────┐  ┌───────────────────────────┐
//! │ FetchGate + ResolutionCache  │  │ FeatureCollector          │
//! │   JsonFetcher (reqwest)      │  │   provenance, properties  │
//! └──────────────────────────────┘  └───────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use navplace_resolver::{NavPlaceResolver, ResolverConfig};
//!
//! let resolver = NavPlaceResolver::http(ResolverConfig::default())?;
//! let resolution = resolver.resolve_uri("https://example.org/manifest.json").await;
//! for feature in &resolution.features {
//!     println!("{:?} {:?}", feature.from_resource(), feature.geometry);
//! }
//! ```

pub mod bootstrap;
pub mod cache;
pub mod collect;
pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod guard;
pub mod resource;
pub mod walker;

pub use bootstrap::RootRequest;
pub use collect::{feature_collection, Feature, FeatureCollector, Provenance, FROM_RESOURCE_KEY};
pub use config::ResolverConfig;
pub use context::{check_presentation_context, ContextCheck};
pub use error::{ConfigError, FetchError};
pub use fetch::{HttpFetcher, InMemoryFetcher, JsonFetcher};
pub use resource::ResourceKind;
pub use walker::{SessionStats, TraversalSession};

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Result of one traversal session
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Features in discovery order
    pub features: Vec<Feature>,
    /// Working copy of the root with resolved references spliced in
    pub resource: Value,
    pub stats: SessionStats,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// The features as a GeoJSON FeatureCollection
    pub fn to_feature_collection(&self) -> Value {
        feature_collection(&self.features)
    }
}

/// Entry point: resolves root documents into features
///
/// Every call runs its own session with a fresh cache and fresh counters,
/// so concurrent calls do not interfere.
#[derive(Clone)]
pub struct NavPlaceResolver {
    fetcher: Arc<dyn JsonFetcher>,
    config: ResolverConfig,
}

impl std::fmt::Debug for NavPlaceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavPlaceResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NavPlaceResolver {
    pub fn new(fetcher: Arc<dyn JsonFetcher>, config: ResolverConfig) -> Self {
        Self { fetcher, config }
    }

    /// Resolver over HTTP using the configured request timeout
    pub fn http(config: ResolverConfig) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self::new(Arc::new(fetcher), config))
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Fetch `uri` and resolve it
    ///
    /// A root that cannot be fetched, or is not a JSON object, yields an
    /// empty resolution.
    pub async fn resolve_uri(&self, uri: &str) -> Resolution {
        let session = TraversalSession::new(self.fetcher.as_ref(), &self.config);
        let root = match session.load_root(uri).await {
            Ok(root) => root,
            Err(e) => {
                tracing::warn!(
                    uri = %uri,
                    error = %e,
                    "Root URI did not resolve; there is no data"
                );
                return Resolution {
                    stats: session.stats(0),
                    ..Resolution::default()
                };
            }
        };
        self.run(session, root).await
    }

    /// Resolve an already-loaded root document
    ///
    /// The resolver rewrites its own copy; clone first if the original is
    /// still needed.
    pub async fn resolve_document(&self, root: Value) -> Resolution {
        let session = TraversalSession::new(self.fetcher.as_ref(), &self.config);
        self.run(session, root).await
    }

    async fn run(&self, session: TraversalSession<'_>, mut root: Value) -> Resolution {
        if !root.is_object() {
            tracing::warn!("Root document is not a JSON object; there is no data");
            return Resolution {
                resource: root,
                stats: session.stats(0),
                ..Resolution::default()
            };
        }

        let Some(kind) = ResourceKind::of(&root) else {
            tracing::warn!(
                declared = ?resource::declared_type(&root),
                "Root resource type is not supported; expected a IIIF Collection, Manifest, \
                 Range, Canvas, or a Web Annotation / AnnotationPage"
            );
            return Resolution {
                resource: root,
                stats: session.stats(0),
                ..Resolution::default()
            };
        };

        if !kind.is_annotation() {
            if let Some(problem) = check_presentation_context(&root).problem() {
                tracing::warn!(kind = %kind, "{}", problem);
            }
        }

        let property = self
            .config
            .geometry_property
            .clone()
            .unwrap_or_else(|| kind.default_geometry_property().to_string());

        let mut collector = FeatureCollector::new();
        session.walk(&mut root, &property, &mut collector).await;

        let harvested = collector.len();
        let root_provenance = Provenance::of(kind, &root);
        let features = collector.into_features(Some(&root_provenance));
        let stats = session.stats(harvested);

        tracing::info!(
            kind = %kind,
            property = %property,
            features = features.len(),
            harvested,
            network_fetches = stats.network_fetches,
            cache_hits = stats.cache_hits,
            nodes_visited = stats.nodes_visited,
            "Resolution complete"
        );

        Resolution {
            features,
            resource: root,
            stats,
        }
    }
}
