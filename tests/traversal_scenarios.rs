//! End-to-end traversal scenarios
//!
//! Every test drives `NavPlaceResolver` through `InMemoryFetcher`, which
//! records the URIs requested so fetch counts can be asserted.

use navplace_resolver::{Feature, InMemoryFetcher, NavPlaceResolver, ResolverConfig};
use serde_json::{json, Map, Value};
use std::sync::Arc;

const P3: &str = "http://iiif.io/api/presentation/3/context.json";

fn point(name: &str) -> Value {
    json!({
        "type": "Feature",
        "properties": {"name": name},
        "geometry": {"type": "Point", "coordinates": [-90.2, 38.6]}
    })
}

fn collection_of(names: &[&str]) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": names.iter().map(|n| point(n)).collect::<Vec<_>>()
    })
}

fn names(features: &[Feature]) -> Vec<&str> {
    features
        .iter()
        .map(|f| f.property_str("name").unwrap_or("?"))
        .collect()
}

fn resolver(fetcher: &Arc<InMemoryFetcher>, config: ResolverConfig) -> NavPlaceResolver {
    NavPlaceResolver::new(fetcher.clone(), config)
}

#[tokio::test]
async fn test_canvas_thumbnail_from_painting_body() {
    let fetcher = Arc::new(InMemoryFetcher::new());
    let canvas = json!({
        "@context": P3,
        "id": "https://example.org/canvas/1",
        "type": "Canvas",
        "navPlace": collection_of(&["A"]),
        "items": [{
            "id": "https://example.org/canvas/1/page",
            "type": "AnnotationPage",
            "items": [{
                "id": "https://example.org/canvas/1/painting",
                "type": "Annotation",
                "motivation": "painting",
                "body": {"id": "https://img/1.jpg", "type": "Image"},
                "target": "https://example.org/canvas/1"
            }]
        }]
    });

    let resolution = resolver(&fetcher, ResolverConfig::default())
        .resolve_document(canvas)
        .await;

    assert_eq!(names(&resolution.features), vec!["A"]);
    let a = &resolution.features[0];
    assert_eq!(a.property_str("thumbnail"), Some("https://img/1.jpg"));
    assert_eq!(a.property_str("canvas"), Some("https://example.org/canvas/1"));
    assert_eq!(a.from_resource(), Some("Canvas"));
    assert!(fetcher.requests().is_empty());
}

#[tokio::test]
async fn test_collection_of_manifests_with_referenced_navplace() {
    let fetcher = Arc::new(
        InMemoryFetcher::new()
            .with_document("https://example.org/collection", json!({
                "@context": P3,
                "id": "https://example.org/collection",
                "type": "Collection",
                "label": {"en": ["Travel journals"]},
                "items": [
                    {
                        "id": "https://example.org/manifest/1",
                        "type": "Manifest",
                        "label": {"en": ["Journal one"]},
                        "navPlace": {
                            "id": "https://example.org/geo/1.json",
                            "type": "FeatureCollection"
                        },
                        "items": []
                    },
                    {
                        "id": "https://example.org/manifest/2",
                        "type": "Manifest",
                        "navPlace": {
                            "id": "https://example.org/geo/2.json",
                            "type": "FeatureCollection"
                        },
                        "items": []
                    }
                ]
            }))
            .with_document("https://example.org/geo/1.json", collection_of(&["m1-a", "m1-b"]))
            .with_document("https://example.org/geo/2.json", collection_of(&["m2-a"])),
    );

    let resolution = resolver(&fetcher, ResolverConfig::default())
        .resolve_uri("https://example.org/collection")
        .await;

    assert_eq!(names(&resolution.features), vec!["m1-a", "m1-b", "m2-a"]);
    assert!(resolution
        .features
        .iter()
        .all(|f| f.from_resource() == Some("Manifest")));
    assert_eq!(fetcher.request_count("https://example.org/geo/1.json"), 1);
    assert_eq!(fetcher.request_count("https://example.org/geo/2.json"), 1);
    // root + one per distinct navPlace URI
    assert_eq!(resolution.stats.network_fetches, 3);

    let first = &resolution.features[0];
    assert_eq!(first.property_str("manifest"), Some("https://example.org/manifest/1"));
    assert_eq!(first.property("label"), Some(&json!({"en": ["Journal one"]})));
    assert_eq!(first.property_str("collection"), Some("https://example.org/collection"));

    // The second manifest has no label of its own; the collection's fills in.
    let third = &resolution.features[2];
    assert_eq!(third.property("label"), Some(&json!({"en": ["Travel journals"]})));
}

#[tokio::test]
async fn test_unreachable_navplace_is_dropped_silently() {
    let fetcher = Arc::new(
        InMemoryFetcher::new().with_status("https://example.org/geo/missing.json", 404),
    );
    let manifest = json!({
        "@context": P3,
        "id": "https://example.org/manifest",
        "type": "Manifest",
        "navPlace": {"id": "https://example.org/geo/missing.json", "type": "FeatureCollection"},
        "items": [{
            "id": "https://example.org/canvas/1",
            "type": "Canvas",
            "navPlace": collection_of(&["canvas-1"]),
            "items": []
        }]
    });

    let resolution = resolver(&fetcher, ResolverConfig::default())
        .resolve_document(manifest)
        .await;

    assert_eq!(names(&resolution.features), vec!["canvas-1"]);
    assert_eq!(resolution.resource["navPlace"], json!({}));
    assert_eq!(fetcher.request_count("https://example.org/geo/missing.json"), 1);
}

#[tokio::test]
async fn test_structures_take_precedence_over_items() {
    let fetcher = Arc::new(InMemoryFetcher::new().with_document(
        "https://example.org/canvas/2",
        json!({
            "id": "https://example.org/canvas/2",
            "type": "Canvas",
            "navPlace": collection_of(&["outline-canvas"]),
            "items": []
        }),
    ));
    let manifest = json!({
        "@context": P3,
        "id": "https://example.org/manifest",
        "type": "Manifest",
        "items": [
            {
                "id": "https://example.org/canvas/1",
                "type": "Canvas",
                "navPlace": collection_of(&["flat-canvas"]),
                "items": []
            }
        ],
        "structures": [{
            "id": "https://example.org/range/1",
            "type": "Range",
            "navPlace": collection_of(&["chapter"]),
            "items": [{"id": "https://example.org/canvas/2", "type": "Canvas"}]
        }]
    });

    let resolution = resolver(&fetcher, ResolverConfig::default())
        .resolve_document(manifest)
        .await;

    assert_eq!(names(&resolution.features), vec!["chapter", "outline-canvas"]);
    assert_eq!(resolution.features[0].from_resource(), Some("Range"));
    assert_eq!(resolution.features[1].from_resource(), Some("Canvas"));
}

#[tokio::test]
async fn test_empty_structures_do_not_suppress_items() {
    let fetcher = Arc::new(InMemoryFetcher::new());
    let manifest = json!({
        "id": "https://example.org/manifest",
        "type": "Manifest",
        "items": [{
            "id": "https://example.org/canvas/1",
            "type": "Canvas",
            "navPlace": collection_of(&["flat-canvas"]),
            "items": []
        }],
        "structures": []
    });

    let resolution = resolver(&fetcher, ResolverConfig::default())
        .resolve_document(manifest)
        .await;

    assert_eq!(names(&resolution.features), vec!["flat-canvas"]);
}

#[tokio::test]
async fn test_self_referencing_collection_terminates() {
    let uri = "https://example.org/collection/loop";
    let fetcher = Arc::new(InMemoryFetcher::new().with_document(
        uri,
        json!({
            "@context": P3,
            "id": uri,
            "type": "Collection",
            "navPlace": collection_of(&["loop"]),
            "items": [{"id": uri, "type": "Collection"}]
        }),
    ));

    let resolution = resolver(&fetcher, ResolverConfig::default().with_max_visits(25))
        .resolve_uri(uri)
        .await;

    assert!(!resolution.is_empty());
    assert!(resolution.features.iter().all(|f| f.property_str("name") == Some("loop")));
    assert!(resolution.stats.visit_limit_reached);
    assert_eq!(fetcher.request_count(uri), 1);
    assert!(resolution.stats.nodes_visited >= 25);
}

#[tokio::test]
async fn test_self_referencing_collection_at_default_ceiling() {
    let uri = "https://example.org/collection/loop";
    let fetcher = Arc::new(InMemoryFetcher::new().with_document(
        uri,
        json!({
            "@context": P3,
            "id": uri,
            "type": "Collection",
            "navPlace": collection_of(&["loop"]),
            "items": [{"id": uri, "type": "Collection"}]
        }),
    ));

    let resolution = resolver(&fetcher, ResolverConfig::default())
        .resolve_uri(uri)
        .await;

    // Each level costs one visit and one harvested result.
    assert_eq!(resolution.features.len(), 500);
    assert_eq!(resolution.stats.nodes_visited, 1000);
    assert!(resolution.stats.visit_limit_reached);
    assert_eq!(resolution.stats.network_fetches, 1);
}

#[tokio::test]
async fn test_deep_embedded_chain_reaches_leaf() {
    let depth = 900;
    let leaf_id = "https://example.org/collection/leaf";
    let mut node = json!({
        "id": leaf_id,
        "type": "Collection",
        "navPlace": collection_of(&["leaf"]),
        "items": []
    });
    for level in (0..depth).rev() {
        let mut parent = Map::new();
        parent.insert(
            "id".to_string(),
            Value::String(format!("https://example.org/collection/{}", level)),
        );
        parent.insert("type".to_string(), Value::String("Collection".to_string()));
        parent.insert("items".to_string(), Value::Array(vec![node]));
        node = Value::Object(parent);
    }
    let fetcher = Arc::new(InMemoryFetcher::new());

    let resolution = resolver(&fetcher, ResolverConfig::default())
        .resolve_document(node)
        .await;

    assert_eq!(names(&resolution.features), vec!["leaf"]);
    assert_eq!(resolution.features[0].property_str("collection"), Some(leaf_id));
    assert!(!resolution.stats.visit_limit_reached);
    assert_eq!(resolution.stats.nodes_visited, depth + 2);
    assert!(fetcher.requests().is_empty());
}

#[tokio::test]
async fn test_prefetch_stays_within_visit_budget() {
    let mut fetcher = InMemoryFetcher::new();
    let mut items = Vec::new();
    for i in 0..8 {
        let uri = format!("https://example.org/manifest/{}", i);
        fetcher = fetcher.with_document(
            uri.clone(),
            json!({
                "id": uri,
                "type": "Manifest",
                "navPlace": collection_of(&[format!("m{}", i).as_str()]),
                "items": []
            }),
        );
        items.push(json!({"id": uri, "type": "Manifest"}));
    }
    let fetcher = Arc::new(fetcher);
    let root = json!({"id": "https://example.org/c", "type": "Collection", "items": items});

    let resolution = resolver(&fetcher, ResolverConfig::default().with_max_visits(3))
        .resolve_document(root)
        .await;

    assert_eq!(names(&resolution.features), vec!["m0"]);
    assert!(resolution.stats.visit_limit_reached);
    // The root visit leaves room for two more, so only two siblings are warmed.
    assert_eq!(fetcher.requests().len(), 2);
    assert_eq!(resolution.stats.network_fetches, 2);
}

#[tokio::test]
async fn test_mutual_reference_cycle_terminates() {
    let a = "https://example.org/collection/a";
    let b = "https://example.org/collection/b";
    let fetcher = Arc::new(
        InMemoryFetcher::new()
            .with_document(a, json!({
                "id": a, "type": "Collection",
                "navPlace": collection_of(&["a"]),
                "items": [{"id": b, "type": "Collection"}]
            }))
            .with_document(b, json!({
                "id": b, "type": "Collection",
                "navPlace": collection_of(&["b"]),
                "items": [{"id": a, "type": "Collection"}]
            })),
    );

    let config = ResolverConfig::default().with_max_visits(40);
    let first = resolver(&fetcher, config.clone()).resolve_uri(a).await;
    let second = resolver(&fetcher, config).resolve_uri(a).await;

    assert_eq!(names(&first.features)[..4], ["a", "b", "a", "b"]);
    assert_eq!(names(&first.features), names(&second.features));
    assert_eq!(first.stats.network_fetches, 2);
}

#[tokio::test]
async fn test_fetch_ceiling_returns_partial_result() {
    let mut fetcher = InMemoryFetcher::new();
    for i in 1..10 {
        let uri = format!("https://example.org/chain/{}", i);
        fetcher = fetcher.with_document(
            uri.clone(),
            json!({
                "id": uri,
                "type": "Collection",
                "navPlace": collection_of(&[format!("c{}", i).as_str()]),
                "items": [{
                    "id": format!("https://example.org/chain/{}", i + 1),
                    "type": "Collection"
                }]
            }),
        );
    }
    let fetcher = Arc::new(fetcher);
    let root = json!({
        "id": "https://example.org/chain/0",
        "type": "Collection",
        "navPlace": collection_of(&["c0"]),
        "items": [{"id": "https://example.org/chain/1", "type": "Collection"}]
    });

    let resolution = resolver(&fetcher, ResolverConfig::default().with_max_fetches(3))
        .resolve_document(root)
        .await;

    assert_eq!(names(&resolution.features), vec!["c0", "c1", "c2", "c3"]);
    assert_eq!(resolution.stats.network_fetches, 3);
    assert!(resolution.stats.fetch_limit_reached);
    assert_eq!(fetcher.requests().len(), 3);
}

#[tokio::test]
async fn test_same_uri_fetched_once_per_session() {
    let manifest_uri = "https://example.org/manifest";
    let fetcher = Arc::new(InMemoryFetcher::new().with_document(
        manifest_uri,
        json!({
            "id": manifest_uri,
            "type": "Manifest",
            "navPlace": collection_of(&["m"]),
            "items": []
        }),
    ));
    let root = json!({
        "id": "https://example.org/collection",
        "type": "Collection",
        "items": [
            {"id": "https://example.org/manifest#first", "type": "Manifest"},
            {"id": "https://example.org/manifest#second", "type": "Manifest"},
            {"id": manifest_uri, "type": "Manifest"},
            {"id": manifest_uri, "type": "Manifest"}
        ]
    });

    let resolution = resolver(&fetcher, ResolverConfig::default())
        .resolve_document(root)
        .await;

    assert_eq!(fetcher.requests().len(), 1);
    assert_eq!(resolution.stats.network_fetches, 1);
    assert_eq!(resolution.stats.reference_counts[manifest_uri], 4);
    assert_eq!(resolution.stats.cache_hits, 3);
    // One harvest per reachability path
    assert_eq!(names(&resolution.features), vec!["m", "m", "m", "m"]);
}

#[tokio::test]
async fn test_declared_identity_avoids_second_fetch() {
    let fetcher = Arc::new(InMemoryFetcher::new().with_document(
        "https://example.org/old/manifest",
        json!({
            "id": "https://example.org/manifest",
            "type": "Manifest",
            "navPlace": collection_of(&["moved"]),
            "items": []
        }),
    ));
    let root = json!({
        "id": "https://example.org/collection",
        "type": "Collection",
        "items": [
            {"id": "https://example.org/old/manifest", "type": "Manifest"},
            {
                "id": "https://example.org/collection/sub",
                "type": "Collection",
                "items": [{"id": "https://example.org/manifest", "type": "Manifest"}]
            }
        ]
    });

    let resolution = resolver(&fetcher, ResolverConfig::default())
        .resolve_document(root)
        .await;

    assert_eq!(fetcher.requests(), vec!["https://example.org/old/manifest"]);
    assert_eq!(names(&resolution.features), vec!["moved", "moved"]);
}

#[tokio::test]
async fn test_concurrent_prefetch_keeps_document_order() {
    let mut fetcher = InMemoryFetcher::new();
    let mut items = Vec::new();
    for i in 0..6 {
        let uri = format!("https://example.org/manifest/{}", i);
        fetcher = fetcher.with_document(
            uri.clone(),
            json!({
                "id": uri,
                "type": "Manifest",
                "navPlace": collection_of(&[format!("m{}", i).as_str()]),
                "items": []
            }),
        );
        items.push(json!({"id": uri, "type": "Manifest"}));
    }
    let fetcher = Arc::new(fetcher);
    let root = json!({"id": "https://example.org/c", "type": "Collection", "items": items});

    let resolution = resolver(
        &fetcher,
        ResolverConfig::default().with_max_concurrent_fetches(2),
    )
    .resolve_document(root)
    .await;

    assert_eq!(
        names(&resolution.features),
        vec!["m0", "m1", "m2", "m3", "m4", "m5"]
    );
    assert_eq!(fetcher.requests().len(), 6);
    assert!(resolution
        .stats
        .reference_counts
        .values()
        .all(|&count| count == 1));
    // Warmed entries: each first lookup stands in for the fetch
    assert_eq!(resolution.stats.cache_hits, 0);
}

#[tokio::test]
async fn test_resolution_disabled_skips_references() {
    let fetcher = Arc::new(
        InMemoryFetcher::new()
            .with_document("https://example.org/geo/1.json", collection_of(&["remote"])),
    );
    let manifest = json!({
        "id": "https://example.org/manifest",
        "type": "Manifest",
        "navPlace": {
                            "id": "https://example.org/geo/1.json",
                            "type": "FeatureCollection"
                        },
        "items": [
            {"id": "https://example.org/canvas/1", "type": "Canvas"},
            {
                "id": "https://example.org/canvas/2",
                "type": "Canvas",
                "navPlace": collection_of(&["embedded"]),
                "items": []
            }
        ]
    });

    let resolution = resolver(
        &fetcher,
        ResolverConfig::default().with_resolve_references(false),
    )
    .resolve_document(manifest)
    .await;

    assert_eq!(names(&resolution.features), vec!["embedded"]);
    assert!(fetcher.requests().is_empty());
    // Skipped references stay as they were
    assert_eq!(
        resolution.resource["items"][0],
        json!({"id": "https://example.org/canvas/1", "type": "Canvas"})
    );
}

#[tokio::test]
async fn test_shallow_traversal_stops_at_immediate_children() {
    let fetcher = Arc::new(InMemoryFetcher::new().with_document(
        "https://example.org/manifest/2",
        json!({
            "id": "https://example.org/manifest/2",
            "type": "Manifest",
            "navPlace": collection_of(&["m2"]),
            "items": []
        }),
    ));
    let root = json!({
        "id": "https://example.org/collection",
        "type": "Collection",
        "navPlace": collection_of(&["root"]),
        "items": [
            {
                "id": "https://example.org/manifest/1",
                "type": "Manifest",
                "navPlace": collection_of(&["m1"]),
                "items": [{
                    "id": "https://example.org/canvas/1",
                    "type": "Canvas",
                    "navPlace": collection_of(&["too-deep"]),
                    "items": []
                }]
            },
            {"id": "https://example.org/manifest/2", "type": "Manifest"}
        ]
    });

    let resolution = resolver(&fetcher, ResolverConfig::default().with_deep_traversal(false))
        .resolve_document(root)
        .await;

    assert_eq!(names(&resolution.features), vec!["root", "m1", "m2"]);
}

#[tokio::test]
async fn test_annotation_page_bodies() {
    let fetcher = Arc::new(InMemoryFetcher::new().with_document(
        "https://example.org/geo/a2.json",
        point("remote-body"),
    ));
    let page = json!({
        "@context": "http://www.w3.org/ns/anno.jsonld",
        "id": "https://example.org/page/1",
        "type": "AnnotationPage",
        "items": [
            {
                "id": "https://example.org/anno/1",
                "type": "Annotation",
                "motivation": "tagging",
                "target": "https://example.org/canvas/1",
                "body": collection_of(&["a1-x", "a1-y"])
            },
            {
                "id": "https://example.org/anno/2",
                "type": "Annotation",
                "target": {"type": "SpecificResource", "source": "https://example.org/canvas/2"},
                "body": {"id": "https://example.org/geo/a2.json", "type": "Feature"}
            }
        ]
    });

    let resolution = resolver(&fetcher, ResolverConfig::default())
        .resolve_document(page)
        .await;

    assert_eq!(names(&resolution.features), vec!["a1-x", "a1-y", "remote-body"]);
    let first = &resolution.features[0];
    assert_eq!(first.from_resource(), Some("Annotation"));
    assert_eq!(first.property_str("anno"), Some("https://example.org/anno/1"));
    assert_eq!(first.property_str("targeting"), Some("https://example.org/canvas/1"));
    let last = &resolution.features[2];
    assert_eq!(last.property_str("anno"), Some("https://example.org/anno/2"));
    assert_eq!(last.property_str("targeting"), Some("https://example.org/canvas/2"));
}

#[tokio::test]
async fn test_existing_properties_are_kept() {
    let fetcher = Arc::new(InMemoryFetcher::new());
    let canvas = json!({
        "id": "https://example.org/canvas/1",
        "type": "Canvas",
        "label": {"en": ["Canvas label"]},
        "thumbnail": [{"id": "https://img/canvas-thumb.jpg", "type": "Image"}],
        "navPlace": {
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {
                    "name": "own",
                    "label": {"en": ["Feature label"]},
                    "thumbnail": "https://img/own.jpg"
                },
                "geometry": {"type": "Point", "coordinates": [0.0, 0.0]}
            }]
        },
        "items": []
    });

    let resolution = resolver(&fetcher, ResolverConfig::default())
        .resolve_document(canvas)
        .await;

    let feature = &resolution.features[0];
    assert_eq!(feature.property("label"), Some(&json!({"en": ["Feature label"]})));
    assert_eq!(feature.property_str("thumbnail"), Some("https://img/own.jpg"));
    assert_eq!(feature.property_str("canvas"), Some("https://example.org/canvas/1"));
}

#[tokio::test]
async fn test_unresolvable_root_yields_empty_result() {
    let fetcher = Arc::new(InMemoryFetcher::new());
    let resolution = resolver(&fetcher, ResolverConfig::default())
        .resolve_uri("https://example.org/nothing-here")
        .await;

    assert!(resolution.is_empty());
    assert_eq!(resolution.stats.network_fetches, 1);
}

#[tokio::test]
async fn test_unsupported_root_type_yields_empty_result() {
    let fetcher = Arc::new(InMemoryFetcher::new());
    let resolution = resolver(&fetcher, ResolverConfig::default())
        .resolve_document(json!({
            "type": "Dataset",
            "navPlace": collection_of(&["ignored"])
        }))
        .await;

    assert!(resolution.is_empty());
}

#[tokio::test]
async fn test_output_is_geojson_feature_collection() {
    let fetcher = Arc::new(InMemoryFetcher::new());
    let resolution = resolver(&fetcher, ResolverConfig::default())
        .resolve_document(json!({
            "id": "https://example.org/canvas/1",
            "type": "Canvas",
            "navPlace": collection_of(&["only"]),
            "items": []
        }))
        .await;

    let fc = resolution.to_feature_collection();
    assert_eq!(fc["type"], "FeatureCollection");
    assert_eq!(fc["features"][0]["type"], "Feature");
    assert_eq!(fc["features"][0]["geometry"]["type"], "Point");
    assert_eq!(fc["features"][0]["properties"]["__fromResource"], "Canvas");
}
