//! Feature collector
//!
//! Accumulates harvested geometry in discovery order and flattens it into
//! GeoJSON features, copying display metadata down from the resource each
//! geometry was found on.

use crate::resource::{self, ResourceKind};
use serde::Serialize;
use serde_json::{Map, Value};

/// Provenance tag written on every harvested collection and feature
pub const FROM_RESOURCE_KEY: &str = "__fromResource";

const LABEL_KEY: &str = "label";
const SUMMARY_KEY: &str = "summary";
const THUMBNAIL_KEY: &str = "thumbnail";
const TARGETING_KEY: &str = "targeting";

/// Display metadata of the resource that owns a piece of geometry
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    pub kind: ResourceKind,
    pub id: Option<String>,
    /// Plain string or language map, copied as-is
    pub label: Option<Value>,
    pub summary: Option<Value>,
    pub thumbnail: Option<String>,
    /// Annotation target
    pub target: Option<Value>,
}

impl Provenance {
    pub fn of(kind: ResourceKind, owner: &Value) -> Self {
        Self {
            kind,
            id: resource::identity(owner).map(str::to_string),
            label: owner.get(LABEL_KEY).filter(|v| !v.is_null()).cloned(),
            summary: owner.get(SUMMARY_KEY).filter(|v| !v.is_null()).cloned(),
            thumbnail: resource::thumbnail(owner),
            target: owner.get("target").filter(|v| !v.is_null()).cloned(),
        }
    }

    /// Provenance of a root document, if it is a supported resource
    pub fn of_root(root: &Value) -> Option<Self> {
        ResourceKind::of(root).map(|kind| Self::of(kind, root))
    }
}

/// Fill properties the feature lacks from its owning resource
///
/// Existing keys are never overwritten.
pub fn fill_missing(properties: &mut Map<String, Value>, provenance: &Provenance) {
    properties
        .entry(FROM_RESOURCE_KEY)
        .or_insert_with(|| Value::String(provenance.kind.as_str().to_string()));

    if let Some(label) = &provenance.label {
        properties
            .entry(LABEL_KEY)
            .or_insert_with(|| label.clone());
    }
    if let Some(summary) = &provenance.summary {
        properties
            .entry(SUMMARY_KEY)
            .or_insert_with(|| summary.clone());
    }
    if let Some(thumbnail) = &provenance.thumbnail {
        properties
            .entry(THUMBNAIL_KEY)
            .or_insert_with(|| Value::String(thumbnail.clone()));
    }
    if provenance.kind != ResourceKind::Annotation {
        if let (Some(key), Some(id)) = (provenance.kind.back_reference_key(), &provenance.id) {
            properties
                .entry(key)
                .or_insert_with(|| Value::String(id.clone()));
        }
    }
}

/// Attach the owning annotation's identity and target
///
/// These always replace existing values.
pub fn attach_annotation(properties: &mut Map<String, Value>, provenance: &Provenance) {
    if let Some(id) = &provenance.id {
        properties.insert("anno".to_string(), Value::String(id.clone()));
    }
    if let Some(target) = &provenance.target {
        let targeting = resource::target_identity(target)
            .map(Value::String)
            .unwrap_or_else(|| target.clone());
        properties.insert(TARGETING_KEY.to_string(), targeting);
    }
}

/// Feature objects inside a geometry value: every member of a
/// FeatureCollection, or the value itself when it is a single Feature
fn features_mut(geometry: &mut Value) -> Vec<&mut Map<String, Value>> {
    if geometry.get("features").map(Value::is_array).unwrap_or(false) {
        return match geometry.get_mut("features") {
            Some(Value::Array(features)) => {
                features.iter_mut().filter_map(Value::as_object_mut).collect()
            }
            _ => Vec::new(),
        };
    }
    if geometry.get("geometry").is_some() {
        return geometry.as_object_mut().into_iter().collect();
    }
    Vec::new()
}

fn properties_mut(feature: &mut Map<String, Value>) -> Option<&mut Map<String, Value>> {
    if !matches!(feature.get("properties"), Some(Value::Object(_))) {
        feature.insert("properties".to_string(), Value::Object(Map::new()));
    }
    feature.get_mut("properties").and_then(Value::as_object_mut)
}

/// Tag a harvested geometry value and denormalize its features in place
pub fn denormalize(geometry: &mut Value, provenance: &Provenance) {
    if let Value::Object(collection) = geometry {
        collection
            .entry(FROM_RESOURCE_KEY)
            .or_insert_with(|| Value::String(provenance.kind.as_str().to_string()));
    }
    for feature in features_mut(geometry) {
        let Some(properties) = properties_mut(feature) else {
            continue;
        };
        fill_missing(properties, provenance);
        if provenance.kind == ResourceKind::Annotation {
            attach_annotation(properties, provenance);
        }
    }
}

/// A GeoJSON feature ready for the rendering layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: Value,
    pub properties: Map<String, Value>,
    /// Other members (`id`, `bbox`, foreign members)
    #[serde(flatten)]
    pub members: Map<String, Value>,
}

impl Feature {
    fn from_object(mut object: Map<String, Value>) -> Self {
        let kind = match object.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => "Feature".to_string(),
        };
        let geometry = object.remove("geometry").unwrap_or(Value::Null);
        let properties = match object.remove("properties") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self {
            kind,
            geometry,
            properties,
            members: object,
        }
    }

    /// Kind of resource the feature was harvested from
    pub fn from_resource(&self) -> Option<&str> {
        self.properties.get(FROM_RESOURCE_KEY).and_then(Value::as_str)
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.property(key).and_then(Value::as_str)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Wrap features in a GeoJSON FeatureCollection
pub fn feature_collection(features: &[Feature]) -> Value {
    serde_json::json!({
        "type": "FeatureCollection",
        "features": features.iter().map(Feature::to_value).collect::<Vec<_>>(),
    })
}

/// One harvested geometry value and its owner
#[derive(Debug, Clone)]
pub struct Harvested {
    pub geometry: Value,
    pub provenance: Provenance,
}

/// Ordered accumulator of harvested geometry
#[derive(Debug, Default)]
pub struct FeatureCollector {
    harvested: Vec<Harvested>,
}

impl FeatureCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, geometry: Value, provenance: Provenance) {
        self.harvested.push(Harvested {
            geometry,
            provenance,
        });
    }

    pub fn len(&self) -> usize {
        self.harvested.len()
    }

    pub fn is_empty(&self) -> bool {
        self.harvested.is_empty()
    }

    pub fn harvested(&self) -> &[Harvested] {
        &self.harvested
    }

    /// Flatten into features, in discovery order
    ///
    /// A FeatureCollection contributes all its features, a Feature itself,
    /// anything else nothing. Features still missing display properties
    /// inherit them from `root`.
    pub fn into_features(self, root: Option<&Provenance>) -> Vec<Feature> {
        let mut features = Vec::new();
        for Harvested {
            mut geometry,
            provenance,
        } in self.harvested
        {
            denormalize(&mut geometry, &provenance);
            let members: Vec<Value> = match geometry {
                Value::Object(mut object) => match object.remove("features") {
                    Some(Value::Array(members)) => members,
                    Some(_) => Vec::new(),
                    None if object.contains_key("geometry") => vec![Value::Object(object)],
                    None => Vec::new(),
                },
                _ => Vec::new(),
            };
            for member in members {
                let Value::Object(object) = member else {
                    continue;
                };
                let mut feature = Feature::from_object(object);
                if let Some(root) = root {
                    fill_missing(&mut feature.properties, root);
                }
                features.push(feature);
            }
        }
        features
    }
}
