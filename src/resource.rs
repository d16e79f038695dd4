//! Resource kinds and JSON node helpers
//!
//! The walker only reacts to the closed set of IIIF Presentation and Web
//! Annotation kinds below. Every other object is inert.

use serde_json::Value;
use std::fmt;

/// Keys whose array values hold child resources
pub const RECURSE_KEYS: [&str; 2] = [ITEMS_KEY, STRUCTURES_KEY];

pub const ITEMS_KEY: &str = "items";
pub const STRUCTURES_KEY: &str = "structures";

/// Geometry property searched on IIIF resources
pub const NAVPLACE_PROPERTY: &str = "navPlace";

/// Geometry property searched on Web Annotations
pub const BODY_PROPERTY: &str = "body";

/// Supported resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Container of manifests and other collections
    Collection,
    /// Ordered sequence of canvases, optionally with a structural outline
    Manifest,
    /// Structural outline entry (chapter, section)
    Range,
    /// Leaf canvas
    Canvas,
    AnnotationPage,
    Annotation,
}

impl ResourceKind {
    /// Parse a declared type tag
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "Collection" => Some(Self::Collection),
            "Manifest" => Some(Self::Manifest),
            "Range" => Some(Self::Range),
            "Canvas" => Some(Self::Canvas),
            "AnnotationPage" => Some(Self::AnnotationPage),
            "Annotation" => Some(Self::Annotation),
            _ => None,
        }
    }

    /// Kind of a JSON node, if it is an object declaring a supported type
    pub fn of(node: &Value) -> Option<Self> {
        declared_type(node).and_then(Self::parse)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collection => "Collection",
            Self::Manifest => "Manifest",
            Self::Range => "Range",
            Self::Canvas => "Canvas",
            Self::AnnotationPage => "AnnotationPage",
            Self::Annotation => "Annotation",
        }
    }

    /// Field whose presence marks a node of this kind as embedded
    pub fn content_key(&self) -> &'static str {
        match self {
            Self::Annotation => BODY_PROPERTY,
            Self::Collection
            | Self::Manifest
            | Self::Range
            | Self::Canvas
            | Self::AnnotationPage => ITEMS_KEY,
        }
    }

    /// Geometry property to search when a traversal starts at this kind
    pub fn default_geometry_property(&self) -> &'static str {
        if self.is_annotation() {
            BODY_PROPERTY
        } else {
            NAVPLACE_PROPERTY
        }
    }

    pub fn is_annotation(&self) -> bool {
        matches!(self, Self::Annotation | Self::AnnotationPage)
    }

    /// Whose `structures` take precedence over its `items`
    pub fn prefers_structures(&self) -> bool {
        matches!(self, Self::Manifest)
    }

    /// Property naming the owning resource on harvested features
    pub fn back_reference_key(&self) -> Option<&'static str> {
        match self {
            Self::Collection => Some("collection"),
            Self::Manifest => Some("manifest"),
            Self::Canvas => Some("canvas"),
            Self::Annotation => Some("anno"),
            Self::Range | Self::AnnotationPage => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared type tag (`type`, falling back to `@type`)
pub fn declared_type(node: &Value) -> Option<&str> {
    node.get("type")
        .or_else(|| node.get("@type"))
        .and_then(Value::as_str)
}

/// Identity URI (`id`, falling back to `@id`)
pub fn identity(node: &Value) -> Option<&str> {
    node.get("id")
        .or_else(|| node.get("@id"))
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
}

/// URI of a supported resource that must be fetched before use
///
/// A node is a reference when it declares a supported kind, carries an
/// identity, and lacks the content field of that kind.
pub fn pending_reference(node: &Value) -> Option<String> {
    let kind = ResourceKind::of(node)?;
    if node.get(kind.content_key()).is_some() {
        return None;
    }
    identity(node).map(str::to_string)
}

/// Whether a geometry value already carries its content
pub fn has_geometry_content(value: &Value) -> bool {
    value.get("features").map(Value::is_array).unwrap_or(false)
        || value.get("geometry").is_some()
}

/// URI of a geometry value that must be fetched before use
///
/// Only untyped values and GeoJSON `Feature`/`FeatureCollection` values
/// are fetched: a painting annotation's image body is never a geometry
/// reference.
pub fn geometry_reference(value: &Value) -> Option<String> {
    if has_geometry_content(value) {
        return None;
    }
    match declared_type(value) {
        None | Some("Feature") | Some("FeatureCollection") => {
            identity(value).map(str::to_string)
        }
        Some(_) => None,
    }
}

/// First element of an array, or the value itself
fn first(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

fn image_uri(value: &Value) -> Option<String> {
    match first(value)? {
        Value::String(uri) if !uri.trim().is_empty() => Some(uri.clone()),
        other => identity(other).map(str::to_string),
    }
}

/// Thumbnail URI for a resource
///
/// Prefers the resource's own `thumbnail`; falls back to the body of its
/// first painting annotation.
pub fn thumbnail(node: &Value) -> Option<String> {
    if let Some(thumb) = node.get("thumbnail").and_then(image_uri) {
        return Some(thumb);
    }
    match ResourceKind::of(node)? {
        ResourceKind::Canvas => painting_body(node),
        ResourceKind::Manifest => node
            .get(ITEMS_KEY)
            .and_then(first)
            .and_then(painting_body),
        _ => None,
    }
}

/// `items[0].items[0].body` of a canvas
fn painting_body(canvas: &Value) -> Option<String> {
    canvas
        .get(ITEMS_KEY)
        .and_then(first)
        .and_then(|page| page.get(ITEMS_KEY))
        .and_then(first)
        .and_then(|anno| anno.get(BODY_PROPERTY))
        .and_then(image_uri)
}

/// Identity of an annotation target (`id`/`source` of an object target)
pub fn target_identity(target: &Value) -> Option<String> {
    match first(target)? {
        Value::String(uri) => Some(uri.clone()),
        other => identity(other)
            .or_else(|| other.get("source").and_then(|s| s.as_str()))
            .map(str::to_string),
    }
}
