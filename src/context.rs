//! IIIF `@context` check for root documents
//!
//! The result is a diagnostic. A root whose context is not Presentation 3
//! is still traversed.

use serde_json::Value;

const PRESENTATION_3: [&str; 2] = [
    "http://iiif.io/api/presentation/3/context.json",
    "https://iiif.io/api/presentation/3/context.json",
];

const PRESENTATION_2: [&str; 2] = [
    "http://iiif.io/api/presentation/2/context.json",
    "https://iiif.io/api/presentation/2/context.json",
];

/// Outcome of inspecting a root's `@context`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextCheck {
    Presentation3,
    Presentation2,
    /// No `@context` at all
    Missing,
    /// String or list context naming neither Presentation version
    Unrecognized(String),
    /// Inline context object
    CustomObject,
}

impl ContextCheck {
    pub fn is_presentation3(&self) -> bool {
        matches!(self, ContextCheck::Presentation3)
    }

    /// Human-readable problem, if any
    pub fn problem(&self) -> Option<String> {
        match self {
            ContextCheck::Presentation3 => None,
            ContextCheck::Presentation2 => Some(
                "resource uses the Presentation API 2 context; navPlace requires 3".to_string(),
            ),
            ContextCheck::Missing => Some("resource has no @context".to_string()),
            ContextCheck::Unrecognized(ctx) => Some(format!(
                "resource @context '{}' does not include the Presentation API 3 context",
                ctx
            )),
            ContextCheck::CustomObject => Some(
                "custom @context objects are not supported; include the Presentation API 3 context"
                    .to_string(),
            ),
        }
    }
}

/// Inspect the `@context` of a IIIF root
pub fn check_presentation_context(node: &Value) -> ContextCheck {
    match node.get("@context") {
        None | Some(Value::Null) => ContextCheck::Missing,
        Some(Value::String(ctx)) => classify(std::iter::once(ctx.as_str()), ctx),
        Some(Value::Array(entries)) => {
            let names: Vec<&str> = entries.iter().filter_map(Value::as_str).collect();
            if names.is_empty() {
                if entries.iter().any(Value::is_object) {
                    return ContextCheck::CustomObject;
                }
                return ContextCheck::Missing;
            }
            classify(names.iter().copied(), &names.join(", "))
        }
        Some(Value::Object(_)) => ContextCheck::CustomObject,
        Some(other) => ContextCheck::Unrecognized(other.to_string()),
    }
}

fn classify<'a>(mut names: impl Iterator<Item = &'a str> + Clone, display: &str) -> ContextCheck {
    if names.clone().any(|n| PRESENTATION_3.contains(&n)) {
        ContextCheck::Presentation3
    } else if names.any(|n| PRESENTATION_2.contains(&n)) {
        ContextCheck::Presentation2
    } else {
        ContextCheck::Unrecognized(display.to_string())
    }
}
