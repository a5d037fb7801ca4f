//! Type mapping from content-model field tags to canonical column types.

use tracing::warn;

use crate::core::CanonicalType;

/// Field tags that never produce a column.
const EXCLUDED_TYPES: [&str; 2] = ["component", "custom"];

/// Map a field type tag to a canonical column type.
///
/// Matching is case-insensitive. Unknown tags fall back to
/// [`CanonicalType::Text`] with a warning; this function never fails.
pub fn map_type(tag: &str) -> CanonicalType {
    match lookup(tag) {
        Some(canonical) => canonical,
        None => {
            warn!("Unknown field type '{}', mapping to text", tag);
            CanonicalType::Text
        }
    }
}

/// Fixed tag table. Returns `None` for tags outside it.
pub fn lookup(tag: &str) -> Option<CanonicalType> {
    let canonical = match tag.to_lowercase().as_str() {
        // Strings
        "text" => CanonicalType::Varchar,
        "textarea" => CanonicalType::Text,
        "select" | "radio" => CanonicalType::Text,

        // Scalars
        "number" => CanonicalType::Numeric,
        "boolean" | "checkbox" => CanonicalType::Boolean,
        "date" => CanonicalType::Timestamp,

        // Structured
        "array" => CanonicalType::TextArray,
        "json" => CanonicalType::Jsonb,

        // References are stored as the target row's id
        "relation" => CanonicalType::Integer,

        _ => return None,
    };
    Some(canonical)
}

/// Whether a field of this type is never stored as a column.
pub fn is_excluded_type(tag: &str) -> bool {
    let tag = tag.to_lowercase();
    EXCLUDED_TYPES.contains(&tag.as_str())
}
