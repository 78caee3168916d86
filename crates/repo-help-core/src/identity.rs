//! Deterministic chunk identity.
//!
//! A docId names a storage *slot*, not content: it is derived only from
//! the namespace, the file path and the chunk ordinal, so re-deriving it
//! in another process always yields the same string.
//!
//! ```text
//! ordinal 0  →  acme/widgets::src/app.js
//! ordinal 2  →  acme/widgets::src/app.js::unit-2
//! ```

/// Separator between the namespace, the path and the unit tag.
pub const SEPARATOR: &str = "::";

const UNIT_TAG: &str = "unit-";

/// The docId of chunk `ordinal` of `path` in `namespace`.
///
/// # Example
///
/// ```rust
/// use repo_help_core::identity::doc_id;
///
/// assert_eq!(doc_id("acme/widgets", "a.js", 0), "acme/widgets::a.js");
/// assert_eq!(doc_id("acme/widgets", "a.js", 3), "acme/widgets::a.js::unit-3");
/// ```
pub fn doc_id(namespace: &str, path: &str, ordinal: u32) -> String {
    let prefix = file_prefix(namespace, path);
    if ordinal == 0 {
        prefix
    } else {
        format!("{}{}{}{}", prefix, SEPARATOR, UNIT_TAG, ordinal)
    }
}

/// The identity prefix shared by every chunk of one file.
pub fn file_prefix(namespace: &str, path: &str) -> String {
    format!("{}{}{}", namespace, SEPARATOR, path)
}

/// Whether `id` is one of the chunk ids of `path` in `namespace`.
///
/// Matching is on a separator boundary, so `a.js` does not claim the ids
/// of `a.jsx`.
pub fn belongs_to_file(id: &str, namespace: &str, path: &str) -> bool {
    let prefix = file_prefix(namespace, path);
    match id.strip_prefix(prefix.as_str()) {
        Some("") => true,
        Some(rest) => rest.starts_with(SEPARATOR),
        None => false,
    }
}
