//! Filesystem- and id-safe slugs derived from display names.

/// Slug used when a name contains no usable characters.
pub const EMPTY_SLUG: &str = "unnamed";

/// Lower-case `name`, collapse every run of characters outside `[a-z0-9]`
/// into a single `_`, and trim leading/trailing `_`.
///
/// Names are reduced to ASCII: non-ASCII letters are not transliterated and
/// count as separators, so `"Café"` becomes `caf`.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    if slug.is_empty() {
        EMPTY_SLUG.to_string()
    } else {
        slug
    }
}
