//! Glob engine shared by `sideEffects` arrays and tsconfig `paths`.
//!
//! Semantics:
//!
//! * `?` matches one non-separator character.
//! * `*` matches any run of non-separator characters.
//! * `**` matches any run of characters including separators.
//! * A pattern without a leading `/` matches any path that ends with a
//!   match, on a segment boundary.
//! * Separators are normalized to `/` before comparison.
//!
//! tsconfig `paths` patterns go through [`single_star_split`] instead of
//! the full matcher: they carry at most one `*` and never `**`.

use std::borrow::Cow;

fn forward_slashed(s: &str) -> Cow<'_, str> {
    if s.contains('\\') { Cow::Owned(s.replace('\\', "/")) } else { Cow::Borrowed(s) }
}

/// Anchored match of `pattern` against `path`.
pub fn glob_match(pattern: &str, path: &str) -> bool {
    fast_glob::glob_match(forward_slashed(pattern).as_ref(), forward_slashed(path).as_ref())
}

/// Match a `sideEffects` pattern against a path relative to the package
/// root.
///
/// A leading `/` anchors the pattern at the package root; anything else
/// matches any suffix of the path that begins on a segment boundary, so
/// `bar/index.js` matches `src/bar/index.js` but not `foobar/index.js`.
pub fn side_effects_match(pattern: &str, relative_path: &str) -> bool {
    let relative_path = forward_slashed(relative_path);
    let pattern = forward_slashed(pattern);
    if let Some(anchored) = pattern.strip_prefix('/') {
        return fast_glob::glob_match(anchored, relative_path.as_ref());
    }
    if fast_glob::glob_match(pattern.as_ref(), relative_path.as_ref()) {
        return true;
    }
    // Suffix semantics: an implicit leading `**/`.
    let suffixed = format!("**/{pattern}");
    fast_glob::glob_match(&suffixed, relative_path.as_ref())
}

/// Split a tsconfig `paths` pattern around its single `*`.
///
/// Returns `None` for patterns containing no `*`; such patterns only
/// match the specifier exactly. Patterns with more than one `*` (which
/// includes `**`) are invalid in `paths` and also return `None`, so they
/// can only match literally.
pub fn single_star_split(pattern: &str) -> Option<(&str, &str)> {
    let mut stars = pattern.match_indices('*');
    let (index, _) = stars.next()?;
    if stars.next().is_some() {
        return None;
    }
    Some((&pattern[..index], &pattern[index + 1..]))
}
