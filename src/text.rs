//! Text normalization utilities
//!
//! Shared by the search engine and the highlight relocation engine so both
//! sides of a comparison agree on whitespace and casing.

/// Collapse every whitespace run to a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize text for comparison: collapse whitespace, trim, case-fold.
pub fn normalize(text: &str) -> String {
    collapse_whitespace(text).to_lowercase()
}

/// Case-fold a single character without changing the character count.
///
/// `char::to_lowercase` can expand to multiple characters for a handful of
/// code points; the first one is kept so folded text stays index-compatible
/// with its source. Snippet offsets depend on this.
pub fn fold_char(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Case-fold a string character by character, preserving length in chars.
pub fn fold_chars(text: &str) -> Vec<char> {
    text.chars().map(fold_char).collect()
}
