//! Utility functions and helpers.

pub mod html;
pub mod http;

use sha2::{Digest, Sha256};
use unicode_segmentation::UnicodeSegmentation;

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hex-encoded SHA-256 of a string.
pub fn sha256_hex(s: &str) -> String {
    hex::encode(Sha256::digest(s.as_bytes()))
}

/// Cut a string to at most `max` user-perceived characters.
pub fn truncate_graphemes(s: &str, max: usize) -> String {
    s.graphemes(true).take(max).collect()
}

/// Number of user-perceived characters.
pub fn grapheme_len(s: &str) -> usize {
    s.graphemes(true).count()
}

/// Case-insensitive substring test against a list of needles.
pub fn contains_any(haystack_lower: &str, needles: &[String]) -> Option<String> {
    needles
        .iter()
        .find(|n| !n.is_empty() && haystack_lower.contains(&n.to_lowercase()))
        .cloned()
}
