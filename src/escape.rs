//! Text escaping at the serialization boundary.
//!
//! Display names and hotspot labels are kept as plain text in memory. They are
//! percent-encoded exactly once when written into a bundle or persisted record
//! and decoded exactly once when read back.

use std::borrow::Cow;

use crate::error::{Result, TourError};

/// Percent-encode a display text for embedding.
pub fn escape_text(text: &str) -> String {
    urlencoding::encode(text).into_owned()
}

/// Reverse [`escape_text`].
pub fn unescape_text(text: &str) -> Result<String> {
    urlencoding::decode(text)
        .map(Cow::into_owned)
        .map_err(|e| TourError::Corrupt(format!("bad escaped text '{}': {}", text, e)))
}

/// Make serialized JSON safe to place inside a `<script>` element.
///
/// `<`, `>` and `&` can only occur inside JSON strings, so swapping them for
/// their `\u` escapes leaves a document any JSON parser reads back unchanged.
pub fn script_safe_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            _ => out.push(c),
        }
    }
    out
}
