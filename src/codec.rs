//! # URL Codec
//!
//! Encoding and decoding of individual route segments so that they survive the
//! clean-up performed by a front web server before the application sees the
//! path (collapsing of repeated `/`, trimming of trailing blanks, refusal of
//! encoded slashes).
//!
//! ## Encoding
//!
//! 1. trailing blanks are trimmed;
//! 2. an empty value becomes a single space, so an intentionally empty
//!    segment is never collapsed away;
//! 3. the value is percent-encoded;
//! 4. the percent-encoded text is remapped in one simultaneous pass:
//!    `_` → `_5F`, `+` → `_20`, `%` → `_`.
//!
//! After step 4 the segment contains no `%` at all, so a web server that
//! decodes (or re-encodes) escapes in the path cannot alter it.
//!
//! ## Decoding
//!
//! The inverse pass (`_5F` → `%5F`, any other `_` → `%`) is applied, then the
//! value is percent-decoded and trailing blanks are trimmed again.
//!
//! ```rust
//! use mvc_dispatch::codec::{decode_segment, encode_segment};
//!
//! let encoded = encode_segment("a b/c_d");
//! assert!(!encoded.contains('%'));
//! assert!(!encoded.contains('/'));
//! assert_eq!(decode_segment(&encoded), "a b/c_d");
//! ```

use smallvec::SmallVec;
use url::form_urlencoded;

use crate::route::Parameters;

/// Maximum number of route segments kept inline before heap allocation.
pub const MAX_INLINE_SEGMENTS: usize = 8;

/// Decoded route segments (controller, action, parameters).
pub type SegmentVec = SmallVec<[String; MAX_INLINE_SEGMENTS]>;

/// Characters treated as trailing blanks by [`rtrim`].
const BLANKS: &[char] = &[' ', '\t', '\n', '\r', '\0', '\u{0B}'];

/// Trim trailing blanks (space, tab, LF, CR, NUL, vertical tab).
#[must_use]
pub fn rtrim(value: &str) -> &str {
    value.trim_end_matches(BLANKS)
}

/// Encode one route segment.
///
/// Never fails: every string has a percent-encoded form.
#[must_use]
pub fn encode_segment(value: &str) -> String {
    let trimmed = rtrim(value);
    let source = if trimmed.is_empty() { " " } else { trimmed };

    let mut out = String::with_capacity(source.len() + 8);
    for chunk in form_urlencoded::byte_serialize(source.as_bytes()) {
        for ch in chunk.chars() {
            match ch {
                '_' => out.push_str("_5F"),
                '+' => out.push_str("_20"),
                '%' => out.push('_'),
                other => out.push(other),
            }
        }
    }
    out
}

/// Encode an optional segment; `None` encodes like the empty string.
#[must_use]
pub fn encode_optional(value: Option<&str>) -> String {
    encode_segment(value.unwrap_or_default())
}

/// Decode one route segment previously produced by [`encode_segment`].
///
/// Invalid escapes are kept verbatim and invalid UTF-8 is replaced, so this
/// never fails either.
#[must_use]
pub fn decode_segment(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('_') {
        escaped.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with("_5F") {
            escaped.push_str("%5F");
            rest = &tail[3..];
        } else {
            escaped.push('%');
            rest = &tail[1..];
        }
    }
    escaped.push_str(rest);

    let decoded = percent_decode(&escaped);
    rtrim(&decoded).to_string()
}

/// Decode an optional segment; `None` decodes to the empty string.
#[must_use]
pub fn decode_optional(value: Option<&str>) -> String {
    value.map(decode_segment).unwrap_or_default()
}

/// Remove every character that cannot legally appear in a URL.
#[must_use]
pub fn sanitize_route(raw: &str) -> String {
    raw.chars().filter(|c| is_url_char(*c)).collect()
}

/// Split a raw route string into decoded segments.
///
/// Trailing slashes are dropped before splitting, so `"blog/show/"` yields
/// two segments. Every segment (controller and action included) goes through
/// [`decode_segment`].
#[must_use]
pub fn split_route(raw: &str) -> SegmentVec {
    let trimmed = raw.trim_end_matches('/');
    let sanitized = sanitize_route(trimmed);
    sanitized.split('/').map(decode_segment).collect()
}

/// Build the URL of a controller action.
///
/// Controller and action names are encoded like parameters. In associative
/// mode every parameter contributes a `key/value` pair, in positional mode
/// only its value.
#[must_use]
pub fn build_url(
    base: &str,
    controller: &str,
    action: &str,
    params: &Parameters,
    associative: bool,
) -> String {
    let mut url = String::from(base);
    url.push_str(&encode_segment(controller));
    url.push('/');
    url.push_str(&encode_segment(action));
    for (key, value) in params.pairs() {
        if associative {
            url.push('/');
            url.push_str(&encode_segment(&key));
        }
        url.push('/');
        url.push_str(&encode_segment(value));
    }
    url
}

fn percent_decode(value: &str) -> String {
    let spaced = value.replace('+', " ");
    let bytes = urlencoding::decode_binary(spaced.as_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}

fn is_url_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "$-_.+!*'(),{}|\\^~[]`<>#%\";/?:@&=".contains(c)
}
