//! Integration tests for route segment encoding
//!
//! URLs built by [`build_url`] must parse back, through [`split_route`], into
//! the same controller, action and parameters, including values a web
//! server would otherwise mangle.

use mvc_dispatch::codec::{build_url, decode_segment, encode_segment, split_route};
use mvc_dispatch::route::Parameters;

const AWKWARD: &[&str] = &[
    "plain",
    "with space",
    "slash/inside",
    "double//slash",
    "under_score",
    "_5F literal",
    "percent %41",
    "plus+sign",
    "back\\slash",
    "question?mark&amp=1#frag",
    "ünïcödé ✓",
    "a",
];

#[test]
fn test_trailing_blanks_are_not_preserved() {
    assert_eq!(decode_segment(&encode_segment("value \t\n")), "value");
    assert_eq!(decode_segment(&encode_segment("")), "");
    assert_eq!(encode_segment(""), "_20");
}

#[test]
fn test_built_url_parses_back() {
    let mut params = Parameters::associative();
    for (i, value) in AWKWARD.iter().enumerate() {
        params.insert(format!("k{i}"), *value);
    }

    let url = build_url("/", "blog", "show", &params, true);
    let segments = split_route(url.trim_start_matches('/'));

    assert_eq!(segments[0], "blog");
    assert_eq!(segments[1], "show");
    let parsed = Parameters::pair_segments(segments.into_iter().skip(2));
    for (i, value) in AWKWARD.iter().enumerate() {
        assert_eq!(parsed.get(&format!("k{i}")), Some(*value));
    }
}

#[test]
fn test_positional_url_carries_values_only() {
    let mut params = Parameters::positional();
    params.insert("ignored", "x y");
    params.insert("ignored", "z");

    let url = build_url("/base/", "Blog", "List", &params, false);
    assert_eq!(url, "/base/Blog/List/x_20y/z");
}

#[test]
fn test_empty_parameter_keeps_its_slot() {
    let mut params = Parameters::associative();
    params.insert("empty", "");
    params.insert("next", "1");

    let url = build_url("/", "c", "a", &params, true);
    let segments = split_route(url.trim_start_matches('/'));

    let parsed = Parameters::pair_segments(segments.into_iter().skip(2));
    assert_eq!(parsed.get("empty"), Some(""));
    assert_eq!(parsed.get("next"), Some("1"));
}
