//! Crate-level cross-module corpus and property tests.
//!
//! Per-component tests live alongside their source (`canon.rs`,
//! `parser.rs`, `fingerprint.rs`, `validator.rs`, `patch.rs`, `frame.rs`,
//! `cursor.rs`). This module holds the tests that exercise the canonical
//! text form end-to-end, the kind the teacher reserved `tests.rs` for.

use crate::*;
use serde_json::json;

#[test]
fn test_canon_null() {
    let gv = GValue::null();
    assert_eq!(canonicalize_loose(&gv), "_");
}

#[test]
fn test_canon_null_pretty() {
    let gv = GValue::null();
    let opts = LooseCanonOpts::pretty();
    assert_eq!(canonicalize_loose_with_opts(&gv, &opts), "\u{2205}");
}

#[test]
fn test_canon_bool() {
    assert_eq!(canonicalize_loose(&GValue::bool(true)), "t");
    assert_eq!(canonicalize_loose(&GValue::bool(false)), "f");
}

#[test]
fn test_canon_int() {
    assert_eq!(canonicalize_loose(&GValue::int(42)), "42");
    assert_eq!(canonicalize_loose(&GValue::int(-123)), "-123");
    assert_eq!(canonicalize_loose(&GValue::int(0)), "0");
}

#[test]
fn test_canon_float() {
    assert_eq!(canonicalize_loose(&GValue::float(3.14)), "3.14");
    assert_eq!(canonicalize_loose(&GValue::float(0.0)), "0");
    assert_eq!(canonicalize_loose(&GValue::float(-0.0)), "0");
}

#[test]
fn test_canon_string_bare() {
    let gv = GValue::str("hello");
    assert_eq!(canonicalize_loose(&gv), "hello");
}

#[test]
fn test_canon_string_quoted() {
    let gv = GValue::str("hello world");
    assert_eq!(canonicalize_loose(&gv), "\"hello world\"");
}

#[test]
fn test_canon_string_escapes() {
    let gv = GValue::str("line1\nline2");
    assert_eq!(canonicalize_loose(&gv), "\"line1\\nline2\"");
}

#[test]
fn test_canon_list() {
    let gv = GValue::list(vec![GValue::int(1), GValue::int(2), GValue::int(3)]);
    assert_eq!(canonicalize_loose(&gv), "[1 2 3]");
}

#[test]
fn test_canon_map_sorted() {
    let gv = GValue::map(vec![field("b", GValue::int(2)), field("a", GValue::int(1))]);
    assert_eq!(canonicalize_loose(&gv), "{a=1 b=2}");
}

#[test]
fn test_canon_ref() {
    let gv = GValue::id("user", "123");
    assert_eq!(canonicalize_loose(&gv), "^user:123");

    let gv2 = GValue::simple_id("abc");
    assert_eq!(canonicalize_loose(&gv2), "^abc");
}

#[test]
fn test_json_roundtrip() {
    let data = json!({
        "name": "Alice",
        "age": 30,
        "active": true
    });

    let gv = from_json(&data);
    let restored = to_json(&gv);

    assert_eq!(data, restored);
}

#[test]
fn test_sparse_keys_no_tabular() {
    let data = json!([{"a": 1}, {"b": 2}, {"c": 3}]);
    let gv = from_json(&data);
    let result = canonicalize_loose(&gv);

    assert!(!result.contains("@tab"), "Disjoint keys should not use tabular");
    assert_eq!(result, "[{a=1} {b=2} {c=3}]");
}

#[test]
fn test_homogeneous_array_tabular() {
    let data = json!([
        {"a": 1, "b": 2},
        {"a": 3, "b": 4},
        {"a": 5, "b": 6}
    ]);
    let gv = from_json(&data);
    let result = canonicalize_loose(&gv);

    assert!(result.contains("@tab"), "Homogeneous array should use tabular");
}

#[test]
fn test_empty_objects_no_tabular() {
    let data = json!([{}, {}, {}]);
    let gv = from_json(&data);
    let result = canonicalize_loose(&gv);

    assert!(!result.contains("@tab"), "Empty objects should not use tabular");
    assert_eq!(result, "[{} {} {}]");
}

#[test]
fn test_equality() {
    let a = from_json(&json!({"x": 1, "y": 2}));
    let b = from_json(&json!({"y": 2, "x": 1}));

    assert!(equal_loose(&a, &b), "Same data, different order should be equal");
}

#[test]
fn test_fingerprint_deterministic() {
    let data = json!({"a": 1, "b": [2, 3]});
    let gv = from_json(&data);

    let fp1 = fingerprint(&gv);
    let fp2 = fingerprint(&gv);

    assert_eq!(fp1, fp2);
}

#[test]
fn test_short_fingerprint_length() {
    let gv = from_json(&json!({"test": "value"}));
    let h = short_fingerprint(&gv);

    assert_eq!(h.len(), 16);
}

#[test]
fn test_unicode() {
    let gv = GValue::str("\u{4f60}\u{597d}\u{4e16}\u{754c}");
    let result = canonicalize_loose(&gv);
    assert_eq!(result, "\u{4f60}\u{597d}\u{4e16}\u{754c}");
}

#[test]
fn test_complex_nested() {
    let data = json!({
        "tool_call": {
            "name": "search",
            "args": {
                "query": "weather",
                "limit": 10
            }
        }
    });

    let gv = from_json(&data);
    let result = canonicalize_loose(&gv);

    assert!(result.contains("search"));
    assert!(result.contains("query=weather"));
    assert!(result.contains("limit=10"));
}

#[test]
fn test_tabular_threshold() {
    let data2 = json!([{"a": 1}, {"a": 2}]);
    let result2 = canonicalize_loose(&from_json(&data2));
    assert!(!result2.contains("@tab"));

    let data3 = json!([{"a": 1}, {"a": 2}, {"a": 3}]);
    let result3 = canonicalize_loose(&from_json(&data3));
    assert!(result3.contains("@tab"));
}

/// Property 1 (idempotence), exercised end-to-end across the JSON bridge,
/// the canonicalizer, and the parser together rather than any single module.
#[test]
fn property_idempotence_across_json_bridge_and_parser() {
    let data = json!({
        "b": 2,
        "a": [1, "x y", null, true],
        "nested": {"k": 1.5}
    });
    let gv = from_json(&data);
    let canon1 = canonicalize_loose(&gv);
    let parsed = parse_loose(&canon1).unwrap();
    assert!(equal_loose(&gv, &parsed));
    assert_eq!(canonicalize_loose(&parsed), canon1);
}

/// Property 3 (cross-implementation parity): a small frozen corpus of JSON
/// inputs and their expected canonical outputs.
#[test]
fn corpus_json_to_canonical() {
    let cases: &[(serde_json::Value, &str)] = &[
        (json!(null), "_"),
        (json!(true), "t"),
        (json!(false), "f"),
        (json!(0), "0"),
        (json!(-1), "-1"),
        (json!("hello"), "hello"),
        (json!("hello world"), "\"hello world\""),
        (json!([]), "[]"),
        (json!({}), "{}"),
        (json!([1, 2, 3]), "[1 2 3]"),
        (json!({"b": 1, "a": 2}), "{a=2 b=1}"),
    ];
    for (input, expected) in cases {
        let gv = from_json(input);
        assert_eq!(&canonicalize_loose(&gv), expected, "input: {input}");
    }
}

#[test]
fn sc1_literal_scenario() {
    let gv = from_json(&json!({"b":1,"a":2,"aa":3,"A":4,"_":5}));
    assert_eq!(canonicalize_loose(&gv), "{A=4 _=5 a=2 aa=3 b=1}");
}

#[test]
fn sc3_literal_scenario_auto_tabular() {
    let gv = from_json(&json!([
        {"id": 1, "name": "a"},
        {"id": 2, "name": "b"},
        {"id": 3, "name": "c"}
    ]));
    let out = canonicalize_loose(&gv);
    assert!(out.starts_with("@tab"));
    assert!(out.contains("cols=2"));
    assert!(out.contains("rows=3"));
    assert!(out.ends_with("@end"));
}

/// Property 4: sorted keys are non-decreasing in byte-wise UTF-8 order of
/// their canonical string form.
#[test]
fn property_key_sort_is_non_decreasing() {
    let gv = GValue::map(vec![
        field("zebra", GValue::int(1)),
        field("apple", GValue::int(2)),
        field("mango", GValue::int(3)),
    ]);
    let out = canonicalize_loose(&gv);
    let inner = &out[1..out.len() - 1];
    let keys: Vec<&str> = inner.split(' ').map(|kv| kv.split('=').next().unwrap()).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn sc4_literal_scenario() {
    let registry = StaticToolRegistry::new().with_tool(
        "search",
        ToolSchema::new()
            .with_arg("query", ArgSchema::new(ArgType::Str).required())
            .with_arg("max_results", ArgSchema::new(ArgType::Int).range(1.0, 100.0)),
    );

    let mut known = StreamingValidator::new(&registry);
    let snap = known.push("{action=search q");
    assert_eq!(snap.state, Some(ValidatorState::InFieldKey));
    assert_eq!(snap.tool_name.as_deref(), Some("search"));
    assert!(snap.error.is_none());

    let mut unknown = StreamingValidator::new(&registry);
    let snap2 = unknown.push("{action=hack_server p");
    assert_eq!(snap2.state, Some(ValidatorState::Aborted));
    assert_eq!(snap2.error, Some(ValidatorErrorCode::UnknownTool));
}

#[test]
fn sc5_literal_scenario() {
    let state = GValue::map(vec![
        field("score", GValue::list(vec![GValue::int(1), GValue::int(2)])),
        field("name", GValue::str("alice")),
    ]);

    let mismatched_text = "@patch @target=m:ARS @base=0123456789abcdef\n= score [3 1]\n@end";
    let mismatched = parse_patch(mismatched_text).unwrap();
    assert!(apply_patch(&state, &mismatched).is_err());

    let matching_text = format!(
        "@patch @target=m:ARS @base={}\n= score [3 1]\n@end",
        short_fingerprint(&state)
    );
    let matching = parse_patch(&matching_text).unwrap();
    let applied = apply_patch(&state, &matching).unwrap();
    assert_eq!(canonicalize_loose(applied.get("score").unwrap()), "[3 1]");
}
