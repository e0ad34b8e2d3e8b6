//! GLYPH loose mode canonicalization
//!
//! Provides deterministic canonical string representation for GValues
//! in schema-optional mode. Used for hashing, comparison, and deduplication.

use crate::error::{GlyphError, Result};
use crate::types::*;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::collections::HashSet;

/// Null style for canonicalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullStyle {
    /// Use underscore: _
    #[default]
    Underscore,
    /// Use unicode symbol: ∅
    Symbol,
}

/// A key-dictionary for the `@schema#<id>` string-compression header
/// (§4.3 "Schema-header option"). Purely a rendering optimization: keys
/// present in the dictionary are rendered as `#N` (their index) instead
/// of verbatim, without changing canonical sort order or semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDict {
    pub id: u64,
    pub keys: Vec<String>,
}

impl KeyDict {
    pub fn new(id: u64, keys: Vec<String>) -> Self {
        Self { id, keys }
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }
}

/// Options for loose canonicalization
#[derive(Debug, Clone)]
pub struct LooseCanonOpts {
    /// Enable auto-tabular mode for homogeneous arrays
    pub auto_tabular: bool,
    /// Minimum rows for tabular mode
    pub min_rows: usize,
    /// Maximum columns for tabular mode
    pub max_cols: usize,
    /// Allow missing keys in tabular (fill with null)
    pub allow_missing: bool,
    /// Null value style
    pub null_style: NullStyle,
    /// Optional key dictionary for `#N` compression
    pub key_dict: Option<KeyDict>,
}

impl Default for LooseCanonOpts {
    fn default() -> Self {
        Self {
            auto_tabular: true,
            min_rows: 3,
            max_cols: 20,
            allow_missing: true,
            null_style: NullStyle::Underscore,
            key_dict: None,
        }
    }
}

impl LooseCanonOpts {
    /// Options optimized for LLM output (same as `default`, spelled out
    /// for call-site clarity).
    pub fn llm() -> Self {
        Self::default()
    }

    /// Options with pretty unicode null symbol
    pub fn pretty() -> Self {
        Self {
            null_style: NullStyle::Symbol,
            ..Self::default()
        }
    }

    /// Options with tabular disabled
    pub fn no_tabular() -> Self {
        Self {
            auto_tabular: false,
            ..Self::default()
        }
    }
}

/// Canonicalize a GValue to GLYPH string with default options
pub fn canonicalize_loose(v: &GValue) -> String {
    canonicalize_loose_with_opts(v, &LooseCanonOpts::default())
}

/// Canonicalize without tabular mode
pub fn canonicalize_loose_no_tabular(v: &GValue) -> String {
    canonicalize_loose_with_opts(v, &LooseCanonOpts::no_tabular())
}

/// Canonicalize with custom options
pub fn canonicalize_loose_with_opts(v: &GValue, opts: &LooseCanonOpts) -> String {
    let mut buf = String::new();
    if let Some(dict) = &opts.key_dict {
        buf.push_str(&format!(
            "@schema#{} keys=[{}]\n",
            dict.id,
            dict.keys
                .iter()
                .map(|k| canon_string(k))
                .collect::<Vec<_>>()
                .join(" ")
        ));
    }
    write_canon_loose(&mut buf, v, opts);
    buf
}

// ============================================================
// Internal canonicalization
// ============================================================

fn write_canon_loose(buf: &mut String, v: &GValue, opts: &LooseCanonOpts) {
    match v {
        GValue::Null => buf.push_str(canon_null(opts.null_style)),
        GValue::Bool(b) => buf.push(if *b { 't' } else { 'f' }),
        GValue::Int(n) => buf.push_str(&canon_int(*n)),
        GValue::Float(f) => buf.push_str(&canon_float(*f).unwrap_or_else(|_| "0".to_string())),
        GValue::Str(s) => buf.push_str(&canon_string(s)),
        GValue::Bytes(data) => write_canon_bytes(buf, data),
        GValue::Time(t) => buf.push_str(&canon_time(t)),
        GValue::Id(ref_id) => write_canon_ref(buf, ref_id),
        GValue::List(items) => write_canon_list(buf, items, opts),
        GValue::Map(entries) => write_canon_map(buf, entries, opts),
        // Loose mode discards the struct's type name and treats it as a
        // plain map (§4.3) -- the name survives only in the in-memory
        // `StructValue` and the struct-literal *parse* syntax.
        GValue::Struct(s) => write_canon_map(buf, &s.fields, opts),
        GValue::Sum(s) => write_canon_sum(buf, s, opts),
    }
}

fn canon_null(style: NullStyle) -> &'static str {
    match style {
        NullStyle::Underscore => "_",
        NullStyle::Symbol => "∅",
    }
}

fn canon_int(n: i64) -> String {
    n.to_string()
}

/// Reject NaN/Infinity; render the shortest round-trippable decimal,
/// switching to exponential notation when the decimal exponent is
/// `< -4` or `>= 15` (§4.2).
pub fn canon_float(f: f64) -> Result<String> {
    if f.is_nan() || f.is_infinite() {
        return Err(GlyphError::InvalidFloat(
            "NaN and Infinity cannot be canonicalized".to_string(),
        ));
    }

    let f = if f == 0.0 { 0.0 } else { f };
    if f == 0.0 {
        return Ok("0".to_string());
    }

    let neg = f.is_sign_negative();
    let abs = f.abs();

    // Rust's `{:e}` formatting for f64, like `{}`, uses the shortest
    // decimal that round-trips -- we just need to reshape its output into
    // GLYPH's exponent syntax.
    let sci = format!("{:e}", abs);
    let (mantissa, exp_str) = sci
        .split_once('e')
        .expect("f64 LowerExp output always contains 'e'");
    let exp: i32 = exp_str.parse().expect("f64 LowerExp exponent is numeric");

    let body = if exp < -4 || exp >= 15 {
        let sign = if exp >= 0 { "+" } else { "-" };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    } else {
        format!("{abs}")
    };

    Ok(if neg { format!("-{body}") } else { body })
}

fn canon_time(t: &chrono::DateTime<chrono::Utc>) -> String {
    if t.timestamp_subsec_millis() == 0 {
        t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    } else {
        t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }
}

/// First code point must be a Unicode letter or `_`; the rest drawn from
/// {letter, digit, `_`, `-`, `.`, `/`}; not a reserved word (§4.2).
fn is_bare_safe(s: &str) -> bool {
    let mut chars = s.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    if !(first.is_alphabetic() || first == '_') {
        return false;
    }
    for c in chars {
        if !(c.is_alphabetic() || c.is_numeric() || matches!(c, '_' | '-' | '.' | '/')) {
            return false;
        }
    }
    !matches!(s, "t" | "f" | "true" | "false" | "null" | "none" | "nil")
}

fn canon_string(s: &str) -> String {
    if is_bare_safe(s) {
        s.to_string()
    } else {
        quote_string(s)
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn write_canon_bytes(buf: &mut String, data: &[u8]) {
    buf.push_str("b64\"");
    buf.push_str(&BASE64.encode(data));
    buf.push('"');
}

fn write_canon_ref(buf: &mut String, ref_id: &RefId) {
    buf.push('^');
    if is_ref_safe(&ref_id.prefix, &ref_id.value) {
        if !ref_id.prefix.is_empty() {
            buf.push_str(&ref_id.prefix);
            buf.push(':');
        }
        buf.push_str(&ref_id.value);
    } else {
        let combined = if ref_id.prefix.is_empty() {
            ref_id.value.clone()
        } else {
            format!("{}:{}", ref_id.prefix, ref_id.value)
        };
        buf.push_str(&quote_string(&combined));
    }
}

/// Ref-safe rule: same as bare-safe, plus `:` allowed (§4.2), checked
/// against the combined `prefix:value` (or bare `value`) form.
fn is_ref_safe(prefix: &str, value: &str) -> bool {
    let combined;
    let s: &str = if prefix.is_empty() {
        value
    } else {
        combined = format!("{prefix}:{value}");
        &combined
    };

    let mut chars = s.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    if !(first.is_alphabetic() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_alphabetic() || c.is_numeric() || matches!(c, '_' | '-' | '.' | '/' | ':'))
}

fn write_canon_list(buf: &mut String, items: &[GValue], opts: &LooseCanonOpts) {
    if opts.auto_tabular {
        if let Some(tabular) = try_emit_tabular(items, opts) {
            buf.push_str(&tabular);
            return;
        }
    }

    buf.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            buf.push(' ');
        }
        write_canon_loose(buf, item, opts);
    }
    buf.push(']');
}

fn render_key(buf: &mut String, key: &str, opts: &LooseCanonOpts) {
    match opts.key_dict.as_ref().and_then(|d| d.index_of(key)) {
        Some(idx) => buf.push_str(&format!("#{idx}")),
        None => buf.push_str(&canon_string(key)),
    }
}

fn write_canon_map(buf: &mut String, entries: &[MapEntry], opts: &LooseCanonOpts) {
    buf.push('{');

    // Sort entries by the byte-wise UTF-8 order of each key's canonical
    // string form -- sort order is unaffected by `#N` compression.
    let mut sorted: Vec<_> = entries.iter().collect();
    sorted.sort_by(|a, b| canon_string(&a.key).cmp(&canon_string(&b.key)));

    for (i, entry) in sorted.iter().enumerate() {
        if i > 0 {
            buf.push(' ');
        }
        render_key(buf, &entry.key, opts);
        buf.push('=');
        write_canon_loose(buf, &entry.value, opts);
    }
    buf.push('}');
}

fn write_canon_sum(buf: &mut String, s: &SumValue, opts: &LooseCanonOpts) {
    // A Sum is a one-entry map `{tag=value}` (or `{tag=_}` with no
    // payload) at the canonical layer -- `Name(...)` is input syntax only.
    buf.push('{');
    render_key(buf, &s.tag, opts);
    buf.push('=');
    match &s.value {
        Some(v) => write_canon_loose(buf, v, opts),
        None => buf.push_str(canon_null(opts.null_style)),
    }
    buf.push('}');
}

// ============================================================
// Auto-tabular detection and emission
// ============================================================

fn try_emit_tabular(items: &[GValue], opts: &LooseCanonOpts) -> Option<String> {
    if items.len() < opts.min_rows {
        return None;
    }

    let mut all_keys: HashSet<String> = HashSet::new();
    let mut row_keys: Vec<HashSet<String>> = Vec::new();

    for item in items {
        let keys = get_object_keys(item)?;
        let key_set: HashSet<String> = keys.into_iter().collect();
        all_keys.extend(key_set.clone());
        row_keys.push(key_set);
    }

    if all_keys.is_empty() || all_keys.len() > opts.max_cols {
        return None;
    }

    if !opts.allow_missing {
        let first_keys = &row_keys[0];
        for keys in &row_keys[1..] {
            if keys != first_keys {
                return None;
            }
        }
    } else {
        // "Mostly-common" guard: at least half of the union of keys must
        // be present in every row.
        let mut common_keys: HashSet<String> = row_keys[0].clone();
        for keys in &row_keys[1..] {
            common_keys = common_keys.intersection(keys).cloned().collect();
        }
        if common_keys.len() * 2 < all_keys.len() {
            return None;
        }
    }

    let mut cols: Vec<String> = all_keys.into_iter().collect();
    cols.sort_by(|a, b| canon_string(a).cmp(&canon_string(b)));

    let mut buf = String::new();
    buf.push_str(&format!(
        "@tab _ rows={} cols={} [{}]\n",
        items.len(),
        cols.len(),
        cols.iter()
            .map(|c| canon_string(c))
            .collect::<Vec<_>>()
            .join(" ")
    ));

    for item in items {
        buf.push('|');
        let values = get_object_values(item);
        for col in &cols {
            let cell = values
                .get(col.as_str())
                .map(|v| {
                    let mut cell_buf = String::new();
                    write_canon_loose(&mut cell_buf, v, opts);
                    cell_buf.replace('|', "\\|")
                })
                .unwrap_or_else(|| canon_null(opts.null_style).to_string());
            buf.push_str(&cell);
            buf.push('|');
        }
        buf.push('\n');
    }
    buf.push_str("@end");

    Some(buf)
}

fn get_object_keys(v: &GValue) -> Option<Vec<String>> {
    match v {
        GValue::Map(entries) => Some(entries.iter().map(|e| e.key.clone()).collect()),
        GValue::Struct(s) => Some(s.fields.iter().map(|f| f.key.clone()).collect()),
        _ => None,
    }
}

fn get_object_values(v: &GValue) -> std::collections::HashMap<&str, &GValue> {
    match v {
        GValue::Map(entries) => entries.iter().map(|e| (e.key.as_str(), &e.value)).collect(),
        GValue::Struct(s) => s.fields.iter().map(|f| (f.key.as_str(), &f.value)).collect(),
        _ => std::collections::HashMap::new(),
    }
}
