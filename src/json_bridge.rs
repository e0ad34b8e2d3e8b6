//! JSON <-> GValue conversion (C4's JSON bridge).
//!
//! Two modes: compact (the default -- Time/Id/Bytes degrade to plain JSON
//! strings) and extended (`{"$glyph": "...", ...}` tagged objects that
//! round-trip the typed variants exactly).

use crate::error::*;
use crate::types::*;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{Map, Number, Value as JsonValue};

/// 2^53, the largest integer magnitude JSON numbers are guaranteed to
/// carry exactly in an IEEE-754 double.
const MAX_SAFE_INT: i64 = 9_007_199_254_740_992;

/// Convert JSON value to GValue (compact mode).
pub fn from_json(json: &JsonValue) -> GValue {
    match json {
        JsonValue::Null => GValue::Null,
        JsonValue::Bool(b) => GValue::Bool(*b),
        JsonValue::Number(n) => number_to_gvalue(n),
        JsonValue::String(s) => GValue::Str(s.clone()),
        JsonValue::Array(arr) => GValue::List(arr.iter().map(from_json).collect()),
        JsonValue::Object(obj) => {
            let entries: Vec<MapEntry> = obj
                .iter()
                .map(|(k, v)| MapEntry::new(k.clone(), from_json(v)))
                .collect();
            GValue::Map(entries)
        }
    }
}

fn number_to_gvalue(n: &Number) -> GValue {
    if let Some(i) = n.as_i64() {
        if i.unsigned_abs() <= MAX_SAFE_INT as u64 {
            return GValue::Int(i);
        }
    }
    match n.as_f64() {
        Some(f) if f.is_finite() => GValue::Float(f),
        _ => GValue::Float(0.0),
    }
}

/// Convert GValue to JSON value (compact mode): Time renders as an ISO
/// string, Id as `"^prefix:value"`, Bytes as a plain base64 string.
pub fn to_json(gv: &GValue) -> JsonValue {
    match gv {
        GValue::Null => JsonValue::Null,
        GValue::Bool(b) => JsonValue::Bool(*b),
        GValue::Int(n) => JsonValue::Number(Number::from(*n)),
        GValue::Float(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        GValue::Str(s) => JsonValue::String(s.clone()),
        GValue::Bytes(data) => JsonValue::String(BASE64.encode(data)),
        GValue::Time(t) => JsonValue::String(t.to_rfc3339()),
        GValue::Id(ref_id) => JsonValue::String(id_to_string(ref_id)),
        GValue::List(items) => JsonValue::Array(items.iter().map(to_json).collect()),
        GValue::Map(entries) => {
            let mut map = Map::new();
            for entry in entries {
                map.insert(entry.key.clone(), to_json(&entry.value));
            }
            JsonValue::Object(map)
        }
        GValue::Struct(s) => {
            let mut map = Map::new();
            for field in &s.fields {
                map.insert(field.key.clone(), to_json(&field.value));
            }
            map.insert("_type".to_string(), JsonValue::String(s.type_name.clone()));
            JsonValue::Object(map)
        }
        GValue::Sum(s) => {
            let mut map = Map::new();
            map.insert("_tag".to_string(), JsonValue::String(s.tag.clone()));
            if let Some(ref value) = s.value {
                map.insert("_value".to_string(), to_json(value));
            }
            JsonValue::Object(map)
        }
    }
}

fn id_to_string(ref_id: &RefId) -> String {
    if ref_id.prefix.is_empty() {
        format!("^{}", ref_id.value)
    } else {
        format!("^{}:{}", ref_id.prefix, ref_id.value)
    }
}

// ============================================================
// Extended mode: `{"$glyph": "time"|"id"|"bytes", ...}`
// ============================================================

/// Convert JSON to GValue, recognizing the `$glyph`-tagged extended forms
/// for Time, Id, and Bytes.
pub fn from_json_extended(json: &JsonValue) -> Result<GValue> {
    if let JsonValue::Object(obj) = json {
        if let Some(JsonValue::String(tag)) = obj.get("$glyph") {
            return match tag.as_str() {
                "time" => {
                    let s = extended_str_field(obj, "value")?;
                    let dt = chrono::DateTime::parse_from_rfc3339(s)
                        .map_err(|e| GlyphError::Parse(format!("invalid $glyph time: {e}")))?;
                    Ok(GValue::Time(dt.with_timezone(&chrono::Utc)))
                }
                "id" => {
                    let s = extended_str_field(obj, "value")?;
                    let s = s.strip_prefix('^').unwrap_or(s);
                    Ok(match s.split_once(':') {
                        Some((prefix, value)) => GValue::id(prefix, value),
                        None => GValue::simple_id(s),
                    })
                }
                "bytes" => {
                    let s = extended_str_field(obj, "base64")?;
                    let bytes = BASE64
                        .decode(s)
                        .map_err(|e| GlyphError::Parse(format!("invalid $glyph bytes: {e}")))?;
                    Ok(GValue::Bytes(bytes))
                }
                other => Err(GlyphError::InvalidValue(format!(
                    "unknown $glyph tag: {other}"
                ))),
            };
        }
        let entries = obj
            .iter()
            .map(|(k, v)| Ok(MapEntry::new(k.clone(), from_json_extended(v)?)))
            .collect::<Result<Vec<_>>>()?;
        return Ok(GValue::Map(entries));
    }
    if let JsonValue::Array(arr) = json {
        let items = arr.iter().map(from_json_extended).collect::<Result<Vec<_>>>()?;
        return Ok(GValue::List(items));
    }
    Ok(from_json(json))
}

fn extended_str_field<'a>(obj: &'a Map<String, JsonValue>, key: &str) -> Result<&'a str> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| GlyphError::MissingField(key.to_string()))
}

/// Convert GValue to JSON, emitting the `$glyph`-tagged extended forms for
/// Time, Id, and Bytes instead of their compact plain-string forms.
pub fn to_json_extended(gv: &GValue) -> JsonValue {
    match gv {
        GValue::Time(t) => {
            let mut map = Map::new();
            map.insert("$glyph".to_string(), JsonValue::String("time".to_string()));
            map.insert("value".to_string(), JsonValue::String(t.to_rfc3339()));
            JsonValue::Object(map)
        }
        GValue::Id(ref_id) => {
            let mut map = Map::new();
            map.insert("$glyph".to_string(), JsonValue::String("id".to_string()));
            map.insert("value".to_string(), JsonValue::String(id_to_string(ref_id)));
            JsonValue::Object(map)
        }
        GValue::Bytes(data) => {
            let mut map = Map::new();
            map.insert("$glyph".to_string(), JsonValue::String("bytes".to_string()));
            map.insert("base64".to_string(), JsonValue::String(BASE64.encode(data)));
            JsonValue::Object(map)
        }
        GValue::List(items) => JsonValue::Array(items.iter().map(to_json_extended).collect()),
        GValue::Map(entries) => {
            let mut map = Map::new();
            for entry in entries {
                map.insert(entry.key.clone(), to_json_extended(&entry.value));
            }
            JsonValue::Object(map)
        }
        GValue::Struct(s) => {
            let mut map = Map::new();
            for field in &s.fields {
                map.insert(field.key.clone(), to_json_extended(&field.value));
            }
            map.insert("_type".to_string(), JsonValue::String(s.type_name.clone()));
            JsonValue::Object(map)
        }
        GValue::Sum(s) => {
            let mut map = Map::new();
            map.insert("_tag".to_string(), JsonValue::String(s.tag.clone()));
            if let Some(ref value) = s.value {
                map.insert("_value".to_string(), to_json_extended(value));
            }
            JsonValue::Object(map)
        }
        _ => to_json(gv),
    }
}

/// Parse JSON string to GValue
pub fn parse_json(json_str: &str) -> Result<GValue> {
    let json: JsonValue = serde_json::from_str(json_str)?;
    Ok(from_json(&json))
}

/// Stringify GValue to JSON string
pub fn stringify_json(gv: &GValue) -> String {
    serde_json::to_string(&to_json(gv)).unwrap_or_default()
}

/// Stringify GValue to pretty JSON string
pub fn stringify_json_pretty(gv: &GValue) -> String {
    serde_json::to_string_pretty(&to_json(gv)).unwrap_or_default()
}
