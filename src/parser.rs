//! GLYPH loose-mode parser (C4).
//!
//! A permissive, single-pass, code-point-oriented reader for the textual
//! form the canonicalizer in `canon.rs` produces, plus the wider grammar
//! `canon.rs` never emits but this reader still accepts (quote-or-bare
//! key separators, `true`/`false`, `@tab`/`@schema` blocks, ...).

use crate::error::{GlyphError, ParseErrorKind, Result};
use crate::types::*;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use std::sync::OnceLock;

fn time_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?Z").unwrap()
    })
}

/// Parse a single GLYPH loose-mode document, including an optional
/// leading `@schema#<id> keys=[...]` header.
pub fn parse_loose(input: &str) -> Result<GValue> {
    let mut p = Parser::new(input);
    p.skip_ws_and_seps();
    if p.starts_with("@schema#") {
        p.parse_schema_header()?;
        p.skip_ws_and_seps();
    }
    let value = p.parse_value()?;
    p.skip_ws_and_seps();
    if !p.at_end() {
        return Err(p.err_here(ParseErrorKind::Other(
            "trailing input after top-level value".to_string(),
        )));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    key_dict: Option<Vec<String>>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            key_dict: None,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, c: char) -> Result<()> {
        match self.peek() {
            Some(found) if found == c => {
                self.bump();
                Ok(())
            }
            Some(found) => Err(self.err_here(ParseErrorKind::UnexpectedChar(found))),
            None => Err(self.err_here(ParseErrorKind::UnexpectedEof)),
        }
    }

    fn expect_str(&mut self, s: &str) -> Result<()> {
        if self.starts_with(s) {
            self.pos += s.len();
            Ok(())
        } else {
            Err(self.err_here(ParseErrorKind::Other(format!("expected `{s}`"))))
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// Whitespace and `,` item separators.
    fn skip_ws_and_seps(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn err_here(&self, kind: ParseErrorKind) -> GlyphError {
        GlyphError::ParseAt {
            offset: self.pos,
            kind,
        }
    }

    // ============================================================
    // Value dispatch
    // ============================================================

    fn parse_value(&mut self) -> Result<GValue> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.err_here(ParseErrorKind::UnexpectedEof)),
            Some('"') => Ok(GValue::Str(self.parse_quoted()?)),
            Some('[') => self.parse_list(),
            Some('{') => self.parse_map(),
            Some('^') => self.parse_id(),
            Some('_') => self.parse_underscore(),
            Some('\u{2205}') => {
                self.bump();
                Ok(GValue::Null)
            }
            Some('@') => self.parse_directive_value(),
            Some(c) if c == '-' || c.is_ascii_digit() => self.parse_number_or_time(),
            Some(c) if c.is_alphabetic() => self.parse_bare_leading(),
            Some(c) => Err(self.err_here(ParseErrorKind::UnexpectedChar(c))),
        }
    }

    /// `_` alone is Null; `_foo` is the bare string `"_foo"` (identifier
    /// rule: first char `_` is a valid bare-string start).
    fn parse_underscore(&mut self) -> Result<GValue> {
        let ident = self.read_identifier();
        if ident == "_" {
            Ok(GValue::Null)
        } else {
            self.classify_bare(ident)
        }
    }

    fn parse_bare_leading(&mut self) -> Result<GValue> {
        let start = self.pos;
        let ident = self.read_identifier();

        if ident == "b64" && self.peek() == Some('"') {
            let s = self.parse_quoted()?;
            let bytes = BASE64
                .decode(s.as_bytes())
                .map_err(|e| self.err_at(start, ParseErrorKind::Other(format!("invalid base64: {e}"))))?;
            return Ok(GValue::Bytes(bytes));
        }

        match self.peek() {
            Some('{') => {
                self.bump();
                self.parse_struct_body(ident)
            }
            Some('(') => {
                self.bump();
                self.parse_sum_body(ident)
            }
            _ => self.classify_bare(ident),
        }
    }

    fn err_at(&self, offset: usize, kind: ParseErrorKind) -> GlyphError {
        GlyphError::ParseAt { offset, kind }
    }

    fn classify_bare(&self, ident: String) -> Result<GValue> {
        Ok(match ident.as_str() {
            "_" | "null" | "none" | "nil" => GValue::Null,
            "t" | "true" => GValue::Bool(true),
            "f" | "false" => GValue::Bool(false),
            _ => GValue::Str(ident),
        })
    }

    /// Reads a bare identifier: first code point alphabetic or `_`, the
    /// rest from {letter, digit, `_`, `-`, `.`, `/`}.
    fn read_identifier(&mut self) -> String {
        let mut out = String::new();
        if let Some(c) = self.peek() {
            if c.is_alphabetic() || c == '_' {
                out.push(c);
                self.bump();
            }
        }
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/') {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        out
    }

    fn parse_number_or_time(&mut self) -> Result<GValue> {
        if let Some(m) = time_regex().find(self.rest()) {
            let text = m.as_str().to_string();
            self.pos += text.len();
            let dt = DateTime::parse_from_rfc3339(&text)
                .map_err(|e| self.err_here(ParseErrorKind::Other(format!("invalid timestamp: {e}"))))?;
            return Ok(GValue::Time(dt.with_timezone(&Utc)));
        }
        self.parse_number()
    }

    fn parse_number(&mut self) -> Result<GValue> {
        let start = self.pos;
        let mut is_float = false;

        if self.peek() == Some('-') {
            self.bump();
        }
        let digits_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if self.pos == digits_start {
            return Err(self.err_at(start, ParseErrorKind::InvalidNumber(self.src[start..self.pos].to_string())));
        }
        if self.peek() == Some('.') {
            is_float = true;
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            is_float = true;
            self.bump();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.bump();
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }

        let text = &self.src[start..self.pos];
        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(GValue::Int(n));
            }
        }
        let f: f64 = text
            .parse()
            .map_err(|_| self.err_at(start, ParseErrorKind::InvalidNumber(text.to_string())))?;
        if f.is_nan() || f.is_infinite() {
            return Err(self.err_at(start, ParseErrorKind::NonFinite(text.to_string())));
        }
        Ok(GValue::Float(f))
    }

    fn parse_quoted(&mut self) -> Result<String> {
        let start = self.pos;
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.err_at(start, ParseErrorKind::UnterminatedString)),
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some('\\') => out.push('\\'),
                    Some('"') => out.push('"'),
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some('u') => {
                        let mut hex = String::with_capacity(4);
                        for _ in 0..4 {
                            match self.bump() {
                                Some(c) if c.is_ascii_hexdigit() => hex.push(c),
                                _ => {
                                    return Err(self.err_here(ParseErrorKind::InvalidEscape(
                                        format!("\\u{hex}"),
                                    )))
                                }
                            }
                        }
                        let code = u32::from_str_radix(&hex, 16).unwrap();
                        match char::from_u32(code) {
                            Some(c) => out.push(c),
                            None => {
                                return Err(self
                                    .err_here(ParseErrorKind::InvalidEscape(format!("\\u{hex}"))))
                            }
                        }
                    }
                    Some(other) => {
                        return Err(self.err_here(ParseErrorKind::InvalidEscape(other.to_string())))
                    }
                    None => return Err(self.err_here(ParseErrorKind::UnterminatedString)),
                },
                Some(c) => out.push(c),
            }
        }
        Ok(out)
    }

    fn parse_id(&mut self) -> Result<GValue> {
        self.expect('^')?;
        let combined = if self.peek() == Some('"') {
            self.parse_quoted()?
        } else {
            self.read_ref_token()?
        };
        Ok(match combined.split_once(':') {
            Some((prefix, value)) => GValue::id(prefix, value),
            None => GValue::simple_id(combined),
        })
    }

    fn read_ref_token(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':') {
                self.bump();
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.err_here(ParseErrorKind::Other("empty id token".to_string())));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn parse_list(&mut self) -> Result<GValue> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_ws_and_seps();
            if self.peek() == Some(']') {
                self.bump();
                break;
            }
            items.push(self.parse_value()?);
            self.skip_ws_and_seps();
            if self.peek() == Some(']') {
                self.bump();
                break;
            }
        }
        Ok(GValue::List(items))
    }

    fn parse_map(&mut self) -> Result<GValue> {
        self.expect('{')?;
        let entries = self.parse_entries('}')?;
        Ok(GValue::Map(entries))
    }

    fn parse_struct_body(&mut self, type_name: String) -> Result<GValue> {
        let fields = self.parse_entries('}')?;
        Ok(GValue::Struct(StructValue::new(type_name, fields)))
    }

    fn parse_sum_body(&mut self, tag: String) -> Result<GValue> {
        self.skip_ws();
        if self.peek() == Some(')') {
            self.bump();
            return Ok(GValue::sum(tag, None));
        }
        let value = self.parse_value()?;
        self.skip_ws();
        self.expect(')')?;
        Ok(GValue::sum(tag, Some(value)))
    }

    /// Shared key=value / key:value entry-list reader for Map and Struct
    /// bodies, up to (and consuming) `closer`. Duplicate keys keep the
    /// last-seen value but the first-seen position.
    fn parse_entries(&mut self, closer: char) -> Result<Vec<MapEntry>> {
        let mut entries: Vec<MapEntry> = Vec::new();
        let mut index_of: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

        loop {
            self.skip_ws_and_seps();
            if self.peek() == Some(closer) {
                self.bump();
                break;
            }
            let key = self.parse_key()?;
            self.skip_ws();
            match self.peek() {
                Some('=') | Some(':') => {
                    self.bump();
                }
                Some(c) => return Err(self.err_here(ParseErrorKind::UnexpectedChar(c))),
                None => return Err(self.err_here(ParseErrorKind::UnexpectedEof)),
            }
            self.skip_ws();
            let value = self.parse_value()?;

            if let Some(&idx) = index_of.get(&key) {
                entries[idx].value = value;
            } else {
                index_of.insert(key.clone(), entries.len());
                entries.push(MapEntry::new(key, value));
            }

            self.skip_ws_and_seps();
            if self.peek() == Some(closer) {
                self.bump();
                break;
            }
        }
        Ok(entries)
    }

    fn parse_key(&mut self) -> Result<String> {
        match self.peek() {
            Some('"') => self.parse_quoted(),
            Some('#') => {
                self.bump();
                let digits_start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.bump();
                }
                let idx: usize = self.src[digits_start..self.pos]
                    .parse()
                    .map_err(|_| self.err_here(ParseErrorKind::Other("invalid #N key reference".to_string())))?;
                match self.key_dict.as_ref().and_then(|d| d.get(idx)) {
                    Some(k) => Ok(k.clone()),
                    None => Err(self.err_here(ParseErrorKind::Other(format!(
                        "unresolved schema key reference #{idx}"
                    )))),
                }
            }
            Some(c) if c.is_alphabetic() || c == '_' => Ok(self.read_identifier()),
            Some(c) => Err(self.err_here(ParseErrorKind::UnexpectedChar(c))),
            None => Err(self.err_here(ParseErrorKind::UnexpectedEof)),
        }
    }

    fn parse_schema_header(&mut self) -> Result<()> {
        self.expect_str("@schema#")?;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        self.skip_ws();
        self.expect_str("keys=")?;
        self.expect('[')?;
        let mut keys = Vec::new();
        loop {
            self.skip_ws_and_seps();
            if self.peek() == Some(']') {
                self.bump();
                break;
            }
            keys.push(self.parse_key()?);
        }
        self.key_dict = Some(keys);
        Ok(())
    }

    // ============================================================
    // `@` directives in value position: `@tab ... @end`.
    // ============================================================

    fn parse_directive_value(&mut self) -> Result<GValue> {
        if self.starts_with("@tab") {
            self.parse_tabular()
        } else {
            Err(self.err_here(ParseErrorKind::UnknownDirective(
                self.rest().chars().take(16).collect(),
            )))
        }
    }

    fn parse_tabular(&mut self) -> Result<GValue> {
        let start = self.pos;
        self.expect_str("@tab")?;
        self.skip_ws();
        // Reserved schema-slot token, unused in loose mode.
        self.read_identifier();
        self.skip_ws();
        self.expect_str("rows=")?;
        let rows = self.read_uint()?;
        self.skip_ws();
        self.expect_str("cols=")?;
        let cols_n = self.read_uint()?;
        self.skip_ws();
        self.expect('[')?;
        let mut cols = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(']') {
                self.bump();
                break;
            }
            cols.push(self.parse_key()?);
            self.skip_ws();
        }
        if cols.len() != cols_n {
            return Err(self.err_at(
                start,
                ParseErrorKind::Other(format!(
                    "@tab declared cols={cols_n} but header lists {}",
                    cols.len()
                )),
            ));
        }
        self.skip_ws();
        if self.peek() == Some('\n') {
            self.bump();
        }

        let mut out_rows = Vec::with_capacity(rows);
        for _ in 0..rows {
            self.expect('|')?;
            let mut entries = Vec::with_capacity(cols.len());
            for col in &cols {
                let cell = self.read_cell()?;
                self.expect('|')?;
                let mut cell_parser = Parser::new(&cell);
                cell_parser.key_dict = self.key_dict.clone();
                let value = cell_parser.parse_value()?;
                entries.push(MapEntry::new(col.clone(), value));
            }
            if self.peek() == Some('\n') {
                self.bump();
            }
            out_rows.push(GValue::Map(entries));
        }

        self.skip_ws();
        self.expect_str("@end")?;
        Ok(GValue::List(out_rows))
    }

    fn read_uint(&mut self) -> Result<usize> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        self.src[start..self.pos]
            .parse()
            .map_err(|_| self.err_at(start, ParseErrorKind::InvalidNumber(self.src[start..self.pos].to_string())))
    }

    /// A tabular cell: raw text up to an unescaped `|`, with `\|`
    /// unescaped back to `|`.
    fn read_cell(&mut self) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.err_here(ParseErrorKind::UnterminatedTabular)),
                Some('|') => break,
                Some('\\') if self.rest().starts_with("\\|") => {
                    self.bump();
                    self.bump();
                    out.push('|');
                }
                Some(c) => {
                    out.push(c);
                    self.bump();
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::canonicalize_loose;
    use crate::fingerprint::equal_loose;

    #[test]
    fn parses_scalars() {
        assert_eq!(parse_loose("_").unwrap(), GValue::Null);
        assert_eq!(parse_loose("\u{2205}").unwrap(), GValue::Null);
        assert_eq!(parse_loose("null").unwrap(), GValue::Null);
        assert_eq!(parse_loose("t").unwrap(), GValue::Bool(true));
        assert_eq!(parse_loose("false").unwrap(), GValue::Bool(false));
        assert_eq!(parse_loose("42").unwrap(), GValue::Int(42));
        assert_eq!(parse_loose("-7").unwrap(), GValue::Int(-7));
        assert_eq!(parse_loose("3.14").unwrap(), GValue::Float(3.14));
        assert_eq!(parse_loose("hello").unwrap(), GValue::Str("hello".to_string()));
        assert_eq!(
            parse_loose("\"hello world\"").unwrap(),
            GValue::Str("hello world".to_string())
        );
    }

    #[test]
    fn parses_map_with_either_separator() {
        let a = parse_loose("{a=1 b=2}").unwrap();
        let b = parse_loose("{a:1, b:2}").unwrap();
        assert!(equal_loose(&a, &b));
    }

    #[test]
    fn last_wins_on_duplicate_key() {
        let v = parse_loose("{k=1 k=2 k=3}").unwrap();
        assert_eq!(v.get("k").unwrap().as_int(), Some(3));
        assert_eq!(canonicalize_loose(&v), "{k=3}");
    }

    #[test]
    fn parses_struct_and_sum_literals() {
        let s = parse_loose("Point{x=1 y=2}").unwrap();
        match &s {
            GValue::Struct(sv) => {
                assert_eq!(sv.type_name, "Point");
                assert_eq!(sv.fields.len(), 2);
            }
            _ => panic!("expected struct"),
        }

        let sum = parse_loose("ok(1)").unwrap();
        assert_eq!(sum.as_sum().unwrap().tag, "ok");

        let empty_sum = parse_loose("done()").unwrap();
        assert!(empty_sum.as_sum().unwrap().value.is_none());
    }

    #[test]
    fn parses_ids() {
        let v = parse_loose("^user:123").unwrap();
        let id = v.as_id().unwrap();
        assert_eq!(id.prefix, "user");
        assert_eq!(id.value, "123");

        let v2 = parse_loose("^abc").unwrap();
        assert_eq!(v2.as_id().unwrap().value, "abc");
    }

    #[test]
    fn parses_bytes_and_time() {
        let v = parse_loose("b64\"aGVsbG8=\"").unwrap();
        assert_eq!(v.as_bytes().unwrap(), b"hello");

        let v2 = parse_loose("2024-01-02T03:04:05Z").unwrap();
        assert!(v2.is_time());
    }

    #[test]
    fn parses_tabular_block() {
        let text = "@tab _ rows=3 cols=2 [id name]\n|1|a|\n|2|b|\n|3|c|\n@end";
        let v = parse_loose(text).unwrap();
        let rows = v.as_list().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("id").unwrap().as_int(), Some(1));
        assert_eq!(rows[1].get("name").unwrap().as_str(), Some("b"));
    }

    #[test]
    fn parses_schema_header() {
        let text = "@schema#1 keys=[id name]\n{#0=1 #1=a}";
        let v = parse_loose(text).unwrap();
        assert_eq!(v.get("id").unwrap().as_int(), Some(1));
        assert_eq!(v.get("name").unwrap().as_str(), Some("a"));
    }

    #[test]
    fn rejects_non_finite_literal() {
        assert!(parse_loose("1e400").is_err());
    }

    #[test]
    fn idempotence_round_trip() {
        let v = GValue::map(vec![
            field("b", GValue::int(2)),
            field("a", GValue::list(vec![GValue::int(1), GValue::str("x y")])),
        ]);
        let canon1 = canonicalize_loose(&v);
        let parsed = parse_loose(&canon1).unwrap();
        assert!(equal_loose(&v, &parsed));
        let canon2 = canonicalize_loose(&parsed);
        assert_eq!(canon1, canon2);
    }
}
