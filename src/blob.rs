//! Blob metadata and session-scoped string pools (C11).

use crate::error::{GlyphError, Result};
use std::collections::HashMap;

/// A content-addressed blob metadata record, emitted as
/// `@blob cid=<algo>:<hex> mime=<type> bytes=<n> [name=] [caption=] [preview=]`.
/// Decoders MUST accept this even when the content is unresolved (§4.11).
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub cid: String,
    pub mime: String,
    pub bytes: u64,
    pub name: Option<String>,
    pub caption: Option<String>,
    pub preview: Option<String>,
}

impl Blob {
    pub fn new(cid: impl Into<String>, mime: impl Into<String>, bytes: u64) -> Self {
        Self {
            cid: cid.into(),
            mime: mime.into(),
            bytes,
            name: None,
            caption: None,
            preview: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_preview(mut self, preview: impl Into<String>) -> Self {
        self.preview = Some(preview.into());
        self
    }

    pub fn encode(&self) -> String {
        let mut out = format!("@blob cid={} mime={} bytes={}", self.cid, self.mime, self.bytes);
        if let Some(name) = &self.name {
            out.push_str(&format!(" name={}", quote_if_needed(name)));
        }
        if let Some(caption) = &self.caption {
            out.push_str(&format!(" caption={}", quote_if_needed(caption)));
        }
        if let Some(preview) = &self.preview {
            out.push_str(&format!(" preview={}", quote_if_needed(preview)));
        }
        out
    }

    pub fn decode(text: &str) -> Result<Self> {
        let rest = text
            .trim()
            .strip_prefix("@blob")
            .ok_or_else(|| GlyphError::Parse("expected `@blob` directive".to_string()))?;
        let fields = tokenize_directive(rest);

        let cid = fields
            .get("cid")
            .cloned()
            .ok_or_else(|| GlyphError::MissingField("cid".to_string()))?;
        let mime = fields
            .get("mime")
            .cloned()
            .ok_or_else(|| GlyphError::MissingField("mime".to_string()))?;
        let bytes = fields
            .get("bytes")
            .ok_or_else(|| GlyphError::MissingField("bytes".to_string()))?
            .parse()
            .map_err(|_| GlyphError::Parse("invalid `bytes` field".to_string()))?;

        Ok(Self {
            cid,
            mime,
            bytes,
            name: fields.get("name").cloned(),
            caption: fields.get("caption").cloned(),
            preview: fields.get("preview").cloned(),
        })
    }
}

/// External blob-content collaborator (§4.11, §6): synchronous from the
/// core's perspective; async hosting is host-wrapped.
pub trait BlobRegistry {
    fn put(&mut self, bytes: &[u8], mime: &str) -> Result<String>;
    fn get(&self, cid: &str) -> Result<(Vec<u8>, String)>;
    fn has(&self, cid: &str) -> bool;
    fn meta(&self, cid: &str) -> Result<(String, u64)>;
}

/// An in-memory `BlobRegistry`, useful for tests and small hosts.
#[derive(Debug, Default)]
pub struct InMemoryBlobRegistry {
    store: HashMap<String, (Vec<u8>, String)>,
}

impl InMemoryBlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobRegistry for InMemoryBlobRegistry {
    fn put(&mut self, bytes: &[u8], mime: &str) -> Result<String> {
        let digest = sha256_hex(bytes);
        let cid = format!("sha256:{digest}");
        self.store.insert(cid.clone(), (bytes.to_vec(), mime.to_string()));
        Ok(cid)
    }

    fn get(&self, cid: &str) -> Result<(Vec<u8>, String)> {
        self.store
            .get(cid)
            .cloned()
            .ok_or_else(|| GlyphError::InvalidValue(format!("unresolved blob {cid}")))
    }

    fn has(&self, cid: &str) -> bool {
        self.store.contains_key(cid)
    }

    fn meta(&self, cid: &str) -> Result<(String, u64)> {
        self.store
            .get(cid)
            .map(|(bytes, mime)| (mime.clone(), bytes.len() as u64))
            .ok_or_else(|| GlyphError::InvalidValue(format!("unresolved blob {cid}")))
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Behavior when a pool reference can't be resolved locally (§4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedPoolPolicy {
    RequestResync,
    StrictError,
    TreatAsOpaque,
}

/// A session-scoped dictionary of repeated strings, declared by
/// `@pool.str id=<id> [entry0 entry1 ...]` and referenced by `^<id>:<index>`.
/// Valid until `@pool.clear`, session termination, or redefinition.
#[derive(Debug, Clone, Default)]
pub struct StringPool {
    pools: HashMap<String, Vec<String>>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool IDs start with an uppercase letter followed by digits (`S1`,
    /// `O1`); entity prefixes are lowercase (§4.11's disambiguation rule).
    pub fn is_pool_id(prefix: &str) -> bool {
        let mut chars = prefix.chars();
        match chars.next() {
            Some(c) if c.is_ascii_uppercase() => chars.all(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    pub fn define(&mut self, id: impl Into<String>, entries: Vec<String>) {
        self.pools.insert(id.into(), entries);
    }

    pub fn clear(&mut self, id: &str) {
        self.pools.remove(id);
    }

    pub fn resolve(&self, id: &str, index: usize) -> Option<&str> {
        self.pools.get(id)?.get(index).map(String::as_str)
    }

    /// Merge a resync shard's entries into the pool (extends past the
    /// current length; earlier entries are left untouched).
    pub fn sync(&mut self, id: &str, entries: Vec<(usize, String)>) {
        let pool = self.pools.entry(id.to_string()).or_default();
        for (idx, entry) in entries {
            if idx >= pool.len() {
                pool.resize(idx + 1, String::new());
            }
            pool[idx] = entry;
        }
    }

    pub fn encode_define(&self, id: &str) -> Option<String> {
        let entries = self.pools.get(id)?;
        Some(format!(
            "@pool.str id={id} [{}]",
            entries
                .iter()
                .map(|e| quote_if_needed(e))
                .collect::<Vec<_>>()
                .join(" ")
        ))
    }
}

fn quote_if_needed(s: &str) -> String {
    if s.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/')) && !s.is_empty()
    {
        s.to_string()
    } else {
        format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

fn tokenize_directive(s: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let mut chars = s.trim().chars().peekable();
    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }
        let mut key = String::new();
        while matches!(chars.peek(), Some(c) if *c != '=') {
            key.push(chars.next().unwrap());
        }
        chars.next();
        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            while let Some(c) = chars.next() {
                if c == '"' {
                    break;
                }
                value.push(c);
            }
        } else {
            while matches!(chars.peek(), Some(c) if !c.is_whitespace()) {
                value.push(chars.next().unwrap());
            }
        }
        out.insert(key.trim().to_string(), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trips_through_directive_text() {
        let blob = Blob::new("sha256:deadbeef", "image/png", 1024).with_name("logo.png");
        let text = blob.encode();
        let decoded = Blob::decode(&text).unwrap();
        assert_eq!(blob, decoded);
    }

    #[test]
    fn blob_decodes_without_optional_fields() {
        let text = "@blob cid=sha256:abc mime=text/plain bytes=3";
        let blob = Blob::decode(text).unwrap();
        assert_eq!(blob.bytes, 3);
        assert!(blob.name.is_none());
    }

    #[test]
    fn pool_id_disambiguated_by_case() {
        assert!(StringPool::is_pool_id("S1"));
        assert!(StringPool::is_pool_id("O42"));
        assert!(!StringPool::is_pool_id("user"));
        assert!(!StringPool::is_pool_id("S1a"));
    }

    #[test]
    fn pool_resolves_by_index_and_clears() {
        let mut pool = StringPool::new();
        pool.define("S1", vec!["alpha".to_string(), "beta".to_string()]);
        assert_eq!(pool.resolve("S1", 1), Some("beta"));
        pool.clear("S1");
        assert_eq!(pool.resolve("S1", 1), None);
    }

    #[test]
    fn pool_sync_extends_without_clobbering_earlier_entries() {
        let mut pool = StringPool::new();
        pool.define("S1", vec!["alpha".to_string()]);
        pool.sync("S1", vec![(2, "gamma".to_string())]);
        assert_eq!(pool.resolve("S1", 0), Some("alpha"));
        assert_eq!(pool.resolve("S1", 2), Some("gamma"));
    }

    #[test]
    fn in_memory_registry_put_then_get() {
        let mut reg = InMemoryBlobRegistry::new();
        let cid = reg.put(b"hello", "text/plain").unwrap();
        assert!(reg.has(&cid));
        let (bytes, mime) = reg.get(&cid).unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(mime, "text/plain");
    }

    #[test]
    fn unresolved_blob_is_an_error_not_a_panic() {
        let reg = InMemoryBlobRegistry::new();
        assert!(reg.get("sha256:missing").is_err());
    }
}
