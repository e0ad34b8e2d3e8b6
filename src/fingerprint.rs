//! Fingerprint and equality over the Loose canonical form (C5).

use crate::canon::canonicalize_loose;
use crate::types::GValue;
use sha2::{Digest, Sha256};

/// Full 64-lowercase-hex SHA-256 of a value's canonical Loose form.
pub fn fingerprint(v: &GValue) -> String {
    hex_encode(&digest(v))
}

/// `fingerprint` with a `sha256:` prefix, as accepted on the wire.
pub fn fingerprint_prefixed(v: &GValue) -> String {
    format!("sha256:{}", fingerprint(v))
}

/// First 16 hex characters of `fingerprint`, used as a patch `@base`.
pub fn short_fingerprint(v: &GValue) -> String {
    fingerprint(v)[..16].to_string()
}

/// Two values are equal iff their canonical Loose forms are byte-identical.
pub fn equal_loose(a: &GValue, b: &GValue) -> bool {
    canonicalize_loose(a) == canonicalize_loose(b)
}

fn digest(v: &GValue) -> [u8; 32] {
    let canonical = canonicalize_loose(v);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.finalize().into()
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{field, GValue};

    #[test]
    fn fingerprint_is_64_hex() {
        let v = GValue::map(vec![field("a", GValue::int(1))]);
        let fp = fingerprint(&v);
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn short_fingerprint_is_prefix_of_full() {
        let v = GValue::map(vec![field("a", GValue::int(1))]);
        assert_eq!(short_fingerprint(&v), &fingerprint(&v)[..16]);
    }

    #[test]
    fn fingerprint_ignores_key_order() {
        let a = GValue::map(vec![field("x", GValue::int(1)), field("y", GValue::int(2))]);
        let b = GValue::map(vec![field("y", GValue::int(2)), field("x", GValue::int(1))]);
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert!(equal_loose(&a, &b));
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let v = GValue::map(vec![field("a", GValue::int(1)), field("b", GValue::list(vec![GValue::int(2), GValue::int(3)]))]);
        assert_eq!(fingerprint(&v), fingerprint(&v));
    }
}
