//! GS1 frame protocol: text wire format, CRC-32, and frame kinds (C8).

use crate::error::{FrameError, GlyphError, Result};
use tracing::{debug, warn};

/// Default maximum payload length (64 MiB), per §4.8.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024;

/// Frame kind (§3, §4.8). Unknown numeric kinds are preserved, never errors.
#[derive(Debug, Clone, Copy)]
pub enum FrameKind {
    Doc,
    Patch,
    Row,
    Ui,
    Ack,
    Err,
    Ping,
    Pong,
    Unknown(u32),
}

impl FrameKind {
    fn as_u32(&self) -> u32 {
        match self {
            FrameKind::Doc => 0,
            FrameKind::Patch => 1,
            FrameKind::Row => 2,
            FrameKind::Ui => 3,
            FrameKind::Ack => 4,
            FrameKind::Err => 5,
            FrameKind::Ping => 6,
            FrameKind::Pong => 7,
            FrameKind::Unknown(n) => *n,
        }
    }

    fn from_u32(n: u32) -> Self {
        match n {
            0 => FrameKind::Doc,
            1 => FrameKind::Patch,
            2 => FrameKind::Row,
            3 => FrameKind::Ui,
            4 => FrameKind::Ack,
            5 => FrameKind::Err,
            6 => FrameKind::Ping,
            7 => FrameKind::Pong,
            n => FrameKind::Unknown(n),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FrameKind::Doc => "doc",
            FrameKind::Patch => "patch",
            FrameKind::Row => "row",
            FrameKind::Ui => "ui",
            FrameKind::Ack => "ack",
            FrameKind::Err => "err",
            FrameKind::Ping => "ping",
            FrameKind::Pong => "pong",
            FrameKind::Unknown(_) => "unknown",
        }
    }

    fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "doc" => FrameKind::Doc,
            "patch" => FrameKind::Patch,
            "row" => FrameKind::Row,
            "ui" => FrameKind::Ui,
            "ack" => FrameKind::Ack,
            "err" => FrameKind::Err,
            "ping" => FrameKind::Ping,
            "pong" => FrameKind::Pong,
            _ => return None,
        })
    }
}

/// `{version, sid, seq, kind, payload, crc?, base?, final?}` (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub version: u32,
    pub sid: u64,
    pub seq: u64,
    pub kind: FrameKind,
    pub payload: Vec<u8>,
    pub crc: Option<u32>,
    pub base: Option<[u8; 32]>,
    pub is_final: bool,
}

impl PartialEq for FrameKind {
    fn eq(&self, other: &Self) -> bool {
        self.as_u32() == other.as_u32()
    }
}
impl Eq for FrameKind {}

impl Frame {
    pub fn new(sid: u64, seq: u64, kind: FrameKind, payload: Vec<u8>) -> Self {
        Self {
            version: 1,
            sid,
            seq,
            kind,
            payload,
            crc: None,
            base: None,
            is_final: false,
        }
    }

    pub fn with_crc(mut self) -> Self {
        self.crc = Some(crc32fast::hash(&self.payload));
        self
    }

    pub fn with_base(mut self, base: [u8; 32]) -> Self {
        self.base = Some(base);
        self
    }

    pub fn finalize(mut self) -> Self {
        self.is_final = true;
        self
    }
}

/// Caps and behavior for encode/decode, mirroring `LooseCanonOpts`'s shape.
#[derive(Debug, Clone)]
pub struct FrameOptions {
    pub max_payload: usize,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Encode a frame to its text wire form (header line, exact payload bytes,
/// trailing newline).
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let mut header = format!(
        "@frame{{v={} sid={} seq={} kind={} len={}",
        frame.version,
        frame.sid,
        frame.seq,
        frame.kind.name(),
        frame.payload.len()
    );
    if let Some(crc) = frame.crc {
        header.push_str(&format!(" crc={crc:08x}"));
    }
    if let Some(base) = &frame.base {
        header.push_str(&format!(" base=sha256:{}", hex_encode(base)));
    }
    if frame.is_final {
        header.push_str(" final=true");
    }
    header.push_str("}\n");

    let mut out = header.into_bytes();
    out.extend_from_slice(&frame.payload);
    out.push(b'\n');
    out
}

/// Decode one frame from the front of `input`, returning the frame and the
/// number of bytes consumed. Reads exactly `len` payload bytes; never
/// delimiter-scans the payload; tolerates a missing trailing newline at EOF.
pub fn decode_frame(input: &[u8], opts: &FrameOptions) -> Result<(Frame, usize)> {
    let header_end = find_header_end(input)?;
    let header_text = std::str::from_utf8(&input[..header_end])
        .map_err(|e| frame_err(FrameError::BadHeader(format!("non-UTF-8 header: {e}"))))?;
    let fields = parse_header_fields(header_text)?;

    let len = fields
        .get("len")
        .ok_or_else(|| frame_err(FrameError::BadHeader("missing `len`".to_string())))?
        .parse::<usize>()
        .map_err(|_| frame_err(FrameError::BadHeader("invalid `len`".to_string())))?;

    if len > opts.max_payload {
        warn!(len, max = opts.max_payload, "frame payload exceeds cap");
        return Err(frame_err(FrameError::Oversize));
    }

    let payload_start = header_end + 1; // skip header's terminating '\n'
    if input.len() < payload_start + len {
        return Err(frame_err(FrameError::Truncated));
    }
    let payload = input[payload_start..payload_start + len].to_vec();
    let mut consumed = payload_start + len;
    if input.get(consumed) == Some(&b'\n') {
        consumed += 1;
    }

    let version: u32 = fields
        .get("v")
        .map(|s| s.parse().unwrap_or(1))
        .unwrap_or(1);
    let sid: u64 = fields
        .get("sid")
        .ok_or_else(|| frame_err(FrameError::BadHeader("missing `sid`".to_string())))?
        .parse()
        .map_err(|_| frame_err(FrameError::BadHeader("invalid `sid`".to_string())))?;
    let seq: u64 = fields
        .get("seq")
        .ok_or_else(|| frame_err(FrameError::BadHeader("missing `seq`".to_string())))?
        .parse()
        .map_err(|_| frame_err(FrameError::BadHeader("invalid `seq`".to_string())))?;
    let kind = fields
        .get("kind")
        .map(|s| FrameKind::from_name(s).unwrap_or_else(|| FrameKind::from_u32(s.parse().unwrap_or(u32::MAX))))
        .ok_or_else(|| frame_err(FrameError::BadHeader("missing `kind`".to_string())))?;

    let crc = match fields.get("crc") {
        Some(s) => Some(
            u32::from_str_radix(s, 16)
                .map_err(|_| frame_err(FrameError::BadHeader("invalid `crc`".to_string())))?,
        ),
        None => None,
    };
    if let Some(expected) = crc {
        let actual = crc32fast::hash(&payload);
        if actual != expected {
            debug!(expected, actual, "frame CRC mismatch");
            return Err(frame_err(FrameError::CrcMismatch));
        }
    }

    let base = match fields.get("base") {
        Some(s) => Some(parse_base(s)?),
        None => None,
    };
    let is_final = fields.get("final").map(|s| s == "true").unwrap_or(false);

    Ok((
        Frame {
            version,
            sid,
            seq,
            kind,
            payload,
            crc,
            base,
            is_final,
        },
        consumed,
    ))
}

fn find_header_end(input: &[u8]) -> Result<usize> {
    input
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| frame_err(FrameError::BadHeader("no header terminator".to_string())))
}

/// Splits `@frame{...}` into key/value tokens; tokens are space/tab/comma
/// separated and quoted strings survive delimiter characters (§4.8).
fn parse_header_fields(header: &str) -> Result<std::collections::HashMap<String, String>> {
    let header = header.trim();
    let inner = header
        .strip_prefix("@frame{")
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| frame_err(FrameError::BadHeader("expected `@frame{...}`".to_string())))?;

    let mut fields = std::collections::HashMap::new();
    let mut chars = inner.chars().peekable();
    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }
        let mut key = String::new();
        while matches!(chars.peek(), Some(c) if *c != '=') {
            key.push(chars.next().unwrap());
        }
        chars.next(); // consume '='
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
            while matches!(chars.peek(), Some(c) if !c.is_whitespace() && *c != ',') {
                value.push(chars.next().unwrap());
            }
        }
        fields.insert(key.trim().to_string(), value);
    }
    Ok(fields)
}

fn parse_base(s: &str) -> Result<[u8; 32]> {
    let hex = s
        .strip_prefix("sha256:")
        .ok_or_else(|| frame_err(FrameError::BadHeader("base must be `sha256:<64hex>`".to_string())))?;
    if hex.len() != 64 {
        return Err(frame_err(FrameError::BadHeader("base hex must be 64 chars".to_string())));
    }
    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| frame_err(FrameError::BadHeader("invalid base hex".to_string())))?;
    }
    Ok(out)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn frame_err(e: FrameError) -> GlyphError {
    GlyphError::Frame(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sc6_roundtrip_empty_map_payload() {
        let text = b"@frame{v=1 sid=1 seq=0 kind=doc len=2}\n{}\n";
        let (frame, consumed) = decode_frame(text, &FrameOptions::default()).unwrap();
        assert_eq!(frame.sid, 1);
        assert_eq!(frame.seq, 0);
        assert_eq!(frame.kind, FrameKind::Doc);
        assert_eq!(frame.payload, b"{}");
        assert_eq!(consumed, text.len());

        let reencoded = encode_frame(&frame);
        assert_eq!(reencoded, text);
    }

    #[test]
    fn crc_mismatch_is_rejected() {
        let frame = Frame::new(1, 0, FrameKind::Doc, b"{a=1}".to_vec()).with_crc();
        let mut bytes = encode_frame(&frame);
        // Flip a payload byte post-encode without touching the crc field.
        let payload_pos = bytes.iter().position(|&b| b == b'\n').unwrap() + 1;
        bytes[payload_pos] = b'X';
        assert!(matches!(
            decode_frame(&bytes, &FrameOptions::default()),
            Err(GlyphError::Frame(FrameError::CrcMismatch))
        ));
    }

    #[test]
    fn unknown_kind_is_preserved_not_rejected() {
        let frame = Frame::new(1, 0, FrameKind::Unknown(42), b"x".to_vec());
        let bytes = encode_frame(&frame);
        let (decoded, _) = decode_frame(&bytes, &FrameOptions::default()).unwrap();
        assert_eq!(decoded.kind, FrameKind::Unknown(42));
    }

    #[test]
    fn oversize_payload_is_hard_error() {
        let opts = FrameOptions { max_payload: 4 };
        let text = b"@frame{v=1 sid=1 seq=0 kind=doc len=10}\n0123456789\n";
        assert!(matches!(
            decode_frame(text, &opts),
            Err(GlyphError::Frame(FrameError::Oversize))
        ));
    }

    #[test]
    fn tolerates_missing_trailing_newline_at_eof() {
        let text = b"@frame{v=1 sid=1 seq=0 kind=ping len=0}\n";
        let (frame, consumed) = decode_frame(text, &FrameOptions::default()).unwrap();
        assert_eq!(frame.kind, FrameKind::Ping);
        assert_eq!(consumed, text.len());
    }

    #[test]
    fn does_not_delimiter_scan_payload_containing_newline() {
        let payload = b"line1\nline2";
        let frame = Frame::new(1, 0, FrameKind::Row, payload.to_vec());
        let bytes = encode_frame(&frame);
        let (decoded, _) = decode_frame(&bytes, &FrameOptions::default()).unwrap();
        assert_eq!(decoded.payload, payload);
    }
}
