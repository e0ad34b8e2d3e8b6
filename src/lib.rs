//! GLYPH Codec - token-efficient serialization for LLM-agent traffic.
//!
//! GLYPH is a human-readable drop-in replacement for JSON, tuned for the
//! token economics and streaming needs of LLM tool calls: deterministic
//! canonical rendering, a permissive round-trip parser, content
//! fingerprinting, a streaming tool-call validator, a patch model for
//! incremental updates, and a framed wire protocol for agent/tool traffic.
//!
//! # Example
//!
//! ```rust
//! use glyph::{from_json, canonicalize_loose};
//! use serde_json::json;
//!
//! let data = json!({"action": "search", "query": "weather"});
//! let gvalue = from_json(&data);
//! let glyph = canonicalize_loose(&gvalue);
//! assert_eq!(glyph, "{action=search query=weather}");
//! ```

mod blob;
mod canon;
mod cursor;
mod error;
mod fingerprint;
mod frame;
mod json_bridge;
mod parser;
mod patch;
mod types;
mod ui;
mod validator;

pub use blob::*;
pub use canon::*;
pub use cursor::*;
pub use error::*;
pub use fingerprint::*;
pub use frame::*;
pub use json_bridge::*;
pub use parser::*;
pub use patch::*;
pub use types::*;
pub use ui::*;
pub use validator::*;

#[cfg(test)]
mod tests;
