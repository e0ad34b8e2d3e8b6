//! Error types for GLYPH codec

use thiserror::Error;

/// Errors that can occur during GLYPH operations
#[derive(Error, Debug)]
pub enum GlyphError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("JSON conversion error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid float: {0}")]
    InvalidFloat(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Parse error at byte {offset}: {kind}")]
    ParseAt {
        offset: usize,
        #[source]
        kind: ParseErrorKind,
    },

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Cursor(#[from] CursorError),
}

impl GlyphError {
    /// Stable error code string, per the wire-level error contract.
    pub fn code(&self) -> &'static str {
        match self {
            GlyphError::Parse(_) => "PARSE_ERROR",
            GlyphError::InvalidValue(_) => "PARSE_INVALID_VALUE",
            GlyphError::TypeMismatch { .. } => "PARSE_TYPE_MISMATCH",
            GlyphError::JsonError(_) => "PARSE_JSON",
            GlyphError::InvalidFloat(_) => "PARSE_NON_FINITE",
            GlyphError::MissingField(_) => "MISSING_REQUIRED",
            GlyphError::ParseAt { kind, .. } => kind.code(),
            GlyphError::Patch(e) => e.code(),
            GlyphError::Frame(e) => e.code(),
            GlyphError::Cursor(e) => e.code(),
        }
    }
}

/// Reasons a parse can fail, attached to a byte offset by `GlyphError::ParseAt`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
    #[error("invalid number literal: {0}")]
    InvalidNumber(String),
    #[error("invalid escape sequence: {0}")]
    InvalidEscape(String),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated tabular block")]
    UnterminatedTabular,
    #[error("unknown directive: {0}")]
    UnknownDirective(String),
    #[error("non-finite number rejected: {0}")]
    NonFinite(String),
    #[error("{0}")]
    Other(String),
}

impl ParseErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ParseErrorKind::UnexpectedEof => "PARSE_UNEXPECTED_EOF",
            ParseErrorKind::UnexpectedChar(_) => "PARSE_UNEXPECTED_CHAR",
            ParseErrorKind::InvalidNumber(_) => "PARSE_INVALID_NUMBER",
            ParseErrorKind::InvalidEscape(_) => "PARSE_INVALID_ESCAPE",
            ParseErrorKind::UnterminatedString => "PARSE_UNTERMINATED_STRING",
            ParseErrorKind::UnterminatedTabular => "PARSE_UNTERMINATED_TABULAR",
            ParseErrorKind::UnknownDirective(_) => "PARSE_UNKNOWN_DIRECTIVE",
            ParseErrorKind::NonFinite(_) => "PARSE_NON_FINITE",
            ParseErrorKind::Other(_) => "PARSE_ERROR",
        }
    }
}

/// Patch application failures (C7).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchError {
    #[error("path segment does not resolve: {0}")]
    InvalidPath(String),
    #[error("list index out of range for `=`: {0}")]
    MissingIndex(String),
    #[error("delta op target is not numeric")]
    NonNumericDelta,
    #[error("patch apply failed: {0}")]
    ApplyFailed(String),
    #[error("malformed patch text: {0}")]
    Malformed(String),
}

impl PatchError {
    pub fn code(&self) -> &'static str {
        match self {
            PatchError::InvalidPath(_) => "PATCH_INVALID_PATH",
            PatchError::MissingIndex(_) => "PATCH_MISSING_INDEX",
            PatchError::NonNumericDelta => "PATCH_NON_NUMERIC_DELTA",
            PatchError::ApplyFailed(_) => "PATCH_APPLY_FAILED",
            PatchError::Malformed(_) => "PATCH_MALFORMED",
        }
    }
}

/// Frame-level failures (C8).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("frame payload exceeds maximum length")]
    Oversize,
    #[error("CRC-32 mismatch")]
    CrcMismatch,
    #[error("frame truncated before `len` bytes were read")]
    Truncated,
    #[error("malformed frame header: {0}")]
    BadHeader(String),
}

impl FrameError {
    pub fn code(&self) -> &'static str {
        match self {
            FrameError::Oversize => "OVERSIZE",
            FrameError::CrcMismatch => "CRC_MISMATCH",
            FrameError::Truncated => "FRAME_TRUNCATED",
            FrameError::BadHeader(_) => "FRAME_BAD_HEADER",
        }
    }
}

/// Cursor-level failures (C9).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CursorError {
    #[error("patch base fingerprint does not match cursor state")]
    BaseMismatch,
    #[error("frame received after sid was marked final")]
    FinalViolation,
}

impl CursorError {
    pub fn code(&self) -> &'static str {
        match self {
            CursorError::BaseMismatch => "BASE_MISMATCH",
            CursorError::FinalViolation => "FINAL_VIOLATION",
        }
    }
}

/// Reasons the streaming validator can abort into S7, plus constraint
/// sub-codes for `CONSTRAINT_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorErrorCode {
    UnknownTool,
    MissingRequired,
    ConstraintType,
    ConstraintRange,
    ConstraintLength,
    ConstraintPattern,
    ConstraintEnum,
}

impl ValidatorErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ValidatorErrorCode::UnknownTool => "UNKNOWN_TOOL",
            ValidatorErrorCode::MissingRequired => "MISSING_REQUIRED",
            ValidatorErrorCode::ConstraintType => "CONSTRAINT_TYPE",
            ValidatorErrorCode::ConstraintRange => "CONSTRAINT_RANGE",
            ValidatorErrorCode::ConstraintLength => "CONSTRAINT_LENGTH",
            ValidatorErrorCode::ConstraintPattern => "CONSTRAINT_PATTERN",
            ValidatorErrorCode::ConstraintEnum => "CONSTRAINT_ENUM",
        }
    }
}

pub type Result<T> = std::result::Result<T, GlyphError>;
