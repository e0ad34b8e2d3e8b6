//! Streaming tool-call validator (C6).
//!
//! An online per-fragment state machine over the `Name{...}`/`Name(...)`
//! loose-mode call syntax. Designed around the teacher's fail-soft
//! philosophy: violations are recorded on the snapshot, not thrown.

use crate::error::ValidatorErrorCode;
use std::collections::HashMap;
use tracing::debug;

/// Argument type drawn from the registry shape (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Str,
    Int,
    Float,
    Bool,
    List,
    Enum,
    Id,
}

/// Per-argument constraints the validator enforces once a value is closed.
#[derive(Debug, Clone, Default)]
pub struct ArgSchema {
    pub ty: ArgType,
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub pattern: Option<String>,
    pub enum_values: Option<Vec<String>>,
    pub default: Option<String>,
}

impl Default for ArgType {
    fn default() -> Self {
        ArgType::Str
    }
}

impl ArgSchema {
    pub fn new(ty: ArgType) -> Self {
        Self {
            ty,
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min_len = Some(min);
        self.max_len = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn enum_of(mut self, values: Vec<String>) -> Self {
        self.enum_values = Some(values);
        self
    }

    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// A tool's full argument schema: `argName -> ArgSchema`.
#[derive(Debug, Clone, Default)]
pub struct ToolSchema {
    pub args: HashMap<String, ArgSchema>,
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_arg(mut self, name: impl Into<String>, schema: ArgSchema) -> Self {
        self.args.insert(name.into(), schema);
        self
    }
}

/// External collaborator consulted for tool legality (§4.6, §6).
pub trait ToolRegistry {
    fn lookup(&self, name: &str) -> Option<&ToolSchema>;
}

/// A simple in-memory registry, handy for tests and small hosts.
#[derive(Debug, Clone, Default)]
pub struct StaticToolRegistry {
    tools: HashMap<String, ToolSchema>,
}

impl StaticToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, name: impl Into<String>, schema: ToolSchema) -> Self {
        self.tools.insert(name.into(), schema);
        self
    }
}

impl ToolRegistry for StaticToolRegistry {
    fn lookup(&self, name: &str) -> Option<&ToolSchema> {
        self.tools.get(name)
    }
}

/// The S0-S7 state machine's current state (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorState {
    Prelude,
    NameComplete,
    InFieldKey,
    AwaitingValue,
    InValue,
    BetweenFields,
    Closed,
    Aborted,
}

/// Snapshot returned from every `push`/`finalize` call.
#[derive(Debug, Clone, Default)]
pub struct ValidatorSnapshot {
    pub state: Option<ValidatorState>,
    pub tool_name: Option<String>,
    pub complete: bool,
    pub valid: bool,
    pub error: Option<ValidatorErrorCode>,
    pub fields: HashMap<String, String>,
}

impl ValidatorSnapshot {
    fn new(state: ValidatorState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueLex {
    Str,
    BareStr,
    Number,
    BoolOrNull,
    List,
    Nested,
}

/// Incremental validator: `push` one fragment at a time, `finalize` at EOF.
/// Never buffers more than the current token plus constant bookkeeping.
pub struct StreamingValidator<'r, R: ToolRegistry> {
    registry: &'r R,
    state: ValidatorState,
    buf: String,
    tool_name: Option<String>,
    current_key: String,
    current_val: String,
    current_lex: Option<ValueLex>,
    depth: u32,
    in_quotes: bool,
    escape: bool,
    fields: HashMap<String, String>,
    error: Option<ValidatorErrorCode>,
}

impl<'r, R: ToolRegistry> StreamingValidator<'r, R> {
    pub fn new(registry: &'r R) -> Self {
        Self {
            registry,
            state: ValidatorState::Prelude,
            buf: String::new(),
            tool_name: None,
            current_key: String::new(),
            current_val: String::new(),
            current_lex: None,
            depth: 0,
            in_quotes: false,
            escape: false,
            fields: HashMap::new(),
            error: None,
        }
    }

    pub fn should_stop(&self) -> bool {
        self.state == ValidatorState::Aborted
    }

    /// Feed one fragment (any chunk size); returns the snapshot after this
    /// fragment is fully consumed.
    pub fn push(&mut self, fragment: &str) -> ValidatorSnapshot {
        for c in fragment.chars() {
            if self.state == ValidatorState::Aborted {
                break;
            }
            self.step(c);
        }
        self.snapshot()
    }

    pub fn finalize(&mut self) -> ValidatorSnapshot {
        if self.state == ValidatorState::InValue {
            self.close_value();
        }
        if self.state != ValidatorState::Closed && self.state != ValidatorState::Aborted {
            self.abort(ValidatorErrorCode::MissingRequired);
        }
        self.snapshot()
    }

    fn snapshot(&self) -> ValidatorSnapshot {
        let mut snap = ValidatorSnapshot::new(self.state);
        snap.tool_name = self.tool_name.clone();
        snap.fields = self.fields.clone();
        snap.error = self.error;
        snap.complete = self.state == ValidatorState::Closed;
        snap.valid = snap.complete && self.error.is_none();
        snap
    }

    fn abort(&mut self, reason: ValidatorErrorCode) {
        debug!(reason = reason.code(), "validator aborting into S7");
        self.state = ValidatorState::Aborted;
        self.error = Some(reason);
    }

    fn step(&mut self, c: char) {
        match self.state {
            ValidatorState::Prelude => self.step_prelude(c),
            ValidatorState::NameComplete => self.step_name_complete(c),
            ValidatorState::InFieldKey => self.step_field_key(c),
            ValidatorState::AwaitingValue => self.step_awaiting_value(c),
            ValidatorState::InValue => self.step_in_value(c),
            ValidatorState::BetweenFields => self.step_between_fields(c),
            ValidatorState::Closed | ValidatorState::Aborted => {}
        }
    }

    fn step_prelude(&mut self, c: char) {
        if c.is_whitespace() {
            return;
        }
        if c == '{' || c == '(' {
            if self.buf.is_empty() {
                // Anonymous opener: `action=` convention names the tool.
                self.tool_name = None;
                self.state = ValidatorState::NameComplete;
            } else {
                self.complete_name();
            }
            return;
        }
        self.buf.push(c);
    }

    fn step_name_complete(&mut self, c: char) {
        // Between opener and the first key.
        if c.is_whitespace() || c == ',' {
            return;
        }
        self.begin_field_key(c);
    }

    fn complete_name(&mut self) {
        let name = self.buf.trim().to_string();
        self.buf.clear();
        let known = self.registry.lookup(&name).is_some();
        debug!(tool = %name, known, "validator entering S1");
        self.tool_name = Some(name.clone());
        if !known {
            self.abort(ValidatorErrorCode::UnknownTool);
            return;
        }
        self.state = ValidatorState::NameComplete;
    }

    fn begin_field_key(&mut self, c: char) {
        self.current_key.clear();
        self.state = ValidatorState::InFieldKey;
        self.step_field_key(c);
    }

    fn step_field_key(&mut self, c: char) {
        if c == '=' || c == ':' {
            self.state = ValidatorState::AwaitingValue;
            return;
        }
        if c.is_whitespace() {
            return;
        }
        self.current_key.push(c);
    }

    fn step_awaiting_value(&mut self, c: char) {
        if c.is_whitespace() {
            return;
        }
        self.current_val.clear();
        self.current_lex = Some(match c {
            '"' => ValueLex::Str,
            '[' => ValueLex::List,
            '{' => ValueLex::Nested,
            't' | 'f' | '_' => ValueLex::BoolOrNull,
            c if c.is_ascii_digit() || c == '-' => ValueLex::Number,
            _ => ValueLex::BareStr,
        });
        self.depth = 0;
        self.in_quotes = false;
        self.escape = false;
        self.state = ValidatorState::InValue;
        self.step_in_value(c);
    }

    fn step_in_value(&mut self, c: char) {
        self.current_val.push(c);
        match self.current_lex {
            Some(ValueLex::Str) => {
                if self.escape {
                    self.escape = false;
                    return;
                }
                match c {
                    '\\' => self.escape = true,
                    '"' if self.current_val.len() > 1 => self.close_value(),
                    _ => {}
                }
            }
            Some(ValueLex::List) | Some(ValueLex::Nested) => {
                let (open, close) = if self.current_lex == Some(ValueLex::List) {
                    ('[', ']')
                } else {
                    ('{', '}')
                };
                if c == open {
                    self.depth += 1;
                } else if c == close {
                    self.depth -= 1;
                    if self.depth == 0 {
                        self.close_value();
                    }
                }
            }
            Some(ValueLex::Number) => {
                if !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')) {
                    self.current_val.pop();
                    self.close_value_with_pushback(c);
                }
            }
            Some(ValueLex::BoolOrNull) => {
                if c.is_whitespace() || c == ',' || c == '}' || c == ')' {
                    self.current_val.pop();
                    self.close_value_with_pushback(c);
                }
            }
            Some(ValueLex::BareStr) => {
                if c.is_whitespace() || c == ',' || c == '}' || c == ')' {
                    self.current_val.pop();
                    self.close_value_with_pushback(c);
                }
            }
            None => {}
        }
    }

    fn close_value_with_pushback(&mut self, next: char) {
        self.close_value();
        if self.state != ValidatorState::Aborted {
            self.step(next);
        }
    }

    fn close_value(&mut self) {
        let key = self.current_key.clone();
        let val = self.current_val.clone();

        if self.tool_name.is_none() && key == "action" {
            let name = val.trim_matches('"').to_string();
            let known = self.registry.lookup(&name).is_some();
            debug!(tool = %name, known, "validator naming tool via action= key");
            self.tool_name = Some(name);
            if !known {
                self.abort(ValidatorErrorCode::UnknownTool);
                return;
            }
        }

        if let Some(schema) = self.tool_name.clone().and_then(|name| {
            self.registry.lookup(&name).and_then(|t| t.args.get(&key).cloned())
        }) {
            if let Some(reason) = validate_arg(&schema, &val) {
                self.fields.insert(key, val);
                self.abort(reason);
                return;
            }
        }
        self.fields.insert(key, val);
        self.state = ValidatorState::BetweenFields;
    }

    fn step_between_fields(&mut self, c: char) {
        if c.is_whitespace() || c == ',' {
            return;
        }
        if c == '}' || c == ')' {
            self.flush_close();
            return;
        }
        self.begin_field_key(c);
    }

    fn flush_close(&mut self) {
        if let Some(name) = self.tool_name.clone() {
            if let Some(schema) = self.registry.lookup(&name) {
                for (arg_name, arg) in &schema.args {
                    if arg.required && !self.fields.contains_key(arg_name) {
                        self.abort(ValidatorErrorCode::MissingRequired);
                        return;
                    }
                    if !self.fields.contains_key(arg_name) {
                        if let Some(default) = &arg.default {
                            self.fields.insert(arg_name.clone(), default.clone());
                        }
                    }
                }
            }
        }
        self.state = ValidatorState::Closed;
    }
}

fn validate_arg(schema: &ArgSchema, raw: &str) -> Option<ValidatorErrorCode> {
    match schema.ty {
        ArgType::Str | ArgType::Enum => {
            let s = raw.trim_matches('"');
            if let (Some(min), Some(max)) = (schema.min_len, schema.max_len) {
                if s.len() < min || s.len() > max {
                    return Some(ValidatorErrorCode::ConstraintLength);
                }
            }
            if let Some(pattern) = &schema.pattern {
                if let Ok(re) = regex::Regex::new(pattern) {
                    if !re.is_match(s) {
                        return Some(ValidatorErrorCode::ConstraintPattern);
                    }
                }
            }
            if let Some(values) = &schema.enum_values {
                if !values.iter().any(|v| v == s) {
                    return Some(ValidatorErrorCode::ConstraintEnum);
                }
            }
            None
        }
        ArgType::Int | ArgType::Float => {
            let n: f64 = match raw.parse() {
                Ok(n) => n,
                Err(_) => return Some(ValidatorErrorCode::ConstraintType),
            };
            if let (Some(min), Some(max)) = (schema.min, schema.max) {
                if n < min || n > max {
                    return Some(ValidatorErrorCode::ConstraintRange);
                }
            }
            None
        }
        ArgType::Bool | ArgType::List | ArgType::Id => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_registry() -> StaticToolRegistry {
        StaticToolRegistry::new().with_tool(
            "search",
            ToolSchema::new()
                .with_arg("query", ArgSchema::new(ArgType::Str).required())
                .with_arg("max_results", ArgSchema::new(ArgType::Int).range(1.0, 100.0)),
        )
    }

    #[test]
    fn recognizes_known_tool_and_stays_open() {
        let reg = search_registry();
        let mut v = StreamingValidator::new(&reg);
        let mut snap = ValidatorSnapshot::default();
        for c in "search{action=search ".chars() {
            snap = v.push(&c.to_string());
        }
        let _ = snap;
        assert!(!v.should_stop());
    }

    #[test]
    fn unknown_tool_aborts_at_opener() {
        let reg = search_registry();
        let mut v = StreamingValidator::new(&reg);
        let snap = v.push("hack_server{");
        assert_eq!(snap.state, Some(ValidatorState::Aborted));
        assert_eq!(snap.error, Some(ValidatorErrorCode::UnknownTool));
    }

    #[test]
    fn determinism_under_chunking() {
        let reg = search_registry();
        let whole = "search{query=\"weather\" max_results=10}";

        let mut a = StreamingValidator::new(&reg);
        let snap_a = a.push(whole);

        let mut b = StreamingValidator::new(&reg);
        let mut snap_b = ValidatorSnapshot::default();
        for c in whole.chars() {
            snap_b = b.push(&c.to_string());
        }

        assert_eq!(snap_a.state, snap_b.state);
        assert_eq!(snap_a.valid, snap_b.valid);
        assert_eq!(snap_a.tool_name, snap_b.tool_name);
    }

    #[test]
    fn missing_required_aborts_on_close() {
        let reg = search_registry();
        let mut v = StreamingValidator::new(&reg);
        let snap = v.push("search{max_results=5}");
        assert_eq!(snap.error, Some(ValidatorErrorCode::MissingRequired));
    }

    #[test]
    fn range_violation_aborts() {
        let reg = search_registry();
        let mut v = StreamingValidator::new(&reg);
        let snap = v.push("search{query=\"x\" max_results=500}");
        assert_eq!(snap.error, Some(ValidatorErrorCode::ConstraintRange));
    }

    #[test]
    fn valid_call_completes() {
        let reg = search_registry();
        let mut v = StreamingValidator::new(&reg);
        let snap = v.push("search{query=\"weather\" max_results=10}");
        assert!(snap.valid);
        assert!(snap.complete);
    }
}
