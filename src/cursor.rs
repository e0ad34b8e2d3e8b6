//! Per-SID stream cursor: sequence/state tracking and handler dispatch (C9).

use crate::error::{CursorError, Result};
use crate::frame::{Frame, FrameKind};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Caller-supplied callbacks for cursor dispatch. Every method has a
/// sensible default so callers override only what they need (§6).
pub trait FrameHandler {
    fn on_doc(&mut self, _sid: u64, _frame: &Frame) {}
    fn on_patch(&mut self, _sid: u64, _frame: &Frame) {}
    fn on_row(&mut self, _sid: u64, _frame: &Frame) {}
    fn on_ui(&mut self, _sid: u64, _frame: &Frame) {}
    fn on_ack(&mut self, _sid: u64, _frame: &Frame) {}
    fn on_err(&mut self, _sid: u64, _frame: &Frame) {}
    fn on_unknown(&mut self, _sid: u64, _frame: &Frame) {}
    fn on_final(&mut self, _sid: u64) {}

    /// `seq > lastSeq + 1`; return true to accept the gap anyway. Default:
    /// accept-with-warning, per §7's "accept" default propagation policy.
    fn on_seq_gap(&mut self, _sid: u64, _last_seq: u64, _seq: u64) -> bool {
        true
    }

    /// Patch `base` disagreed with tracked state hash. Default: reject.
    fn on_base_mismatch(&mut self, _sid: u64, _expected: &str, _got: &str) -> bool {
        false
    }
}

#[derive(Debug, Clone, Default)]
struct SidState {
    last_seq: Option<u64>,
    last_acked_seq: Option<u64>,
    state_hash: Option<String>,
    is_final: bool,
}

#[derive(Debug, Clone)]
pub struct CursorOptions {
    /// If true, a gap with no handler override is accepted (matches the
    /// default `on_seq_gap` behavior); set false to make the cursor more
    /// conservative without changing the handler trait.
    pub accept_gaps_by_default: bool,
}

impl Default for CursorOptions {
    fn default() -> Self {
        Self {
            accept_gaps_by_default: true,
        }
    }
}

/// What happened to one frame handed to the cursor — used so recoverable
/// conditions are recorded rather than raised (§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorOutcome {
    Dispatched,
    DuplicateDropped,
    GapRejected,
    BaseMismatchRejected,
}

/// Tracks per-SID sequence/state and dispatches to a `FrameHandler`.
/// Purely synchronous, single-threaded with respect to one receive
/// iterator (§4.9, §5).
#[derive(Debug, Default)]
pub struct StreamCursor {
    sids: HashMap<u64, SidState>,
    opts_accept_gaps: bool,
}

impl StreamCursor {
    pub fn new() -> Self {
        Self::with_options(CursorOptions::default())
    }

    pub fn with_options(opts: CursorOptions) -> Self {
        Self {
            sids: HashMap::new(),
            opts_accept_gaps: opts.accept_gaps_by_default,
        }
    }

    /// Record the application state hash after a handler applies a `doc`
    /// or `patch` frame's payload. The cursor does not interpret payloads
    /// itself (§4.9).
    pub fn record_state_hash(&mut self, sid: u64, hash: String) {
        self.sids.entry(sid).or_default().state_hash = Some(hash);
    }

    pub fn state_hash(&self, sid: u64) -> Option<&str> {
        self.sids.get(&sid).and_then(|s| s.state_hash.as_deref())
    }

    pub fn receive<H: FrameHandler>(&mut self, frame: &Frame, handler: &mut H) -> Result<CursorOutcome> {
        let sid = frame.sid;
        let entry = self.sids.entry(sid).or_default();

        if entry.is_final {
            warn!(sid, seq = frame.seq, "frame received after sid marked final");
            return Err(CursorError::FinalViolation.into());
        }

        if let Some(last) = entry.last_seq {
            if frame.seq <= last {
                debug!(sid, seq = frame.seq, last, "duplicate sequence dropped");
                return Ok(CursorOutcome::DuplicateDropped);
            }
            if frame.seq > last + 1 {
                let accept = handler.on_seq_gap(sid, last, frame.seq);
                if !accept {
                    warn!(sid, seq = frame.seq, last, "sequence gap rejected");
                    return Ok(CursorOutcome::GapRejected);
                }
            }
        }

        if frame.kind == FrameKind::Patch {
            if let Some(base) = &frame.base {
                let expected = hex_encode(base);
                let current = entry.state_hash.clone().unwrap_or_default();
                if current != expected {
                    let accept = handler.on_base_mismatch(sid, &expected, &current);
                    if !accept {
                        return Err(CursorError::BaseMismatch.into());
                    }
                }
            }
        }

        entry.last_seq = Some(frame.seq);
        self.dispatch(sid, frame, handler);

        let entry = self.sids.get_mut(&sid).unwrap();
        if frame.is_final {
            entry.is_final = true;
            handler.on_final(sid);
        }

        Ok(CursorOutcome::Dispatched)
    }

    fn dispatch<H: FrameHandler>(&self, sid: u64, frame: &Frame, handler: &mut H) {
        match frame.kind {
            FrameKind::Doc => handler.on_doc(sid, frame),
            FrameKind::Patch => handler.on_patch(sid, frame),
            FrameKind::Row => handler.on_row(sid, frame),
            FrameKind::Ui => handler.on_ui(sid, frame),
            FrameKind::Ack => handler.on_ack(sid, frame),
            FrameKind::Err => handler.on_err(sid, frame),
            FrameKind::Ping | FrameKind::Pong => {}
            FrameKind::Unknown(_) => handler.on_unknown(sid, frame),
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingHandler {
        docs: u32,
        gaps: u32,
        finals: u32,
    }

    impl FrameHandler for RecordingHandler {
        fn on_doc(&mut self, _sid: u64, _frame: &Frame) {
            self.docs += 1;
        }
        fn on_seq_gap(&mut self, _sid: u64, _last_seq: u64, _seq: u64) -> bool {
            self.gaps += 1;
            true
        }
        fn on_final(&mut self, _sid: u64) {
            self.finals += 1;
        }
    }

    #[test]
    fn duplicate_seq_is_dropped_not_redispatched() {
        let mut cursor = StreamCursor::new();
        let mut handler = RecordingHandler::default();
        let frame = Frame::new(1, 0, FrameKind::Doc, b"{}".to_vec());
        cursor.receive(&frame, &mut handler).unwrap();
        let outcome = cursor.receive(&frame, &mut handler).unwrap();
        assert_eq!(outcome, CursorOutcome::DuplicateDropped);
        assert_eq!(handler.docs, 1);
    }

    #[test]
    fn gap_invokes_callback() {
        let mut cursor = StreamCursor::new();
        let mut handler = RecordingHandler::default();
        cursor.receive(&Frame::new(1, 0, FrameKind::Doc, b"{}".to_vec()), &mut handler).unwrap();
        cursor.receive(&Frame::new(1, 5, FrameKind::Doc, b"{}".to_vec()), &mut handler).unwrap();
        assert_eq!(handler.gaps, 1);
    }

    #[test]
    fn final_frame_terminates_sid() {
        let mut cursor = StreamCursor::new();
        let mut handler = RecordingHandler::default();
        let final_frame = Frame::new(1, 0, FrameKind::Doc, b"{}".to_vec()).finalize();
        cursor.receive(&final_frame, &mut handler).unwrap();
        assert_eq!(handler.finals, 1);

        let after = Frame::new(1, 1, FrameKind::Doc, b"{}".to_vec());
        assert!(cursor.receive(&after, &mut handler).is_err());
    }

    #[test]
    fn handler_never_invoked_twice_for_same_seq() {
        let mut cursor = StreamCursor::new();
        let mut handler = RecordingHandler::default();
        let frame = Frame::new(1, 0, FrameKind::Doc, b"{}".to_vec());
        for _ in 0..5 {
            cursor.receive(&frame, &mut handler).unwrap();
        }
        assert_eq!(handler.docs, 1);
    }

    #[test]
    fn base_mismatch_rejects_by_default() {
        let mut cursor = StreamCursor::new();
        let mut handler = RecordingHandler::default();
        cursor.record_state_hash(1, "fedcba9876543210fedcba9876543210fedcba9876543210fedcba9876543210".to_string());
        let mut base = [0u8; 32];
        base[0] = 0x01;
        let patch_frame = Frame::new(1, 0, FrameKind::Patch, b"{}".to_vec()).with_base(base);
        let result = cursor.receive(&patch_frame, &mut handler);
        assert!(result.is_err());
    }
}
