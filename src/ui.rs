//! Conventional payload shapes for `ui`/`err` frames (C10).
//!
//! These are conventions layered on the value model, not a format
//! requirement — the frame machinery in `frame.rs` is agnostic to them.

use crate::types::{field, GValue};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub pct: f64,
    pub msg: String,
    pub ts: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub level: String,
    pub msg: String,
    pub ts: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub mime: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResyncRequest {
    pub sid: u64,
    pub seq: u64,
    pub want: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiError {
    pub code: String,
    pub msg: String,
    pub sid: u64,
    pub seq: u64,
}

impl Progress {
    pub fn to_gvalue(&self) -> GValue {
        let mut fields = vec![
            field("pct", GValue::float(self.pct)),
            field("msg", GValue::str(self.msg.clone())),
        ];
        if let Some(ts) = self.ts {
            fields.push(field("ts", GValue::time(ts)));
        }
        GValue::struct_val("Progress", fields)
    }

    pub fn from_gvalue(v: &GValue) -> Option<Self> {
        Some(Self {
            pct: v.get("pct")?.as_float().or_else(|| v.get("pct")?.as_int().map(|i| i as f64))?,
            msg: v.get("msg")?.as_str()?.to_string(),
            ts: v.get("ts").and_then(|t| t.as_time()).copied(),
        })
    }
}

impl Log {
    pub fn to_gvalue(&self) -> GValue {
        GValue::struct_val(
            "Log",
            vec![
                field("level", GValue::str(self.level.clone())),
                field("msg", GValue::str(self.msg.clone())),
                field("ts", GValue::time(self.ts)),
            ],
        )
    }

    pub fn from_gvalue(v: &GValue) -> Option<Self> {
        Some(Self {
            level: v.get("level")?.as_str()?.to_string(),
            msg: v.get("msg")?.as_str()?.to_string(),
            ts: *v.get("ts")?.as_time()?,
        })
    }
}

impl Metric {
    pub fn to_gvalue(&self) -> GValue {
        let mut fields = vec![
            field("name", GValue::str(self.name.clone())),
            field("value", GValue::float(self.value)),
        ];
        if let Some(unit) = &self.unit {
            fields.push(field("unit", GValue::str(unit.clone())));
        }
        GValue::struct_val("Metric", fields)
    }

    pub fn from_gvalue(v: &GValue) -> Option<Self> {
        Some(Self {
            name: v.get("name")?.as_str()?.to_string(),
            value: v.get("value")?.as_float().or_else(|| v.get("value")?.as_int().map(|i| i as f64))?,
            unit: v.get("unit").and_then(|u| u.as_str()).map(str::to_string),
        })
    }
}

impl Artifact {
    pub fn to_gvalue(&self) -> GValue {
        GValue::struct_val(
            "Artifact",
            vec![
                field("mime", GValue::str(self.mime.clone())),
                field("ref", GValue::str(self.reference.clone())),
                field("name", GValue::str(self.name.clone())),
            ],
        )
    }

    pub fn from_gvalue(v: &GValue) -> Option<Self> {
        Some(Self {
            mime: v.get("mime")?.as_str()?.to_string(),
            reference: v.get("ref")?.as_str()?.to_string(),
            name: v.get("name")?.as_str()?.to_string(),
        })
    }
}

impl ResyncRequest {
    pub fn to_gvalue(&self) -> GValue {
        GValue::struct_val(
            "ResyncRequest",
            vec![
                field("sid", GValue::int(self.sid as i64)),
                field("seq", GValue::int(self.seq as i64)),
                field("want", GValue::int(self.want as i64)),
                field("reason", GValue::str(self.reason.clone())),
            ],
        )
    }

    pub fn from_gvalue(v: &GValue) -> Option<Self> {
        Some(Self {
            sid: v.get("sid")?.as_int()? as u64,
            seq: v.get("seq")?.as_int()? as u64,
            want: v.get("want")?.as_int()? as u64,
            reason: v.get("reason")?.as_str()?.to_string(),
        })
    }
}

impl UiError {
    pub fn to_gvalue(&self) -> GValue {
        GValue::struct_val(
            "Error",
            vec![
                field("code", GValue::str(self.code.clone())),
                field("msg", GValue::str(self.msg.clone())),
                field("sid", GValue::int(self.sid as i64)),
                field("seq", GValue::int(self.seq as i64)),
            ],
        )
    }

    pub fn from_gvalue(v: &GValue) -> Option<Self> {
        Some(Self {
            code: v.get("code")?.as_str()?.to_string(),
            msg: v.get("msg")?.as_str()?.to_string(),
            sid: v.get("sid")?.as_int()? as u64,
            seq: v.get("seq")?.as_int()? as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_round_trips_through_gvalue() {
        let p = Progress {
            pct: 42.5,
            msg: "halfway".to_string(),
            ts: None,
        };
        let gv = p.to_gvalue();
        let back = Progress::from_gvalue(&gv).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn metric_round_trips_without_unit() {
        let m = Metric {
            name: "latency_ms".to_string(),
            value: 12.3,
            unit: None,
        };
        let gv = m.to_gvalue();
        assert_eq!(Metric::from_gvalue(&gv).unwrap(), m);
    }

    #[test]
    fn resync_request_round_trips() {
        let r = ResyncRequest {
            sid: 7,
            seq: 3,
            want: 4,
            reason: "gap".to_string(),
        };
        let gv = r.to_gvalue();
        assert_eq!(ResyncRequest::from_gvalue(&gv).unwrap(), r);
    }

    #[test]
    fn ui_error_round_trips() {
        let e = UiError {
            code: "CRC_MISMATCH".to_string(),
            msg: "bad frame".to_string(),
            sid: 1,
            seq: 9,
        };
        let gv = e.to_gvalue();
        assert_eq!(UiError::from_gvalue(&gv).unwrap(), e);
    }
}
