//! # Audit Sink
//!
//! Append-only event recording for every decision the pipeline makes.
//!
//! ## Design
//!
//! - The in-memory [`AuditLog`] is a bounded ring: old entries are evicted,
//!   memory stays bounded, and `entries()` hands out a snapshot copy.
//! - External transports implement [`AuditSink`] and are forked to on every
//!   record; a slow or failing sink cannot corrupt the ring.
//! - Entries are written BEFORE the corresponding error is raised, so a
//!   crashing caller does not lose the record.
//!
//! ## Redaction
//!
//! When redaction is enabled, every string value in an entry's `context` is
//! replaced with `"[REDACTED]"` except the reserved keys `reason` and
//! `event`. The shape of the context is preserved so downstream tooling can
//! still aggregate on structure.
//!
//! ## Wire Format
//!
//! One JSON object per line (JSONL):
//!
//! ```text
//! {"timestamp":1714060800123,"event":"scan_block","decision":"blocked","sessionId":"…","context":{…}}
//! ```

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Decision classes recorded with every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditDecision {
    /// Informational; no enforcement happened.
    Info,
    /// Suspicious but allowed through.
    Flagged,
    /// Enforcement fired.
    Blocked,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Event name (`scan_pass`, `scan_block`, `stream_violation`,
    /// `action_denied`, `session_quarantined`, `session_terminated`,
    /// `detector-fault`).
    pub event: String,
    /// Decision class.
    pub decision: AuditDecision,
    /// Session correlation id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Request correlation id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Free-form structured context.
    pub context: serde_json::Value,
}

impl AuditEntry {
    /// Render as one JSONL line (no trailing newline).
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            // An audit entry that cannot serialize still must leave a trace.
            format!(
                "{{\"timestamp\":{},\"event\":\"audit-serialize-error\",\"decision\":\"info\",\"context\":{{\"reason\":\"{e}\"}}}}",
                self.timestamp
            )
        })
    }
}

/// External audit transport (file, OpenTelemetry, console, ...).
pub trait AuditSink: Send {
    /// Record one entry. Implementations must not panic; failures are the
    /// sink's own concern.
    fn record(&mut self, entry: &AuditEntry);
}

/// Console sink writing JSONL to stderr.
///
/// Honors `NO_COLOR`: when the variable is set (or stderr styling is
/// unwanted), lines are emitted without ANSI escapes.
pub struct ConsoleSink {
    color: bool,
}

impl ConsoleSink {
    /// Build a console sink, consulting `NO_COLOR`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            color: std::env::var_os("NO_COLOR").is_none(),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for ConsoleSink {
    fn record(&mut self, entry: &AuditEntry) {
        let line = entry.to_jsonl();
        if self.color && entry.decision == AuditDecision::Blocked {
            eprintln!("\x1b[31m{line}\x1b[0m");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Bounded, append-only in-memory audit log with optional fan-out sinks.
pub struct AuditLog {
    ring: VecDeque<AuditEntry>,
    capacity: usize,
    redact_context: bool,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("entries", &self.ring.len())
            .field("capacity", &self.capacity)
            .field("redact_context", &self.redact_context)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl AuditLog {
    /// Default ring capacity.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Build a log with the given ring capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: VecDeque::new(),
            capacity: capacity.max(1),
            redact_context: false,
            sinks: Vec::new(),
        }
    }

    /// Enable context redaction (builder style).
    #[must_use]
    pub fn with_redaction(mut self, enabled: bool) -> Self {
        self.redact_context = enabled;
        self
    }

    /// Attach an external sink (builder style).
    #[must_use]
    pub fn with_sink(mut self, sink: impl AuditSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Append one entry, evicting the oldest when full, and fork it to all
    /// attached sinks.
    pub fn record(
        &mut self,
        event: impl Into<String>,
        decision: AuditDecision,
        session_id: Option<String>,
        request_id: Option<String>,
        context: serde_json::Value,
    ) {
        let context = if self.redact_context {
            redact_context(context)
        } else {
            context
        };
        let entry = AuditEntry {
            timestamp: now_millis(),
            event: event.into(),
            decision,
            session_id,
            request_id,
            context,
        };

        for sink in &mut self.sinks {
            sink.record(&entry);
        }

        if self.ring.len() == self.capacity {
            self.ring.pop_front();
        }
        self.ring.push_back(entry);
    }

    /// Snapshot of the current entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.ring.iter().cloned().collect()
    }

    /// Number of entries currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// True when nothing has been recorded (or everything was evicted).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Render the retained entries as JSONL.
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        let mut out = String::new();
        for entry in &self.ring {
            out.push_str(&entry.to_jsonl());
            out.push('\n');
        }
        out
    }
}

/// Milliseconds since the Unix epoch.
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Replace every string value in `context` with `"[REDACTED]"`, except the
/// values of the reserved keys `reason` and `event` at any level.
fn redact_context(value: serde_json::Value) -> serde_json::Value {
    fn walk(value: serde_json::Value, parent_key: Option<&str>) -> serde_json::Value {
        match value {
            serde_json::Value::String(s) => {
                if matches!(parent_key, Some("reason" | "event")) {
                    serde_json::Value::String(s)
                } else {
                    serde_json::Value::String("[REDACTED]".to_string())
                }
            }
            serde_json::Value::Array(items) => serde_json::Value::Array(
                items.into_iter().map(|v| walk(v, None)).collect(),
            ),
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(k, v)| {
                        let walked = walk(v, Some(k.as_str()));
                        (k, walked)
                    })
                    .collect(),
            ),
            other => other,
        }
    }
    walk(value, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_and_snapshot() {
        let mut log = AuditLog::new(10);
        log.record(
            "scan_pass",
            AuditDecision::Info,
            Some("s1".to_string()),
            None,
            json!({ "score": 0.0 }),
        );
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, "scan_pass");
        assert_eq!(entries[0].decision, AuditDecision::Info);
    }

    #[test]
    fn test_ring_bounded() {
        let mut log = AuditLog::new(3);
        for i in 0..10 {
            log.record("e", AuditDecision::Info, None, None, json!({ "i": i }));
        }
        assert_eq!(log.len(), 3);
        // Oldest evicted; the survivors are the last three.
        let entries = log.entries();
        assert_eq!(entries[0].context["i"], 7);
        assert_eq!(entries[2].context["i"], 9);
    }

    #[test]
    fn test_jsonl_one_object_per_line() {
        let mut log = AuditLog::new(10);
        log.record("a", AuditDecision::Info, None, None, json!({}));
        log.record("b", AuditDecision::Blocked, None, None, json!({}));
        let jsonl = log.to_jsonl();
        let lines: Vec<&str> = jsonl.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(parsed.get("timestamp").is_some());
            assert!(parsed.get("event").is_some());
        }
    }

    #[test]
    fn test_decision_wire_names() {
        assert_eq!(
            serde_json::to_string(&AuditDecision::Flagged).unwrap(),
            "\"flagged\""
        );
    }

    #[test]
    fn test_redaction_masks_strings_except_reserved() {
        let mut log = AuditLog::new(10).with_redaction(true);
        log.record(
            "action_denied",
            AuditDecision::Blocked,
            None,
            None,
            json!({
                "reason": "exfiltration: secret reuse",
                "tool": "send_email",
                "nested": { "matched": "123-45-6789", "event": "inner" },
                "count": 3
            }),
        );
        let entry = &log.entries()[0];
        assert_eq!(entry.context["reason"], "exfiltration: secret reuse");
        assert_eq!(entry.context["tool"], "[REDACTED]");
        assert_eq!(entry.context["nested"]["matched"], "[REDACTED]");
        assert_eq!(entry.context["nested"]["event"], "inner");
        assert_eq!(entry.context["count"], 3);
    }

    #[test]
    fn test_fan_out_sink_sees_entries() {
        struct Capture(std::sync::Arc<std::sync::Mutex<Vec<String>>>);
        impl AuditSink for Capture {
            fn record(&mut self, entry: &AuditEntry) {
                self.0.lock().unwrap().push(entry.event.clone());
            }
        }

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut log = AuditLog::new(10).with_sink(Capture(std::sync::Arc::clone(&seen)));
        log.record("scan_block", AuditDecision::Blocked, None, None, json!({}));
        assert_eq!(seen.lock().unwrap().as_slice(), ["scan_block"]);
    }

    #[test]
    fn test_session_id_serialized_camel_case() {
        let entry = AuditEntry {
            timestamp: 1,
            event: "e".to_string(),
            decision: AuditDecision::Info,
            session_id: Some("s".to_string()),
            request_id: None,
            context: json!({}),
        };
        let line = entry.to_jsonl();
        assert!(line.contains("\"sessionId\":\"s\""));
        assert!(!line.contains("requestId"));
    }
}
