//! # Stream Monitor Engine
//!
//! Synchronous core of the output watchdog. Chunks are pushed in, scanned
//! against a sliding window, and everything before the window tail is
//! emitted immediately.
//!
//! ## Sliding Window
//!
//! The monitor keeps a suffix of `W` characters buffered but not yet
//! emitted, where `W = max(longest canary token length, 64)`. Any pattern
//! that straddles a chunk boundary is therefore still whole inside the
//! buffer when its last character arrives: a partial match at the end of
//! the buffer is always shorter than `W`, so it lives entirely in the
//! unemitted tail.
//!
//! ## State Machine
//!
//! ```text
//! Flowing ──violation──► Terminated   (absorbing)
//!    │
//!    └──clean EOF──► Closed           (absorbing)
//! ```
//!
//! After `Terminated` or `Closed`, [`StreamMonitor::push`] discards input.
//! A terminating violation is carried in exactly one [`Push`]; the buffered
//! tail from earlier chunks is discarded, never emitted.
//!
//! ## Modes
//!
//! - **Block** (default): any match terminates the stream.
//! - **Redaction** (`pii_redaction`): PII and custom redactable matches are
//!   replaced with `[REDACTED-<LABEL>]` in the emitted text and the stream
//!   continues; canary, secret, and custom block patterns still terminate.

use aho_corasick::AhoCorasick;
use regex::Regex;
use serde::{Deserialize, Serialize};

use aegis_scanner::models::{Detection, DetectionType, Severity};
use aegis_scanner::pii::{self, PiiPattern};
use aegis_scanner::secrets::{self, SecretPattern};

/// Floor for the sliding-window width in characters.
pub const MIN_WINDOW: usize = 64;

/// Configuration for [`StreamMonitor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Canary tokens; an appearance terminates the stream.
    pub canaries: Vec<String>,
    /// Scan for PII families.
    pub detect_pii: bool,
    /// Redact PII instead of terminating.
    pub pii_redaction: bool,
    /// Scan for secret families (keys, tokens, URL credentials).
    pub detect_secrets: bool,
    /// Additional terminating regex patterns.
    pub block_patterns: Vec<String>,
    /// Additional redactable regex patterns (label `CUSTOM`).
    pub redact_patterns: Vec<String>,
    /// Maximum emitted length in characters; 0 disables the check.
    pub max_output_chars: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            canaries: Vec::new(),
            detect_pii: true,
            pii_redaction: false,
            detect_secrets: true,
            block_patterns: Vec::new(),
            redact_patterns: Vec::new(),
            max_output_chars: 0,
        }
    }
}

/// A single observed violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamViolation {
    /// Detection type (`canary_leak`, `pii_detected`, `secret_detected`,
    /// `custom_pattern`, `oversize`).
    pub violation_type: DetectionType,
    /// Severity of the violation.
    pub severity: Severity,
    /// Family label; doubles as the redaction marker for PII.
    pub label: String,
    /// Matched text, truncated to the audit excerpt length.
    pub matched: String,
    /// Human-readable description.
    pub description: String,
}

/// Lifecycle state of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Accepting chunks.
    Flowing,
    /// Upstream finished cleanly.
    Closed,
    /// Kill switch fired; input is discarded.
    Terminated,
}

/// Result of one [`StreamMonitor::push`] or [`StreamMonitor::finish`].
#[derive(Debug, Clone, Default)]
pub struct Push {
    /// Text released downstream by this call, in order.
    pub emitted: String,
    /// Violations observed by this call. A terminating violation appears
    /// here exactly once across the monitor's lifetime.
    pub violations: Vec<StreamViolation>,
}

/// One redactable match inside the buffer.
struct RedactableMatch {
    label: String,
    span: std::ops::Range<usize>,
}

/// The synchronous output watchdog.
///
/// # Example
///
/// ```rust
/// use aegis_stream::{StreamConfig, StreamMonitor};
///
/// let config = StreamConfig {
///     canaries: vec!["AEGIS_CANARY_abc123".to_string()],
///     ..StreamConfig::default()
/// };
/// let mut monitor = StreamMonitor::new(&config);
///
/// let push = monitor.push("perfectly ordinary output, ");
/// assert!(push.violations.is_empty());
///
/// let push = monitor.push("the secret is AEGIS_CANARY_abc123");
/// assert_eq!(push.violations.len(), 1);
/// assert!(monitor.is_terminated());
/// ```
pub struct StreamMonitor {
    canaries: Option<AhoCorasick>,
    canary_tokens: Vec<String>,
    pii_patterns: Vec<PiiPattern>,
    secret_patterns: Vec<SecretPattern>,
    block_patterns: Vec<Regex>,
    redact_patterns: Vec<Regex>,
    pii_redaction: bool,
    max_output_chars: usize,
    window: usize,
    buffer: String,
    emitted_chars: usize,
    state: MonitorState,
}

impl StreamMonitor {
    /// Build a monitor for one stream.
    ///
    /// Invalid user regexes are skipped with a warning; built-in catalogs
    /// and canary matching are unaffected.
    #[must_use]
    pub fn new(config: &StreamConfig) -> Self {
        let canary_tokens: Vec<String> = config
            .canaries
            .iter()
            .filter(|c| !c.is_empty())
            .cloned()
            .collect();
        let canaries = if canary_tokens.is_empty() {
            None
        } else {
            AhoCorasick::builder()
                .ascii_case_insensitive(true)
                .build(&canary_tokens)
                .map_err(|e| {
                    tracing::warn!(error = %e, "canary matcher failed to build");
                    e
                })
                .ok()
        };

        let longest_canary = canary_tokens
            .iter()
            .map(|c| c.chars().count())
            .max()
            .unwrap_or(0);

        let compile = |sources: &[String], kind: &str| -> Vec<Regex> {
            sources
                .iter()
                .filter_map(|s| match Regex::new(s) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        tracing::warn!(pattern = %s, error = %e, "{kind} pattern skipped");
                        None
                    }
                })
                .collect()
        };

        Self {
            canaries,
            canary_tokens,
            pii_patterns: if config.detect_pii {
                pii::default_pii_patterns()
            } else {
                Vec::new()
            },
            secret_patterns: if config.detect_secrets {
                secrets::default_secret_patterns()
            } else {
                Vec::new()
            },
            block_patterns: compile(&config.block_patterns, "block"),
            redact_patterns: compile(&config.redact_patterns, "redact"),
            pii_redaction: config.pii_redaction,
            max_output_chars: config.max_output_chars,
            window: longest_canary.max(MIN_WINDOW),
            buffer: String::new(),
            emitted_chars: 0,
            state: MonitorState::Flowing,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> MonitorState {
        self.state
    }

    /// True once the kill switch has fired.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state == MonitorState::Terminated
    }

    /// The sliding-window width in characters.
    #[must_use]
    pub const fn window(&self) -> usize {
        self.window
    }

    /// Feed one chunk through the monitor.
    ///
    /// Returns the text to emit downstream (everything buffered beyond the
    /// window tail) and any violations observed. After termination, input
    /// is discarded and nothing further is emitted.
    pub fn push(&mut self, chunk: &str) -> Push {
        if self.state != MonitorState::Flowing {
            return Push::default();
        }
        self.buffer.push_str(chunk);
        self.advance(false)
    }

    /// Signal clean upstream EOF: scan and release the remaining tail.
    ///
    /// A violation hiding in the tail still terminates; otherwise the tail
    /// is emitted (redacted if applicable) and the monitor closes.
    pub fn finish(&mut self) -> Push {
        if self.state != MonitorState::Flowing {
            return Push::default();
        }
        let push = self.advance(true);
        if self.state == MonitorState::Flowing {
            self.state = MonitorState::Closed;
        }
        push
    }

    /// Shared scan-and-emit step. `flush` releases the whole buffer instead
    /// of holding back the window tail.
    fn advance(&mut self, flush: bool) -> Push {
        // Terminating signals scan the entire buffer, tail included.
        if let Some(violation) = self.find_terminating() {
            tracing::debug!(kind = ?violation.violation_type, "stream kill switch fired");
            self.buffer.clear();
            self.state = MonitorState::Terminated;
            return Push {
                emitted: String::new(),
                violations: vec![violation],
            };
        }

        let mut boundary = if flush {
            self.buffer.len()
        } else {
            byte_offset_of_tail(&self.buffer, self.window)
        };

        let mut violations = Vec::new();
        let mut emitted;

        if self.pii_redaction {
            let matches = self.find_redactable();
            // Never split a match across the emit boundary; hold it whole
            // in the tail until it is complete.
            for m in &matches {
                if m.span.start < boundary && m.span.end > boundary {
                    boundary = m.span.start;
                }
            }

            let mut region = self.buffer[..boundary].to_string();
            let mut inside: Vec<&RedactableMatch> = matches
                .iter()
                .filter(|m| m.span.end <= boundary)
                .collect();
            inside.sort_by_key(|m| std::cmp::Reverse(m.span.start));
            for m in inside {
                let matched = &self.buffer[m.span.clone()];
                violations.push(StreamViolation {
                    violation_type: DetectionType::PiiDetected,
                    severity: Severity::High,
                    label: m.label.clone(),
                    matched: Detection::excerpt(matched),
                    description: format!("{} redacted from output", m.label),
                });
                region.replace_range(m.span.clone(), &format!("[REDACTED-{}]", m.label));
            }
            // Oldest first for the audit trail.
            violations.reverse();
            emitted = region;
        } else {
            emitted = self.buffer[..boundary].to_string();
        }

        self.buffer.drain(..boundary);

        // Output length ceiling applies to what actually leaves.
        self.emitted_chars += emitted.chars().count();
        if self.max_output_chars > 0 && self.emitted_chars > self.max_output_chars {
            let over = self.emitted_chars - self.max_output_chars;
            let keep = emitted.chars().count() - over;
            emitted = emitted.chars().take(keep).collect();
            self.buffer.clear();
            self.state = MonitorState::Terminated;
            violations.push(StreamViolation {
                violation_type: DetectionType::Oversize,
                severity: Severity::Medium,
                label: "OUTPUT-LENGTH".to_string(),
                matched: String::new(),
                description: format!(
                    "output exceeded {} characters",
                    self.max_output_chars
                ),
            });
        }

        Push {
            emitted,
            violations,
        }
    }

    /// First terminating match anywhere in the buffer, by check order:
    /// canary, secret, custom block, then PII when redaction is off.
    fn find_terminating(&self) -> Option<StreamViolation> {
        if let Some(ac) = &self.canaries {
            if let Some(m) = ac.find(self.buffer.as_str()) {
                let token = &self.canary_tokens[m.pattern().as_usize()];
                return Some(StreamViolation {
                    violation_type: DetectionType::CanaryLeak,
                    severity: Severity::Critical,
                    label: "CANARY".to_string(),
                    matched: Detection::excerpt(token),
                    description: "canary token observed in output".to_string(),
                });
            }
        }

        if let Some(m) = secrets::find_secrets(&self.secret_patterns, &self.buffer)
            .into_iter()
            .next()
        {
            return Some(StreamViolation {
                violation_type: DetectionType::SecretDetected,
                severity: Severity::Critical,
                label: m.label.to_string(),
                matched: Detection::excerpt(&self.buffer[m.span]),
                description: format!("{} credential observed in output", m.label),
            });
        }

        for re in &self.block_patterns {
            if let Some(m) = re.find(&self.buffer) {
                return Some(StreamViolation {
                    violation_type: DetectionType::CustomPattern,
                    severity: Severity::High,
                    label: "CUSTOM".to_string(),
                    matched: Detection::excerpt(m.as_str()),
                    description: "custom block pattern observed in output".to_string(),
                });
            }
        }

        if !self.pii_redaction {
            if let Some(m) = pii::find_pii(&self.pii_patterns, &self.buffer)
                .into_iter()
                .next()
            {
                return Some(StreamViolation {
                    violation_type: DetectionType::PiiDetected,
                    severity: Severity::High,
                    label: m.label.to_string(),
                    matched: Detection::excerpt(&self.buffer[m.span]),
                    description: format!("{} observed in output", m.label),
                });
            }
        }

        None
    }

    /// All redactable matches (PII families plus custom redact patterns),
    /// sorted by start offset with overlaps dropped.
    fn find_redactable(&self) -> Vec<RedactableMatch> {
        let mut matches: Vec<RedactableMatch> = pii::find_pii(&self.pii_patterns, &self.buffer)
            .into_iter()
            .map(|m| RedactableMatch {
                label: m.label.to_string(),
                span: m.span,
            })
            .collect();

        for re in &self.redact_patterns {
            for m in re.find_iter(&self.buffer) {
                matches.push(RedactableMatch {
                    label: "CUSTOM".to_string(),
                    span: m.range(),
                });
            }
        }

        matches.sort_by_key(|m| (m.span.start, m.span.end));
        let mut kept: Vec<RedactableMatch> = Vec::new();
        for m in matches {
            if kept
                .last()
                .map_or(true, |k| m.span.start >= k.span.end)
            {
                kept.push(m);
            }
        }
        kept
    }
}

impl std::fmt::Debug for StreamMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamMonitor")
            .field("state", &self.state)
            .field("window", &self.window)
            .field("buffered_chars", &self.buffer.chars().count())
            .field("emitted_chars", &self.emitted_chars)
            .finish()
    }
}

/// Byte offset where the last `window` characters of `s` begin.
///
/// Returns 0 when the string is shorter than the window.
fn byte_offset_of_tail(s: &str, window: usize) -> usize {
    let total = s.chars().count();
    if total <= window {
        return 0;
    }
    let cut = total - window;
    s.char_indices()
        .nth(cut)
        .map_or(s.len(), |(byte_idx, _)| byte_idx)
}
