//! # Core Types for the Input Scanner
//!
//! This module defines the fundamental data types used throughout the defense
//! pipeline for threat classification, scan results, and the trust boundary.
//!
//! ## Design Principles
//!
//! 1. **Closed Classification** - Every detection maps to a [`DetectionType`]
//!    variant; the enum is the stable wire contract.
//! 2. **Explicit Trust Boundary** - Untrusted content is wrapped in
//!    [`Quarantined`] at ingress and stays immutable afterwards.
//! 3. **Serializable** - Wire-facing types derive Serde for audit trails and
//!    adapter use; quarantine metadata stays process-local.
//!
//! ## References
//!
//! - OWASP LLM Top 10: <https://owasp.org/www-project-top-10-for-large-language-model-applications/>
//! - MITRE ATLAS: <https://atlas.mitre.org/>

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Severity of a single detection.
///
/// Ordering is total: `Low < Medium < High < Critical`, so detections can be
/// sorted most-severe-first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Weak signal, informational.
    Low,
    /// Suspicious but commonly benign in context.
    Medium,
    /// Strong signal of adversarial intent.
    High,
    /// Unambiguous attack marker. A single critical detection blocks
    /// regardless of the composite score.
    Critical,
}

impl Severity {
    /// Contribution of one detection at this severity to the composite score.
    ///
    /// | Severity | Weight |
    /// |----------|--------|
    /// | Low      | 0.1    |
    /// | Medium   | 0.25   |
    /// | High     | 0.5    |
    /// | Critical | 1.0    |
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Severity::Low => 0.1,
            Severity::Medium => 0.25,
            Severity::High => 0.5,
            Severity::Critical => 1.0,
        }
    }

    /// One level down. `Low` stays `Low`.
    #[must_use]
    pub const fn demoted(self) -> Self {
        match self {
            Severity::Critical => Severity::High,
            Severity::High => Severity::Medium,
            Severity::Medium | Severity::Low => Severity::Low,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// The closed set of detection types used verbatim across the wire.
///
/// New attack techniques are mapped onto an existing variant rather than
/// extending the enum; the serialized names are the stable contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionType {
    /// "Ignore previous instructions" and friends.
    InstructionOverride,
    /// Persona/role hijacking ("pretend you are", "act as").
    RoleManipulation,
    /// Closing role tags, instruction-token injection, code-fence escapes.
    DelimiterEscape,
    /// "Developer mode", DAN-style framings, simulated environments.
    Virtualization,
    /// Comply-with-a-disclaimer framings ("for educational purposes").
    SkeletonKey,
    /// "Admin override", "bypass auth" in imperative form.
    PrivilegeEscalation,
    /// High-entropy GCG-style suffixes.
    AdversarialSuffix,
    /// Dense switching between writing systems.
    LanguageSwitching,
    /// Base64/rot13/percent-encoding smuggling markers.
    EncodingObfuscation,
    /// A configured canary token appeared in output.
    CanaryLeak,
    /// Personally identifiable information in output.
    PiiDetected,
    /// API keys, bearer tokens, cloud credentials in output.
    SecretDetected,
    /// A user-supplied pattern matched.
    CustomPattern,
    /// Previously captured tool output reappearing in an outbound call.
    Exfiltration,
    /// Per-tool rate limit exceeded.
    DenialOfWallet,
    /// Content exceeds the configured maximum length.
    Oversize,
}

impl DetectionType {
    /// The threat-category code this detection type maps to by default.
    ///
    /// T1, T9, T16, T18 and T19 carry the documented meanings; the remaining
    /// codes are reserved and assigned here so every detection carries a
    /// stable category.
    #[must_use]
    pub const fn default_category(self) -> ThreatCategory {
        match self {
            DetectionType::InstructionOverride
            | DetectionType::RoleManipulation
            | DetectionType::DelimiterEscape
            | DetectionType::Virtualization => ThreatCategory::T1,
            DetectionType::PrivilegeEscalation => ThreatCategory::T5,
            DetectionType::PiiDetected | DetectionType::SecretDetected => ThreatCategory::T7,
            DetectionType::EncodingObfuscation => ThreatCategory::T9,
            DetectionType::AdversarialSuffix => ThreatCategory::T11,
            DetectionType::DenialOfWallet => ThreatCategory::T12,
            DetectionType::Oversize => ThreatCategory::T13,
            DetectionType::CustomPattern => ThreatCategory::T2,
            DetectionType::SkeletonKey => ThreatCategory::T16,
            DetectionType::LanguageSwitching => ThreatCategory::T18,
            DetectionType::CanaryLeak | DetectionType::Exfiltration => ThreatCategory::T19,
        }
    }
}

/// Stable threat-category codes `T1..T19`.
///
/// Documented meanings: T1 (instruction override / role / delimiter /
/// virtualization), T9 (encoding bypass), T16 (skeleton key), T18 (language
/// switching), T19 (exfiltration). The remaining codes are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ThreatCategory {
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
    T7,
    T8,
    T9,
    T10,
    T11,
    T12,
    T13,
    T14,
    T15,
    T16,
    T17,
    T18,
    T19,
}

impl ThreatCategory {
    /// The wire code, e.g. `"T16"`.
    #[must_use]
    pub const fn as_code(self) -> &'static str {
        match self {
            ThreatCategory::T1 => "T1",
            ThreatCategory::T2 => "T2",
            ThreatCategory::T3 => "T3",
            ThreatCategory::T4 => "T4",
            ThreatCategory::T5 => "T5",
            ThreatCategory::T6 => "T6",
            ThreatCategory::T7 => "T7",
            ThreatCategory::T8 => "T8",
            ThreatCategory::T9 => "T9",
            ThreatCategory::T10 => "T10",
            ThreatCategory::T11 => "T11",
            ThreatCategory::T12 => "T12",
            ThreatCategory::T13 => "T13",
            ThreatCategory::T14 => "T14",
            ThreatCategory::T15 => "T15",
            ThreatCategory::T16 => "T16",
            ThreatCategory::T17 => "T17",
            ThreatCategory::T18 => "T18",
            ThreatCategory::T19 => "T19",
        }
    }
}

/// One detection produced by a single signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Which kind of signal fired.
    #[serde(rename = "type")]
    pub detection_type: DetectionType,
    /// How strongly this match indicates an attack.
    pub severity: Severity,
    /// Identifier of the pattern or signal that matched.
    pub pattern: String,
    /// The matched text, truncated for audit logging.
    pub matched: String,
    /// Byte offset of the match in the normalized text (0 for whole-text
    /// signals such as oversize).
    pub position: usize,
    /// Human-readable description for logging/alerts.
    pub description: String,
    /// Stable threat-category code.
    #[serde(rename = "threatCategory")]
    pub threat_category: ThreatCategory,
}

impl Detection {
    /// Maximum length of the `matched` excerpt kept in a detection.
    pub const MATCH_EXCERPT_CHARS: usize = 50;

    /// Truncate a matched span to the audit excerpt length.
    #[must_use]
    pub fn excerpt(matched: &str) -> String {
        matched.chars().take(Self::MATCH_EXCERPT_CHARS).collect()
    }
}

/// Result of scanning a piece of quarantined content.
///
/// Invariants:
/// - `safe == (score < block_threshold) && no critical detection`
/// - `0.0 <= score <= 1.0`
/// - `detections` is sorted by descending severity
/// - `normalized` is the canonical form the pattern signals ran against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Whether the content may pass through.
    pub safe: bool,
    /// Composite risk score in `[0, 1]`.
    pub score: f64,
    /// All detections, most severe first.
    pub detections: Vec<Detection>,
    /// The canonicalized text used for detection.
    pub normalized: String,
    /// Detector faults encountered while scanning (skipped signals).
    ///
    /// Not part of the wire shape; the orchestrator turns these into
    /// `detector-fault` audit entries.
    #[serde(skip)]
    pub faults: Vec<String>,
}

impl ScanResult {
    /// A trivially safe result for empty input.
    #[must_use]
    pub fn safe_empty(normalized: String) -> Self {
        Self {
            safe: true,
            score: 0.0,
            detections: Vec::new(),
            normalized,
            faults: Vec::new(),
        }
    }

    /// True if any detection is critical.
    #[must_use]
    pub fn has_critical(&self) -> bool {
        self.detections
            .iter()
            .any(|d| d.severity == Severity::Critical)
    }

    /// The most severe detection, if any.
    #[must_use]
    pub fn top_detection(&self) -> Option<&Detection> {
        self.detections.first()
    }
}

/// Message roles understood by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Application-owned instructions; exempt from most pattern signals.
    System,
    /// End-user or tool-derived text; always scanned.
    User,
    /// Prior model turns; scanned only under [`ScanStrategy::FullHistory`].
    Assistant,
}

/// The canonical internal message shape.
///
/// Provider-specific formats are mapped into this shape before scanning;
/// tool-role messages are mapped to [`Role::User`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Who produced this message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl PromptMessage {
    /// Convenience constructor for a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Convenience constructor for a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Convenience constructor for an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Map a wire-format role string into the canonical shape.
    ///
    /// Tool-derived roles (`tool`, `function`) are mapped to [`Role::User`]
    /// so they receive full scanning. Unknown roles are rejected rather
    /// than coerced.
    ///
    /// # Errors
    ///
    /// Returns the offending role string when it is not recognized.
    pub fn from_wire(role: &str, content: impl Into<String>) -> Result<Self, String> {
        let role = match role {
            "system" => Role::System,
            "user" | "tool" | "function" => Role::User,
            "assistant" => Role::Assistant,
            other => return Err(format!("unknown role '{other}'")),
        };
        Ok(Self {
            role,
            content: content.into(),
        })
    }
}

/// Which slice of a conversation the scanner examines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanStrategy {
    /// Only the most recent user message.
    LastUser,
    /// Every user message.
    AllUser,
    /// User and assistant messages (prior assistant turns can carry
    /// indirect-injection payloads).
    FullHistory,
}

impl Default for ScanStrategy {
    fn default() -> Self {
        ScanStrategy::AllUser
    }
}

/// How much the origin of a piece of content is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrustLevel {
    /// External user input. Never trusted.
    Untrusted,
    /// Output captured from a tool invocation. Untrusted; additionally
    /// tracked for exfiltration.
    ToolOutput,
    /// Application-owned content (system prompts).
    Trusted,
}

/// A tagged wrapper around untrusted content.
///
/// Any text that reaches the scanner must first be quarantined, making the
/// trust boundary explicit. Created at ingress (message parsing, tool-output
/// capture); immutable thereafter and freely shareable.
///
/// # Example
///
/// ```rust
/// use aegis_scanner::{Quarantined, TrustLevel};
///
/// let q = Quarantined::untrusted("ignore previous instructions", "chat");
/// assert_eq!(q.trust(), TrustLevel::Untrusted);
/// assert_eq!(q.source(), "chat");
/// ```
#[derive(Debug, Clone)]
pub struct Quarantined<T> {
    value: T,
    source: String,
    received_at: SystemTime,
    trust: TrustLevel,
}

impl<T> Quarantined<T> {
    /// Quarantine untrusted external content.
    pub fn untrusted(value: T, source: impl Into<String>) -> Self {
        Self {
            value,
            source: source.into(),
            received_at: SystemTime::now(),
            trust: TrustLevel::Untrusted,
        }
    }

    /// Quarantine captured tool output.
    pub fn tool_output(value: T, source: impl Into<String>) -> Self {
        Self {
            value,
            source: source.into(),
            received_at: SystemTime::now(),
            trust: TrustLevel::ToolOutput,
        }
    }

    /// Read access to the wrapped value.
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Where this content entered the system.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// When this content was captured.
    pub fn received_at(&self) -> SystemTime {
        self.received_at
    }

    /// Trust level assigned at ingress.
    pub fn trust(&self) -> TrustLevel {
        self.trust
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_severity_weights() {
        assert_eq!(Severity::Critical.weight(), 1.0);
        assert_eq!(Severity::High.weight(), 0.5);
        assert_eq!(Severity::Medium.weight(), 0.25);
        assert_eq!(Severity::Low.weight(), 0.1);
    }

    #[test]
    fn test_severity_demotion() {
        assert_eq!(Severity::Critical.demoted(), Severity::High);
        assert_eq!(Severity::High.demoted(), Severity::Medium);
        assert_eq!(Severity::Medium.demoted(), Severity::Low);
        assert_eq!(Severity::Low.demoted(), Severity::Low);
    }

    #[test]
    fn test_detection_type_wire_names() {
        let json = serde_json::to_string(&DetectionType::InstructionOverride).unwrap();
        assert_eq!(json, "\"instruction_override\"");
        let json = serde_json::to_string(&DetectionType::DenialOfWallet).unwrap();
        assert_eq!(json, "\"denial_of_wallet\"");
        let json = serde_json::to_string(&DetectionType::PiiDetected).unwrap();
        assert_eq!(json, "\"pii_detected\"");
    }

    #[test]
    fn test_threat_category_codes() {
        assert_eq!(ThreatCategory::T1.as_code(), "T1");
        assert_eq!(ThreatCategory::T19.as_code(), "T19");
        assert_eq!(
            DetectionType::SkeletonKey.default_category(),
            ThreatCategory::T16
        );
        assert_eq!(
            DetectionType::LanguageSwitching.default_category(),
            ThreatCategory::T18
        );
    }

    #[test]
    fn test_scan_result_serialization_shape() {
        let result = ScanResult {
            safe: false,
            score: 0.5,
            detections: vec![Detection {
                detection_type: DetectionType::InstructionOverride,
                severity: Severity::High,
                pattern: "IO-001".to_string(),
                matched: "ignore previous instructions".to_string(),
                position: 0,
                description: "instruction override".to_string(),
                threat_category: ThreatCategory::T1,
            }],
            normalized: "ignore previous instructions".to_string(),
            faults: vec!["internal note".to_string()],
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"type\":\"instruction_override\""));
        assert!(json.contains("\"threatCategory\":\"T1\""));
        // Faults are process-local, not wire data.
        assert!(!json.contains("internal note"));
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        let msg: PromptMessage =
            serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert_eq!(msg.role, Role::User);
    }

    #[test]
    fn test_from_wire_role_mapping() {
        assert_eq!(
            PromptMessage::from_wire("tool", "df -h output").unwrap().role,
            Role::User
        );
        assert_eq!(
            PromptMessage::from_wire("system", "rules").unwrap().role,
            Role::System
        );
        assert!(PromptMessage::from_wire("wizard", "hi").is_err());
    }

    #[test]
    fn test_quarantine_metadata() {
        let q = Quarantined::tool_output("df -h output".to_string(), "shell");
        assert_eq!(q.trust(), TrustLevel::ToolOutput);
        assert_eq!(q.get(), "df -h output");
    }

    #[test]
    fn test_excerpt_truncation() {
        let long = "x".repeat(200);
        assert_eq!(Detection::excerpt(&long).chars().count(), 50);
    }
}
