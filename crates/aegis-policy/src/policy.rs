//! Resolved policy types, presets, and validation.
//!
//! A [`Policy`] is the fully resolved configuration the orchestrator runs
//! with: thresholds, capability sets, limits, and the recovery mode. It is
//! immutable after resolution and freely shared.
//!
//! Users supply either a [`Preset`] name or a policy file (see
//! [`crate::file`]); both expand deterministically into the same shape and
//! pass through [`Policy::validate`] before use.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use aegis_scanner::patterns::CustomPattern;
use aegis_scanner::Severity;

use crate::error::PolicyError;

/// How the session reacts to a blocked input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryMode {
    /// Raise on the blocked request; subsequent requests are independent.
    Continue,
    /// Strip the offending message and retry once on the remainder.
    ResetLast,
    /// Lock the session; every future input guard fails until the instance
    /// is discarded.
    QuarantineSession,
    /// Kill the session permanently; stream transforms also refuse.
    TerminateSession,
}

/// Tool capability sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Tools the model may call. `"*"` allows any tool not denied.
    pub allow: BTreeSet<String>,
    /// Tools that are always refused.
    pub deny: BTreeSet<String>,
    /// Tools that require a human-in-the-loop approval.
    pub require_approval: BTreeSet<String>,
}

/// Resource limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Per-tool calls per minute.
    pub rate_limit: BTreeMap<String, u32>,
    /// Maximum distinct tools per request.
    pub max_tools_per_request: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            rate_limit: BTreeMap::new(),
            max_tools_per_request: 8,
        }
    }
}

/// Input-side scanning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPolicy {
    /// Maximum input length in characters.
    pub max_length: usize,
    /// Additional terminating regex patterns for incoming text.
    pub block_patterns: Vec<String>,
    /// Require content to arrive quarantined (typed ingress enforces this;
    /// the flag is kept for adapter compatibility).
    pub require_quarantine: bool,
    /// Run encoding normalization before pattern signals.
    pub encoding_normalization: bool,
}

impl Default for InputPolicy {
    fn default() -> Self {
        Self {
            max_length: 32_768,
            block_patterns: Vec::new(),
            require_quarantine: true,
            encoding_normalization: true,
        }
    }
}

/// Output-side stream monitoring knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPolicy {
    /// Maximum output length in characters (0 disables the check).
    pub max_length: usize,
    /// Additional terminating regex patterns for outgoing text.
    pub block_patterns: Vec<String>,
    /// Additional redactable patterns, treated like PII with label `CUSTOM`.
    pub redact_patterns: Vec<String>,
    /// Scan output for PII families.
    pub detect_pii: bool,
    /// Scan output for configured canary tokens.
    pub detect_canary: bool,
    /// Terminate the stream on a canary/secret leak.
    pub block_on_leak: bool,
    /// Scan output for injection payloads destined for downstream agents.
    pub detect_injection_payloads: bool,
    /// Neutralize markdown auto-execution vectors (adapter concern; carried
    /// for compatibility).
    pub sanitize_markdown: bool,
}

impl Default for OutputPolicy {
    fn default() -> Self {
        Self {
            max_length: 0,
            block_patterns: Vec::new(),
            redact_patterns: Vec::new(),
            detect_pii: true,
            detect_canary: true,
            block_on_leak: true,
            detect_injection_payloads: false,
            sanitize_markdown: false,
        }
    }
}

/// Alignment-check configuration (consumed by the optional LLM-judge
/// adapter; the core only validates and carries it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentPolicy {
    /// Whether the external judge is consulted at all.
    pub enabled: bool,
    /// Judge strictness in `[0, 1]`.
    pub strictness: f64,
}

impl Default for AlignmentPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            strictness: 0.5,
        }
    }
}

/// How PII in output is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PiiHandling {
    /// Pass PII through untouched.
    Allow,
    /// Replace matches with `[REDACTED-<label>]` and continue the stream.
    Redact,
    /// Terminate the stream on the first match.
    Block,
}

/// Data-flow rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFlowPolicy {
    /// PII disposition for output streams.
    pub pii_handling: PiiHandling,
    /// Whether retrieved/external documents may enter prompts.
    pub external_data_sources: bool,
    /// Track tool outputs and deny calls that re-emit them.
    pub no_exfiltration: bool,
}

impl Default for DataFlowPolicy {
    fn default() -> Self {
        Self {
            pii_handling: PiiHandling::Redact,
            external_data_sources: true,
            no_exfiltration: true,
        }
    }
}

/// Agentic-loop limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentLoopPolicy {
    /// Step budget when the caller does not pass an explicit maximum.
    pub default_max_steps: u32,
    /// Ceiling for the running sum of per-step scan scores.
    pub max_cumulative_risk: f64,
    /// Tools dropped from the allowed set after the first detected anomaly.
    pub high_risk_tools: BTreeSet<String>,
}

impl Default for AgentLoopPolicy {
    fn default() -> Self {
        Self {
            default_max_steps: 16,
            max_cumulative_risk: 3.0,
            high_risk_tools: default_high_risk_tools(),
        }
    }
}

fn default_high_risk_tools() -> BTreeSet<String> {
    ["write_file", "delete_file", "shell", "exec", "send_email", "http_post", "fetch_url"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// A fully resolved, validated configuration.
///
/// Immutable after resolution; the orchestrator derives per-component
/// configs from it and never mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Schema version.
    pub version: u32,
    /// Tool capability sets.
    pub capabilities: Capabilities,
    /// Resource limits.
    pub limits: Limits,
    /// Input scanning knobs.
    pub input: InputPolicy,
    /// Output monitoring knobs.
    pub output: OutputPolicy,
    /// Alignment-check passthrough.
    pub alignment: AlignmentPolicy,
    /// Data-flow rules.
    pub data_flow: DataFlowPolicy,
    /// Agentic-loop limits.
    pub agent_loop: AgentLoopPolicy,
    /// Score at or above which input is blocked.
    pub block_threshold: f64,
    /// Score at or above which input is flagged.
    pub flag_threshold: f64,
    /// Session recovery mode.
    pub recovery: RecoveryMode,
    /// Canary tokens watched for in output.
    pub canaries: Vec<String>,
}

impl Default for Policy {
    fn default() -> Self {
        Preset::Balanced.resolve()
    }
}

impl Policy {
    /// Validate internal consistency.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint: thresholds out of `[0, 1]`,
    /// `block_threshold < flag_threshold`, empty tool names, a tool in both
    /// allow and deny, or a zero rate limit.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for (field, value) in [
            ("block_threshold", self.block_threshold),
            ("flag_threshold", self.flag_threshold),
            ("alignment.strictness", self.alignment.strictness),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PolicyError::ThresholdOutOfRange { field, value });
            }
        }
        if self.block_threshold < self.flag_threshold {
            return Err(PolicyError::ThresholdOrder {
                block: self.block_threshold,
                flag: self.flag_threshold,
            });
        }

        let lists: [(&'static str, &BTreeSet<String>); 4] = [
            ("capabilities.allow", &self.capabilities.allow),
            ("capabilities.deny", &self.capabilities.deny),
            ("capabilities.requireApproval", &self.capabilities.require_approval),
            ("agentLoop.highRiskTools", &self.agent_loop.high_risk_tools),
        ];
        for (context, set) in lists {
            if set.iter().any(|t| t.trim().is_empty()) {
                return Err(PolicyError::EmptyToolName { context });
            }
        }

        if let Some(tool) = self
            .capabilities
            .allow
            .intersection(&self.capabilities.deny)
            .next()
        {
            return Err(PolicyError::CapabilityOverlap { tool: tool.clone() });
        }

        for (tool, limit) in &self.limits.rate_limit {
            if tool.trim().is_empty() {
                return Err(PolicyError::EmptyToolName {
                    context: "limits.rateLimit",
                });
            }
            if *limit == 0 {
                return Err(PolicyError::InvalidRateLimit { tool: tool.clone() });
            }
        }

        Ok(())
    }

    /// Input block patterns compiled into the scanner's custom-pattern form.
    #[must_use]
    pub fn input_custom_patterns(&self) -> Vec<CustomPattern> {
        self.input
            .block_patterns
            .iter()
            .enumerate()
            .map(|(i, regex)| CustomPattern {
                id: format!("policy-input-{i:03}"),
                regex: regex.clone(),
                severity: Severity::High,
                description: Some("policy input block pattern".to_string()),
            })
            .collect()
    }

    /// Add a canary token (builder style).
    #[must_use]
    pub fn with_canary(mut self, token: impl Into<String>) -> Self {
        self.canaries.push(token.into());
        self
    }

    /// Set the recovery mode (builder style).
    #[must_use]
    pub fn with_recovery(mut self, recovery: RecoveryMode) -> Self {
        self.recovery = recovery;
        self
    }
}

/// The built-in presets.
///
/// Each preset expands deterministically into a [`Policy`]; resolving the
/// same preset twice yields identical policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Low thresholds, quarantine on block, explicit tool grants only.
    Strict,
    /// Production default: moderate thresholds, PII redaction, open tools.
    Balanced,
    /// High thresholds, minimal output scanning.
    Permissive,
    /// Conversation-heavy deployments: retry after stripping the offender.
    CustomerSupport,
    /// Code-heavy traffic: tolerate high-entropy content and code fences.
    CodeAssistant,
    /// Lowest thresholds, terminate on block, everything denied by default.
    Paranoid,
}

impl Preset {
    /// All presets, for CLI inventory listings.
    pub const ALL: [Preset; 6] = [
        Preset::Strict,
        Preset::Balanced,
        Preset::Permissive,
        Preset::CustomerSupport,
        Preset::CodeAssistant,
        Preset::Paranoid,
    ];

    /// The kebab-case name used in files and on the CLI.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Preset::Strict => "strict",
            Preset::Balanced => "balanced",
            Preset::Permissive => "permissive",
            Preset::CustomerSupport => "customer-support",
            Preset::CodeAssistant => "code-assistant",
            Preset::Paranoid => "paranoid",
        }
    }

    /// Expand this preset into a concrete policy.
    #[must_use]
    pub fn resolve(self) -> Policy {
        let star: BTreeSet<String> = std::iter::once("*".to_string()).collect();
        let base = Policy {
            version: 1,
            capabilities: Capabilities {
                allow: star,
                deny: BTreeSet::new(),
                require_approval: BTreeSet::new(),
            },
            limits: Limits::default(),
            input: InputPolicy::default(),
            output: OutputPolicy::default(),
            alignment: AlignmentPolicy::default(),
            data_flow: DataFlowPolicy::default(),
            agent_loop: AgentLoopPolicy::default(),
            block_threshold: 0.7,
            flag_threshold: 0.4,
            recovery: RecoveryMode::Continue,
            canaries: Vec::new(),
        };

        match self {
            Preset::Balanced => base,
            Preset::Strict => Policy {
                block_threshold: 0.4,
                flag_threshold: 0.2,
                recovery: RecoveryMode::QuarantineSession,
                capabilities: Capabilities::default(),
                input: InputPolicy {
                    max_length: 16_384,
                    ..InputPolicy::default()
                },
                agent_loop: AgentLoopPolicy {
                    default_max_steps: 8,
                    max_cumulative_risk: 1.5,
                    ..AgentLoopPolicy::default()
                },
                ..base
            },
            Preset::Permissive => Policy {
                block_threshold: 0.9,
                flag_threshold: 0.6,
                output: OutputPolicy {
                    detect_pii: false,
                    ..OutputPolicy::default()
                },
                data_flow: DataFlowPolicy {
                    pii_handling: PiiHandling::Allow,
                    no_exfiltration: false,
                    ..DataFlowPolicy::default()
                },
                agent_loop: AgentLoopPolicy {
                    default_max_steps: 32,
                    max_cumulative_risk: 6.0,
                    ..AgentLoopPolicy::default()
                },
                ..base
            },
            Preset::CustomerSupport => Policy {
                block_threshold: 0.65,
                flag_threshold: 0.35,
                recovery: RecoveryMode::ResetLast,
                capabilities: Capabilities {
                    allow: std::iter::once("*".to_string()).collect(),
                    deny: ["shell", "exec", "eval"].into_iter().map(String::from).collect(),
                    require_approval: BTreeSet::new(),
                },
                agent_loop: AgentLoopPolicy {
                    default_max_steps: 12,
                    max_cumulative_risk: 2.5,
                    ..AgentLoopPolicy::default()
                },
                ..base
            },
            Preset::CodeAssistant => Policy {
                block_threshold: 0.8,
                flag_threshold: 0.5,
                output: OutputPolicy {
                    detect_pii: false,
                    ..OutputPolicy::default()
                },
                agent_loop: AgentLoopPolicy {
                    default_max_steps: 24,
                    max_cumulative_risk: 4.0,
                    ..AgentLoopPolicy::default()
                },
                ..base
            },
            Preset::Paranoid => Policy {
                block_threshold: 0.25,
                flag_threshold: 0.1,
                recovery: RecoveryMode::TerminateSession,
                capabilities: Capabilities::default(),
                input: InputPolicy {
                    max_length: 8_192,
                    ..InputPolicy::default()
                },
                agent_loop: AgentLoopPolicy {
                    default_max_steps: 4,
                    max_cumulative_risk: 1.0,
                    ..AgentLoopPolicy::default()
                },
                ..base
            },
        }
    }
}

impl std::str::FromStr for Preset {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| PolicyError::UnknownPreset(s.to_string()))
    }
}
