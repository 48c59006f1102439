//! Policy file loading.
//!
//! Policy files are JSON or a minimal YAML subset with the documented
//! camelCase schema. Unknown keys are rejected at every level; missing
//! sections fall back to the `balanced` preset's values, so a file only
//! has to state what it changes.
//!
//! ```yaml
//! version: 1
//! capabilities:
//!   allow: ["search", "calculator"]
//!   deny: ["shell"]
//!   requireApproval: ["send_email"]
//! limits:
//!   rateLimit: { search: 30 }
//!   maxToolsPerRequest: 4
//! input:
//!   maxLength: 16384
//! dataFlow:
//!   piiHandling: redact
//!   noExfiltration: true
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;

use crate::error::PolicyError;
use crate::policy::{
    AgentLoopPolicy, AlignmentPolicy, Capabilities, DataFlowPolicy, InputPolicy, Limits,
    OutputPolicy, PiiHandling, Policy, Preset,
};

/// The strict on-disk schema. Every section is optional; unknown keys are
/// rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicyFile {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    capabilities: Option<CapabilitiesFile>,
    #[serde(default)]
    limits: Option<LimitsFile>,
    #[serde(default)]
    input: Option<InputFile>,
    #[serde(default)]
    output: Option<OutputFile>,
    #[serde(default)]
    alignment: Option<AlignmentFile>,
    #[serde(default)]
    data_flow: Option<DataFlowFile>,
    #[serde(default)]
    agent_loop: Option<AgentLoopFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CapabilitiesFile {
    #[serde(default)]
    allow: Option<BTreeSet<String>>,
    #[serde(default)]
    deny: Option<BTreeSet<String>>,
    #[serde(default)]
    require_approval: Option<BTreeSet<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct LimitsFile {
    #[serde(default)]
    rate_limit: Option<BTreeMap<String, u32>>,
    #[serde(default)]
    max_tools_per_request: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct InputFile {
    #[serde(default)]
    max_length: Option<usize>,
    #[serde(default)]
    block_patterns: Option<Vec<String>>,
    #[serde(default)]
    require_quarantine: Option<bool>,
    #[serde(default)]
    encoding_normalization: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct OutputFile {
    #[serde(default)]
    max_length: Option<usize>,
    #[serde(default)]
    block_patterns: Option<Vec<String>>,
    #[serde(default)]
    redact_patterns: Option<Vec<String>>,
    #[serde(default)]
    detect_pii: Option<bool>,
    #[serde(default)]
    detect_canary: Option<bool>,
    #[serde(default)]
    block_on_leak: Option<bool>,
    #[serde(default)]
    detect_injection_payloads: Option<bool>,
    #[serde(default)]
    sanitize_markdown: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AlignmentFile {
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    strictness: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DataFlowFile {
    #[serde(default)]
    pii_handling: Option<PiiHandling>,
    #[serde(default)]
    external_data_sources: Option<bool>,
    #[serde(default)]
    no_exfiltration: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AgentLoopFile {
    #[serde(default)]
    default_max_steps: Option<u32>,
    #[serde(default)]
    max_cumulative_risk: Option<f64>,
    #[serde(default)]
    high_risk_tools: Option<BTreeSet<String>>,
}

impl PolicyFile {
    /// Parse from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Json`] on malformed input or unknown keys.
    pub fn from_json(content: &str) -> Result<Self, PolicyError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Parse from a YAML string (minimal subset; anchors and tags are not
    /// part of the supported schema even where the parser accepts them).
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Yaml`] on malformed input or unknown keys.
    pub fn from_yaml(content: &str) -> Result<Self, PolicyError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Resolve onto the `balanced` base and validate.
    ///
    /// # Errors
    ///
    /// Returns the first violated policy constraint.
    pub fn resolve(self) -> Result<Policy, PolicyError> {
        let base = Preset::Balanced.resolve();

        let capabilities = match self.capabilities {
            Some(c) => Capabilities {
                allow: c.allow.unwrap_or(base.capabilities.allow),
                deny: c.deny.unwrap_or(base.capabilities.deny),
                require_approval: c
                    .require_approval
                    .unwrap_or(base.capabilities.require_approval),
            },
            None => base.capabilities,
        };

        let limits = match self.limits {
            Some(l) => Limits {
                rate_limit: l.rate_limit.unwrap_or(base.limits.rate_limit),
                max_tools_per_request: l
                    .max_tools_per_request
                    .unwrap_or(base.limits.max_tools_per_request),
            },
            None => base.limits,
        };

        let input = match self.input {
            Some(i) => InputPolicy {
                max_length: i.max_length.unwrap_or(base.input.max_length),
                block_patterns: i.block_patterns.unwrap_or(base.input.block_patterns),
                require_quarantine: i
                    .require_quarantine
                    .unwrap_or(base.input.require_quarantine),
                encoding_normalization: i
                    .encoding_normalization
                    .unwrap_or(base.input.encoding_normalization),
            },
            None => base.input,
        };

        let output = match self.output {
            Some(o) => OutputPolicy {
                max_length: o.max_length.unwrap_or(base.output.max_length),
                block_patterns: o.block_patterns.unwrap_or(base.output.block_patterns),
                redact_patterns: o.redact_patterns.unwrap_or(base.output.redact_patterns),
                detect_pii: o.detect_pii.unwrap_or(base.output.detect_pii),
                detect_canary: o.detect_canary.unwrap_or(base.output.detect_canary),
                block_on_leak: o.block_on_leak.unwrap_or(base.output.block_on_leak),
                detect_injection_payloads: o
                    .detect_injection_payloads
                    .unwrap_or(base.output.detect_injection_payloads),
                sanitize_markdown: o
                    .sanitize_markdown
                    .unwrap_or(base.output.sanitize_markdown),
            },
            None => base.output,
        };

        let alignment = match self.alignment {
            Some(a) => AlignmentPolicy {
                enabled: a.enabled.unwrap_or(base.alignment.enabled),
                strictness: a.strictness.unwrap_or(base.alignment.strictness),
            },
            None => base.alignment,
        };

        let data_flow = match self.data_flow {
            Some(d) => DataFlowPolicy {
                pii_handling: d.pii_handling.unwrap_or(base.data_flow.pii_handling),
                external_data_sources: d
                    .external_data_sources
                    .unwrap_or(base.data_flow.external_data_sources),
                no_exfiltration: d.no_exfiltration.unwrap_or(base.data_flow.no_exfiltration),
            },
            None => base.data_flow,
        };

        let agent_loop = match self.agent_loop {
            Some(a) => AgentLoopPolicy {
                default_max_steps: a
                    .default_max_steps
                    .unwrap_or(base.agent_loop.default_max_steps),
                max_cumulative_risk: a
                    .max_cumulative_risk
                    .unwrap_or(base.agent_loop.max_cumulative_risk),
                high_risk_tools: a
                    .high_risk_tools
                    .unwrap_or(base.agent_loop.high_risk_tools),
            },
            None => base.agent_loop,
        };

        let policy = Policy {
            version: self.version.unwrap_or(base.version),
            capabilities,
            limits,
            input,
            output,
            alignment,
            data_flow,
            agent_loop,
            ..base
        };

        policy.validate()?;
        Ok(policy)
    }
}

impl Policy {
    /// Load and resolve a policy file.
    ///
    /// `.json` paths parse as JSON; everything else parses as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] on I/O failure, parse failure (including
    /// unknown keys), or a validation violation.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Policy, PolicyError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file = if path.extension().is_some_and(|e| e == "json") {
            PolicyFile::from_json(&content)?
        } else {
            PolicyFile::from_yaml(&content)?
        };
        tracing::debug!(path = %path.display(), "policy file loaded");
        file.resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_resolves_to_balanced() {
        let policy = PolicyFile::from_json("{}").unwrap().resolve().unwrap();
        assert_eq!(policy, Preset::Balanced.resolve());
    }

    #[test]
    fn test_json_overrides_applied() {
        let json = r#"{
            "version": 2,
            "capabilities": {
                "allow": ["search"],
                "deny": ["shell"],
                "requireApproval": ["send_email"]
            },
            "limits": { "rateLimit": { "search": 30 }, "maxToolsPerRequest": 4 },
            "input": { "maxLength": 1000 },
            "dataFlow": { "piiHandling": "block", "noExfiltration": true }
        }"#;
        let policy = PolicyFile::from_json(json).unwrap().resolve().unwrap();
        assert_eq!(policy.version, 2);
        assert!(policy.capabilities.allow.contains("search"));
        assert!(policy.capabilities.deny.contains("shell"));
        assert_eq!(policy.limits.rate_limit.get("search"), Some(&30));
        assert_eq!(policy.input.max_length, 1000);
        assert_eq!(policy.data_flow.pii_handling, PiiHandling::Block);
        // Untouched sections keep the balanced defaults.
        assert_eq!(policy.block_threshold, Preset::Balanced.resolve().block_threshold);
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let json = r#"{ "version": 1, "turboMode": true }"#;
        assert!(matches!(
            PolicyFile::from_json(json),
            Err(PolicyError::Json(_))
        ));
    }

    #[test]
    fn test_unknown_nested_key_rejected() {
        let json = r#"{ "input": { "maxLength": 10, "maxLenght": 10 } }"#;
        assert!(PolicyFile::from_json(json).is_err());
    }

    #[test]
    fn test_yaml_parses() {
        let yaml = "
version: 1
capabilities:
  allow: [\"search\"]
  deny: [\"shell\"]
agentLoop:
  defaultMaxSteps: 3
  maxCumulativeRisk: 1.5
";
        let policy = PolicyFile::from_yaml(yaml).unwrap().resolve().unwrap();
        assert_eq!(policy.agent_loop.default_max_steps, 3);
        assert!((policy.agent_loop.max_cumulative_risk - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_file_fails_validation() {
        let json = r#"{ "capabilities": { "allow": ["shell"], "deny": ["shell"] } }"#;
        let result = PolicyFile::from_json(json).unwrap().resolve();
        assert!(matches!(result, Err(PolicyError::CapabilityOverlap { .. })));
    }

    #[test]
    fn test_from_path_json_and_yaml() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("policy.json");
        let mut f = std::fs::File::create(&json_path).unwrap();
        f.write_all(br#"{ "input": { "maxLength": 2048 } }"#).unwrap();
        let policy = Policy::from_path(&json_path).unwrap();
        assert_eq!(policy.input.max_length, 2048);

        let yaml_path = dir.path().join("policy.yaml");
        let mut f = std::fs::File::create(&yaml_path).unwrap();
        f.write_all(b"input:\n  maxLength: 4096\n").unwrap();
        let policy = Policy::from_path(&yaml_path).unwrap();
        assert_eq!(policy.input.max_length, 4096);
    }

    #[test]
    fn test_from_path_missing_file() {
        assert!(matches!(
            Policy::from_path("/nonexistent/policy.json"),
            Err(PolicyError::Io(_))
        ));
    }
}
