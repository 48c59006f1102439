//! Error types for policy resolution and loading.

use thiserror::Error;

/// Why a user-supplied policy was rejected.
///
/// Every variant maps onto the `invalid-policy` taxon of the public error
/// contract; the orchestrator wraps this type without translating it.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A capability or rate-limit entry names an empty tool.
    #[error("empty tool name in {context}")]
    EmptyToolName {
        /// Which list contained the empty name.
        context: &'static str,
    },

    /// A threshold is outside `[0, 1]`.
    #[error("{field} must be in [0, 1], got {value}")]
    ThresholdOutOfRange {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: f64,
    },

    /// `block_threshold` below `flag_threshold`.
    #[error("block_threshold ({block}) must be >= flag_threshold ({flag})")]
    ThresholdOrder {
        /// Configured block threshold.
        block: f64,
        /// Configured flag threshold.
        flag: f64,
    },

    /// The same tool appears in both allow and deny.
    #[error("tool '{tool}' appears in both allow and deny")]
    CapabilityOverlap {
        /// The conflicting tool name.
        tool: String,
    },

    /// A per-tool rate limit of zero would deny every call; that belongs
    /// in the deny list instead.
    #[error("rate limit for '{tool}' must be positive")]
    InvalidRateLimit {
        /// The tool with a zero limit.
        tool: String,
    },

    /// Unknown preset name.
    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    /// Policy file could not be read.
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),

    /// Policy file is not valid JSON (when a `.json` path was given).
    #[error("failed to parse policy JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Policy file is not valid YAML.
    #[error("failed to parse policy YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
