//! Error taxonomy for the Aegis pipeline.
//!
//! The set is closed and stable: adapters map these onto their own surface
//! (HTTP 403 for block/quarantine/terminate, 400 for invalid policy) and
//! rely on the variants not shifting underneath them.

use thiserror::Error;

use aegis_policy::PolicyError;
use aegis_scanner::ScanResult;

/// Core error type for Aegis operations.
///
/// Audit entries are always written before one of these is raised, so a
/// caller that crashes on the error does not lose the record.
#[derive(Debug, Error)]
pub enum AegisError {
    /// Content failed the input scanner under a non-escalating recovery
    /// mode. Carries the full scan result.
    #[error("input blocked (score {:.2}, {} detections)", .0.score, .0.detections.len())]
    InputBlocked(ScanResult),

    /// The session is locked; every future input guard fails with this
    /// until the instance is discarded. The triggering scan result is
    /// attached to the first such failure.
    #[error("session quarantined")]
    SessionQuarantined {
        /// The scan result that caused the quarantine, present on the
        /// failure that performed the transition.
        scan: Option<ScanResult>,
    },

    /// The session is permanently dead. Stricter than quarantined: stream
    /// transforms also refuse to emit.
    #[error("session terminated")]
    SessionTerminated,

    /// A tool call was refused.
    #[error("action denied: {0}")]
    ActionDenied(String),

    /// A user-supplied policy failed validation.
    #[error("invalid policy: {0}")]
    InvalidPolicy(#[from] PolicyError),

    /// Malformed ingress input (unknown role, non-text content). Typed
    /// ingress rejects instead of coercing.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Reserved for the optional structured-extraction helper; the helper
    /// lives outside the core but its error belongs to the stable
    /// taxonomy.
    #[error("sandbox extraction failed after {attempts} attempts")]
    SandboxExtractionFailed {
        /// How many extraction attempts were made.
        attempts: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = AegisError::ActionDenied("rate limit".to_string());
        assert_eq!(err.to_string(), "action denied: rate limit");

        let err = AegisError::SessionTerminated;
        assert_eq!(err.to_string(), "session terminated");

        let err = AegisError::SandboxExtractionFailed { attempts: 3 };
        assert!(err.to_string().contains("3 attempts"));
    }

    #[test]
    fn test_policy_error_converts() {
        let err: AegisError = PolicyError::UnknownPreset("nope".to_string()).into();
        assert!(matches!(err, AegisError::InvalidPolicy(_)));
    }
}
