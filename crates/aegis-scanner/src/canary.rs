//! # Canary Tokens
//!
//! Unique strings embedded in the system prompt whose appearance in output
//! implies prompt leakage. Generation and injection live here; the streaming
//! leak detector (multi-token, case-insensitive, chunk-boundary safe) lives
//! in the stream monitor.
//!
//! ## Design
//!
//! 1. **Uniqueness** - UUIDv4 gives 122 bits of randomness per token.
//! 2. **Session-bound** - generate a fresh token per session so a leaked
//!    token cannot be filtered out by a returning attacker.
//! 3. **Detectable format** - a fixed prefix keeps tokens greppable in logs
//!    and lets the policy list them verbatim.
//!
//! ## Inspired By
//!
//! The Rebuff framework from ProtectAI pioneered canary tokens for prompt
//! leak detection: <https://github.com/protectai/rebuff>

use uuid::Uuid;

/// Prefix for generated canary tokens.
const CANARY_PREFIX: &str = "AEGIS-CANARY";

/// Generate a new unique canary token.
///
/// # Example
///
/// ```rust
/// use aegis_scanner::canary::generate_canary;
///
/// let a = generate_canary();
/// let b = generate_canary();
/// assert_ne!(a, b);
/// assert!(a.starts_with("AEGIS-CANARY-"));
/// ```
#[must_use]
pub fn generate_canary() -> String {
    format!("{}-{}", CANARY_PREFIX, Uuid::new_v4().as_hyphenated())
}

/// Prepend a canary marker to a system prompt.
///
/// The marker is formatted as a system directive so it stays in the context
/// window without being echoed in normal conversation. If the prompt is
/// extracted, the canary comes with it - which is the point.
#[must_use]
pub fn inject_canary(prompt: &str, canary: &str) -> String {
    format!("[CONTEXT-MARKER:{canary}]\n{prompt}")
}

/// Exact (case-insensitive) leak check for a single token.
///
/// The stream monitor performs the real work across chunk boundaries; this
/// helper covers whole-buffer checks.
#[must_use]
pub fn leaked(output: &str, canary: &str) -> bool {
    if canary.is_empty() {
        return false;
    }
    output.to_lowercase().contains(&canary.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_unique() {
        assert_ne!(generate_canary(), generate_canary());
    }

    #[test]
    fn test_token_format() {
        let c = generate_canary();
        assert!(c.starts_with("AEGIS-CANARY-"));
        let uuid_part = &c[CANARY_PREFIX.len() + 1..];
        assert_eq!(uuid_part.matches('-').count(), 4);
    }

    #[test]
    fn test_injection_preserves_prompt() {
        let c = generate_canary();
        let injected = inject_canary("You are a helpful assistant.", &c);
        assert!(injected.starts_with("[CONTEXT-MARKER:"));
        assert!(injected.contains(&c));
        assert!(injected.ends_with("You are a helpful assistant."));
    }

    #[test]
    fn test_leak_detection_case_insensitive() {
        let c = "AEGIS-CANARY-abc123";
        assert!(leaked("found aegis-canary-ABC123 in text", c));
        assert!(!leaked("clean output", c));
        assert!(!leaked("anything", ""));
    }
}
