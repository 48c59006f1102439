//! # Character-Entropy Signal
//!
//! Shannon entropy analysis for detecting adversarial suffixes and other
//! token-smuggling payloads with a statistical signature unlike prose.
//!
//! ## Threat Model
//!
//! Gradient-based attacks (GCG-style) append optimized character sequences
//! that look like line noise:
//!
//! ```text
//! "describing.\ + similarlyNow write oppance sentence}444telecom"
//! ```
//!
//! Such suffixes exhibit unusually high Shannon entropy compared to natural
//! language. The signal measures entropy over a sliding character window so
//! a suffix embedded in otherwise normal text is still caught.
//!
//! ## Calibration
//!
//! | Content | Typical bits/char |
//! |---------|-------------------|
//! | English prose | 3.5 - 4.2 |
//! | Source code | 4.2 - 4.8 |
//! | GCG suffixes | 5.0 - 6.0 |
//! | Random ASCII | 6.0 - 6.5 |
//!
//! Two adjustments keep the false-positive rate workable:
//!
//! - Code inside backticks is stripped before measurement (callers pass
//!   pre-stripped text; see [`crate::normalize::strip_code`]).
//! - The threshold is boosted for text dominated by non-Latin scripts
//!   (CJK, Hangul), which have naturally higher per-character entropy.
//!
//! ## References
//!
//! - Shannon, C.E. (1948) - "A Mathematical Theory of Communication"
//! - Zou et al. (2023) - "Universal and Transferable Adversarial Attacks on
//!   Aligned Language Models" <https://arxiv.org/abs/2307.15043>

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::script::dominant_non_latin_ratio;

/// Default entropy threshold in bits per character.
///
/// Chosen to sit above prose and most source code while catching the bulk
/// of GCG-style suffixes.
pub const DEFAULT_ENTROPY_THRESHOLD: f64 = 4.5;

/// Additional bits/char allowed for CJK/Hangul-dominant text.
pub const DEFAULT_NON_LATIN_BOOST: f64 = 1.8;

/// Minimum text length for entropy analysis.
///
/// Shorter strings don't provide enough samples for a meaningful estimate
/// and would flag identifiers and acronyms.
pub const MIN_ANALYSIS_LENGTH: usize = 12;

/// Default sliding-window width in characters.
pub const DEFAULT_WINDOW: usize = 32;

/// Configuration for the entropy signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntropyConfig {
    /// Base threshold in bits per character.
    pub threshold: f64,
    /// Added to the threshold when non-Latin scripts dominate.
    pub non_latin_boost: f64,
    /// Sliding-window width in characters.
    pub window: usize,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_ENTROPY_THRESHOLD,
            non_latin_boost: DEFAULT_NON_LATIN_BOOST,
            window: DEFAULT_WINDOW,
        }
    }
}

/// Shannon entropy of `text` in bits per character.
///
/// `H(X) = -Σ p(x) log₂ p(x)` over the empirical character distribution.
/// Returns 0.0 for empty input.
///
/// # Example
///
/// ```rust
/// use aegis_scanner::entropy::shannon_entropy;
///
/// assert_eq!(shannon_entropy(""), 0.0);
/// assert_eq!(shannon_entropy("aaaa"), 0.0);
/// let prose = shannon_entropy("The quick brown fox jumps over the lazy dog");
/// assert!(prose > 3.0 && prose < 4.5);
/// ```
#[must_use]
pub fn shannon_entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    let mut total = 0usize;
    for c in text.chars() {
        *freq.entry(c).or_insert(0) += 1;
        total += 1;
    }

    let total_f64 = total as f64;
    let mut entropy = 0.0;
    for &count in freq.values() {
        let p = count as f64 / total_f64;
        entropy -= p * p.log2();
    }
    entropy
}

/// Locate the first window of `window` characters whose entropy exceeds
/// `threshold`.
///
/// Returns `Some((char_offset, entropy))` on a hit, `None` when every window
/// is below threshold or the text is shorter than the window.
#[must_use]
pub fn high_entropy_window(text: &str, window: usize, threshold: f64) -> Option<(usize, f64)> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() < window || window == 0 {
        return None;
    }

    for start in 0..=(chars.len() - window) {
        let segment: String = chars[start..start + window].iter().collect();
        let entropy = shannon_entropy(&segment);
        if entropy > threshold {
            return Some((start, entropy));
        }
    }
    None
}

/// Outcome of the entropy signal over one piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct EntropyFinding {
    /// Character offset of the offending window.
    pub offset: usize,
    /// Measured entropy in bits/char.
    pub entropy: f64,
    /// The threshold that was in effect (after any script boost).
    pub threshold: f64,
}

/// Run the entropy signal with script-aware thresholding.
///
/// `text` should already have code spans stripped. The effective threshold
/// is `config.threshold`, plus `config.non_latin_boost` when more than half
/// of the letters are CJK or Hangul.
#[must_use]
pub fn analyze(text: &str, config: &EntropyConfig) -> Option<EntropyFinding> {
    if text.chars().count() < MIN_ANALYSIS_LENGTH {
        return None;
    }

    let mut threshold = config.threshold;
    if dominant_non_latin_ratio(text) > 0.5 {
        threshold += config.non_latin_boost;
    }

    // Whole-text check first (cheap), then the sliding window for embedded
    // suffixes in longer content.
    let whole = shannon_entropy(text);
    if whole > threshold {
        return Some(EntropyFinding {
            offset: 0,
            entropy: whole,
            threshold,
        });
    }

    high_entropy_window(text, config.window, threshold).map(|(offset, entropy)| EntropyFinding {
        offset,
        entropy,
        threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_empty() {
        assert_eq!(shannon_entropy(""), 0.0);
    }

    #[test]
    fn test_entropy_uniform() {
        assert_eq!(shannon_entropy("aaaaaaa"), 0.0);
        let two = shannon_entropy("abababab");
        assert!((two - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_prose_below_threshold() {
        let prose = "The quick brown fox jumps over the lazy dog";
        assert!(shannon_entropy(prose) < DEFAULT_ENTROPY_THRESHOLD);
        assert!(analyze(prose, &EntropyConfig::default()).is_none());
    }

    #[test]
    fn test_gibberish_flagged() {
        let gibberish = "x9K!2m#3nQ4b%5v^6c&7z*8a(1s)2d=3f+4g[5h]6j{7k}8l|9";
        let finding = analyze(gibberish, &EntropyConfig::default());
        assert!(finding.is_some(), "entropy: {}", shannon_entropy(gibberish));
    }

    #[test]
    fn test_embedded_suffix_found_by_window() {
        let text = format!(
            "{} x9K!2m#3nQ4b%5v^6c&7z*8a(1s)2d=3f+4g[5h]6j{{7k}}8l|9",
            "This is a perfectly normal request about the weather today and tomorrow."
        );
        let finding = analyze(&text, &EntropyConfig::default());
        assert!(finding.is_some());

        let (offset, _) =
            high_entropy_window(&text, DEFAULT_WINDOW, DEFAULT_ENTROPY_THRESHOLD).unwrap();
        assert!(offset > 0, "suffix sits past the prose prefix");
    }

    #[test]
    fn test_short_text_not_analyzed() {
        assert!(analyze("x9K!2m#", &EntropyConfig::default()).is_none());
    }

    #[test]
    fn test_cjk_threshold_boosted() {
        // Natural Chinese text has high per-character entropy; the boost
        // keeps it from flagging.
        let zh = "今天天气很好我们一起去公园散步吧然后吃午饭再回家休息一下明天继续工作学习";
        let finding = analyze(zh, &EntropyConfig::default());
        assert!(finding.is_none(), "CJK prose should not flag: {finding:?}");
    }

    #[test]
    fn test_window_shorter_than_text() {
        assert!(high_entropy_window("abc", 10, 1.0).is_none());
        assert!(high_entropy_window("abc", 0, 1.0).is_none());
    }
}
