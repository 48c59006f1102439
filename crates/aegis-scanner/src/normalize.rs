//! # Encoding Normalization
//!
//! Canonicalizes text before pattern matching so that Unicode tricks cannot
//! bypass detection.
//!
//! ## Threat Model
//!
//! Attackers routinely smuggle injection payloads past naive filters using:
//!
//! - **Zero-width characters** - "ig\u{200B}nore previous instructions"
//! - **Homoglyphs** - Cyrillic "і" and Greek "ο" standing in for Latin letters
//! - **Compatibility forms** - fullwidth ASCII, ligatures, superscripts
//! - **Whitespace stuffing** - "ignore    previous\n\ninstructions"
//!
//! The normalization pass runs in a fixed order:
//!
//! 1. Unicode NFKC (folds compatibility forms, fullwidth ASCII, ligatures)
//! 2. Strip zero-width and invisible formatting characters
//! 3. Decode confusable homoglyphs (Cyrillic/Greek lookalikes to Latin)
//! 4. Collapse runs of whitespace to a single space
//!
//! The result is idempotent: `normalize(normalize(x)) == normalize(x)`.
//!
//! The raw text must be retained alongside the normalized form, because the
//! script-switch signal needs the pre-normalization writing systems.

use unicode_normalization::UnicodeNormalization;

/// Characters that are semantically invisible but survive NFKC.
///
/// Stripping these prevents payload-splitting attacks where a zero-width
/// character breaks a keyword without changing what the model reads.
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{200B}' // zero-width space
        | '\u{200C}' // zero-width non-joiner
        | '\u{200D}' // zero-width joiner
        | '\u{FEFF}' // byte order mark / zero-width no-break space
        | '\u{00AD}' // soft hyphen
        | '\u{200E}' // left-to-right mark
        | '\u{200F}' // right-to-left mark
        | '\u{202A}'..='\u{202E}' // directional embedding/override controls
        | '\u{2060}' // word joiner
        | '\u{2061}'..='\u{2064}' // invisible operators
        | '\u{2066}'..='\u{2069}' // directional isolates
    )
}

/// Map Cyrillic and Greek lookalikes onto their Latin equivalents.
///
/// The table covers the confusables that actually appear in observed
/// injection payloads; it is intentionally not a full UTS #39 mapping.
fn decode_confusable(c: char) -> char {
    match c {
        // Cyrillic uppercase/lowercase lookalikes
        '\u{0410}' | '\u{0430}' => 'a',
        '\u{0412}' | '\u{0432}' => 'b',
        '\u{0421}' | '\u{0441}' => 'c',
        '\u{0415}' | '\u{0435}' => 'e',
        '\u{041D}' | '\u{043D}' => 'h',
        '\u{0406}' | '\u{0456}' => 'i',
        '\u{041A}' | '\u{043A}' => 'k',
        '\u{041C}' | '\u{043C}' => 'm',
        '\u{041E}' | '\u{043E}' => 'o',
        '\u{0420}' | '\u{0440}' => 'p',
        '\u{0405}' | '\u{0455}' => 's',
        '\u{0422}' | '\u{0442}' => 't',
        '\u{0425}' | '\u{0445}' => 'x',
        '\u{0423}' | '\u{0443}' => 'y',
        // Greek lookalikes
        '\u{0391}' | '\u{03B1}' => 'a',
        '\u{0392}' => 'b',
        '\u{0395}' | '\u{03B5}' => 'e',
        '\u{0397}' => 'h',
        '\u{0399}' | '\u{03B9}' => 'i',
        '\u{039A}' | '\u{03BA}' => 'k',
        '\u{039C}' => 'm',
        '\u{039D}' | '\u{03BD}' => 'v',
        '\u{039F}' | '\u{03BF}' => 'o',
        '\u{03A1}' | '\u{03C1}' => 'p',
        '\u{03A4}' | '\u{03C4}' => 't',
        '\u{03A5}' | '\u{03C5}' => 'y',
        '\u{03A7}' | '\u{03C7}' => 'x',
        other => other,
    }
}

/// Canonicalize text for detection.
///
/// Applies NFKC, strips invisible characters, decodes confusables, and
/// collapses whitespace. Case is preserved; pattern regexes carry their own
/// `(?i)` flags.
///
/// # Example
///
/// ```rust
/// use aegis_scanner::normalize::normalize;
///
/// // Zero-width split and a Cyrillic "о" both fold away.
/// let sneaky = "ign\u{200B}оre   previous instructions";
/// assert_eq!(normalize(sneaky), "ignore previous instructions");
/// ```
#[must_use]
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfkc()
        .filter(|c| !is_invisible(*c))
        .map(decode_confusable)
        .collect();

    collapse_whitespace(&folded)
}

/// Collapse every run of whitespace to a single ASCII space and trim.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_whitespace = false;
    for c in text.chars() {
        if c.is_whitespace() {
            in_whitespace = true;
        } else {
            if in_whitespace && !out.is_empty() {
                out.push(' ');
            }
            in_whitespace = false;
            out.push(c);
        }
    }
    out
}

/// Byte ranges of fenced code blocks (``` ... ```) in `text`.
///
/// Used for the code-context severity demotion: matches that live entirely
/// inside a fence are one level less alarming, and the entropy signal skips
/// fenced content entirely. Unterminated fences extend to the end of text.
#[must_use]
pub fn fenced_ranges(text: &str) -> Vec<std::ops::Range<usize>> {
    let mut ranges = Vec::new();
    let mut search_from = 0usize;
    while let Some(rel_open) = text[search_from..].find("```") {
        let open = search_from + rel_open;
        let body_start = open + 3;
        match text[body_start..].find("```") {
            Some(rel_close) => {
                let close = body_start + rel_close + 3;
                ranges.push(open..close);
                search_from = close;
            }
            None => {
                ranges.push(open..text.len());
                break;
            }
        }
    }
    ranges
}

/// Remove fenced blocks and inline backtick spans.
///
/// The entropy signal measures prose, not code; source code has naturally
/// elevated entropy and would otherwise dominate the measurement.
#[must_use]
pub fn strip_code(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    for range in fenced_ranges(text) {
        out.push_str(&text[last..range.start]);
        last = range.end;
    }
    out.push_str(&text[last..]);

    // Inline spans: `code` (single backticks, same line).
    let mut result = String::with_capacity(out.len());
    let mut rest = out.as_str();
    while let Some(open) = rest.find('`') {
        let after = &rest[open + 1..];
        match after.find('`') {
            Some(close) if !after[..close].contains('\n') => {
                result.push_str(&rest[..open]);
                rest = &after[close + 1..];
            }
            _ => {
                result.push_str(&rest[..=open]);
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ascii_unchanged() {
        assert_eq!(normalize("hello world"), "hello world");
    }

    #[test]
    fn test_zero_width_stripped() {
        assert_eq!(
            normalize("ig\u{200B}nore\u{200D} previous"),
            "ignore previous"
        );
    }

    #[test]
    fn test_bom_stripped() {
        assert_eq!(normalize("\u{FEFF}hello"), "hello");
    }

    #[test]
    fn test_cyrillic_confusables_decoded() {
        // Cyrillic о/е standing in for Latin o/e
        let s = "ign\u{043E}r\u{0435} previous";
        assert_eq!(normalize(s), "ignore previous");
    }

    #[test]
    fn test_greek_omicron_decoded() {
        let s = "ign\u{03BF}re all rules";
        assert_eq!(normalize(s), "ignore all rules");
    }

    #[test]
    fn test_fullwidth_folded_by_nfkc() {
        // Fullwidth "ｉｇｎｏｒｅ"
        let s = "\u{FF49}\u{FF47}\u{FF4E}\u{FF4F}\u{FF52}\u{FF45} this";
        assert_eq!(normalize(s), "ignore this");
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(normalize("  a \t b\n\n c  "), "a b c");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "ignore\u{200B} previous",
            "  spaced   out  ",
            "ｆｕｌｌｗｉｄｔｈ",
            "mixed \u{043E}k",
            "plain",
        ];
        for input in inputs {
            let once = normalize(input);
            let twice = normalize(&once);
            assert_eq!(once, twice, "normalize not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n\t "), "");
    }

    #[test]
    fn test_fenced_ranges_basic() {
        let text = "before ```let x = 1;``` after";
        let ranges = fenced_ranges(text);
        assert_eq!(ranges.len(), 1);
        assert_eq!(&text[ranges[0].clone()], "```let x = 1;```");
    }

    #[test]
    fn test_fenced_ranges_unterminated() {
        let text = "before ```open until end";
        let ranges = fenced_ranges(text);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].end, text.len());
    }

    #[test]
    fn test_strip_code_removes_fences_and_inline() {
        let text = "prose ```x9k2m3n4b5``` more `q1w2e3` end";
        let stripped = strip_code(text);
        assert!(!stripped.contains("x9k2m3n4b5"));
        assert!(!stripped.contains("q1w2e3"));
        assert!(stripped.contains("prose"));
        assert!(stripped.contains("end"));
    }

    #[test]
    fn test_strip_code_unpaired_backtick_kept() {
        let text = "a ` b";
        assert_eq!(strip_code(text), "a ` b");
    }
}
