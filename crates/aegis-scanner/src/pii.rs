//! # PII Pattern Catalog
//!
//! Labeled regex families for personally identifiable information. The
//! labels double as redaction markers: a match for pattern `SSN` is replaced
//! with `[REDACTED-SSN]` when redaction mode is active.
//!
//! Patterns are compiled once at catalog construction and reused for every
//! scan; a pattern that fails to compile is skipped with a warning rather
//! than taking down the catalog.
//!
//! Some families need more than a regex can express. IPv4 has a post-match
//! filter excluding loopback and broadcast addresses, and octet range
//! checks that regex alternation would make unreadable.

use regex::Regex;

/// A compiled PII pattern.
pub struct PiiPattern {
    /// Stable label, also the redaction marker (`[REDACTED-<label>]`).
    pub label: &'static str,
    /// Compiled matcher.
    pub regex: Regex,
    /// Optional post-match filter; a match is kept only when this returns
    /// true. Used where the regex alone over-matches.
    pub accept: Option<fn(&str) -> bool>,
}

impl std::fmt::Debug for PiiPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiiPattern")
            .field("label", &self.label)
            .field("regex", &self.regex.as_str())
            .field("has_filter", &self.accept.is_some())
            .finish()
    }
}

impl PiiPattern {
    /// The redaction marker for this pattern, e.g. `[REDACTED-SSN]`.
    #[must_use]
    pub fn marker(&self) -> String {
        format!("[REDACTED-{}]", self.label)
    }
}

/// Accept an IPv4 match only when each octet is in range and the address is
/// neither loopback nor broadcast nor unspecified.
fn accept_ipv4(s: &str) -> bool {
    let mut octets = [0u16; 4];
    for (i, part) in s.split('.').enumerate() {
        if i >= 4 {
            return false;
        }
        match part.parse::<u16>() {
            Ok(v) if v <= 255 => octets[i] = v,
            _ => return false,
        }
    }
    if octets[0] == 127 {
        return false; // loopback
    }
    if octets == [255, 255, 255, 255] || octets == [0, 0, 0, 0] {
        return false; // broadcast / unspecified
    }
    true
}

/// Accept a credit-card match only when it passes the Luhn check.
fn accept_luhn(s: &str) -> bool {
    let digits: Vec<u32> = s.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }
    let mut sum = 0u32;
    for (i, d) in digits.iter().rev().enumerate() {
        let mut v = *d;
        if i % 2 == 1 {
            v *= 2;
            if v > 9 {
                v -= 9;
            }
        }
        sum += v;
    }
    sum % 10 == 0
}

/// Build the default PII catalog.
///
/// Covered families: SSN, credit card, email, phone, IPv4, passport, DOB,
/// IBAN, US routing number, driver's license, MRN. Contextual families
/// (passport, DOB, driver's license, MRN) anchor on a nearby keyword to keep
/// false positives down.
#[must_use]
pub fn default_pii_patterns() -> Vec<PiiPattern> {
    let sources: Vec<(&'static str, &'static str, Option<fn(&str) -> bool>)> = vec![
        ("SSN", r"\b\d{3}-\d{2}-\d{4}\b", None),
        (
            "CC",
            r"\b(?:4\d{3}|5[1-5]\d{2}|3[47]\d{2}|6011)(?:[ -]?\d{4}){2}[ -]?\d{1,4}\b",
            Some(accept_luhn as fn(&str) -> bool),
        ),
        (
            "EMAIL",
            r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}",
            None,
        ),
        (
            "PHONE",
            r"\b(?:\+?1[-. ]?)?\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b",
            None,
        ),
        (
            "IPV4",
            r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b",
            Some(accept_ipv4 as fn(&str) -> bool),
        ),
        (
            "PASSPORT",
            r"(?i)passport\s*(?:no\.?|number|#)?\s*[:#]?\s*[A-Z]{1,2}\d{6,9}\b",
            None,
        ),
        (
            "DOB",
            r"(?i)(?:dob|date\s+of\s+birth|born(?:\s+on)?)\s*[:]?\s*\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4}\b",
            None,
        ),
        ("IBAN", r"\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b", None),
        (
            "ROUTING",
            r"(?i)(?:routing|aba)\s*(?:no\.?|number|#)?\s*[:#]?\s*\d{9}\b",
            None,
        ),
        (
            "DL",
            r"(?i)driver'?s?\s+licen[cs]e\s*(?:no\.?|number|#)?\s*[:#]?\s*[A-Z0-9]{5,13}\b",
            None,
        ),
        ("MRN", r"(?i)\bmrn\s*[:#]?\s*\d{6,10}\b", None),
    ];

    sources
        .into_iter()
        .filter_map(|(label, source, accept)| match Regex::new(source) {
            Ok(regex) => Some(PiiPattern {
                label,
                regex,
                accept,
            }),
            Err(e) => {
                tracing::warn!(label, error = %e, "PII pattern failed to compile, skipping");
                None
            }
        })
        .collect()
}

/// One PII match with its label and byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiiMatch {
    /// Which family matched.
    pub label: &'static str,
    /// Byte span in the scanned text.
    pub span: std::ops::Range<usize>,
}

/// Find every PII match across `patterns` in `text`, post-filtered and
/// sorted by start offset.
#[must_use]
pub fn find_pii(patterns: &[PiiPattern], text: &str) -> Vec<PiiMatch> {
    let mut matches = Vec::new();
    for p in patterns {
        for m in p.regex.find_iter(text) {
            if let Some(accept) = p.accept {
                if !accept(m.as_str()) {
                    continue;
                }
            }
            matches.push(PiiMatch {
                label: p.label,
                span: m.range(),
            });
        }
    }
    matches.sort_by_key(|m| (m.span.start, m.span.end));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Vec<PiiPattern> {
        default_pii_patterns()
    }

    fn labels_in(text: &str) -> Vec<&'static str> {
        find_pii(&patterns(), text).into_iter().map(|m| m.label).collect()
    }

    #[test]
    fn test_catalog_compiles_fully() {
        assert_eq!(patterns().len(), 11);
    }

    #[test]
    fn test_ssn() {
        assert_eq!(labels_in("SSN: 123-45-6789 on file"), vec!["SSN"]);
        assert!(labels_in("order 123-456789").is_empty());
    }

    #[test]
    fn test_credit_card_luhn() {
        // Valid Visa test number
        assert_eq!(labels_in("card 4111 1111 1111 1111 ok"), vec!["CC"]);
        // Same shape, broken checksum
        assert!(labels_in("card 4111 1111 1111 1112 ok").is_empty());
    }

    #[test]
    fn test_email() {
        assert_eq!(labels_in("reach me at jane.doe@example.com"), vec!["EMAIL"]);
    }

    #[test]
    fn test_phone() {
        assert_eq!(labels_in("call 555-867-5309 today"), vec!["PHONE"]);
        assert_eq!(labels_in("call (555) 867-5309 today"), vec!["PHONE"]);
    }

    #[test]
    fn test_ipv4_excludes_loopback_and_broadcast() {
        assert_eq!(labels_in("host at 192.168.4.20"), vec!["IPV4"]);
        assert!(labels_in("loopback 127.0.0.1 here").is_empty());
        assert!(labels_in("broadcast 255.255.255.255 here").is_empty());
        assert!(labels_in("octet 999.1.1.1 here").is_empty());
    }

    #[test]
    fn test_passport_contextual() {
        assert_eq!(labels_in("passport number: A1234567"), vec!["PASSPORT"]);
        // Bare alphanumerics without the keyword stay clean.
        assert!(labels_in("model A1234567 in stock").is_empty());
    }

    #[test]
    fn test_dob_contextual() {
        assert_eq!(labels_in("DOB: 04/12/1987"), vec!["DOB"]);
        assert!(labels_in("meeting on 04/12 at noon").is_empty());
    }

    #[test]
    fn test_iban() {
        assert_eq!(labels_in("pay to DE89370400440532013000"), vec!["IBAN"]);
    }

    #[test]
    fn test_routing_contextual() {
        assert_eq!(labels_in("routing number 021000021 checking"), vec!["ROUTING"]);
    }

    #[test]
    fn test_drivers_license_contextual() {
        assert_eq!(
            labels_in("driver's license no. D1234567 issued"),
            vec!["DL"]
        );
    }

    #[test]
    fn test_mrn() {
        assert_eq!(labels_in("patient MRN: 00482913"), vec!["MRN"]);
    }

    #[test]
    fn test_matches_sorted_by_offset() {
        let text = "email a@b.co then SSN 123-45-6789";
        let matches = find_pii(&patterns(), text);
        assert_eq!(matches.len(), 2);
        assert!(matches[0].span.start < matches[1].span.start);
    }

    #[test]
    fn test_marker_format() {
        let p = &patterns()[0];
        assert_eq!(p.marker(), format!("[REDACTED-{}]", p.label));
    }
}
