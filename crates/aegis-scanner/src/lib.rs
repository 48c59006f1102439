//! # Aegis Scanner - Deterministic Injection Detection
//!
//! The input scanner is the first line of defense in the Aegis pipeline.
//! It inspects quarantined text before it reaches a model and classifies
//! injection attempts across multiple independent signals.
//!
//! ## Threat Model
//!
//! The scanner defends against the following attack classes:
//!
//! | Threat | Description | Defense |
//! |--------|-------------|---------|
//! | Direct injection | "Ignore previous instructions" | Pattern matching |
//! | Role hijacking | "Pretend you are", DAN-style framings | Pattern matching |
//! | Delimiter escape | Role tags, `[INST]`, special tokens | Pattern matching |
//! | Skeleton key | Comply-with-a-disclaimer framings | Pattern matching |
//! | GCG suffixes | Adversarial high-entropy payloads | Shannon entropy |
//! | Script mixing | Cross-alphabet keyword splitting | Switch density |
//! | Unicode smuggling | Zero-width chars, homoglyphs | NFKC normalization |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        INPUT SCANNER                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────┐   │
//! │  │ NORMALIZATION│  │   PATTERNS   │  │  ENTROPY + SCRIPT    │   │
//! │  │              │  │              │  │                      │   │
//! │  │ NFKC, zero-  │  │ RegexSet 2-  │  │ Shannon H(X) window  │   │
//! │  │ width, homo- │  │ pass catalog │  │ + switch density     │   │
//! │  │ glyph fold   │  │              │  │                      │   │
//! │  └──────┬───────┘  └──────┬───────┘  └──────────┬───────────┘   │
//! │         │                 │                     │               │
//! │         └────────────┬────┴─────────────────────┘               │
//! │                      ▼                                          │
//! │              ┌───────────────┐                                  │
//! │              │  SCAN RESULT  │  score ∈ [0,1], detections,      │
//! │              │               │  normalized text                 │
//! │              └───────────────┘                                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This crate also hosts the shared detection catalogs (PII, secrets,
//! canary tokens) consumed by the stream monitor and the action validator,
//! so every component classifies content the same way.
//!
//! ## Usage
//!
//! ```rust
//! use aegis_scanner::{InputScanner, Quarantined, ScannerConfig};
//!
//! let scanner = InputScanner::new(ScannerConfig::default());
//! let input = Quarantined::untrusted("Hello, can you help me?".to_string(), "chat");
//! let result = scanner.scan(&input);
//! assert!(result.safe);
//! ```
//!
//! ## References
//!
//! - Perez & Ribeiro (2022) - "Ignore This Title and HackAPrompt"
//!   <https://arxiv.org/abs/2311.16119>
//! - Greshake et al. (2023) - "Not What You've Signed Up For"
//!   <https://arxiv.org/abs/2302.12173>
//! - Zou et al. (2023) - "Universal and Transferable Adversarial Attacks"
//!   <https://arxiv.org/abs/2307.15043>
//! - OWASP LLM Top 10
//!   <https://owasp.org/www-project-top-10-for-large-language-model-applications/>

pub mod canary;
pub mod entropy;
pub mod models;
pub mod normalize;
pub mod patterns;
pub mod pii;
pub mod scanner;
pub mod script;
pub mod secrets;

pub use models::{
    Detection, DetectionType, PromptMessage, Quarantined, Role, ScanResult, ScanStrategy,
    Severity, ThreatCategory, TrustLevel,
};
pub use patterns::CustomPattern;
pub use scanner::{InputScanner, ScannerConfig};
