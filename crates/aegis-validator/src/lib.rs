//! # Aegis Action Validator
//!
//! Authorization gate for tool/function calls proposed by a model, with
//! cross-step data-flow tracking.
//!
//! ## Threat Coverage
//!
//! | Threat | Defense |
//! |--------|---------|
//! | Unauthorized tool use | Allow/deny lists, approval gates |
//! | Injection via parameters | Parameter scan through the input scanner |
//! | Denial-of-wallet | Per-tool token-bucket rate limits |
//! | Cross-step exfiltration | Fingerprinting of recorded tool outputs |
//! | Runaway sessions | Cumulative-risk ceiling |
//!
//! ## Security Notes
//!
//! - Checks execute in a fixed order and the first failure wins; a denied
//!   call records nothing.
//! - The exfiltration ring is bounded: only the most recent outputs are
//!   tracked, trading recall for bounded memory.
//! - `check` takes `&mut self`, so per-session serialization is enforced
//!   by the type system rather than by documentation.

mod fingerprint;
mod ratelimit;
mod validator;

pub use fingerprint::Fingerprinter;
pub use ratelimit::TokenBucket;
pub use validator::{
    ActionDecision, ActionRequest, ActionValidator, ProposedAction, ValidatorConfig,
    DEFAULT_OUTPUT_RING,
};
