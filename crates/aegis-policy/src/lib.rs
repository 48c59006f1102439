//! # Aegis Policy Engine
//!
//! Resolves a user-supplied configuration - a preset name or a policy file -
//! into a concrete, internally consistent [`Policy`].
//!
//! ## Guarantees
//!
//! - Resolution is deterministic: the same preset or file always yields the
//!   same policy.
//! - Every policy that leaves this crate has passed [`Policy::validate`]:
//!   thresholds are in `[0, 1]` with `block >= flag`, tool names are
//!   non-empty, and the allow/deny sets are disjoint.
//! - Policy files are parsed against a strict schema; unknown keys are
//!   rejected rather than silently ignored.
//!
//! ## Usage
//!
//! ```rust
//! use aegis_policy::{Policy, Preset};
//!
//! // From a preset
//! let policy = Preset::Strict.resolve();
//! assert!(policy.validate().is_ok());
//!
//! // Or parse "strict" from user input
//! let preset: Preset = "strict".parse().unwrap();
//! assert_eq!(preset, Preset::Strict);
//! ```

mod error;
pub mod file;
mod policy;

pub use error::PolicyError;
pub use file::PolicyFile;
pub use policy::{
    AgentLoopPolicy, AlignmentPolicy, Capabilities, DataFlowPolicy, InputPolicy, Limits,
    OutputPolicy, PiiHandling, Policy, Preset, RecoveryMode,
};
