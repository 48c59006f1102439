//! # Aegis Core
//!
//! Unified facade for the Aegis prompt-injection defense pipeline.
//! Orchestrates the input scanner, stream monitor, action validator,
//! agentic-loop guard, session state machine, and audit sink.
//!
//! ## Threat Coverage
//!
//! Aegis provides layered defense against attacks on LLM applications:
//!
//! | Layer | Component | Threats Addressed |
//! |-------|-----------|-------------------|
//! | Input | Input Scanner | Direct/indirect injection, obfuscation |
//! | Output | Stream Monitor | Prompt leaks, PII/secret disclosure |
//! | Actions | Action Validator | Tool abuse, denial-of-wallet, exfiltration |
//! | Trajectory | Agentic-Loop Guard | Slow-burn injection, runaway loops |
//! | Lifecycle | Session State Machine | Post-compromise containment |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          AEGIS CORE                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │                     ┌─────────────────┐                         │
//! │                     │      Aegis      │  ← Unified Facade       │
//! │                     └────────┬────────┘                         │
//! │                              │                                  │
//! │      ┌─────────┬─────────────┼────────────┬──────────┐          │
//! │      ▼         ▼             ▼            ▼          ▼          │
//! │ ┌────────┐ ┌────────┐ ┌───────────┐ ┌─────────┐ ┌────────┐     │
//! │ │ Input  │ │ Stream │ │  Action   │ │  Chain  │ │Session │     │
//! │ │Scanner │ │Monitor │ │ Validator │ │  Guard  │ │  FSM   │     │
//! │ └────────┘ └────────┘ └───────────┘ └─────────┘ └────────┘     │
//! │                              │                                  │
//! │                              ▼                                  │
//! │                     ┌─────────────────┐                         │
//! │                     │   Audit Sink    │  (ring + fan-out)       │
//! │                     └─────────────────┘                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use aegis_core::{Aegis, GuardOptions};
//! use aegis_policy::Preset;
//! use aegis_scanner::PromptMessage;
//!
//! let mut aegis = Aegis::with_preset(Preset::Strict)?;
//!
//! let messages = vec![PromptMessage::user("What is the capital of France?")];
//! let passed = aegis.guard_input(&messages, GuardOptions::default())?;
//! # Ok::<(), aegis_core::AegisError>(())
//! ```
//!
//! ## Security Notes
//!
//! - Session state escalations are one-way: quarantined and terminated
//!   sessions never return to active.
//! - Audit entries are written before errors are raised.
//! - Once a violation fires on a guarded stream, nothing further is
//!   emitted from that stream.
//! - There is no process-wide instance; every `Aegis` is self-contained.

mod aegis;
mod audit;
mod error;
mod session;

pub use aegis::{Aegis, GuardOptions};
pub use audit::{AuditDecision, AuditEntry, AuditLog, AuditSink, ConsoleSink};
pub use error::AegisError;
pub use session::{SessionState, SessionStatus};

// Re-export component types for convenience
pub use aegis_agent::{ChainConfig, ChainGuard, ChainStepOptions, ChainStepResult};
pub use aegis_policy::{Policy, PolicyError, Preset, RecoveryMode};
pub use aegis_scanner::{
    Detection, DetectionType, InputScanner, PromptMessage, Quarantined, Role, ScanResult,
    ScanStrategy, ScannerConfig, Severity, ThreatCategory,
};
pub use aegis_stream::{GuardedStream, StreamConfig, StreamMonitor, StreamViolation};
pub use aegis_validator::{ActionDecision, ActionRequest, ActionValidator, ProposedAction};

/// Core result type for Aegis operations.
pub type Result<T> = std::result::Result<T, AegisError>;
