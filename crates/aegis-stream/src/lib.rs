//! # Aegis Stream Monitor
//!
//! Streaming-first output defense: tokens are forwarded to the consumer
//! immediately while being scanned in parallel, and a kill switch
//! terminates the stream the moment a violation is observed.
//!
//! ## Architecture
//!
//! ```text
//!  upstream chunks          ┌────────────────────────┐       downstream
//!  ───────────────────────► │     GuardedStream      │ ─────────────────►
//!                           │                        │
//!                           │  ┌──────────────────┐  │
//!                           │  │  StreamMonitor   │  │
//!                           │  │                  │  │
//!                           │  │ sliding window W │  │   W = max(longest
//!                           │  │ canary / PII /   │  │       canary, 64)
//!                           │  │ secret / custom  │  │
//!                           │  └────────┬─────────┘  │
//!                           │           │ violation  │
//!                           │           ▼            │
//!                           │     KILL SWITCH ───────┼──► violation handler
//!                           └────────────────────────┘      (exactly once)
//! ```
//!
//! The engine ([`StreamMonitor`]) is synchronous and runtime-agnostic; the
//! adapter ([`GuardedStream`]) binds it to any `futures::Stream` of text
//! chunks and enforces the concurrency contract: in-order emission, zero
//! added latency beyond the window tail, absorbing termination, and
//! backpressure inherited from poll semantics.
//!
//! ## Security Notes
//!
//! - After a violation, no further output is emitted from the stream and
//!   the buffered tail is discarded.
//! - Canary and secret matches always terminate; PII terminates unless
//!   redaction mode is enabled, in which case matches are replaced with
//!   `[REDACTED-<LABEL>]` markers and each occurrence is reported.
//! - Pattern matching runs against the full retained window, so matches
//!   split across chunk boundaries are still caught.

pub mod monitor;
pub mod transform;

pub use monitor::{MonitorState, Push, StreamConfig, StreamMonitor, StreamViolation, MIN_WINDOW};
pub use transform::{GuardedStream, ViolationHandler};
