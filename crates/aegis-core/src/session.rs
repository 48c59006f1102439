//! # Session State Machine
//!
//! One state variable per Aegis instance. Transitions are monotonic:
//!
//! ```text
//! Active ──► Quarantined     (absorbing)
//!    │
//!    └─────► Terminated      (absorbing, stricter: streams also refuse)
//! ```
//!
//! [`SessionState::escalate`] is the single place where state escalates;
//! all callers go through the orchestrator, which emits the matching audit
//! entry on every transition.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Normal operation.
    Active,
    /// Locked after a block under `quarantine-session` recovery; every
    /// future input guard fails until the instance is discarded.
    Quarantined,
    /// Permanently dead; stream transforms also refuse.
    Terminated,
}

/// Session state owned by one Aegis instance.
#[derive(Debug, Clone)]
pub struct SessionState {
    id: String,
    status: SessionStatus,
}

impl SessionState {
    /// Fresh active session with a unique id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            status: SessionStatus::Active,
        }
    }

    /// Session correlation id for audit entries.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// True unless quarantined or terminated.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Escalate to a stricter status. Returns `true` when the status
    /// actually changed.
    ///
    /// Quarantined and terminated are absorbing; a quarantined session may
    /// still escalate to terminated, but nothing ever returns to active.
    pub fn escalate(&mut self, to: SessionStatus) -> bool {
        let allowed = match (self.status, to) {
            (SessionStatus::Active, SessionStatus::Quarantined | SessionStatus::Terminated) => true,
            (SessionStatus::Quarantined, SessionStatus::Terminated) => true,
            _ => false,
        };
        if allowed {
            tracing::warn!(session = %self.id, from = ?self.status, to = ?to, "session escalated");
            self.status = to;
        }
        allowed
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_active() {
        let s = SessionState::new();
        assert!(s.is_active());
        assert!(!s.id().is_empty());
    }

    #[test]
    fn test_escalation_to_quarantine() {
        let mut s = SessionState::new();
        assert!(s.escalate(SessionStatus::Quarantined));
        assert_eq!(s.status(), SessionStatus::Quarantined);
    }

    #[test]
    fn test_quarantine_absorbing() {
        let mut s = SessionState::new();
        s.escalate(SessionStatus::Quarantined);
        assert!(!s.escalate(SessionStatus::Active));
        assert_eq!(s.status(), SessionStatus::Quarantined);
    }

    #[test]
    fn test_quarantine_may_harden_to_terminated() {
        let mut s = SessionState::new();
        s.escalate(SessionStatus::Quarantined);
        assert!(s.escalate(SessionStatus::Terminated));
        assert_eq!(s.status(), SessionStatus::Terminated);
    }

    #[test]
    fn test_terminated_absorbing() {
        let mut s = SessionState::new();
        s.escalate(SessionStatus::Terminated);
        assert!(!s.escalate(SessionStatus::Active));
        assert!(!s.escalate(SessionStatus::Quarantined));
        assert_eq!(s.status(), SessionStatus::Terminated);
    }

    #[test]
    fn test_session_ids_unique() {
        assert_ne!(SessionState::new().id(), SessionState::new().id());
    }
}
