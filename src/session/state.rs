//! Session lifecycle state.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use parking_lot::Mutex;
use tracing::debug;

use crate::identifiers::SessionId;

// ============================================================================
// SessionState
// ============================================================================

/// Lifecycle state of a transport session.
///
/// ```text
/// Idle → Connecting → [TlsNegotiating →] Open → Closing → Closed | Faulted
/// ```
///
/// Any non-terminal state may move to `Closing`; `Closed` and `Faulted` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, not started.
    Idle,
    /// Resolving and connecting.
    Connecting,
    /// TLS handshake in progress (stream transport only).
    TlsNegotiating,
    /// Connected; both pipelines running.
    Open,
    /// Pipelines unwinding.
    Closing,
    /// Ended cleanly or by request.
    Closed,
    /// Ended because of a failure.
    Faulted,
}

impl SessionState {
    /// Returns `true` for `Closed` and `Faulted`.
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Faulted)
    }

    /// Returns `true` while the session still accepts outbound items.
    #[inline]
    #[must_use]
    pub const fn accepts_sends(&self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Connecting | Self::TlsNegotiating | Self::Open
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// StateCell
// ============================================================================

/// Shared, lock-protected session state.
#[derive(Debug)]
pub(crate) struct StateCell {
    session: SessionId,
    state: Mutex<SessionState>,
}

impl StateCell {
    pub(crate) fn new(session: SessionId) -> Self {
        Self {
            session,
            state: Mutex::new(SessionState::Idle),
        }
    }

    /// Returns the current state.
    #[inline]
    pub(crate) fn get(&self) -> SessionState {
        *self.state.lock()
    }

    /// Moves to `next` unless the current state is terminal.
    ///
    /// Returns `false` if the transition was refused.
    pub(crate) fn transition(&self, next: SessionState) -> bool {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return false;
        }
        let from = *state;
        debug!(session = %self.session, %from, to = %next, "State transition");
        *state = next;
        true
    }

    /// Moves from `expected` to `next`; refuses any other current state.
    pub(crate) fn transition_from(&self, expected: SessionState, next: SessionState) -> bool {
        let mut state = self.state.lock();
        if *state != expected {
            return false;
        }
        let from = *state;
        debug!(session = %self.session, %from, to = %next, "State transition");
        *state = next;
        true
    }
}

// ============================================================================
// Tests
// ============================================================================
