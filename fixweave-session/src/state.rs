/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Runtime session state machine.
//!
//! Transitions are driven by peer messages and timers at runtime, so the
//! machine is a checked enum rather than a typestate: every move goes
//! through [`SessionCore::transition`], which rejects anything the protocol
//! does not allow.

use crate::sequence::SequenceManager;
use fixweave_core::error::SessionError;
use parking_lot::RwLock;
use std::fmt;

/// Lifecycle states of a FIX session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No connection established.
    Disconnected,
    /// TCP connect in progress.
    Connecting,
    /// Logon sent, awaiting the response.
    LogonSent,
    /// Session fully established.
    LoggedIn,
    /// Gap detected; awaiting replayed messages.
    Resending,
    /// Logout sent, awaiting confirmation.
    LogoutSent,
    /// Terminal failure state.
    Errored,
}

impl SessionStatus {
    /// Returns true if the machine may move from `self` to `next`.
    #[must_use]
    pub fn allows(self, next: Self) -> bool {
        use SessionStatus::{
            Connecting, Disconnected, Errored, LoggedIn, LogonSent, LogoutSent, Resending,
        };
        // Errored is reachable from any non-terminal state.
        if next == Errored {
            return self != Errored;
        }
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, LogonSent)
                | (LogonSent, LoggedIn)
                | (LoggedIn, Resending)
                | (Resending, LoggedIn)
                | (LoggedIn | Resending | LogonSent, LogoutSent)
                | (LogoutSent | Connecting, Disconnected)
        )
    }

    /// Returns true for the terminal failure state.
    #[must_use]
    pub const fn is_errored(self) -> bool {
        matches!(self, Self::Errored)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::LogonSent => "logon-sent",
            Self::LoggedIn => "logged-in",
            Self::Resending => "resending",
            Self::LogoutSent => "logout-sent",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Shared session state: the status machine plus the sequence counters.
///
/// One `SessionCore` is shared by the session processors; the pipeline's
/// single-writer discipline means status changes never race a reader that
/// cares.
#[derive(Debug)]
pub struct SessionCore {
    status: RwLock<SessionStatus>,
    sequences: SequenceManager,
    session_id: String,
}

impl SessionCore {
    /// Creates a core in `Disconnected` with sequences at 1.
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            status: RwLock::new(SessionStatus::Disconnected),
            sequences: SequenceManager::new(),
            session_id: session_id.into(),
        }
    }

    /// Creates a core resuming from persisted sequence numbers.
    #[must_use]
    pub fn resumed(session_id: impl Into<String>, next_send: u64, next_expect: u64) -> Self {
        Self {
            status: RwLock::new(SessionStatus::Disconnected),
            sequences: SequenceManager::with_initial(next_send, next_expect),
            session_id: session_id.into(),
        }
    }

    /// The persisted session identifier.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        *self.status.read()
    }

    /// Moves the machine to `next`.
    ///
    /// # Errors
    /// Returns `SessionError::InvalidTransition` when the protocol does not
    /// allow the move.
    pub fn transition(&self, next: SessionStatus) -> Result<(), SessionError> {
        let mut status = self.status.write();
        if !status.allows(next) {
            return Err(SessionError::InvalidTransition {
                from: status.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(session = %self.session_id, from = %*status, to = %next, "session transition");
        *status = next;
        Ok(())
    }

    /// The sequence counters.
    #[must_use]
    pub fn sequences(&self) -> &SequenceManager {
        &self.sequences
    }
}
