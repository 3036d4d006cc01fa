//! Session management for the lock protocol
//!
//! A session is one batch of queued requests delivered over one connection.
//! It tracks:
//! - The exclusive busy flag (only one batch in flight per lock)
//! - The lifecycle state of the batch

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::error::{Error, Result};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No batch in flight
    Idle,

    /// Resolving the lock and opening a link
    Connecting,

    /// Connecting briefly to the wake-up receiver
    WakingPeer,

    /// Negotiating the session key
    KeyExchange,

    /// Sending queued requests
    Draining,

    /// Batch aborted, cleanup in progress
    Failed,
}

impl SessionState {
    /// Check if a transition is allowed
    pub fn can_transition(self, to: Self) -> bool {
        use SessionState::*;

        matches!(
            (self, to),
            (Idle, Connecting)
                | (Connecting, WakingPeer)
                | (WakingPeer, Connecting)
                | (Connecting, KeyExchange)
                | (KeyExchange, Draining)
                | (Draining, Idle)
                | (Connecting | WakingPeer | KeyExchange | Draining, Failed)
                | (Failed, Idle)
        )
    }

    /// Get state name
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::WakingPeer => "waking-peer",
            Self::KeyExchange => "key-exchange",
            Self::Draining => "draining",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Session manager
///
/// Owns the busy flag and the lifecycle state of a lock.
/// Thread-safe and can be cloned cheaply (Arc internally).
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    /// Set while a batch is in flight
    busy: AtomicBool,

    /// Number of batches started, for log correlation
    batches: AtomicU64,

    /// Current session state
    state: parking_lot::RwLock<SessionState>,
}

impl Session {
    /// Create an idle session
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                busy: AtomicBool::new(false),
                batches: AtomicU64::new(0),
                state: parking_lot::RwLock::new(SessionState::Idle),
            }),
        }
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    /// Check if a batch is in flight
    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    /// Number of batches started so far
    pub fn batches(&self) -> u64 {
        self.inner.batches.load(Ordering::Acquire)
    }

    /// Claim the session for one batch
    ///
    /// The returned guard releases the busy flag and returns the state to
    /// [`SessionState::Idle`] when dropped, whatever path the batch takes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionBusy`] without side effects if another batch
    /// holds the session.
    ///
    /// # Examples
    ///
    /// ```
    /// use ulrust_core::Session;
    ///
    /// let session = Session::new();
    /// let guard = session.begin().unwrap();
    /// assert!(session.begin().is_err());
    ///
    /// drop(guard);
    /// assert!(session.begin().is_ok());
    /// ```
    pub fn begin(&self) -> Result<SessionGuard> {
        self.inner
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::SessionBusy)?;

        let batch = self.inner.batches.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(batch, "Session claimed");

        Ok(SessionGuard {
            session: self.clone(),
            batch,
        })
    }

    fn transition(&self, to: SessionState) -> Result<SessionState> {
        let mut state = self.inner.state.write();
        let from = *state;

        if !from.can_transition(to) {
            return Err(Error::InvalidSessionState(format!(
                "Cannot move from {} to {}",
                from, to
            )));
        }

        *state = to;
        trace!(%from, %to, "Session transition");
        Ok(from)
    }

    fn release(&self) {
        *self.inner.state.write() = SessionState::Idle;
        self.inner.busy.store(false, Ordering::Release);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive claim on a [`Session`] for one batch
#[derive(Debug)]
pub struct SessionGuard {
    session: Session,
    batch: u64,
}

impl SessionGuard {
    /// Sequence number of this batch
    pub fn batch(&self) -> u64 {
        self.batch
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Move to a new state
    ///
    /// Returns the previous state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSessionState`] for a transition the lifecycle
    /// does not allow.
    pub fn transition(&self, to: SessionState) -> Result<SessionState> {
        self.session.transition(to)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.release();
        trace!(batch = self.batch, "Session released");
    }
}
