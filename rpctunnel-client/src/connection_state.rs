//! Socket connection state
//!
//! The persistent connection moves through its states in one direction
//! only:
//!
//! ```text
//! Connecting → Connected → Closed
//!      ↓           ↓
//!    Failed      Failed
//! ```
//!
//! There is no reconnection, so once a connection has left `Connected` it
//! never returns there. That is what makes the "connected" signal fire at
//! most once: observers of [`ConnectionTracker::subscribe`] see the
//! transition to `Connected` exactly once or not at all.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Handshake in progress; outbound frames are queued
    Connecting,
    /// Handshake complete; queued frames have been flushed
    Connected,
    /// Closed locally or by the server
    Closed,
    /// Connect, read or write failure
    Failed,
}

impl ConnectionState {
    /// Value reported by the connection state gauge
    pub fn code(&self) -> i64 {
        match self {
            ConnectionState::Connecting => 0,
            ConnectionState::Connected => 1,
            ConnectionState::Closed => 2,
            ConnectionState::Failed => 3,
        }
    }

    /// `true` once the connection is gone for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            ConnectionState::Connecting => 0,
            ConnectionState::Connected => 1,
            ConnectionState::Closed | ConnectionState::Failed => 2,
        }
    }
}

/// Forward-only holder of a [`ConnectionState`]
#[derive(Debug)]
pub struct ConnectionTracker {
    state: watch::Sender<ConnectionState>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self { state }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Move to `next` if that is a forward transition
    ///
    /// Returns `false`, leaving the state untouched, for a backward or
    /// sideways move (including `Closed` ↔ `Failed`).
    pub fn advance(&self, next: ConnectionState) -> bool {
        self.state.send_if_modified(|current| {
            if next.rank() > current.rank() {
                *current = next;
                true
            } else {
                false
            }
        })
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}
