//! Session definition
//!
//! The registry-visible handle for one live connection: its id, peer
//! address, optional login handle, and the outbound line channel feeding
//! the connection's writer task.

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::types::SessionId;

/// Protocol state of one connection
///
/// `Unauthenticated` is initial, `Closed` is terminal. The owning handler
/// task is the only writer of this state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no successful LOGIN yet
    Unauthenticated,
    /// LOGIN accepted, handle bound in the registry
    LoggedIn,
    /// Connection torn down; the handler loop has exited
    Closed,
}

/// One live connection as seen by the registry and router
///
/// The TCP stream itself is not here: the read half is owned by the handler
/// task and the write half by the writer task, so the socket closes exactly
/// once when both tasks end. Everyone else talks to the session through its
/// outbound channel.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique identifier, assigned at accept time
    pub id: SessionId,
    /// Peer address, used as the display name before login
    pub peer: String,
    /// Login handle (None until a successful LOGIN)
    pub handle: Option<String>,
    /// Outbound display lines, drained by the writer task
    outbound: mpsc::Sender<String>,
}

impl Session {
    /// Create a new session around an outbound line channel
    pub fn new(id: SessionId, peer: String, outbound: mpsc::Sender<String>) -> Self {
        Self {
            id,
            peer,
            handle: None,
            outbound,
        }
    }

    /// Queue one display line for this session, without blocking.
    ///
    /// Best effort: a full buffer (stalled recipient) or a closed channel
    /// (recipient already gone) is reported to the caller, who logs and
    /// moves on. A slow recipient must never stall a broadcast.
    pub fn send(&self, line: String) -> Result<(), SendError> {
        self.outbound.try_send(line).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Display name: the handle if bound, otherwise the peer address
    pub fn display_name(&self) -> &str {
        self.handle.as_deref().unwrap_or(&self.peer)
    }
}
