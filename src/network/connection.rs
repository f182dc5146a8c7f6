//! Connection Handles
//!
//! The session layer only ever pushes messages at a player; it never reads.
//! A `Connection` is the sending half of that player's outbound queue, drained
//! by the transport's writer task.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::game::state::PlayerId;
use crate::network::protocol::ServerMessage;

/// Outbound queue depth per connection.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Failure to hand a message to a connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// Writer side is gone.
    #[error("connection closed")]
    Closed,

    /// Client is not keeping up.
    #[error("outbound queue full")]
    Full,
}

/// Sending handle to one client.
#[derive(Debug, Clone)]
pub struct Connection {
    sender: mpsc::Sender<ServerMessage>,
}

impl Connection {
    /// Wrap an existing outbound sender.
    pub fn new(sender: mpsc::Sender<ServerMessage>) -> Self {
        Self { sender }
    }

    /// New connection plus the receiver its writer task drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Queue a message without waiting.
    ///
    /// Never blocks a room's tick on a slow client.
    pub fn send(&self, message: ServerMessage) -> Result<(), ConnectionError> {
        self.sender.try_send(message).map_err(|e| match e {
            TrySendError::Closed(_) => ConnectionError::Closed,
            TrySendError::Full(_) => ConnectionError::Full,
        })
    }

    /// Whether the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Whether both handles feed the same outbound queue, i.e. the same socket.
    pub fn same_channel(&self, other: &Connection) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

/// A connected player, as supplied by the transport.
#[derive(Debug, Clone)]
pub struct Player {
    /// Upstream-resolved id
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Outbound handle
    pub connection: Connection,
}

impl Player {
    /// Create a player.
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>, connection: Connection) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            connection,
        }
    }

    /// Send, logging instead of failing.
    pub fn notify(&self, message: ServerMessage) {
        if let Err(e) = self.connection.send(message) {
            tracing::debug!(player = %self.id, error = %e, "dropped outbound message");
        }
    }
}
