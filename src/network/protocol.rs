//! Protocol Messages
//!
//! JSON wire format between clients and the server. Every message is an
//! object tagged by `type`; field names are camelCase.

use serde::{Serialize, Deserialize};

use crate::error::MatchError;
use crate::game::input::{Direction, PaddleCommand};
use crate::game::mode::GameMode;
use crate::game::state::{GameState, PlayerId, RoomId};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Move the paddle one step (2D modes).
    PaddleMove {
        /// Direction of travel.
        direction: Direction,
    },

    /// Place the paddle along the table (3D mode).
    #[serde(rename = "paddleMove3D")]
    PaddleMove3d {
        /// Requested z.
        position: f64,
    },

    /// Leave the matchmaking queue.
    CancelQueue,

    /// Ping for latency measurement.
    #[serde(rename_all = "camelCase")]
    Ping {
        /// Echoed back in `pong`.
        timestamp: u64,
    },
}

impl ClientMessage {
    /// Paddle command carried by this message, if any.
    pub fn paddle_command(&self) -> Option<PaddleCommand> {
        match *self {
            ClientMessage::PaddleMove { direction } => Some(PaddleCommand::Move { direction }),
            ClientMessage::PaddleMove3d { position } => Some(PaddleCommand::SetPosition { z: position }),
            ClientMessage::CancelQueue | ClientMessage::Ping { .. } => None,
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Seat announced at pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatInfo {
    /// Player id
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Seat index
    pub slot: u8,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Connection accepted.
    #[serde(rename_all = "camelCase")]
    Connected {
        /// Id the server knows this connection by.
        player_id: PlayerId,
    },

    /// Queued, waiting for opponents.
    #[serde(rename_all = "camelCase")]
    Waiting {
        /// Queue joined.
        mode: GameMode,
        /// 1-based position in that queue.
        position: usize,
    },

    /// Paired into a room.
    #[serde(rename_all = "camelCase")]
    MatchFound {
        /// Room id.
        game_id: RoomId,
        /// Room mode.
        mode: GameMode,
        /// Everyone seated, in slot order.
        players: Vec<SeatInfo>,
        /// Receiver's own slot.
        your_slot: u8,
    },

    /// Countdown timer.
    #[serde(rename_all = "camelCase")]
    Countdown {
        /// Whole seconds until Running.
        seconds_remaining: u32,
    },

    /// Running has begun.
    #[serde(rename_all = "camelCase")]
    GameStarted {
        /// Room id.
        game_id: RoomId,
    },

    /// Per-tick snapshot.
    State(GameState),

    /// Match won on points.
    #[serde(rename_all = "camelCase")]
    GameOver {
        /// Winning side id.
        winner_id: String,
        /// Text for the receiver.
        message: String,
    },

    /// Match ended because someone left.
    OpponentDisconnected {
        /// Text for the receiver.
        message: String,
    },

    /// Request rejected.
    Error {
        /// Stable error code.
        code: String,
        /// Human-readable detail.
        message: String,
    },

    /// Reply to `ping`.
    Pong {
        /// Client's timestamp.
        timestamp: u64,
    },
}

impl ServerMessage {
    /// Error reply for a rejected request.
    pub fn error(err: &MatchError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
