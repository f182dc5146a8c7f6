//! Network Layer
//!
//! WebSocket transport and the JSON wire format.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod protocol;
pub mod connection;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, SeatInfo};
pub use connection::{Connection, ConnectionError, Player, OUTBOUND_CAPACITY};
pub use server::{ConnectRequest, GameServer, ServerError, parse_request};
