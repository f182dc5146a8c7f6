//! # Rally Match Server
//!
//! Authoritative matchmaking and simulation for real-time pong matches.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     RALLY SERVER                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Per-room Xorshift128+ PRNG                │
//! │  └── vec.rs      - 2D / 3D vectors                           │
//! │                                                              │
//! │  game/           - Simulation (deterministic)                │
//! │  ├── mode.rs     - Game modes and sides                      │
//! │  ├── state.rs    - Room state and phase transitions          │
//! │  ├── input.rs    - Paddle commands                           │
//! │  ├── pong2d.rs   - Flat playfield physics (1v1, 2v2)         │
//! │  ├── pong3d.rs   - Table physics (3d)                        │
//! │  ├── step.rs     - Mode-dispatching step                     │
//! │  └── result.rs   - Finished-match records                    │
//! │                                                              │
//! │  session/        - Orchestration (non-deterministic)         │
//! │  ├── queue.rs    - Per-mode FIFO queues                      │
//! │  ├── invite.rs   - Tournament / private invitations          │
//! │  ├── registry.rs - Live rooms by id and by player            │
//! │  └── controller.rs - Countdown, ticks, forfeits, results     │
//! │                                                              │
//! │  sink/           - External adapters                         │
//! │  ├── results.rs  - Result persistence                        │
//! │  └── events.rs   - Tournament result events                  │
//! │                                                              │
//! │  network/        - Transport (non-deterministic)             │
//! │  ├── server.rs   - WebSocket server                          │
//! │  ├── protocol.rs - Message types                             │
//! │  └── connection.rs - Outbound handles                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! `core/` and `game/` never read the clock or the OS RNG. Each room draws
//! from its own seeded generator, so a room's state, `dt` and inputs fully
//! determine the next state.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod session;
pub mod sink;
pub mod network;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use crate::core::rng::DeterministicRng;
pub use config::{ServerConfig, SessionConfig};
pub use error::MatchError;
pub use game::mode::GameMode;
pub use game::state::{GameState, MatchPhase, PlayerId, RoomId};
pub use game::result::GameResult;
pub use session::{MatchmakingQueues, RoomRegistry, SessionController};
pub use sink::{EventPublisher, ResultSink};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;

/// Points needed to win a match
pub const WIN_SCORE: u32 = 7;

/// Countdown before a room starts running (seconds)
pub const COUNTDOWN_SECONDS: u64 = 5;
