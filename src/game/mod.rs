//! Game Logic Module
//!
//! Per-room simulation. Deterministic given the room's state, `dt` and inputs;
//! no clock reads and no OS randomness below this line.
//!
//! ## Module Structure
//!
//! - `mode`: Game modes and sides
//! - `state`: Room state, phases, identifiers
//! - `input`: Paddle commands and per-tick input buffering
//! - `pong2d`: Flat playfield simulator (1v1, 2v2)
//! - `pong3d`: Table simulator (3d)
//! - `step`: Mode-dispatching authoritative step
//! - `result`: Finished-match records

pub mod mode;
pub mod state;
pub mod input;
pub mod pong2d;
pub mod pong3d;
pub mod step;
pub mod result;

// Re-export key types
pub use mode::{GameMode, Side};
pub use state::{GameState, PlayerState, PlayerId, RoomId, MatchPhase, PhaseError, Ball};
pub use input::{Direction, PaddleCommand, TickInputs, InputBuffer};
pub use step::{step, PhysicsSimulator, StepOutcome};
pub use result::{GameResult, MatchEnd};
