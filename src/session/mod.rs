//! Match Orchestration
//!
//! Shared registries and the lifecycle controller. Everything here is
//! non-deterministic glue around the `game/` simulation.

pub mod queue;
pub mod invite;
pub mod registry;
pub mod controller;

pub use queue::{MatchmakingQueues, WaitingEntry};
pub use invite::{InviteBook, InviteSummary, Invitation, JoinOutcome};
pub use registry::{Room, RoomHandle, RoomRegistry};
pub use controller::{ControllerStats, Eligibility, SessionController};
