//! Core deterministic primitives.
//!
//! Shared by both simulators. Nothing in here touches the clock or the OS RNG.

pub mod rng;
pub mod vec;

// Re-export core types
pub use rng::{DeterministicRng, derive_room_seed};
pub use vec::{Vec2, Vec3};
