//! Paddle Input
//!
//! Commands arrive from connections at any time; the room buffers them and
//! hands one `TickInputs` snapshot to the simulator per tick. Keyed by slot in
//! a BTreeMap so iteration order is fixed.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

/// Vertical paddle direction for the 2D modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    /// Toward y = 0.
    Up,
    /// Toward the bottom wall.
    Down,
}

impl Direction {
    /// Sign applied to the paddle offset.
    #[inline]
    pub const fn sign(self) -> f64 {
        match self {
            Direction::Up => -1.0,
            Direction::Down => 1.0,
        }
    }
}

/// One paddle command.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PaddleCommand {
    /// Move one paddle step (2D modes).
    Move {
        /// Direction of travel.
        direction: Direction,
    },
    /// Place the paddle at an absolute table z (3D mode).
    SetPosition {
        /// Requested z; clamped by the simulator.
        z: f64,
    },
}

/// Inputs consumed by one simulation step, keyed by slot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickInputs {
    commands: BTreeMap<u8, PaddleCommand>,
}

impl TickInputs {
    /// Empty input set (every paddle idle).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the command for a slot, replacing any earlier one.
    pub fn set(&mut self, slot: u8, command: PaddleCommand) {
        self.commands.insert(slot, command);
    }

    /// Builder form of [`TickInputs::set`].
    #[cfg(test)]
    pub fn with(mut self, slot: u8, command: PaddleCommand) -> Self {
        self.set(slot, command);
        self
    }

    /// Command for a slot, if any.
    #[cfg(test)]
    pub fn get(&self, slot: u8) -> Option<PaddleCommand> {
        self.commands.get(&slot).copied()
    }

    /// Iterate commands in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, PaddleCommand)> + '_ {
        self.commands.iter().map(|(slot, cmd)| (*slot, *cmd))
    }

    /// True when no paddle moves this tick.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Pending commands for a room between two ticks.
///
/// A `Move` is applied exactly once; the latest `SetPosition` wins.
#[derive(Debug, Default)]
pub struct InputBuffer {
    pending: TickInputs,
}

impl InputBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a command from the player in `slot`.
    pub fn record(&mut self, slot: u8, command: PaddleCommand) {
        self.pending.set(slot, command);
    }

    /// Take everything recorded since the last tick.
    pub fn take(&mut self) -> TickInputs {
        std::mem::take(&mut self.pending)
    }
}
