//! Game Modes
//!
//! The single tagged variant that selects player count, simulator and
//! result shape for a room.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

use crate::error::MatchError;

/// Match mode. Serialized verbatim as `"1v1"`, `"2v2"`, `"3d"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GameMode {
    /// Classic 2D pong, one paddle per side.
    #[serde(rename = "1v1")]
    OneVsOne,
    /// 2D pong, two paddles per side.
    #[serde(rename = "2v2")]
    TwoVsTwo,
    /// Table tennis on a 3D table, one paddle per side.
    #[serde(rename = "3d")]
    ThreeD,
}

impl GameMode {
    /// All modes, in queue order.
    pub const ALL: [GameMode; 3] = [GameMode::OneVsOne, GameMode::TwoVsTwo, GameMode::ThreeD];

    /// Players needed to start a room in this mode.
    #[inline]
    pub const fn required_players(self) -> usize {
        match self {
            GameMode::OneVsOne | GameMode::ThreeD => 2,
            GameMode::TwoVsTwo => 4,
        }
    }

    /// Wire / persistence name.
    pub const fn as_str(self) -> &'static str {
        match self {
            GameMode::OneVsOne => "1v1",
            GameMode::TwoVsTwo => "2v2",
            GameMode::ThreeD => "3d",
        }
    }

    /// Whether the room runs the 3D table simulator.
    #[inline]
    pub const fn is_table(self) -> bool {
        matches!(self, GameMode::ThreeD)
    }

    /// Side a slot plays for.
    ///
    /// 2v2 puts slots 0-1 on the left and 2-3 on the right;
    /// the two-player modes put slot 0 left and slot 1 right.
    #[inline]
    pub const fn side_of(self, slot: usize) -> Side {
        let left = match self {
            GameMode::TwoVsTwo => slot < 2,
            GameMode::OneVsOne | GameMode::ThreeD => slot == 0,
        };
        if left { Side::Left } else { Side::Right }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1v1" => Ok(GameMode::OneVsOne),
            "2v2" => Ok(GameMode::TwoVsTwo),
            "3d" | "3D" => Ok(GameMode::ThreeD),
            other => Err(MatchError::Validation(format!("unknown game mode '{other}'"))),
        }
    }
}

/// One of the two opposing sides of a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum Side {
    /// Side of slot 0.
    Left = 0,
    /// Opposing side.
    Right = 1,
}

impl Side {
    /// Index into per-side arrays.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The opposing side.
    #[inline]
    pub const fn opponent(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}
