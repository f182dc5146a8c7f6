//! Game State Definitions
//!
//! Per-room state mutated only by simulator steps and lifecycle transitions.
//! Serialized (camelCase) as the body of every `state` snapshot.

use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::rng::DeterministicRng;
use crate::core::vec::{Vec2, Vec3};
use crate::game::mode::{GameMode, Side};
use crate::game::{pong2d, pong3d};
use crate::WIN_SCORE;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Player identifier, resolved upstream and taken as-is.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Wrap an upstream id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Room identifier. Doubles as `gameId` in results and `gameMatchId` in events.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Fresh random id for a queued pairing.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap a caller-chosen id (tournament matches).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// MATCH PHASE
// =============================================================================

/// Lifecycle phase. Only ever moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchPhase {
    /// Timer running, ball frozen.
    Countdown,
    /// Simulator stepping every tick.
    Running,
    /// Terminal.
    Over,
}

/// Rejected phase change or phase-gated operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseError {
    /// Transition that would move backwards or repeat.
    #[error("illegal phase transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current phase
        from: MatchPhase,
        /// Requested phase
        to: MatchPhase,
    },

    /// Operation requires another phase.
    #[error("room is in {actual:?}, operation requires {expected:?}")]
    WrongPhase {
        /// Current phase
        actual: MatchPhase,
        /// Phase the operation needs
        expected: MatchPhase,
    },
}

// =============================================================================
// PLAYER STATE
// =============================================================================

/// One paddle and its owner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Player id
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Seat index, fixed at pairing
    pub slot: u8,
    /// Side the slot plays for
    pub side: Side,
    /// Paddle offset: top y in the 2D modes, table z in 3D
    pub paddle: f64,
    /// Mirror of the side score
    pub score: u32,
}

// =============================================================================
// BALL
// =============================================================================

/// Ball kinematics, shaped by the simulator that owns the room.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Ball {
    /// 2D playfield ball.
    Flat {
        /// Top-left corner of the ball square
        position: Vec2,
        /// Units per nominal tick
        velocity: Vec2,
    },
    /// 3D table ball.
    Table {
        /// Centre
        position: Vec3,
        /// Units per nominal tick (before velocity scale)
        velocity: Vec3,
    },
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Authoritative state of one room.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Owning room
    pub room_id: RoomId,
    /// Mode (selects simulator)
    pub mode: GameMode,
    /// Lifecycle phase
    pub phase: MatchPhase,
    /// Simulation steps taken while Running
    pub tick: u64,
    /// Players in slot order
    pub players: Vec<PlayerState>,
    /// Score per side, indexed by [`Side::index`]
    pub scores: [u32; 2],
    /// Ball
    pub ball: Ball,
    /// Set once the match is won or forfeited
    pub winner: Option<Side>,
    /// When Running began
    pub started_at: Option<DateTime<Utc>>,
    /// Serve randomness, seeded from the room id and players
    #[serde(skip)]
    pub rng: DeterministicRng,
}

impl GameState {
    /// Fresh state in Countdown with the first serve laid out.
    ///
    /// `players` is `(id, display name)` in slot order.
    pub fn new(room_id: RoomId, mode: GameMode, players: &[(PlayerId, String)]) -> Self {
        let ids: Vec<&str> = players.iter().map(|(id, _)| id.as_str()).collect();
        let mut rng = DeterministicRng::for_room(room_id.as_str(), &ids);

        let players = players
            .iter()
            .enumerate()
            .map(|(slot, (id, name))| PlayerState {
                id: id.clone(),
                name: name.clone(),
                slot: slot as u8,
                side: mode.side_of(slot),
                paddle: initial_paddle(mode, slot),
                score: 0,
            })
            .collect();

        let ball = if mode.is_table() {
            pong3d::serve(&mut rng)
        } else {
            pong2d::serve(&mut rng)
        };

        Self {
            room_id,
            mode,
            phase: MatchPhase::Countdown,
            tick: 0,
            players,
            scores: [0, 0],
            ball,
            winner: None,
            started_at: None,
            rng,
        }
    }

    /// Countdown -> Running.
    pub fn begin_running(&mut self, now: DateTime<Utc>) -> Result<(), PhaseError> {
        match self.phase {
            MatchPhase::Countdown => {
                self.phase = MatchPhase::Running;
                self.started_at = Some(now);
                Ok(())
            }
            from => Err(PhaseError::IllegalTransition { from, to: MatchPhase::Running }),
        }
    }

    /// Countdown/Running -> Over, recording the winning side.
    ///
    /// Fails if already Over, which makes the caller that succeeds the only
    /// one allowed to finalize the room.
    pub fn finish(&mut self, winner: Side) -> Result<(), PhaseError> {
        match self.phase {
            MatchPhase::Countdown | MatchPhase::Running => {
                self.phase = MatchPhase::Over;
                self.winner = Some(winner);
                Ok(())
            }
            MatchPhase::Over => Err(PhaseError::IllegalTransition {
                from: MatchPhase::Over,
                to: MatchPhase::Over,
            }),
        }
    }

    /// Require a phase, for phase-gated operations.
    pub fn expect_phase(&self, expected: MatchPhase) -> Result<(), PhaseError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(PhaseError::WrongPhase { actual: self.phase, expected })
        }
    }

    /// Credit one point to `side`. Returns true when that reaches [`WIN_SCORE`].
    pub fn score_point(&mut self, side: Side) -> bool {
        let score = &mut self.scores[side.index()];
        *score += 1;
        let total = *score;

        for player in self.players.iter_mut().filter(|p| p.side == side) {
            player.score = total;
        }

        total >= WIN_SCORE
    }

    /// Slot of a player, if seated here.
    pub fn slot_of(&self, player_id: &PlayerId) -> Option<u8> {
        self.players.iter().find(|p| &p.id == player_id).map(|p| p.slot)
    }

    /// Side of a player, if seated here.
    pub fn side_of(&self, player_id: &PlayerId) -> Option<Side> {
        self.players.iter().find(|p| &p.id == player_id).map(|p| p.side)
    }

    /// Players on one side, in slot order.
    pub fn side_players(&self, side: Side) -> impl Iterator<Item = &PlayerState> {
        self.players.iter().filter(move |p| p.side == side)
    }

    /// Score of one side.
    #[inline]
    pub fn score(&self, side: Side) -> u32 {
        self.scores[side.index()]
    }

    /// Whether the match has ended.
    #[inline]
    pub fn is_over(&self) -> bool {
        self.phase == MatchPhase::Over
    }
}

/// Starting paddle offset for a slot.
pub(crate) fn initial_paddle(mode: GameMode, slot: usize) -> f64 {
    match mode {
        GameMode::OneVsOne => pong2d::CENTER_PADDLE_Y,
        // Teammates split the side: upper paddle first, lower second.
        GameMode::TwoVsTwo => {
            if slot % 2 == 0 { pong2d::UPPER_PADDLE_Y } else { pong2d::LOWER_PADDLE_Y }
        }
        GameMode::ThreeD => pong3d::PADDLE_REST_Z,
    }
}
