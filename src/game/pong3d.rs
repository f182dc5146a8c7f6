//! 3D Table Simulator
//!
//! Table tennis on a table spanning x ∈ [-60, 60], z ∈ [-58, 1], surface at
//! y = 53. Slot 0 defends the +x end, slot 1 the -x end. Paddles slide along z.

use crate::core::rng::DeterministicRng;
use crate::core::vec::Vec3;
use crate::game::input::PaddleCommand;
use crate::game::mode::Side;
use crate::game::state::{Ball, GameState};
use crate::game::step::PhysicsSimulator;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Added to vy every tick
pub const GRAVITY: f64 = -0.018;
/// Position advance per tick is velocity times this
pub const VELOCITY_SCALE: f64 = 1.2;
/// Table surface height
pub const TABLE_Y: f64 = 53.0;
/// Ball radius
pub const BALL_RADIUS: f64 = 2.0;
/// Table extent along x
pub const TABLE_MIN_X: f64 = -60.0;
/// Table extent along x
pub const TABLE_MAX_X: f64 = 60.0;
/// Table extent along z
pub const TABLE_MIN_Z: f64 = -58.0;
/// Table extent along z
pub const TABLE_MAX_Z: f64 = 1.0;
/// Fraction of vy kept on a bounce
pub const BOUNCE_DAMPING: f64 = 0.65;

/// Paddle travel limits
pub const PADDLE_MIN_Z: f64 = -50.0;
/// Paddle travel limits
pub const PADDLE_MAX_Z: f64 = -7.0;
/// Paddle starting z
pub const PADDLE_REST_Z: f64 = -28.0;

// Rebounds weaker than LOW_BOUNCE_VY are lifted to MIN_BOUNCE_VY; rebounds
// stronger than HIGH_BOUNCE_VY are capped at MAX_BOUNCE_VY.
const LOW_BOUNCE_VY: f64 = 0.15;
const MIN_BOUNCE_VY: f64 = 0.18;
const HIGH_BOUNCE_VY: f64 = 0.55;
const MAX_BOUNCE_VY: f64 = 0.5;
const PADDLE_NEAR_X: f64 = 55.0;
const PADDLE_FAR_X: f64 = 65.0;
const PADDLE_HALF_WIDTH: f64 = 8.0;
const PADDLE_HEIGHT_Y: f64 = 50.0;
const PADDLE_HALF_HEIGHT: f64 = 16.0;
const HIT_SPEEDUP: f64 = 1.05;
const HIT_MIN_VY: f64 = 0.25;
const HIT_MAX_VY: f64 = 0.7;
const OUT_OF_PLAY_X: f64 = 100.0;

const SERVE_POSITION: Vec3 = Vec3::new(0.0, TABLE_Y + 5.0, -28.5);
const SERVE_VX: f64 = 1.2;
const SERVE_VY: f64 = 0.25;
const SERVE_MAX_VZ: f64 = 0.3;

/// Ball rests on the surface at this height.
#[inline]
fn surface() -> f64 {
    TABLE_Y + BALL_RADIUS
}

#[inline]
fn over_table(p: Vec3) -> bool {
    (TABLE_MIN_X..=TABLE_MAX_X).contains(&p.x) && (TABLE_MIN_Z..=TABLE_MAX_Z).contains(&p.z)
}

/// Upward speed after a table bounce.
fn rebound_vy(incoming: f64) -> f64 {
    let vy = incoming.abs() * BOUNCE_DAMPING;
    if vy < LOW_BOUNCE_VY {
        MIN_BOUNCE_VY
    } else if vy > HIGH_BOUNCE_VY {
        MAX_BOUNCE_VY
    } else {
        vy
    }
}

/// Fresh ball above the net, launched toward a random end.
pub fn serve(rng: &mut DeterministicRng) -> Ball {
    let vx = rng.next_sign() * SERVE_VX;
    let vz = rng.next_f64_range(-SERVE_MAX_VZ, SERVE_MAX_VZ);
    Ball::Table {
        position: SERVE_POSITION,
        velocity: Vec3::new(vx, SERVE_VY, vz),
    }
}

// =============================================================================
// SIMULATOR
// =============================================================================

/// Simulator for the table mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct Pong3d;

impl PhysicsSimulator for Pong3d {
    fn apply_command(&self, state: &mut GameState, slot: u8, command: PaddleCommand) {
        let PaddleCommand::SetPosition { z } = command else {
            return;
        };
        if !z.is_finite() {
            return;
        }
        if let Some(player) = state.players.iter_mut().find(|p| p.slot == slot) {
            player.paddle = z.clamp(PADDLE_MIN_Z, PADDLE_MAX_Z);
        }
    }

    fn advance(&self, state: &mut GameState, scale: f64) -> Option<Side> {
        let Ball::Table { mut position, mut velocity } = state.ball else {
            return None;
        };

        velocity.y += GRAVITY * scale;
        position = position + velocity.scale(VELOCITY_SCALE * scale);

        // Table bounce
        if position.y <= surface() && velocity.y < 0.0 && over_table(position) {
            position.y = surface();
            velocity.y = rebound_vy(velocity.y);
        }

        // Side walls
        if position.z <= TABLE_MIN_Z || position.z >= TABLE_MAX_Z {
            velocity.z = -velocity.z;
            position.z = position.z.clamp(TABLE_MIN_Z, TABLE_MAX_Z);
        }

        for player in &state.players {
            let (near, far, toward) = if player.slot == 0 {
                (PADDLE_NEAR_X, PADDLE_FAR_X, velocity.x > 0.0)
            } else {
                (-PADDLE_FAR_X, -PADDLE_NEAR_X, velocity.x < 0.0)
            };

            let in_reach = position.x > near
                && position.x < far
                && (position.z - player.paddle).abs() < PADDLE_HALF_WIDTH
                && (position.y - PADDLE_HEIGHT_Y).abs() < PADDLE_HALF_HEIGHT;

            if toward && in_reach {
                let offset = (position.z - player.paddle) / PADDLE_HALF_WIDTH;
                velocity.x = -velocity.x * HIT_SPEEDUP;
                velocity.y = state.rng.next_f64_range(HIT_MIN_VY, HIT_MAX_VY);
                velocity.z = offset;
                break;
            }
        }

        state.ball = Ball::Table { position, velocity };

        // Falling below the surface off the table, or past either end.
        let dropped = position.y <= surface() && velocity.y < 0.0 && !over_table(position);
        if dropped || position.x.abs() > OUT_OF_PLAY_X {
            let conceding = if position.x >= 0.0 { side_at(state, 0) } else { side_at(state, 1) };
            return Some(conceding.opponent());
        }

        None
    }

    fn serve(&self, rng: &mut DeterministicRng) -> Ball {
        serve(rng)
    }
}

fn side_at(state: &GameState, slot: usize) -> Side {
    state.mode.side_of(slot)
}
