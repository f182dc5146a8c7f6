//! 2D Pong Simulator
//!
//! Flat 800x400 playfield, paddles flush with the left and right edges.
//! Positions are the top-left corner of the paddle / ball box, y grows downward.
//! Used by both 1v1 and 2v2; in 2v2 each side has two paddles stacked vertically.

use crate::core::rng::DeterministicRng;
use crate::core::vec::Vec2;
use crate::game::input::PaddleCommand;
use crate::game::mode::Side;
use crate::game::state::{Ball, GameState};
use crate::game::step::PhysicsSimulator;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Playfield width
pub const FIELD_WIDTH: f64 = 800.0;
/// Playfield height
pub const FIELD_HEIGHT: f64 = 400.0;
/// Paddle thickness
pub const PADDLE_WIDTH: f64 = 10.0;
/// Paddle length
pub const PADDLE_HEIGHT: f64 = 80.0;
/// Ball box edge
pub const BALL_SIZE: f64 = 16.0;
/// Serve speed on each axis
pub const BALL_SPEED: f64 = 8.0;
/// Paddle travel per move command
pub const PADDLE_SPEED: f64 = 7.0;
/// Rally speed-up applies only below this |vx|
pub const MAX_RALLY_SPEED: f64 = 15.0;
/// Per-hit speed-up factor
pub const RALLY_SPEEDUP: f64 = 1.05;

const MAX_HIT_OFFSET: f64 = 0.8;
const SPIN_FACTOR: f64 = 1.2;
const MIN_WALL_VY: f64 = 2.0;
const MIN_HIT_VY: f64 = 1.5;

/// Single paddle, centred vertically.
pub const CENTER_PADDLE_Y: f64 = (FIELD_HEIGHT - PADDLE_HEIGHT) / 2.0;
/// Upper 2v2 paddle.
pub const UPPER_PADDLE_Y: f64 = 60.0;
/// Lower 2v2 paddle.
pub const LOWER_PADDLE_Y: f64 = FIELD_HEIGHT - PADDLE_HEIGHT - UPPER_PADDLE_Y;

const MAX_PADDLE_Y: f64 = FIELD_HEIGHT - PADDLE_HEIGHT;

// =============================================================================
// SERVE
// =============================================================================

/// Ball at the centre, diagonal serve with room-RNG signs.
pub fn serve(rng: &mut DeterministicRng) -> Ball {
    let vx = rng.next_sign() * BALL_SPEED;
    let vy = rng.next_sign() * BALL_SPEED;
    Ball::Flat {
        position: Vec2::new(FIELD_WIDTH / 2.0, FIELD_HEIGHT / 2.0),
        velocity: Vec2::new(vx, vy),
    }
}

// =============================================================================
// SIMULATOR
// =============================================================================

/// Simulator for the flat modes.
#[derive(Clone, Copy, Debug, Default)]
pub struct Pong2d;

impl PhysicsSimulator for Pong2d {
    fn apply_command(&self, state: &mut GameState, slot: u8, command: PaddleCommand) {
        let PaddleCommand::Move { direction } = command else {
            return;
        };
        let Some(side) = state.players.iter().find(|p| p.slot == slot).map(|p| p.side) else {
            return;
        };

        // A move drives every paddle on the mover's side.
        let delta = direction.sign() * PADDLE_SPEED;
        for player in state.players.iter_mut().filter(|p| p.side == side) {
            player.paddle = (player.paddle + delta).clamp(0.0, MAX_PADDLE_Y);
        }
    }

    fn advance(&self, state: &mut GameState, scale: f64) -> Option<Side> {
        let Ball::Flat { mut position, mut velocity } = state.ball else {
            return None;
        };

        position = position + velocity.scale(scale);

        // Top / bottom walls
        if position.y <= 0.0 {
            position.y = 0.0;
            velocity.y = velocity.y.abs().max(MIN_WALL_VY);
        }
        if position.y >= FIELD_HEIGHT - BALL_SIZE {
            position.y = FIELD_HEIGHT - BALL_SIZE;
            velocity.y = -velocity.y.abs().max(MIN_WALL_VY);
        }

        // Left paddles
        if velocity.x < 0.0 && position.x <= PADDLE_WIDTH && position.x + BALL_SIZE >= 0.0 {
            if let Some(paddle) = hitting_paddle(state, Side::Left, position.y) {
                velocity = deflect(velocity, position.y, paddle);
                position.x = PADDLE_WIDTH + 1.0;
            }
        }

        // Right paddles
        if velocity.x > 0.0
            && position.x + BALL_SIZE >= FIELD_WIDTH - PADDLE_WIDTH
            && position.x <= FIELD_WIDTH
        {
            if let Some(paddle) = hitting_paddle(state, Side::Right, position.y) {
                velocity = deflect(velocity, position.y, paddle);
                position.x = FIELD_WIDTH - PADDLE_WIDTH - BALL_SIZE - 1.0;
            }
        }

        state.ball = Ball::Flat { position, velocity };

        if position.x < 0.0 {
            Some(Side::Right)
        } else if position.x > FIELD_WIDTH {
            Some(Side::Left)
        } else {
            None
        }
    }

    fn serve(&self, rng: &mut DeterministicRng) -> Ball {
        serve(rng)
    }
}

/// Top y of the first paddle on `side` overlapping the ball, in slot order.
fn hitting_paddle(state: &GameState, side: Side, ball_y: f64) -> Option<f64> {
    state
        .side_players(side)
        .map(|p| p.paddle)
        .find(|&paddle| ball_y + BALL_SIZE >= paddle && ball_y <= paddle + PADDLE_HEIGHT)
}

/// Reverse x with rally speed-up and derive vy from where the paddle was hit.
fn deflect(velocity: Vec2, ball_y: f64, paddle_y: f64) -> Vec2 {
    let mut vx = -velocity.x;
    if vx.abs() < MAX_RALLY_SPEED {
        vx *= RALLY_SPEEDUP;
    }

    let ball_center = ball_y + BALL_SIZE / 2.0;
    let paddle_center = paddle_y + PADDLE_HEIGHT / 2.0;
    let offset = ((ball_center - paddle_center) / (PADDLE_HEIGHT / 2.0))
        .clamp(-MAX_HIT_OFFSET, MAX_HIT_OFFSET);

    let mut vy = offset * vx.abs() * SPIN_FACTOR;
    if vy.abs() < MIN_HIT_VY {
        vy = if vy >= 0.0 { MIN_HIT_VY } else { -MIN_HIT_VY };
    }

    Vec2::new(vx, vy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::Direction;
    use crate::game::mode::GameMode;
    use crate::game::state::{PlayerId, RoomId};

    fn state(mode: GameMode) -> GameState {
        let players: Vec<_> = (0..mode.required_players())
            .map(|i| (PlayerId::new(format!("p{i}")), format!("P{i}")))
            .collect();
        GameState::new(RoomId::from("flat"), mode, &players)
    }

    fn place(state: &mut GameState, position: Vec2, velocity: Vec2) {
        state.ball = Ball::Flat { position, velocity };
    }

    fn ball(state: &GameState) -> (Vec2, Vec2) {
        match state.ball {
            Ball::Flat { position, velocity } => (position, velocity),
            Ball::Table { .. } => panic!("expected flat ball"),
        }
    }

    #[test]
    fn test_serve_from_center() {
        let mut rng = DeterministicRng::new(7);
        for _ in 0..20 {
            let Ball::Flat { position, velocity } = serve(&mut rng) else {
                panic!("expected flat ball");
            };
            assert_eq!(position, Vec2::new(400.0, 200.0));
            assert_eq!(velocity.x.abs(), BALL_SPEED);
            assert_eq!(velocity.y.abs(), BALL_SPEED);
        }
    }

    #[test]
    fn test_wall_reflection_with_correction() {
        let mut s = state(GameMode::OneVsOne);
        place(&mut s, Vec2::new(300.0, 3.0), Vec2::new(4.0, -5.0));

        assert_eq!(Pong2d.advance(&mut s, 1.0), None);
        let (pos, vel) = ball(&s);
        assert_eq!(pos.y, 0.0);
        assert_eq!(vel.y, 5.0);

        place(&mut s, Vec2::new(300.0, 383.0), Vec2::new(4.0, 1.0));
        Pong2d.advance(&mut s, 1.0);
        let (pos, vel) = ball(&s);
        assert_eq!(pos.y, FIELD_HEIGHT - BALL_SIZE);
        assert_eq!(vel.y, -MIN_WALL_VY);
    }

    #[test]
    fn test_left_paddle_returns_ball() {
        let mut s = state(GameMode::OneVsOne);
        let paddle = s.players[0].paddle;
        // Ball centred on the paddle
        place(&mut s, Vec2::new(12.0, paddle + 32.0), Vec2::new(-8.0, 0.0));

        assert_eq!(Pong2d.advance(&mut s, 1.0), None);
        let (pos, vel) = ball(&s);
        assert_eq!(pos.x, PADDLE_WIDTH + 1.0);
        assert!((vel.x - 8.0 * RALLY_SPEEDUP).abs() < 1e-9);
        assert_eq!(vel.y.abs(), MIN_HIT_VY);
    }

    #[test]
    fn test_speedup_capped() {
        let v = deflect(Vec2::new(16.0, 0.0), 0.0, 0.0);
        assert_eq!(v.x, -16.0);
    }

    #[test]
    fn test_edge_hit_adds_spin() {
        // Ball centre at the bottom edge of the paddle
        let v = deflect(Vec2::new(-10.0, 0.0), 80.0 - 8.0, 0.0);
        assert!((v.y - MAX_HIT_OFFSET * 10.5 * SPIN_FACTOR).abs() < 1e-9);
    }

    #[test]
    fn test_goals_score_for_opposite_side() {
        let mut s = state(GameMode::OneVsOne);
        s.players[1].paddle = 0.0;
        place(&mut s, Vec2::new(795.0, 350.0), Vec2::new(8.0, 0.5));
        assert_eq!(Pong2d.advance(&mut s, 1.0), Some(Side::Left));

        s.players[0].paddle = 0.0;
        place(&mut s, Vec2::new(3.0, 350.0), Vec2::new(-8.0, 0.5));
        assert_eq!(Pong2d.advance(&mut s, 1.0), Some(Side::Right));
    }

    #[test]
    fn test_lower_teammate_can_return() {
        let mut s = state(GameMode::TwoVsTwo);
        let lower = s.players[1].paddle;
        place(&mut s, Vec2::new(12.0, lower + 10.0), Vec2::new(-8.0, 0.0));

        Pong2d.advance(&mut s, 1.0);
        assert!(ball(&s).1.x > 0.0);
    }

    #[test]
    fn test_move_drives_team_and_clamps() {
        let mut s = state(GameMode::TwoVsTwo);
        let before: Vec<f64> = s.players.iter().map(|p| p.paddle).collect();

        Pong2d.apply_command(&mut s, 1, PaddleCommand::Move { direction: Direction::Up });
        assert_eq!(s.players[0].paddle, before[0] - PADDLE_SPEED);
        assert_eq!(s.players[1].paddle, before[1] - PADDLE_SPEED);
        assert_eq!(s.players[2].paddle, before[2]);

        for _ in 0..100 {
            Pong2d.apply_command(&mut s, 0, PaddleCommand::Move { direction: Direction::Up });
        }
        assert_eq!(s.players[0].paddle, 0.0);
    }

    #[test]
    fn test_table_command_ignored() {
        let mut s = state(GameMode::OneVsOne);
        let before = s.players[0].paddle;
        Pong2d.apply_command(&mut s, 0, PaddleCommand::SetPosition { z: -20.0 });
        assert_eq!(s.players[0].paddle, before);
    }
}
