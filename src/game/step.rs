//! Authoritative Simulation Step
//!
//! One fixed-rate step of a room: apply buffered paddle commands, advance the
//! ball, score, and end the match the moment a side reaches the win score.
//! Deterministic: identical `(state, dt, inputs)` always yield identical output.

use crate::core::rng::DeterministicRng;
use crate::game::input::{PaddleCommand, TickInputs};
use crate::game::mode::{GameMode, Side};
use crate::game::pong2d::Pong2d;
use crate::game::pong3d::Pong3d;
use crate::game::state::{Ball, GameState, MatchPhase};
use crate::TICK_RATE;

/// A per-mode physics model.
pub trait PhysicsSimulator: Send + Sync {
    /// Apply one buffered paddle command for `slot`.
    fn apply_command(&self, state: &mut GameState, slot: u8, command: PaddleCommand);

    /// Advance the ball by `scale` nominal ticks.
    ///
    /// Returns the side that won the point, if the ball left play.
    fn advance(&self, state: &mut GameState, scale: f64) -> Option<Side>;

    /// Put a fresh ball in play.
    fn serve(&self, rng: &mut DeterministicRng) -> Ball;
}

/// Simulator for a mode.
pub fn simulator_for(mode: GameMode) -> &'static dyn PhysicsSimulator {
    match mode {
        GameMode::OneVsOne | GameMode::TwoVsTwo => &Pong2d,
        GameMode::ThreeD => &Pong3d,
    }
}

/// Result of one step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// Side that scored this step
    pub scored: Option<Side>,
    /// Set when this step ended the match
    pub winner: Option<Side>,
}

/// Advance `state` by `dt` seconds.
///
/// Velocities are per nominal tick (1 / [`TICK_RATE`] s), so `dt` is applied
/// as a multiple of that. Does nothing outside Running.
pub fn step(state: &mut GameState, dt: f64, inputs: &TickInputs) -> StepOutcome {
    let mut outcome = StepOutcome::default();

    if state.phase != MatchPhase::Running {
        return outcome;
    }

    let sim = simulator_for(state.mode);

    for (slot, command) in inputs.iter() {
        sim.apply_command(state, slot, command);
    }

    state.tick += 1;

    let scale = dt * TICK_RATE as f64;
    let Some(side) = sim.advance(state, scale) else {
        return outcome;
    };
    outcome.scored = Some(side);

    if state.score_point(side) {
        // Running -> Over cannot fail here; phase was checked above.
        if state.finish(side).is_ok() {
            outcome.winner = Some(side);
        }
    } else {
        state.ball = sim.serve(&mut state.rng);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::core::vec::Vec2;
    use crate::game::input::Direction;
    use crate::game::pong2d;
    use crate::game::state::{PlayerId, RoomId};
    use crate::WIN_SCORE;

    const DT: f64 = 1.0 / 60.0;

    fn running(mode: GameMode) -> GameState {
        let players: Vec<_> = (0..mode.required_players())
            .map(|i| (PlayerId::new(format!("p{i}")), format!("P{i}")))
            .collect();
        let mut state = GameState::new(RoomId::from("step-room"), mode, &players);
        state.begin_running(Utc::now()).unwrap();
        state
    }

    fn random_inputs(rng: &mut StdRng, mode: GameMode) -> TickInputs {
        let mut inputs = TickInputs::new();
        for slot in 0..mode.required_players() as u8 {
            if rng.gen_bool(0.5) {
                let command = if mode.is_table() {
                    PaddleCommand::SetPosition { z: rng.gen_range(-60.0..0.0) }
                } else if rng.gen_bool(0.5) {
                    PaddleCommand::Move { direction: Direction::Up }
                } else {
                    PaddleCommand::Move { direction: Direction::Down }
                };
                inputs.set(slot, command);
            }
        }
        inputs
    }

    fn run_deterministic(mode: GameMode, seed: u64) -> GameState {
        let mut state = running(mode);
        // Timestamps are outside the simulation.
        state.started_at = None;
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..3000 {
            let inputs = random_inputs(&mut rng, mode);
            step(&mut state, DT, &inputs);
        }
        state
    }

    #[test]
    fn test_step_deterministic_all_modes() {
        for mode in GameMode::ALL {
            let a = run_deterministic(mode, 42);
            let b = run_deterministic(mode, 42);
            assert_eq!(a, b, "mode {mode} diverged");
            assert_eq!(a.rng, b.rng);
        }
    }

    #[test]
    fn test_single_step_deterministic() {
        let mut rng = StdRng::seed_from_u64(5);
        for mode in GameMode::ALL {
            let base = running(mode);
            let inputs = random_inputs(&mut rng, mode);

            let mut a = base.clone();
            let mut b = base.clone();
            assert_eq!(step(&mut a, DT, &inputs), step(&mut b, DT, &inputs));
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_no_advance_outside_running() {
        let players = vec![(PlayerId::from("a"), "A".into()), (PlayerId::from("b"), "B".into())];
        let mut state = GameState::new(RoomId::from("r"), GameMode::OneVsOne, &players);
        let before = state.clone();

        assert_eq!(step(&mut state, DT, &TickInputs::new()), StepOutcome::default());
        assert_eq!(state, before);
    }

    #[test]
    fn test_goal_reserves_ball() {
        let mut state = running(GameMode::OneVsOne);
        state.players[1].paddle = 0.0;
        state.ball = Ball::Flat {
            position: Vec2::new(795.0, 350.0),
            velocity: Vec2::new(8.0, 0.5),
        };

        let outcome = step(&mut state, DT, &TickInputs::new());
        assert_eq!(outcome.scored, Some(Side::Left));
        assert_eq!(outcome.winner, None);
        assert_eq!(state.score(Side::Left), 1);
        assert!(matches!(
            state.ball,
            Ball::Flat { position, .. } if position == Vec2::new(400.0, 200.0)
        ));
    }

    #[test]
    fn test_win_ends_match_once() {
        let mut state = running(GameMode::OneVsOne);
        state.scores = [WIN_SCORE - 1, 3];
        state.players[1].paddle = 0.0;
        state.ball = Ball::Flat {
            position: Vec2::new(pong2d::FIELD_WIDTH - 2.0, 350.0),
            velocity: Vec2::new(8.0, 0.5),
        };

        let outcome = step(&mut state, DT, &TickInputs::new());
        assert_eq!(outcome.winner, Some(Side::Left));
        assert_eq!(state.phase, MatchPhase::Over);
        assert_eq!(state.score(Side::Left), WIN_SCORE);
        let tick = state.tick;

        let after = step(&mut state, DT, &TickInputs::new());
        assert_eq!(after, StepOutcome::default());
        assert_eq!(state.tick, tick);
    }

    #[test]
    fn test_dt_scales_travel() {
        let mut a = running(GameMode::OneVsOne);
        let mut b = a.clone();

        step(&mut a, DT, &TickInputs::new());
        step(&mut b, DT * 2.0, &TickInputs::new());

        let (Ball::Flat { position: pa, .. }, Ball::Flat { position: pb, .. }) = (a.ball, b.ball) else {
            panic!("expected flat balls");
        };
        assert!((pb.x - 400.0).abs() > (pa.x - 400.0).abs());
    }
}
