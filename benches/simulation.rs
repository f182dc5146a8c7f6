//! Simulation throughput benchmarks
//!
//! Run with: cargo bench --bench simulation

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use rally::game::input::{Direction, PaddleCommand, TickInputs};
use rally::game::mode::GameMode;
use rally::game::state::{GameState, PlayerId, RoomId};
use rally::game::step::step;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TICKS: usize = 600;
const DT: f64 = 1.0 / 60.0;

fn running_state(mode: GameMode) -> GameState {
    let seats: Vec<(PlayerId, String)> = (0..mode.required_players())
        .map(|i| (PlayerId::new(format!("p{i}")), format!("Player{i}")))
        .collect();
    let mut state = GameState::new(RoomId::from("bench"), mode, &seats);
    let _ = state.begin_running(Utc::now());
    state
}

/// Ten seconds of random paddle input per mode
fn input_script(mode: GameMode, seed: u64) -> Vec<TickInputs> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..TICKS)
        .map(|_| {
            let mut inputs = TickInputs::new();
            for slot in 0..mode.required_players() as u8 {
                if !rng.gen_bool(0.5) {
                    continue;
                }
                let command = if mode.is_table() {
                    PaddleCommand::SetPosition { z: rng.gen_range(-50.0..-7.0) }
                } else if rng.gen_bool(0.5) {
                    PaddleCommand::Move { direction: Direction::Up }
                } else {
                    PaddleCommand::Move { direction: Direction::Down }
                };
                inputs.set(slot, command);
            }
            inputs
        })
        .collect()
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    group.throughput(Throughput::Elements(TICKS as u64));

    for mode in GameMode::ALL {
        let script = input_script(mode, 7);
        group.bench_with_input(BenchmarkId::new("ticks", mode), &mode, |b, &mode| {
            b.iter_batched(
                || running_state(mode),
                |mut state| {
                    for inputs in &script {
                        black_box(step(&mut state, DT, inputs));
                    }
                    state
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let state = running_state(GameMode::TwoVsTwo);
    c.bench_function("snapshot_json", |b| {
        b.iter(|| black_box(serde_json::to_string(&state)))
    });
}

criterion_group!(benches, bench_step, bench_snapshot);
criterion_main!(benches);
