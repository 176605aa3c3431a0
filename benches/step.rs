//! Benchmarks the authoritative tick function in isolation: a single
//! `step_mut` call against a warm mid-match `GameState`, and a full-match
//! run (tick 0 through `match_duration_ticks`) to catch regressions that
//! only show up under sustained simulation (e.g. projectile list growth).

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use brawl_match::game::input::PlayerInput;
use brawl_match::game::state::{GameState, MatchConfig};
use brawl_match::game::tick::step_mut;

fn warm_state(config: &MatchConfig) -> GameState {
    let mut state = GameState::new(config);
    let input = PlayerInput { buttons: brawl_match::game::input::button::RIGHT, aim_x: 1.0, aim_y: 0.0 };
    for _ in 0..120 {
        step_mut(&mut state, [Some(input), Some(input)], [input, input], config);
    }
    state
}

fn bench_single_tick(c: &mut Criterion) {
    let config = MatchConfig::default();
    let warm = warm_state(&config);
    let input = PlayerInput::NULL;

    c.bench_function("step_mut/single_tick", |b| {
        b.iter_batched(
            || warm.clone(),
            |mut state| {
                step_mut(&mut state, [Some(input), Some(input)], [input, input], &config);
                black_box(&state);
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_full_match(c: &mut Criterion) {
    let config = MatchConfig { match_duration_ticks: 1800, ..MatchConfig::default() };
    let input = PlayerInput { buttons: brawl_match::game::input::button::RIGHT, aim_x: 1.0, aim_y: 0.0 };

    c.bench_function("step_mut/full_match", |b| {
        b.iter(|| {
            let mut state = GameState::new(&config);
            for _ in 0..config.match_duration_ticks {
                if state.match_over {
                    break;
                }
                step_mut(&mut state, [Some(input), Some(input)], [input, input], &config);
            }
            black_box(&state);
        })
    });
}

criterion_group!(benches, bench_single_tick, bench_full_match);
criterion_main!(benches);
