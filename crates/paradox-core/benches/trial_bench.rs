use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use paradox_core::{SimulationConfig, run_single_trial, run_trial_aggregate};
use std::time::Duration;

fn bench_trials(c: &mut Criterion) {
    let mut group = c.benchmark_group("trials");
    let samples: usize = std::env::var("PARADOX_BENCH_SAMPLES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(30);
    group.sample_size(samples);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("single_trial_pop100_horizon20", |b| {
        b.iter_batched(
            || SimulationConfig {
                rng_seed: Some(0xBEEF),
                ..SimulationConfig::default()
            },
            |config| run_single_trial(&config).expect("outcome"),
            BatchSize::SmallInput,
        );
    });

    for &trials in &[100usize, 1_000] {
        group.bench_function(format!("aggregate_{trials}_trials"), |b| {
            b.iter_batched(
                || SimulationConfig {
                    rng_seed: Some(0xBEEF),
                    ..SimulationConfig::default()
                },
                |config| run_trial_aggregate(&config, trials).expect("report"),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_trials);
criterion_main!(benches);
