use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use moshpit_core::{MoshpitConfig, Simulation};
use std::time::Duration;

fn bench_advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("advance");
    group.sample_size(30);
    group.warm_up_time(Duration::from_secs(2));
    group.measurement_time(Duration::from_secs(8));

    const STEPS: usize = 32;
    for &population in &[300_usize, 1000, 4000] {
        group.bench_function(format!("steps{STEPS}_moshers{population}"), |b| {
            b.iter_batched(
                || {
                    let config = MoshpitConfig {
                        population,
                        // Scale the arena with the population so neighbor
                        // density stays roughly constant across sizes.
                        arena_width: (population as f64).sqrt() * 3.0,
                        arena_height: (population as f64).sqrt() * 3.0,
                        rng_seed: Some(0xBEEF),
                        ..MoshpitConfig::default()
                    };
                    Simulation::new(config).expect("benchmark simulation")
                },
                |mut sim| {
                    for _ in 0..STEPS {
                        sim.advance();
                    }
                    sim
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_advance);
criterion_main!(benches);
