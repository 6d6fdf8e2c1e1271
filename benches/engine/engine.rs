use criterion::{criterion_group, criterion_main, Criterion};
use flight_contagion::context::Context;
use flight_contagion::engine::{run_simulation, EngineConfig};
use flight_contagion::flight_duration::{ContextFlightDurationExt, FlightDurations};
use flight_contagion::random::ContextRandomExt;

static SEED: u64 = 123;
static HORIZON: f64 = 1440.0;
static OCCUPANCY: usize = 175;

fn one_day() -> Context {
    let mut context = Context::new();
    context.init_random(SEED);
    let durations = FlightDurations::new(vec![48.0, 65.0, 72.0, 90.0, 105.0, 118.0])
        .expect("durations are valid");
    context.set_flight_durations(durations);

    run_simulation(&mut context, &EngineConfig::new(HORIZON, OCCUPANCY))
        .expect("simulation runs");
    context
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("engine one day", |bencher| {
        bencher.iter_with_large_drop(one_day)
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
