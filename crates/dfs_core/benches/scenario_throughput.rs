use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use dfs_core::constraint::{compile, FixtureStore};
use dfs_core::kernel::KernelStats;
use dfs_core::scenario::{ScenarioEngine, SimSettings};

fn scenario_generation(c: &mut Criterion) {
    let spec = compile("daytona-500", &FixtureStore::superspeedway_fixture(40)).unwrap();

    c.bench_function("generate_1000_scenarios_single_thread", |b| {
        b.iter(|| {
            let engine = ScenarioEngine::new(
                &spec,
                SimSettings::default().with_seed(42).with_threads(1),
                Arc::new(KernelStats::default()),
            );
            engine.generate(1000).unwrap()
        })
    });

    c.bench_function("generate_1000_scenarios_parallel", |b| {
        b.iter(|| {
            let engine = ScenarioEngine::new(
                &spec,
                SimSettings::default().with_seed(42),
                Arc::new(KernelStats::default()),
            );
            engine.generate(1000).unwrap()
        })
    });
}

criterion_group!(benches, scenario_generation);
criterion_main!(benches);
