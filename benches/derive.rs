//! Run these benches with `cargo bench --bench derive -- --verbose`
use criterion::{criterion_group, criterion_main, Criterion};

use cast_analysis::CtdCast;

fn build_tester() -> Criterion {
    Criterion::default()
        .sample_size(60)
        .measurement_time(std::time::Duration::from_secs(10))
        .noise_threshold(0.03)
        .significance_level(0.01)
}

criterion_main!(derive_benches);

criterion_group!(
    name = derive_benches;
    config = build_tester();
    targets = density_bench, depth_bench, buoyancy_frequency_bench
);

fn build_cast(n: usize) -> CtdCast {
    let pres: Vec<f64> = (0..n).map(|i| 2.0 * i as f64).collect();
    let sal: Vec<f64> = pres.iter().map(|p| 34.0 + 1.0e-3 * p).collect();
    let temp: Vec<f64> = pres.iter().map(|p| 12.0 * (-p / 700.0).exp()).collect();

    CtdCast::new(pres, sal, temp).unwrap().with_coords(-48.0, 45.0)
}

fn density_bench(c: &mut Criterion) {
    c.bench_function("add_density", |b| {
        b.iter(|| {
            let mut cast = build_cast(1000);
            cast.add_density().unwrap()
        });
    });
}

fn depth_bench(c: &mut Criterion) {
    c.bench_function("add_depth", |b| {
        b.iter(|| {
            let mut cast = build_cast(1000);
            cast.add_depth(None).unwrap()
        });
    });
}

fn buoyancy_frequency_bench(c: &mut Criterion) {
    c.bench_function("add_buoyancy_frequency", |b| {
        b.iter(|| {
            let mut cast = build_cast(500);
            cast.add_buoyancy_frequency(None, 0.2).unwrap()
        });
    });
}
