//! Run these benches with `cargo bench --bench thermal_wind -- --verbose`
use criterion::{criterion_group, criterion_main, Criterion};

use cast_analysis::{Cast, CastCollection, CtdCast, ThermalWindOptions};

fn build_tester() -> Criterion {
    Criterion::default()
        .sample_size(40)
        .measurement_time(std::time::Duration::from_secs(10))
        .noise_threshold(0.03)
        .significance_level(0.01)
}

criterion_main!(thermal_wind_benches);

criterion_group!(
    name = thermal_wind_benches;
    config = build_tester();
    targets = thermal_wind_bench, thermal_wind_inner_bench
);

fn build_transect(stations: usize, n: usize) -> CastCollection {
    (0..stations)
        .map(|j| {
            let pres: Vec<f64> = (0..n).map(|i| 5.0 * i as f64).collect();
            let sal: Vec<f64> = pres
                .iter()
                .map(|p| 34.0 + 1.0e-3 * p + 0.05 * j as f64)
                .collect();
            let temp: Vec<f64> = pres.iter().map(|p| 12.0 * (-p / 700.0).exp()).collect();

            Cast::from(
                CtdCast::new(pres, sal, temp)
                    .unwrap()
                    .with_coords(-48.0 + 0.25 * j as f64, 45.0),
            )
        })
        .collect()
}

fn thermal_wind_bench(c: &mut Criterion) {
    c.bench_function("thermal_wind", |b| {
        b.iter(|| {
            let mut coll = build_transect(12, 400);
            coll.thermal_wind(&ThermalWindOptions::default()).unwrap();
            coll
        });
    });
}

fn thermal_wind_inner_bench(c: &mut Criterion) {
    let coll = build_transect(12, 400);

    c.bench_function("thermal_wind_inner", |b| {
        b.iter(|| {
            coll.thermal_wind_inner(&ThermalWindOptions::default())
                .unwrap()
        });
    });
}
