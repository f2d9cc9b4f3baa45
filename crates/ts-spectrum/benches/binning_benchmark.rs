use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use ts_spectrum::{
    AnomalyLog, ColumnDensityGrid, FluorescentLine, LogAxis, PhotonObservation, PhotonType, SpectraBuilder,
    SpectrumCount, TorusGeometry,
};

fn photons(n: usize) -> Vec<PhotonObservation> {
    (0..n)
        .map(|i| {
            let energy = 100.0 * 3000f64.powf((i % 997) as f64 / 997.0);
            let ty = PhotonType::ALL[i % 4];
            let line = if ty == PhotonType::Fluorescent { FluorescentLine::FeKalpha } else { FluorescentLine::None };
            PhotonObservation::new(energy, 0.0, (i % 157) as f64 / 100.0, ty, line, 1, (i % 31) as f64 * 0.1)
                .unwrap()
        })
        .collect()
}

fn bench_count_photon(c: &mut Criterion) {
    let axis = LogAxis::new(100.0, 300_000.0, 2000).unwrap();
    let energies: Vec<f64> = photons(10_000).iter().map(|p| p.energy()).collect();

    c.bench_function("count_photon_10k", |b| {
        b.iter(|| {
            let mut s = SpectrumCount::build_log_empty(&axis);
            let mut log = AnomalyLog::new();
            for &e in &energies {
                s.count_photon(black_box(e), &mut log, None).unwrap();
            }
            black_box(s.total())
        })
    });
}

fn bench_register(c: &mut Criterion) {
    let axis = LogAxis::new(100.0, 300_000.0, 2000).unwrap();
    let grid = ColumnDensityGrid::build(1e22, 2e24, 30).unwrap();
    let geometry = TorusGeometry::new(0.0, 1.0, 1.0, 1e23).unwrap();
    let viewing = ts_core::ViewingInterval::new(0.0, 90.0).unwrap();

    let mut group = c.benchmark_group("register");
    for n in [1_000usize, 10_000, 100_000] {
        let input = photons(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &input, |b, input| {
            b.iter(|| {
                let mut builder = SpectraBuilder::new(axis, grid.clone(), &geometry, viewing).unwrap();
                for p in input {
                    builder.register(black_box(p)).unwrap();
                }
                black_box(builder.finish().stats().accepted)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_count_photon, bench_register);
criterion_main!(benches);
