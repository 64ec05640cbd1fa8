use std::hint::black_box;

use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use mosaic_backend::algorithms::coverage::CoverageEstimator;
use mosaic_backend::algorithms::greedy::build_mosaics;
use mosaic_backend::config::OptimizerConfig;
use mosaic_backend::core::domain::{Aoi, Scene};
use mosaic_backend::core::geometry::multipolygon_from_coords;
use mosaic_backend::preprocessing::score_catalog;

fn aoi() -> Aoi {
    Aoi::new(
        Some("bench".into()),
        multipolygon_from_coords(&[vec![vec![[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]]]]),
    )
    .unwrap()
}

/// Tiles of 30 × 30 on a 20-unit pitch, one acquisition date per column.
fn grid_catalog(side: usize) -> Vec<Scene> {
    let base = Utc.with_ymd_and_hms(2023, 6, 1, 10, 0, 0).unwrap();
    let mut scenes = Vec::with_capacity(side * side);
    for col in 0..side {
        for row in 0..side {
            let x0 = col as f64 * 20.0;
            let y0 = row as f64 * 20.0;
            scenes.push(Scene {
                id: format!("t{:02}_{:02}", col, row),
                acquired: base + Duration::days((col * 3) as i64),
                footprint: multipolygon_from_coords(&[vec![vec![
                    [x0, y0],
                    [x0 + 30.0, y0],
                    [x0 + 30.0, y0 + 30.0],
                    [x0, y0 + 30.0],
                ]]]),
                valid_pixel_fraction: 0.95,
                cloud_fraction: ((col + row) % 4) as f64 * 0.05,
            });
        }
    }
    scenes
}

fn bench_greedy(c: &mut Criterion) {
    let mut group = c.benchmark_group("greedy");
    let config = OptimizerConfig::default();
    let aoi = aoi();

    for side in [3usize, 5] {
        let scored = score_catalog(grid_catalog(side), &aoi, config.scoring.central_threshold).scored;
        group.bench_with_input(BenchmarkId::new("build_mosaics", side * side), &scored, |b, scored| {
            b.iter(|| black_box(build_mosaics(black_box(scored), &aoi, &config.greedy)));
        });
    }

    group.finish();
}

fn bench_estimator(c: &mut Criterion) {
    let mut group = c.benchmark_group("coverage_estimator");
    let config = OptimizerConfig::default();
    let aoi = aoi();

    for side in [3usize, 5] {
        let scored = score_catalog(grid_catalog(side), &aoi, config.scoring.central_threshold).scored;
        let mosaics = build_mosaics(&scored, &aoi, &config.greedy).mosaics;
        let estimator = CoverageEstimator::new(&aoi, &scored);
        group.bench_with_input(BenchmarkId::new("estimate", side * side), &mosaics, |b, mosaics| {
            b.iter(|| black_box(estimator.estimate(black_box(mosaics)).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_greedy, bench_estimator);
criterion_main!(benches);
