use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use pointsort::{Detection, LeastSquaresPredictor, TrackRegistry};
use rand::prelude::*;
use rand_distr::Normal;
use rand_pcg::Pcg32;
use std::sync::Arc;

/// Targets laid out on a grid 100 pixels apart, each moving diagonally one pixel per frame.
fn make_frame(n: usize, frame: usize, rng: &mut Pcg32) -> Vec<Detection> {
    let jitter = Normal::<f32>::new(0.0, 0.5).unwrap();
    let columns = (n as f32).sqrt().ceil() as usize;
    (0..n)
        .map(|i| {
            let x = (i % columns) as f32 * 100.0 + frame as f32;
            let y = (i / columns) as f32 * 100.0 + frame as f32;
            Detection::new(x + jitter.sample(rng), y + jitter.sample(rng))
        })
        .collect()
}

fn warm_up(mut tracker: TrackRegistry, n: usize, rng: &mut Pcg32) -> TrackRegistry {
    for frame in 0..5 {
        tracker.track(&make_frame(n, frame, rng)).unwrap();
    }
    tracker
}

fn bench_tracker(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracker");

    for n in [10, 50, 200] {
        group.bench_function(format!("linear_{n}_targets"), |b| {
            let mut rng = Pcg32::seed_from_u64(0);
            b.iter_batched(
                || {
                    let tracker = warm_up(TrackRegistry::default(), n, &mut rng);
                    (tracker, make_frame(n, 5, &mut rng))
                },
                |(mut tracker, detections)| black_box(tracker.track(&detections).unwrap()),
                BatchSize::SmallInput,
            );
        });

        group.bench_function(format!("adaptive_{n}_targets"), |b| {
            let mut rng = Pcg32::seed_from_u64(0);
            b.iter_batched(
                || {
                    let tracker = TrackRegistry::adaptive(
                        Default::default(),
                        &Default::default(),
                        Arc::new(LeastSquaresPredictor),
                    )
                    .unwrap();
                    let tracker = warm_up(tracker, n, &mut rng);
                    (tracker, make_frame(n, 5, &mut rng))
                },
                |(mut tracker, detections)| black_box(tracker.track(&detections).unwrap()),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tracker);
criterion_main!(benches);
