//! Benchmarks for the per-pixel background segmentation loop, the ~40%
//! budget item of the core (spec.md §2).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use fallwatch_core::{BackgroundModel, Frame};

fn checkerboard(w: usize, h: usize) -> Frame {
    let mut f = Frame::zeroed(w, h);
    for y in 0..h {
        for x in 0..w {
            let v = if (x + y) % 2 == 0 { 200 } else { 40 };
            f.set_pixel(x, y, [v, v, v]);
        }
    }
    f
}

fn bench_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment");

    for &(w, h) in &[(160usize, 120usize), (320, 240), (640, 480)] {
        let frame = checkerboard(w, h);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{w}x{h}")), &frame, |b, frame| {
            b.iter_with_setup(
                || BackgroundModel::new(w, h, 20, 20, 2, 6, 1),
                |mut model| {
                    let mask = model.segment(black_box(frame));
                    black_box(mask)
                },
            );
        });
    }

    group.finish();
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");

    for &(w, h) in &[(160usize, 120usize), (320, 240)] {
        let frame = checkerboard(w, h);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{w}x{h}")), &frame, |b, frame| {
            b.iter_with_setup(
                || {
                    let mut model = BackgroundModel::new(w, h, 20, 20, 2, 6, 1);
                    let mask = model.segment(frame);
                    (model, mask)
                },
                |(mut model, mask)| {
                    model.update(black_box(frame), black_box(&mask));
                    black_box(model)
                },
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_segment, bench_update);
criterion_main!(benches);
