//! Benchmarks for Corkboard geometry
//!
//! Measures the per-sample cost of:
//! - Pixel delta scaling
//! - Drag application (scale + round + clamp)
//! - Render percent mapping

use corkboard_geometry::{
    screen_delta_to_logical_delta, AnchorReconciler, ContainerSize, CoordinateTransformer,
    LogicalPoint, LogicalSpace, LogicalSpan, PixelDelta,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn bench_delta_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen_delta_to_logical_delta");

    for &width in &[320.0f64, 1280.0, 3840.0] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(width as u64), &width, |b, &w| {
            let container = ContainerSize::new(w, w * 0.75);
            b.iter(|| {
                screen_delta_to_logical_delta(
                    black_box(PixelDelta::new(37.5, -12.25)),
                    container,
                    LogicalSpan::square(520),
                )
            })
        });
    }
    group.finish();
}

fn bench_apply_drag(c: &mut Criterion) {
    let transformer = CoordinateTransformer::new(LogicalSpace::default()).expect("default space");
    let container = ContainerSize::new(1280.0, 960.0);

    c.bench_function("apply_drag", |b| {
        b.iter(|| {
            transformer.apply_drag(
                black_box(LogicalPoint::new(300, 200)),
                black_box(PixelDelta::new(2_000.0, -40.0)),
                container,
            )
        })
    });
}

fn bench_render_percent(c: &mut Criterion) {
    let transformer = CoordinateTransformer::new(LogicalSpace::default()).expect("default space");
    let reconciler = AnchorReconciler::default();
    let points: Vec<_> = (0..1_000).map(|i| LogicalPoint::new(i % 540, i / 2)).collect();

    let mut group = c.benchmark_group("render_board");
    group.throughput(Throughput::Elements(points.len() as u64));
    group.bench_function("1000_cards", |b| {
        b.iter(|| {
            for (i, point) in points.iter().enumerate() {
                black_box(transformer.render_percent(*point));
                black_box(reconciler.render_anchor(*point, i % 2 == 0));
            }
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_delta_scaling,
    bench_apply_drag,
    bench_render_percent,
);
criterion_main!(benches);
