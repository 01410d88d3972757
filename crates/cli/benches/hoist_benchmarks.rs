//! Hoisting benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use cli::{sample, DemoConfig, FrameRenderer};
use common::geometry::{Rect, Transform};
use gpu::StaticGlInterface;
use hoister::RecordingPainter;

fn renderer(config: DemoConfig) -> FrameRenderer {
    match FrameRenderer::new(config, &StaticGlInterface::headless()) {
        Ok(renderer) => renderer,
        Err(err) => panic!("headless renderer: {err}"),
    }
}

/// Benchmark scene traversal alone.
fn bench_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("traversal");
    let viewport = Rect::new(0.0, 0.0, 1280.0, 720.0);

    for copies in [4u32, 32, 256] {
        let scene = sample::demo_scene(1280, 720, copies);
        group.bench_with_input(BenchmarkId::from_parameter(copies), &scene, |b, scene| {
            b.iter(|| {
                let mut visits = 0usize;
                scene.visit_layers(&viewport, &Transform::identity(), &mut |_| visits += 1);
                black_box(visits)
            })
        });
    }

    group.finish();
}

/// Benchmark a steady-state frame where every layer is recycled.
fn bench_recycled_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("recycled_frame");

    for copies in [4u32, 32, 256] {
        let renderer = renderer(DemoConfig::default());
        let scene = sample::demo_scene(1280, 720, copies);
        let mut painter = RecordingPainter::new();
        renderer.render_frame(&scene, &mut painter);

        group.bench_with_input(BenchmarkId::from_parameter(copies), &scene, |b, scene| {
            b.iter(|| {
                painter.clear();
                black_box(renderer.render_frame(scene, &mut painter))
            })
        });
    }

    group.finish();
}

/// Benchmark frames where every layer is new.
fn bench_cold_frame(c: &mut Criterion) {
    c.bench_function("cold_frame", |b| {
        let renderer = renderer(DemoConfig::default());
        let mut painter = RecordingPainter::new();
        b.iter(|| {
            // Fresh sub-scenes each time, so nothing is cached.
            let scene = sample::demo_scene(1280, 720, 8);
            painter.clear();
            let report = renderer.render_frame(&scene, &mut painter);
            renderer.cache().purge_unlocked();
            black_box(report)
        })
    });
}

criterion_group!(benches, bench_traversal, bench_recycled_frame, bench_cold_frame);
criterion_main!(benches);
