//! Transform Benchmarks
//!
//! Batch kernels, pipeline evaluation and whole-buffer transforms.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oxlink_core::icc::Profile;
use oxlink_core::intent::{ChainStep, Intent, link_profiles};
use oxlink_core::simd;
use oxlink_core::transform::{PixelFormat, Transform, TransformFlags};
use oxlink_core::Context;

fn generate_rgb8_data(count: usize) -> Vec<u8> {
    (0..count * 3).map(|i| ((i * 37) % 256) as u8).collect()
}

fn generate_rgb16_data(count: usize) -> Vec<u16> {
    (0..count * 3).map(|i| ((i * 4099) % 65536) as u16).collect()
}

// ============================================================================
// Batch Kernels
// ============================================================================

fn bench_widen_narrow(c: &mut Criterion) {
    let mut group = c.benchmark_group("widen_narrow");

    for size in [1000, 10000, 100000].iter() {
        let bytes = generate_rgb8_data(*size);
        let mut words = vec![0u16; bytes.len()];
        let mut back = vec![0u8; bytes.len()];

        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("widen", size), size, |b, _| {
            b.iter(|| simd::widen_u8_to_u16(black_box(&bytes), black_box(&mut words)))
        });

        group.bench_with_input(BenchmarkId::new("narrow", size), size, |b, _| {
            b.iter(|| simd::narrow_u16_to_u8(black_box(&words), black_box(&mut back)))
        });
    }

    group.finish();
}

// ============================================================================
// Pipeline Evaluation
// ============================================================================

fn bench_pipeline_eval(c: &mut Criterion) {
    let ctx = Context::new();
    let srgb = Profile::srgb(&ctx).unwrap();
    let lab = Profile::lab_v4(&ctx).unwrap();
    let steps = [
        ChainStep::new(&srgb, Intent::PERCEPTUAL),
        ChainStep::new(&lab, Intent::PERCEPTUAL),
    ];
    let lut = link_profiles(&ctx, &steps, &TransformFlags::new()).unwrap();

    let mut group = c.benchmark_group("pipeline_eval");
    let input = generate_rgb16_data(10000);
    let mut output = vec![0u16; input.len()];
    group.throughput(Throughput::Elements(10000));

    group.bench_function("srgb_to_lab_u16", |b| {
        b.iter(|| {
            for (i, o) in input.chunks_exact(3).zip(output.chunks_exact_mut(3)) {
                lut.eval_u16(black_box(i), o);
            }
        })
    });

    let floats: Vec<f32> = input.iter().map(|&v| v as f32 / 65535.0).collect();
    let mut out_f = vec![0f32; floats.len()];
    group.bench_function("srgb_to_lab_f32", |b| {
        b.iter(|| {
            for (i, o) in floats.chunks_exact(3).zip(out_f.chunks_exact_mut(3)) {
                lut.eval_f32(black_box(i), o);
            }
        })
    });

    group.finish();
}

// ============================================================================
// Whole Transforms
// ============================================================================

fn bench_transform(c: &mut Criterion) {
    let ctx = Context::new();
    let srgb = Profile::srgb(&ctx).unwrap();
    let lab = Profile::lab_v4(&ctx).unwrap();

    let mut group = c.benchmark_group("transform_rgb8_to_lab16");

    for (name, flags) in [
        ("precalc", TransformFlags::new()),
        ("no_cache", TransformFlags::new().with_no_cache()),
        ("no_optimize", TransformFlags::new().with_no_optimize()),
    ] {
        let xform = Transform::create(
            &ctx,
            &srgb,
            PixelFormat::RGB_8,
            &lab,
            PixelFormat::LAB_16,
            Intent::PERCEPTUAL,
            flags,
        )
        .unwrap();

        for size in [1000, 100000].iter() {
            let input = generate_rgb8_data(*size);
            let mut output = vec![0u16; size * 3];
            group.throughput(Throughput::Elements(*size as u64));
            group.bench_with_input(BenchmarkId::new(name, size), size, |b, &n| {
                b.iter(|| {
                    xform
                        .transform_typed(black_box(&input), black_box(&mut output), n)
                        .unwrap()
                })
            });
        }
    }

    group.finish();
}

#[cfg(feature = "parallel")]
fn bench_parallel(c: &mut Criterion) {
    use std::sync::Arc;
    use oxlink_core::transform::RayonScheduler;

    let ctx = Context::new().with_scheduler(Arc::new(RayonScheduler::new()));
    let srgb = Profile::srgb(&ctx).unwrap();
    let xform = Transform::create(
        &ctx,
        &srgb,
        PixelFormat::RGB_8,
        &srgb,
        PixelFormat::RGB_8,
        Intent::PERCEPTUAL,
        TransformFlags::new(),
    )
    .unwrap();

    let (width, height) = (1024, 256);
    let input = generate_rgb8_data(width * height);
    let mut output = vec![0u8; input.len()];

    let mut group = c.benchmark_group("parallel");
    group.throughput(Throughput::Elements((width * height) as u64));
    group.bench_function("rayon_lines", |b| {
        b.iter(|| {
            xform
                .transform_lines(
                    black_box(&input),
                    black_box(&mut output),
                    width,
                    height,
                    width * 3,
                    width * 3,
                )
                .unwrap()
        })
    });
    group.finish();
}

#[cfg(not(feature = "parallel"))]
fn bench_parallel(_c: &mut Criterion) {}

criterion_group!(
    benches,
    bench_widen_narrow,
    bench_pipeline_eval,
    bench_transform,
    bench_parallel,
);
criterion_main!(benches);
