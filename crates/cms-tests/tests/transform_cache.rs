//! Cache and Scheduling Tests
//!
//! The single-pixel cache and the parallel scheduler are optimizations only:
//! every path must write the same output.

use std::sync::Arc;

use cms_tests::patterns::{TestPattern, generate_pattern, sizes};
use cms_tests::{PressSpec, press_profile};
use oxlink_core::icc::Profile;
use oxlink_core::intent::Intent;
use oxlink_core::transform::{
    ParallelScheduler, PixelFormat, RayonScheduler, Transform, TransformFlags, WorkSlice,
};
use oxlink_core::Context;

fn to_press(ctx: &Context, flags: TransformFlags) -> Transform {
    let srgb = Profile::srgb(ctx).unwrap();
    let press = press_profile(ctx, &PressSpec::default()).unwrap();
    Transform::create(
        ctx,
        &srgb,
        PixelFormat::RGB_8,
        &press,
        PixelFormat::CMYK_16,
        Intent::PERCEPTUAL,
        flags,
    )
    .unwrap()
}

fn run(xform: &Transform, src: &[u8]) -> Vec<u16> {
    let pixels = src.len() / 3;
    let mut dst = vec![0u16; pixels * 4];
    xform.transform_typed(src, &mut dst, pixels).unwrap();
    dst
}

#[test]
fn test_cached_equals_uncached() {
    let ctx = Context::new();
    let cached = to_press(&ctx, TransformFlags::new());
    let uncached = to_press(&ctx, TransformFlags::new().with_no_cache());
    assert!(!cached.flags().no_cache);

    let (w, h) = sizes::SMALL;
    for pattern in [
        TestPattern::Runs(3),
        TestPattern::Random(4),
        TestPattern::ColorCube,
        TestPattern::Black,
    ] {
        let src = generate_pattern(pattern, w, h);
        assert_eq!(run(&cached, &src), run(&uncached, &src), "{pattern:?}");
    }
}

#[test]
fn test_repeated_calls_are_deterministic() {
    let ctx = Context::new();
    let xform = to_press(&ctx, TransformFlags::new());
    let src = generate_pattern(TestPattern::Random(5), 16, 16);
    assert_eq!(run(&xform, &src), run(&xform, &src));
}

#[test]
fn test_rayon_matches_inline() {
    let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
    let scheduler = Arc::new(RayonScheduler::with_pool(Arc::new(pool)));
    let ctx = Context::new();
    let threaded_ctx = ctx.derive().with_scheduler(scheduler);

    let inline = to_press(&ctx, TransformFlags::new());
    let threaded = to_press(&threaded_ctx, TransformFlags::new());
    assert!(threaded.flags().no_cache);

    let (w, h) = sizes::MEDIUM;
    let src = generate_pattern(TestPattern::Random(6), w, h);
    assert_eq!(run(&inline, &src), run(&threaded, &src));
}

/// Runs slices in reverse on the calling thread and counts them
struct Reversed {
    workers: usize,
    seen: std::sync::atomic::AtomicUsize,
}

impl ParallelScheduler for Reversed {
    fn max_workers(&self) -> usize {
        self.workers
    }

    fn run(&self, slices: Vec<WorkSlice<'_>>, worker: &(dyn Fn(WorkSlice<'_>) + Sync)) {
        for slice in slices.into_iter().rev() {
            self.seen.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            worker(slice);
        }
    }
}

#[test]
fn test_custom_scheduler_sees_every_slice() {
    let scheduler = Arc::new(Reversed {
        workers: 3,
        seen: Default::default(),
    });
    let ctx = Context::new().with_scheduler(scheduler.clone());
    let xform = to_press(&ctx, TransformFlags::new());
    let reference = to_press(&Context::new(), TransformFlags::new().with_no_cache());

    let (w, h) = (10, 7);
    let src = generate_pattern(TestPattern::GradientH, w, h);
    let mut bytes = vec![0u8; w * h * 8];
    xform
        .transform_lines(&src, &mut bytes, w, h, w * 3, w * 8)
        .unwrap();
    let dst: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|b| u16::from_ne_bytes([b[0], b[1]]))
        .collect();
    assert_eq!(scheduler.seen.load(std::sync::atomic::Ordering::Relaxed), 3);
    assert_eq!(dst, run(&reference, &src));
}

