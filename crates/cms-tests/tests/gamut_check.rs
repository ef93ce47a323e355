//! Gamut Check Tests
//!
//! Proofing transforms replace colors the proofing press cannot print with
//! the context alarm codes.

use cms_tests::patterns::{TestPattern, generate_pattern};
use cms_tests::{PressSpec, press_profile};
use oxlink_core::icc::Profile;
use oxlink_core::intent::{ChainStep, Intent, create_gamut_check_pipeline};
use oxlink_core::transform::{PixelFormat, Transform, TransformFlags};
use oxlink_core::{Context, MAX_CHANNELS};

fn alarm_context() -> Context {
    let mut codes = [0u16; MAX_CHANNELS];
    codes[..3].copy_from_slice(&[0xffff, 0, 0xffff]);
    Context::new().with_alarm_codes(codes)
}

fn proofing(ctx: &Context, format: PixelFormat, flags: TransformFlags) -> Transform {
    let srgb = Profile::srgb(ctx).unwrap();
    let press = press_profile(ctx, &PressSpec::default()).unwrap();
    Transform::proofing(
        ctx,
        &srgb,
        format,
        &srgb,
        format,
        &press,
        Intent::PERCEPTUAL,
        Intent::RELATIVE_COLORIMETRIC,
        flags,
    )
    .unwrap()
}

#[test]
fn test_saturated_primaries_alarm() {
    let ctx = alarm_context();
    let xform = proofing(&ctx, PixelFormat::RGB_8, TransformFlags::new().with_gamut_check());

    let src = generate_pattern(TestPattern::GamutBoundary, 8, 1);
    let mut dst = vec![0u8; src.len()];
    xform.transform(&src, &mut dst, 8).unwrap();
    // the paper floor keeps pure red and blue off the press
    assert_eq!(&dst[..3], &[255, 0, 255]);
    assert_eq!(&dst[6..9], &[255, 0, 255]);
}

#[test]
fn test_grays_pass() {
    let ctx = alarm_context();
    let xform = proofing(&ctx, PixelFormat::RGB_8, TransformFlags::new().with_gamut_check());

    let src: Vec<u8> = [96u8, 128, 160, 200].iter().flat_map(|&v| [v; 3]).collect();
    let mut dst = vec![0u8; src.len()];
    xform.transform(&src, &mut dst, 4).unwrap();
    for (s, d) in src.chunks_exact(3).zip(dst.chunks_exact(3)) {
        assert_ne!(d, &[255, 0, 255], "gray {s:?} flagged");
        assert!((d[0] as i32 - d[1] as i32).abs() <= 2, "gray {s:?} tinted: {d:?}");
    }
}

#[test]
fn test_no_alarm_without_flag() {
    let ctx = alarm_context();
    let xform = proofing(&ctx, PixelFormat::RGB_8, TransformFlags::new());
    let mut dst = [0u8; 3];
    xform.transform(&[255, 0, 0], &mut dst, 1).unwrap();
    assert_ne!(dst, [255, 0, 255]);
}

#[test]
fn test_float_alarm() {
    let ctx = alarm_context();
    let xform = proofing(&ctx, PixelFormat::RGB_FLT, TransformFlags::new().with_gamut_check());
    let mut dst = [0f32; 3];
    xform.transform_typed(&[1f32, 0.0, 0.0], &mut dst, 1).unwrap();
    assert_eq!(dst, [1.0, 0.0, 1.0]);
}

#[test]
fn test_soft_proof_chain() {
    let ctx = Context::new();
    let xform = proofing(&ctx, PixelFormat::RGB_16, TransformFlags::new().with_soft_proofing());
    let mut dst = [0u16; 3];
    xform.transform_typed(&[0xffffu16, 0, 0], &mut dst, 1).unwrap();
    // the press cannot reach sRGB red, so the proof is duller
    assert!(dst[0] < 0xff00 || dst[1] > 0x0100 || dst[2] > 0x0100, "{dst:?}");
}

#[test]
fn test_gamut_pipeline_marks_red() {
    let ctx = Context::new();
    let srgb = Profile::srgb(&ctx).unwrap();
    let press = press_profile(&ctx, &PressSpec::default()).unwrap();
    let steps = [ChainStep::new(&srgb, Intent::RELATIVE_COLORIMETRIC)];
    let gamut = create_gamut_check_pipeline(&ctx, &steps, 1, &press).unwrap();
    assert_eq!((gamut.input_channels(), gamut.output_channels()), (3, 1));

    let mut out = [0u16; 1];
    gamut.eval_u16(&[0x8000, 0x8000, 0x8000], &mut out);
    assert_eq!(out[0], 0);
    gamut.eval_u16(&[0xffff, 0, 0], &mut out);
    assert!(out[0] >= 1);
}
