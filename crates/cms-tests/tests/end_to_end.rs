//! End-to-end Transform Tests
//!
//! Whole chains from sRGB to the synthetic press and back, through the
//! linker and the pixel executor.

use cms_tests::patterns::{TestPattern, generate_pattern, sizes};
use cms_tests::{PressSpec, compare_lab_buffers, press_profile};
use oxlink_core::icc::Profile;
use oxlink_core::intent::{ChainStep, Intent, link_profiles};
use oxlink_core::transform::{PixelFormat, Transform, TransformFlags};
use oxlink_core::{ColorSpace, Context};

#[test]
fn test_srgb_to_press_white_has_no_ink() {
    let ctx = Context::new();
    let srgb = Profile::srgb(&ctx).unwrap();
    let press = press_profile(&ctx, &PressSpec::default()).unwrap();

    let steps = [
        ChainStep::new(&srgb, Intent::RELATIVE_COLORIMETRIC),
        ChainStep::new(&press, Intent::RELATIVE_COLORIMETRIC).with_bpc(true),
    ];
    let lut = link_profiles(&ctx, &steps, &TransformFlags::new()).unwrap();
    assert_eq!((lut.input_channels(), lut.output_channels()), (3, 4));

    let mut cmyk = [0f32; 4];
    lut.eval_f32(&[1.0, 1.0, 1.0], &mut cmyk);
    for v in &cmyk[..3] {
        assert!(v.abs() < 0.01, "white carries ink: {cmyk:?}");
    }
}

#[test]
fn test_srgb_to_press_pixels() {
    let ctx = Context::new();
    let srgb = Profile::srgb(&ctx).unwrap();
    let press = press_profile(&ctx, &PressSpec::default()).unwrap();
    let xform = Transform::create(
        &ctx,
        &srgb,
        PixelFormat::RGB_8,
        &press,
        PixelFormat::CMYK_8,
        Intent::RELATIVE_COLORIMETRIC,
        TransformFlags::new().with_bpc(),
    )
    .unwrap();
    assert_eq!(xform.entry_space(), ColorSpace::Rgb);
    assert_eq!(xform.exit_space(), ColorSpace::Cmyk);

    let src = [255u8, 255, 255, 0, 0, 0];
    let mut dst = [0u8; 8];
    xform.transform(&src, &mut dst, 2).unwrap();
    assert!(dst[..4].iter().all(|&v| v <= 1), "white: {:?}", &dst[..4]);
    assert!(dst[7] > 200, "black without K: {:?}", &dst[4..]);
}

#[test]
fn test_press_roundtrip_keeps_grays() {
    let ctx = Context::new();
    let srgb = Profile::srgb(&ctx).unwrap();
    let lab = Profile::lab_v4(&ctx).unwrap();
    let press = press_profile(&ctx, &PressSpec::default()).unwrap();

    let (w, h) = sizes::TINY;
    let grays = generate_pattern(TestPattern::Grayscale, w, h);

    let direct = Transform::create(
        &ctx,
        &srgb,
        PixelFormat::RGB_8,
        &lab,
        PixelFormat::LAB_DBL,
        Intent::RELATIVE_COLORIMETRIC,
        TransformFlags::new(),
    )
    .unwrap();
    let through_press = Transform::multiprofile(
        &ctx,
        &[&srgb, &press, &press, &lab],
        PixelFormat::RGB_8,
        PixelFormat::LAB_DBL,
        Intent::RELATIVE_COLORIMETRIC,
        TransformFlags::new(),
    )
    .unwrap();

    let mut expected = vec![0f64; w * h * 3];
    let mut actual = vec![0f64; w * h * 3];
    direct.transform_typed(&grays, &mut expected, w * h).unwrap();
    through_press.transform_typed(&grays, &mut actual, w * h).unwrap();

    // The press paper is darker than sRGB black, so only mid and light grays
    // survive unchanged.
    let keep: Vec<usize> = (0..w * h).filter(|&i| expected[i * 3] > 30.0).collect();
    let pick = |buf: &[f64]| -> Vec<f64> {
        keep.iter().flat_map(|&i| buf[i * 3..i * 3 + 3].to_vec()).collect()
    };
    let stats = compare_lab_buffers(&pick(&expected), &pick(&actual));
    assert!(stats.is_acceptable(), "{stats:?}");
}

#[test]
fn test_ink_limiting_link_appended() {
    let ctx = Context::new();
    let srgb = Profile::srgb(&ctx).unwrap();
    let press = press_profile(&ctx, &PressSpec::default()).unwrap();
    let limit = Profile::ink_limiting_device_link(&ctx, ColorSpace::Cmyk, 220.0).unwrap();

    let xform = Transform::multiprofile(
        &ctx,
        &[&srgb, &press, &limit],
        PixelFormat::RGB_16,
        PixelFormat::CMYK_16,
        Intent::PERCEPTUAL,
        TransformFlags::new(),
    )
    .unwrap();

    let src: Vec<u16> = generate_pattern(TestPattern::Random(11), 32, 4)
        .into_iter()
        .map(|v| v as u16 * 257)
        .collect();
    let mut dst = vec![0u16; 32 * 4 * 4];
    xform.transform_typed(&src, &mut dst, 32 * 4).unwrap();
    for pixel in dst.chunks_exact(4) {
        let total: f64 = pixel.iter().map(|&v| v as f64 / 655.35).sum();
        assert!(total <= 225.0, "{total}% ink in {pixel:?}");
    }
}

#[test]
fn test_absolute_intent_keeps_paper_white() {
    let ctx = Context::new();
    let lab = Profile::lab_v4(&ctx).unwrap();
    let press = press_profile(&ctx, &PressSpec::default()).unwrap();
    let xform = Transform::create(
        &ctx,
        &press,
        PixelFormat::CMYK_DBL,
        &lab,
        PixelFormat::LAB_DBL,
        Intent::ABSOLUTE_COLORIMETRIC,
        TransformFlags::new(),
    )
    .unwrap();
    let mut out = [0f64; 3];
    xform.transform_typed(&[0f64; 4], &mut out, 1).unwrap();
    assert!((out[0] - 100.0).abs() < 0.5, "{out:?}");
}

#[test]
fn test_wrong_format_rejected() {
    let ctx = Context::new();
    let srgb = Profile::srgb(&ctx).unwrap();
    let press = press_profile(&ctx, &PressSpec::default()).unwrap();
    let result = Transform::create(
        &ctx,
        &srgb,
        PixelFormat::RGB_8,
        &press,
        PixelFormat::RGB_8,
        Intent::PERCEPTUAL,
        TransformFlags::new(),
    );
    assert!(result.is_err());
}
