//! Tag Codec Round Trips
//!
//! Pipelines written as LUT16, lutAtoB/lutBtoA and multiProcessElement tags
//! must evaluate the same after being read back, within the precision of the
//! encoding.

use cms_tests::patterns::random_u16;
use cms_tests::{PressSpec, press_profile, reparse};
use oxlink_core::icc::tags::{decode_tag, encode_tag};
use oxlink_core::icc::{TagValue, type_sig};
use oxlink_core::intent::{ChainStep, Intent, link_profiles};
use oxlink_core::pipeline::Clut;
use oxlink_core::transform::TransformFlags;
use oxlink_core::{Context, Error, Pipeline, Stage, ToneCurve};

fn random_clut(seed: u64, n_in: usize, points: u32, n_out: usize) -> Clut {
    let mut clut = Clut::uniform_u16(n_in, points, n_out).unwrap();
    let values = random_u16(seed, (points as usize).pow(n_in as u32) * n_out);
    let mut next = values.into_iter();
    clut.sample_16(false, |_, out| {
        for v in out.iter_mut() {
            *v = next.next().unwrap_or(0);
        }
        Ok(())
    })
    .unwrap();
    clut
}

fn roundtrip(ctx: &Context, type_signature: oxlink_core::icc::Signature, lut: &Pipeline) -> Pipeline {
    let bytes = encode_tag(ctx, type_signature, &TagValue::Pipeline(lut.clone())).unwrap();
    let (read_type, value) = decode_tag(ctx, &bytes).unwrap();
    assert_eq!(read_type, type_signature);
    value.into_pipeline().unwrap()
}

fn max_difference_f32(a: &Pipeline, b: &Pipeline, seed: u64) -> f32 {
    let n_in = a.input_channels();
    let n_out = a.output_channels();
    let samples = random_u16(seed, n_in * 500);
    let mut worst = 0f32;
    for input in samples.chunks_exact(n_in) {
        let input: Vec<f32> = input.iter().map(|&v| v as f32 / 65535.0).collect();
        let mut x = vec![0f32; n_out];
        let mut y = vec![0f32; n_out];
        a.eval_f32(&input, &mut x);
        b.eval_f32(&input, &mut y);
        for (p, q) in x.iter().zip(&y) {
            worst = worst.max((p - q).abs());
        }
    }
    worst
}

#[test]
fn test_lut16_is_exact_on_words() {
    let ctx = Context::new();
    let lut = Pipeline::from_stages([
        Stage::identity_curves(3).unwrap(),
        Stage::clut(random_clut(1, 3, 9, 4)),
        Stage::identity_curves(4).unwrap(),
    ])
    .unwrap();
    let back = roundtrip(&ctx, type_sig::LUT16, &lut);
    assert_eq!((back.input_channels(), back.output_channels()), (3, 4));

    for input in random_u16(2, 3 * 500).chunks_exact(3) {
        let mut a = [0u16; 4];
        let mut b = [0u16; 4];
        lut.eval_u16(input, &mut a);
        back.eval_u16(input, &mut b);
        for (x, y) in a.iter().zip(&b) {
            assert!((*x as i32 - *y as i32).abs() <= 1, "{input:?}: {a:?} vs {b:?}");
        }
    }
}

#[test]
fn test_lut_a_to_b_full_chain() {
    let ctx = Context::new();
    let matrix = [0.9, 0.05, 0.05, 0.1, 0.8, 0.1, 0.0, 0.2, 0.8];
    let lut = Pipeline::from_stages([
        Stage::curves(vec![ToneCurve::gamma(2.2); 3]).unwrap(),
        Stage::clut(random_clut(3, 3, 5, 3)),
        Stage::curves(vec![ToneCurve::gamma(1.0 / 1.8); 3]).unwrap(),
        Stage::matrix(3, 3, &matrix, Some(&[0.01, 0.0, -0.01])).unwrap(),
        Stage::identity_curves(3).unwrap(),
    ])
    .unwrap();
    let back = roundtrip(&ctx, type_sig::LUT_A_TO_B, &lut);
    let worst = max_difference_f32(&lut, &back, 4);
    assert!(worst < 5e-4, "max difference {worst}");
}

#[test]
fn test_lut_b_to_a_clut_only() {
    let ctx = Context::new();
    let lut = Pipeline::from_stages([
        Stage::identity_curves(3).unwrap(),
        Stage::clut(random_clut(5, 3, 17, 4)),
        Stage::identity_curves(4).unwrap(),
    ])
    .unwrap();
    let back = roundtrip(&ctx, type_sig::LUT_B_TO_A, &lut);
    let worst = max_difference_f32(&lut, &back, 6);
    assert!(worst <= 1.0 / 65535.0, "max difference {worst}");
}

#[test]
fn test_multi_process_elements() {
    let ctx = Context::new();
    let lut = Pipeline::from_stages([
        Stage::matrix(3, 3, &[0.5, 0.25, 0.25, 0.0, 1.0, 0.0, 0.125, 0.125, 0.75], Some(&[0.0, 0.1, 0.0]))
            .unwrap(),
        Stage::clut(random_clut(7, 3, 7, 3)),
    ])
    .unwrap();
    let back = roundtrip(&ctx, type_sig::MULTI_PROCESS_ELEMENT, &lut);
    let worst = max_difference_f32(&lut, &back, 8);
    assert!(worst < 1e-5, "max difference {worst}");
}

#[test]
fn test_wrong_shape_not_suitable() {
    let ctx = Context::new();
    let lut = Pipeline::from_stages([
        Stage::clut(random_clut(9, 3, 5, 3)),
        Stage::clut(random_clut(10, 3, 5, 3)),
    ])
    .unwrap();
    let err = encode_tag(&ctx, type_sig::LUT16, &TagValue::Pipeline(lut)).unwrap_err();
    assert!(matches!(err, Error::NotSuitable(_)));
}

#[test]
fn test_single_grid_point_rejected() {
    let ctx = Context::new();
    let lut = Pipeline::from_stages([
        Stage::identity_curves(3).unwrap(),
        Stage::clut(random_clut(11, 3, 2, 3)),
        Stage::identity_curves(3).unwrap(),
    ])
    .unwrap();
    let mut bytes = encode_tag(&ctx, type_sig::LUT16, &TagValue::Pipeline(lut)).unwrap();
    // type header, input and output channel counts, then the grid size
    bytes[10] = 1;
    assert_eq!(decode_tag(&ctx, &bytes).unwrap_err(), Error::InvalidGridPoints(1));
}

#[test]
fn test_truncated_tag_rejected() {
    let ctx = Context::new();
    let lut = Pipeline::from_stages([
        Stage::identity_curves(3).unwrap(),
        Stage::clut(random_clut(12, 3, 5, 3)),
        Stage::identity_curves(3).unwrap(),
    ])
    .unwrap();
    let bytes = encode_tag(&ctx, type_sig::LUT_A_TO_B, &TagValue::Pipeline(lut)).unwrap();
    assert!(decode_tag(&ctx, &bytes[..bytes.len() - 9]).is_err());
}

#[test]
fn test_reparsed_profile_links_the_same() {
    let ctx = Context::new();
    let press = press_profile(&ctx, &PressSpec::default()).unwrap();
    let back = reparse(&ctx, &press).unwrap();
    let lab = oxlink_core::Profile::lab_v4(&ctx).unwrap();

    let link = |p| {
        let steps = [
            ChainStep::new(p, Intent::PERCEPTUAL),
            ChainStep::new(&lab, Intent::PERCEPTUAL),
        ];
        link_profiles(&ctx, &steps, &TransformFlags::new()).unwrap()
    };
    let worst = max_difference_f32(&link(&press), &link(&back), 13);
    assert!(worst <= 1.0 / 65535.0, "max difference {worst}");
}
