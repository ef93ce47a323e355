//! Per-profile LUT loading
//!
//! Each loader returns the pipeline one profile contributes to a chain in a
//! given direction, in the normalized float encoding every stage works in.
//! Float (MPE) tags take precedence over the 16-bit ones. Profiles without
//! LUTs fall back to their matrix-shaper or gray TRC description.

use tracing::{debug, warn};

use crate::color::{D50, MAX_ENCODEABLE_XYZ};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::icc::{ColorSpace, ProfileClass, Profile, Signature, TagValue, tag, type_sig};
use crate::math::{InterpolationMode, Matrix3x3};
use crate::pipeline::{NamedColorOutput, Pipeline, Stage, StageKind, StagePosition, ToneCurve};

use super::Intent;

const DEVICE_TO_PCS_16: [Signature; 4] = [tag::A2B0, tag::A2B1, tag::A2B2, tag::A2B1];
const DEVICE_TO_PCS_FLOAT: [Signature; 4] = [tag::D2B0, tag::D2B1, tag::D2B2, tag::D2B3];
const PCS_TO_DEVICE_16: [Signature; 4] = [tag::B2A0, tag::B2A1, tag::B2A2, tag::B2A1];
const PCS_TO_DEVICE_FLOAT: [Signature; 4] = [tag::B2D0, tag::B2D1, tag::B2D2, tag::B2D3];

/// Lab a*/b* neutral in the 16-bit encoding
const LAB_NEUTRAL_AB: u16 = 0x8080;

fn read_pipeline(ctx: &Context, profile: &Profile, sig: Signature) -> Result<Pipeline> {
    profile
        .read_tag(ctx, sig)?
        .into_pipeline()
        .ok_or_else(|| ctx.signal(Error::Corrupted(format!("tag '{sig}' is not a LUT"))))
}

fn read_curve(ctx: &Context, profile: &Profile, sig: Signature) -> Result<ToneCurve> {
    match profile.read_tag(ctx, sig)? {
        TagValue::Curve(curve) => Ok(curve),
        _ => Err(ctx.signal(Error::Corrupted(format!("tag '{sig}' is not a curve")))),
    }
}

fn read_named_colors(ctx: &Context, profile: &Profile, output: NamedColorOutput) -> Result<Stage> {
    match profile.read_tag(ctx, tag::NAMED_COLOR2)? {
        TagValue::NamedColors(list) => Stage::named_color(list, output),
        _ => Err(ctx.signal(Error::Corrupted("'ncl2' is not a named color list".into()))),
    }
}

/// Table index for an ICC intent; other intents use the perceptual tags
fn intent_index(intent: Intent) -> usize {
    if intent.is_icc() { intent.0 as usize } else { 0 }
}

fn use_trilinear(lut: &mut Pipeline) {
    for stage in lut.stages_mut() {
        if let StageKind::Clut(clut) = stage.kind_mut() {
            clut.set_interpolation(InterpolationMode::Trilinear);
        }
    }
}

fn colorant_matrix(ctx: &Context, profile: &Profile) -> Result<Matrix3x3> {
    let mut m = Matrix3x3::identity();
    let tags = [tag::RED_COLORANT, tag::GREEN_COLORANT, tag::BLUE_COLORANT];
    for (col, sig) in tags.into_iter().enumerate() {
        let xyz = match profile.read_tag(ctx, sig)? {
            TagValue::Xyz(xyz) => xyz,
            _ => return Err(ctx.signal(Error::Corrupted(format!("tag '{sig}' is not XYZ")))),
        };
        m.m[0][col] = xyz.x;
        m.m[1][col] = xyz.y;
        m.m[2][col] = xyz.z;
    }
    Ok(m)
}

fn rgb_curves(ctx: &Context, profile: &Profile) -> Result<Vec<ToneCurve>> {
    [tag::RED_TRC, tag::GREEN_TRC, tag::BLUE_TRC]
        .into_iter()
        .map(|sig| read_curve(ctx, profile, sig))
        .collect()
}

fn gray_input(ctx: &Context, profile: &Profile) -> Result<Pipeline> {
    let trc = read_curve(ctx, profile, tag::GRAY_TRC)?;
    match profile.pcs() {
        ColorSpace::Lab => {
            let neutral = ToneCurve::from_table16(vec![LAB_NEUTRAL_AB; 2])?;
            Pipeline::from_stages([
                Stage::matrix(3, 1, &[1.0, 1.0, 1.0], None)?,
                Stage::curves(vec![trc, neutral.clone(), neutral])?,
            ])
        }
        _ => {
            let k = 1.0 / MAX_ENCODEABLE_XYZ;
            Pipeline::from_stages([
                Stage::curves(vec![trc])?,
                Stage::matrix(3, 1, &[D50.x * k, D50.y * k, D50.z * k], None)?,
            ])
        }
    }
}

fn rgb_input(ctx: &Context, profile: &Profile) -> Result<Pipeline> {
    let k = 1.0 / MAX_ENCODEABLE_XYZ;
    let m = colorant_matrix(ctx, profile)?;
    let scaled: Vec<f64> = m.to_flat().iter().map(|v| v * k).collect();
    let mut lut = Pipeline::from_stages([
        Stage::curves(rgb_curves(ctx, profile)?)?,
        Stage::matrix(3, 3, &scaled, None)?,
    ])?;
    if profile.pcs() == ColorSpace::Lab {
        lut.insert_stage(StagePosition::End, Stage::xyz_to_lab())?;
    }
    Ok(lut)
}

fn gray_output(ctx: &Context, profile: &Profile) -> Result<Pipeline> {
    let trc = read_curve(ctx, profile, tag::GRAY_TRC)?.reverse();
    let pick = match profile.pcs() {
        ColorSpace::Lab => [1.0, 0.0, 0.0],
        _ => [0.0, MAX_ENCODEABLE_XYZ / D50.y, 0.0],
    };
    Pipeline::from_stages([Stage::matrix(1, 3, &pick, None)?, Stage::curves(vec![trc])?])
}

fn rgb_output(ctx: &Context, profile: &Profile) -> Result<Pipeline> {
    let inv = colorant_matrix(ctx, profile)?
        .inverse()
        .ok_or_else(|| ctx.signal(Error::SingularMatrix))?;
    let scaled: Vec<f64> = inv.to_flat().iter().map(|v| v * MAX_ENCODEABLE_XYZ).collect();
    let curves = rgb_curves(ctx, profile)?
        .iter()
        .map(ToneCurve::reverse)
        .collect();

    let mut lut = Pipeline::empty();
    if profile.pcs() == ColorSpace::Lab {
        lut.insert_stage(StagePosition::End, Stage::lab_to_xyz())?;
    }
    lut.insert_stage(StagePosition::End, Stage::matrix(3, 3, &scaled, None)?)?;
    lut.insert_stage(StagePosition::End, Stage::curves(curves)?)?;
    Ok(lut)
}

/// Float tags carry real units; wrap them in normalizations on both sides
fn normalize_float(lut: &mut Pipeline, entry: ColorSpace, exit: ColorSpace) -> Result<()> {
    match entry {
        ColorSpace::Lab => lut.insert_stage(StagePosition::Begin, Stage::normalize_to_lab_float())?,
        ColorSpace::Xyz => lut.insert_stage(StagePosition::Begin, Stage::normalize_to_xyz_float())?,
        _ => {}
    }
    match exit {
        ColorSpace::Lab => lut.insert_stage(StagePosition::End, Stage::normalize_from_lab_float())?,
        ColorSpace::Xyz => lut.insert_stage(StagePosition::End, Stage::normalize_from_xyz_float())?,
        _ => {}
    }
    Ok(())
}

/// Device to PCS pipeline
pub fn read_input_lut(ctx: &Context, profile: &Profile, intent: Intent) -> Result<Pipeline> {
    if profile.device_class() == ProfileClass::NamedColor {
        return Pipeline::from_stages([
            read_named_colors(ctx, profile, NamedColorOutput::Pcs)?,
            Stage::lab_v2_to_v4(),
        ]);
    }

    if intent.is_icc() {
        let index = intent.0 as usize;
        let float_tag = DEVICE_TO_PCS_FLOAT[index];
        if profile.has_tag(float_tag) {
            debug!(tag = %float_tag, "input LUT from float tag");
            let mut lut = read_pipeline(ctx, profile, float_tag)?;
            normalize_float(&mut lut, profile.color_space(), profile.pcs())?;
            return Ok(lut);
        }

        let mut tag16 = DEVICE_TO_PCS_16[index];
        if !profile.has_tag(tag16) {
            tag16 = tag::A2B0;
        }
        if profile.has_tag(tag16) {
            debug!(tag = %tag16, "input LUT");
            let mut lut = read_pipeline(ctx, profile, tag16)?;
            if profile.tag_true_type(tag16) != Some(type_sig::LUT16)
                || profile.pcs() != ColorSpace::Lab
            {
                return Ok(lut);
            }
            if profile.color_space() == ColorSpace::Lab {
                lut.insert_stage(StagePosition::Begin, Stage::lab_v4_to_v2())?;
            }
            lut.insert_stage(StagePosition::End, Stage::lab_v2_to_v4())?;
            return Ok(lut);
        }
    }

    match profile.color_space() {
        ColorSpace::Gray => gray_input(ctx, profile),
        _ => rgb_input(ctx, profile),
    }
}

/// PCS to device pipeline
pub fn read_output_lut(ctx: &Context, profile: &Profile, intent: Intent) -> Result<Pipeline> {
    if intent.is_icc() {
        let index = intent.0 as usize;
        let float_tag = PCS_TO_DEVICE_FLOAT[index];
        if profile.has_tag(float_tag) {
            debug!(tag = %float_tag, "output LUT from float tag");
            let mut lut = read_pipeline(ctx, profile, float_tag)?;
            normalize_float(&mut lut, profile.pcs(), profile.color_space())?;
            return Ok(lut);
        }

        let mut tag16 = PCS_TO_DEVICE_16[index];
        if !profile.has_tag(tag16) {
            if profile.has_tag(tag::B2A0) {
                warn!(intent = %intent, "no output LUT for intent, using perceptual");
            }
            tag16 = tag::B2A0;
        }
        if profile.has_tag(tag16) {
            debug!(tag = %tag16, "output LUT");
            let mut lut = read_pipeline(ctx, profile, tag16)?;
            if profile.pcs() == ColorSpace::Lab {
                use_trilinear(&mut lut);
            }
            if profile.tag_true_type(tag16) != Some(type_sig::LUT16)
                || profile.pcs() != ColorSpace::Lab
            {
                return Ok(lut);
            }
            lut.insert_stage(StagePosition::Begin, Stage::lab_v4_to_v2())?;
            if profile.color_space() == ColorSpace::Lab {
                lut.insert_stage(StagePosition::End, Stage::lab_v2_to_v4())?;
            }
            return Ok(lut);
        }
    }

    match profile.color_space() {
        ColorSpace::Gray => gray_output(ctx, profile),
        _ => rgb_output(ctx, profile),
    }
}

/// Ready-made pipeline of a device link, abstract or named color profile
pub fn read_devicelink_lut(ctx: &Context, profile: &Profile, intent: Intent) -> Result<Pipeline> {
    if profile.device_class() == ProfileClass::NamedColor {
        let mut lut = Pipeline::from_stages([read_named_colors(
            ctx,
            profile,
            NamedColorOutput::Colorant,
        )?])?;
        if profile.color_space() == ColorSpace::Lab {
            lut.insert_stage(StagePosition::End, Stage::lab_v2_to_v4())?;
        }
        return Ok(lut);
    }

    let index = intent_index(intent);
    for float_tag in [DEVICE_TO_PCS_FLOAT[index], tag::D2B0] {
        if profile.has_tag(float_tag) {
            debug!(tag = %float_tag, "device link from float tag");
            let mut lut = read_pipeline(ctx, profile, float_tag)?;
            normalize_float(&mut lut, profile.color_space(), profile.pcs())?;
            return Ok(lut);
        }
    }

    let mut tag16 = DEVICE_TO_PCS_16[index];
    if !profile.has_tag(tag16) {
        tag16 = tag::A2B0;
    }
    debug!(tag = %tag16, "device link");
    let mut lut = read_pipeline(ctx, profile, tag16)?;
    if profile.pcs() == ColorSpace::Lab {
        use_trilinear(&mut lut);
    }
    if profile.tag_true_type(tag16) != Some(type_sig::LUT16) {
        return Ok(lut);
    }
    if profile.color_space() == ColorSpace::Lab {
        lut.insert_stage(StagePosition::Begin, Stage::lab_v4_to_v2())?;
    }
    if profile.pcs() == ColorSpace::Lab {
        lut.insert_stage(StagePosition::End, Stage::lab_v2_to_v4())?;
    }
    Ok(lut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{Lab, Xyz};
    use crate::icc::{D65_XYY, ProfileVersion, REC709_PRIMARIES};

    #[test]
    fn test_matrix_shaper_roundtrip() {
        let ctx = Context::new();
        let srgb = Profile::srgb(&ctx).unwrap();
        let input = read_input_lut(&ctx, &srgb, Intent::PERCEPTUAL).unwrap();
        let output = read_output_lut(&ctx, &srgb, Intent::PERCEPTUAL).unwrap();

        let mut xyz = [0f32; 3];
        input.eval_f32(&[1.0, 1.0, 1.0], &mut xyz);
        let white = Xyz::from_encoded_float(&xyz);
        assert!(white.approx_eq(&D50, 2e-3), "{white:?}");

        let mut rgb = [0f32; 3];
        for sample in [[0.2f32, 0.5, 0.8], [0.9, 0.1, 0.4]] {
            input.eval_f32(&sample, &mut xyz);
            output.eval_f32(&xyz, &mut rgb);
            for (a, b) in sample.iter().zip(&rgb) {
                assert!((a - b).abs() < 2e-3, "{sample:?} -> {rgb:?}");
            }
        }
    }

    #[test]
    fn test_gray_lab_pcs_is_neutral() {
        let ctx = Context::new();
        let mut gray = Profile::gray(&ctx, &D65_XYY, ToneCurve::gamma(1.0)).unwrap();
        gray.header_mut().pcs = ColorSpace::Lab;
        let lut = read_input_lut(&ctx, &gray, Intent::PERCEPTUAL).unwrap();
        let mut out = [0f32; 3];
        lut.eval_f32(&[0.5], &mut out);
        let lab = Lab::from_encoded_float(&out);
        assert!((lab.l - 50.0).abs() < 0.01);
        assert!(lab.a.abs() < 0.01 && lab.b.abs() < 0.01, "{lab:?}");
    }

    #[test]
    fn test_lut16_lab_gets_v2_bridges() {
        let ctx = Context::new();
        let mut p = Profile::new(
            ProfileClass::Output,
            ColorSpace::Rgb,
            ColorSpace::Lab,
            ProfileVersion::V2_1,
        );
        let lut = Pipeline::from_stages([Stage::identity_curves(3).unwrap()]).unwrap();
        p.write_tag(&ctx, tag::A2B0, TagValue::Pipeline(lut.clone())).unwrap();
        p.write_tag(&ctx, tag::B2A0, TagValue::Pipeline(lut)).unwrap();

        let input = read_input_lut(&ctx, &p, Intent::RELATIVE_COLORIMETRIC).unwrap();
        assert_eq!(input.last_stage().unwrap(), &Stage::lab_v2_to_v4());
        let output = read_output_lut(&ctx, &p, Intent::RELATIVE_COLORIMETRIC).unwrap();
        assert_eq!(output.first_stage().unwrap(), &Stage::lab_v4_to_v2());
    }

    #[test]
    fn test_missing_trc_fails() {
        let ctx = Context::new();
        let mut srgb = Profile::srgb(&ctx).unwrap();
        srgb.remove_tag(tag::GREEN_TRC);
        assert_eq!(
            read_input_lut(&ctx, &srgb, Intent::PERCEPTUAL),
            Err(Error::MissingTag(tag::GREEN_TRC))
        );
    }

    #[test]
    fn test_rgb_primaries_reach_output() {
        let ctx = Context::new();
        let linear = ToneCurve::gamma(1.0);
        let p = Profile::rgb(
            &ctx,
            &D65_XYY,
            &REC709_PRIMARIES,
            [linear.clone(), linear.clone(), linear],
        )
        .unwrap();
        let output = read_output_lut(&ctx, &p, Intent::RELATIVE_COLORIMETRIC).unwrap();
        let mut rgb = [0f32; 3];
        output.eval_f32(&D50.to_encoded_float(), &mut rgb);
        for v in rgb {
            assert!((v - 1.0).abs() < 2e-3, "{rgb:?}");
        }
    }
}
