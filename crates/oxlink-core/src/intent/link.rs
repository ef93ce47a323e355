//! Default ICC linking
//!
//! Walks the chain keeping track of the running color space. Each profile is
//! read as input (device to PCS) when the running space is still a device
//! space, as output otherwise. Between an output-direction profile and its
//! predecessor a PCS conversion carries absolute colorimetric scaling or
//! black point compensation.

use tracing::debug;

use crate::color::{MAX_ENCODEABLE_XYZ, Xyz};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::icc::{ColorSpace, Profile, ProfileClass};
use crate::math::Matrix3x3;
use crate::pipeline::{Pipeline, Stage, StagePosition};
use crate::transform::TransformFlags;

use super::adaptation::compute_absolute_intent;
use super::black_point::{detect_black_point, detect_destination_black_point};
use super::bpc::BpcParams;
use super::loaders::{read_devicelink_lut, read_input_lut, read_output_lut};
use super::{ChainStep, Intent, IntentHandler};

/// Largest summed deviation from identity for which a PCS conversion
/// matrix is skipped. Tunable.
pub const IDENTITY_LAYER_TOLERANCE: f64 = 2e-3;

/// Handler shared by the four ICC intents
pub(crate) struct IccDefault;

impl IntentHandler for IccDefault {
    fn link(
        &self,
        ctx: &Context,
        steps: &[ChainStep<'_>],
        flags: &TransformFlags,
    ) -> Result<Pipeline> {
        default_icc_link(ctx, steps, flags)
    }
}

fn is_empty_layer(m: &Matrix3x3, offset: &[f64; 3]) -> bool {
    let id = Matrix3x3::identity();
    let mut diff = 0.0;
    for i in 0..3 {
        for j in 0..3 {
            diff += (m.m[i][j] - id.m[i][j]).abs();
        }
    }
    diff += offset.iter().map(|v| v.abs()).sum::<f64>();
    diff < IDENTITY_LAYER_TOLERANCE
}

/// Matrix and offset bridging the PCS of `prev` to the PCS of `step`
fn compute_conversion(
    ctx: &Context,
    prev: &Profile,
    step: &ChainStep<'_>,
) -> Result<(Matrix3x3, [f64; 3])> {
    let (m, mut offset) = if step.intent == Intent::ABSOLUTE_COLORIMETRIC {
        let m = compute_absolute_intent(
            step.adaptation_state,
            &prev.media_white_point(ctx),
            &prev.chromatic_adaptation(ctx)?,
            &step.profile.media_white_point(ctx),
            &step.profile.chromatic_adaptation(ctx)?,
        )
        .map_err(|e| ctx.signal(e))?;
        (m, [0.0; 3])
    } else if step.bpc {
        let bp_in = detect_black_point(ctx, prev, step.intent)?;
        let bp_out = detect_destination_black_point(ctx, step.profile, step.intent)?;
        match bpc_between(&bp_in, &bp_out) {
            Some(params) => {
                debug!(?bp_in, ?bp_out, "black point compensation");
                params.to_matrix()
            }
            None => (Matrix3x3::identity(), [0.0; 3]),
        }
    } else {
        (Matrix3x3::identity(), [0.0; 3])
    };

    for v in &mut offset {
        *v /= MAX_ENCODEABLE_XYZ;
    }
    Ok((m, offset))
}

fn bpc_between(bp_in: &Xyz, bp_out: &Xyz) -> Option<BpcParams> {
    if bp_in.approx_eq(bp_out, 1e-9) {
        return None;
    }
    BpcParams::calculate(bp_in, bp_out)
}

/// Append the PCS conversion from `from` to `to`, skipping identity matrices
fn add_conversion(
    lut: &mut Pipeline,
    from: ColorSpace,
    to: ColorSpace,
    m: &Matrix3x3,
    offset: &[f64; 3],
) -> Result<()> {
    let matrix = || Stage::matrix3(m, Some(*offset));
    let empty = is_empty_layer(m, offset);
    match (from, to) {
        (ColorSpace::Xyz, ColorSpace::Xyz) => {
            if !empty {
                lut.insert_stage(StagePosition::End, matrix())?;
            }
        }
        (ColorSpace::Xyz, ColorSpace::Lab) => {
            if !empty {
                lut.insert_stage(StagePosition::End, matrix())?;
            }
            lut.insert_stage(StagePosition::End, Stage::xyz_to_lab())?;
        }
        (ColorSpace::Lab, ColorSpace::Xyz) => {
            lut.insert_stage(StagePosition::End, Stage::lab_to_xyz())?;
            if !empty {
                lut.insert_stage(StagePosition::End, matrix())?;
            }
        }
        (ColorSpace::Lab, ColorSpace::Lab) => {
            if !empty {
                lut.insert_stage(StagePosition::End, Stage::lab_to_xyz())?;
                lut.insert_stage(StagePosition::End, matrix())?;
                lut.insert_stage(StagePosition::End, Stage::xyz_to_lab())?;
            }
        }
        (a, b) if a.is_compatible_with(b) => {}
        (a, b) => {
            return Err(Error::ColorSpaceMismatch(format!(
                "cannot convert {a:?} to {b:?}"
            )));
        }
    }
    Ok(())
}

/// Link `steps` with the ICC rules, one LUT per profile
pub fn default_icc_link(
    ctx: &Context,
    steps: &[ChainStep<'_>],
    flags: &TransformFlags,
) -> Result<Pipeline> {
    let first = steps
        .first()
        .ok_or_else(|| ctx.signal(Error::Range("empty profile chain".into())))?;
    let mut current = first.profile.color_space();
    let mut result = Pipeline::empty();
    let identity = Matrix3x3::identity();

    for (i, step) in steps.iter().enumerate() {
        let profile = step.profile;
        let class = profile.device_class();
        let is_device_link = matches!(class, ProfileClass::DeviceLink | ProfileClass::Abstract);
        let is_input = (i == 0 && !is_device_link) || !current.is_pcs();

        let (space_in, space_out) = if is_input || is_device_link {
            (profile.color_space(), profile.pcs())
        } else {
            (profile.pcs(), profile.color_space())
        };
        if !space_in.is_compatible_with(current) {
            return Err(ctx.signal(Error::ColorSpaceMismatch(format!(
                "profile {i} expects {space_in:?}, chain carries {current:?}"
            ))));
        }

        let lut = if is_device_link || (class == ProfileClass::NamedColor && steps.len() == 1) {
            let lut = read_devicelink_lut(ctx, profile, step.intent)?;
            let (m, offset) = if class == ProfileClass::Abstract && i > 0 {
                compute_conversion(ctx, steps[i - 1].profile, step)?
            } else {
                (identity, [0.0; 3])
            };
            add_conversion(&mut result, current, space_in, &m, &offset)
                .map_err(|e| ctx.signal(e))?;
            lut
        } else if is_input {
            read_input_lut(ctx, profile, step.intent)?
        } else {
            let lut = read_output_lut(ctx, profile, step.intent)?;
            let (m, offset) = compute_conversion(ctx, steps[i - 1].profile, step)?;
            add_conversion(&mut result, current, space_in, &m, &offset)
                .map_err(|e| ctx.signal(e))?;
            lut
        };
        debug!(
            step = i,
            direction = if is_device_link { "link" } else if is_input { "input" } else { "output" },
            ?space_in,
            ?space_out,
            "linked profile"
        );

        result.concatenate(&lut).map_err(|e| ctx.signal(e))?;
        current = space_out;
    }

    if flags.clip_negatives
        && matches!(current, ColorSpace::Gray | ColorSpace::Rgb | ColorSpace::Cmyk)
    {
        result.insert_stage(
            StagePosition::End,
            Stage::clip_negatives(current.channels())?,
        )?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{D50, Lab};
    use crate::intent::link_profiles;

    #[test]
    fn test_empty_layer_tolerance() {
        let id = Matrix3x3::identity();
        assert!(is_empty_layer(&id, &[0.0; 3]));
        assert!(is_empty_layer(&id, &[1e-3, 0.0, 0.0]));
        assert!(!is_empty_layer(&id, &[1e-3, 1e-3, 1e-3]));
        assert!(!is_empty_layer(&Matrix3x3::diagonal(0.99, 1.0, 1.0), &[0.0; 3]));
    }

    #[test]
    fn test_srgb_to_lab_white() {
        let ctx = Context::new();
        let srgb = Profile::srgb(&ctx).unwrap();
        let lab = Profile::lab_v4(&ctx).unwrap();
        let steps = [
            ChainStep::new(&srgb, Intent::RELATIVE_COLORIMETRIC),
            ChainStep::new(&lab, Intent::RELATIVE_COLORIMETRIC),
        ];
        let lut = link_profiles(&ctx, &steps, &TransformFlags::new()).unwrap();
        let mut out = [0f32; 3];
        lut.eval_f32(&[1.0, 1.0, 1.0], &mut out);
        let white = Lab::from_encoded_float(&out);
        assert!((white.l - 100.0).abs() < 0.2, "{white:?}");
        assert!(white.a.abs() < 0.5 && white.b.abs() < 0.5, "{white:?}");
    }

    #[test]
    fn test_srgb_roundtrip_through_xyz() {
        let ctx = Context::new();
        let srgb = Profile::srgb(&ctx).unwrap();
        let steps = [
            ChainStep::new(&srgb, Intent::PERCEPTUAL),
            ChainStep::new(&srgb, Intent::PERCEPTUAL),
        ];
        let lut = link_profiles(&ctx, &steps, &TransformFlags::new()).unwrap();
        let mut out = [0f32; 3];
        lut.eval_f32(&[0.25, 0.5, 0.75], &mut out);
        for (a, b) in [0.25f32, 0.5, 0.75].iter().zip(&out) {
            assert!((a - b).abs() < 2e-3, "{out:?}");
        }
    }

    #[test]
    fn test_incompatible_chain() {
        let ctx = Context::new();
        let srgb = Profile::srgb(&ctx).unwrap();
        let link = Profile::ink_limiting_device_link(&ctx, ColorSpace::Cmyk, 300.0).unwrap();
        let steps = [
            ChainStep::new(&srgb, Intent::PERCEPTUAL),
            ChainStep::new(&link, Intent::PERCEPTUAL),
        ];
        assert!(matches!(
            link_profiles(&ctx, &steps, &TransformFlags::new()),
            Err(Error::ColorSpaceMismatch(_))
        ));
    }

    #[test]
    fn test_clip_negatives_appended() {
        let ctx = Context::new();
        let srgb = Profile::srgb(&ctx).unwrap();
        let steps = [
            ChainStep::new(&srgb, Intent::PERCEPTUAL),
            ChainStep::new(&srgb, Intent::PERCEPTUAL),
        ];
        let flags = TransformFlags::new().with_clip_negatives();
        let lut = link_profiles(&ctx, &steps, &flags).unwrap();
        assert_eq!(lut.last_stage(), Some(&Stage::clip_negatives(3).unwrap()));
    }

    #[test]
    fn test_absolute_scales_by_white() {
        let ctx = Context::new();
        let lab = Profile::lab_v4(&ctx).unwrap();
        let mut paper = Profile::lab_v4(&ctx).unwrap();
        let paper_white = Xyz::new(0.92, 0.95, 0.78);
        paper
            .write_tag(&ctx, crate::icc::tag::MEDIA_WHITE, crate::icc::TagValue::Xyz(paper_white))
            .unwrap();
        let steps = [
            ChainStep::new(&lab, Intent::ABSOLUTE_COLORIMETRIC),
            ChainStep::new(&paper, Intent::ABSOLUTE_COLORIMETRIC),
        ];
        let lut = link_profiles(&ctx, &steps, &TransformFlags::new()).unwrap();
        let mut out = [0f32; 3];
        // media-relative paper white lands on the PCS white
        lut.eval_f32(&Lab::from_xyz(paper_white).to_encoded_float(), &mut out);
        let got = Lab::from_encoded_float(&out);
        assert!(got.approx_eq(&Lab::from_xyz(D50), 0.2), "{got:?}");
    }
}
