//! Gamut checking and total area coverage
//!
//! The gamut check pipeline maps source device values to a single channel
//! that is zero in gamut and grows with the distance outside. It is sampled
//! once over the source space, so per-pixel checks are a CLUT lookup.

use tracing::debug;

use crate::color::{Lab, delta_e};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::icc::{Profile, ProfileClass};
use crate::math::quick_saturate_word;
use crate::pipeline::{Clut, Pipeline, Stage, StagePosition, slice_space_16};
use crate::transform::TransformFlags;

use super::{ChainStep, Intent, MAX_CHAIN_LENGTH, chain_to_lab, link_profiles, reasonable_grid_points};

/// Grid used to estimate total ink over Lab
const TAC_GRID: [u32; 3] = [6, 74, 74];

/// Highest summed ink coverage of an output profile, in percent
///
/// Only output profiles have a meaningful coverage; anything else gives 0.
pub fn detect_tac(ctx: &Context, profile: &Profile) -> Result<f64> {
    if profile.device_class() != ProfileClass::Output {
        return Ok(0.0);
    }
    let lab = Profile::lab_v4(ctx)?;
    let steps = [
        ChainStep::new(&lab, Intent::PERCEPTUAL),
        ChainStep::new(profile, Intent::PERCEPTUAL),
    ];
    let lut = link_profiles(ctx, &steps, &TransformFlags::new())?;

    let mut out = vec![0f32; lut.output_channels()];
    let mut input = [0f32; 3];
    let mut max_tac = 0f64;
    slice_space_16(&TAC_GRID, |lab| {
        for (i, &v) in input.iter_mut().zip(lab) {
            *i = v as f32 / 65535.0;
        }
        lut.eval_f32(&input, &mut out);
        let sum = out.iter().map(|&v| v as f64 * 100.0).sum::<f64>();
        max_tac = max_tac.max(sum);
        Ok(())
    })?;
    debug!(max_tac, "total area coverage");
    Ok(max_tac)
}

/// Pipeline from a chain's source space to an out-of-gamut measure
///
/// `steps[..pcs_position]` take the source to the PCS; the result is then
/// checked against `gamut`. An output of 1 or more on the 16-bit scale
/// means the color cannot be reproduced.
pub fn create_gamut_check_pipeline(
    ctx: &Context,
    steps: &[ChainStep<'_>],
    pcs_position: usize,
    gamut: &Profile,
) -> Result<Pipeline> {
    if pcs_position == 0 || pcs_position > MAX_CHAIN_LENGTH || pcs_position > steps.len() {
        return Err(ctx.signal(Error::Range(format!(
            "gamut check at chain position {pcs_position} of {}",
            steps.len()
        ))));
    }

    let threshold = if gamut.is_matrix_shaper() { 1.0 } else { 5.0 };
    let flags = TransformFlags::new();
    let to_lab = chain_to_lab(ctx, &steps[..pcs_position], &flags)?;

    let lab = Profile::lab_v4(ctx)?;
    let forward = link_profiles(
        ctx,
        &[
            ChainStep::new(&lab, Intent::RELATIVE_COLORIMETRIC),
            ChainStep::new(gamut, Intent::RELATIVE_COLORIMETRIC),
        ],
        &flags,
    )?;
    let reverse = link_profiles(
        ctx,
        &[
            ChainStep::new(gamut, Intent::RELATIVE_COLORIMETRIC),
            ChainStep::new(&lab, Intent::RELATIVE_COLORIMETRIC),
        ],
        &flags,
    )?;

    let source = steps[0].profile.color_space();
    let channels = source.channels();
    let points = reasonable_grid_points(source, &TransformFlags::new().with_high_res_precalc());
    debug!(?source, points, threshold, "sampling gamut check");

    let mut check = GamutCheck {
        threshold,
        forward: &forward,
        reverse: &reverse,
        device: vec![0f32; forward.output_channels()],
    };
    let mut input = vec![0f32; channels];
    let mut lab_in = [0f32; 3];

    let mut clut = Clut::uniform_u16(channels, points, 1)?;
    clut.sample_16(false, |device, out| {
        for (i, &v) in input.iter_mut().zip(device) {
            *i = v as f32 / 65535.0;
        }
        to_lab.eval_f32(&input, &mut lab_in);
        out[0] = check.measure(&Lab::from_encoded_float(&lab_in));
        Ok(())
    })?;

    let mut result = Pipeline::new(channels, 1)?;
    result.insert_stage(StagePosition::Begin, Stage::clut(clut))?;
    Ok(result)
}

struct GamutCheck<'a> {
    threshold: f64,
    forward: &'a Pipeline,
    reverse: &'a Pipeline,
    device: Vec<f32>,
}

impl GamutCheck<'_> {
    /// Lab through the gamut profile and back, with the device values held
    /// at 16 bits
    fn roundtrip(&mut self, lab: &Lab) -> Lab {
        self.forward.eval_f32(&lab.to_encoded_float(), &mut self.device);
        for v in &mut self.device {
            *v = quick_saturate_word(*v as f64 * 65535.0) as f32 / 65535.0;
        }
        let mut out = [0f32; 3];
        self.reverse.eval_f32(&self.device, &mut out);
        Lab::from_encoded_float(&out)
    }

    fn measure(&mut self, lab_in: &Lab) -> u16 {
        let lab_out = self.roundtrip(lab_in);
        let lab_out2 = self.roundtrip(&lab_out);
        let de1 = delta_e(lab_in, &lab_out);
        let de2 = delta_e(&lab_out, &lab_out2);
        let t = self.threshold;

        let excess = if de1 < t {
            // a second large error alone is inconclusive
            0.0
        } else if de2 < t {
            de1 - t
        } else {
            let ratio = if de2 == 0.0 { de1 } else { de1 / de2 };
            if ratio > t { ratio - t } else { 0.0 }
        };
        quick_saturate_word((excess + 0.5).floor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::fixtures::press_profile;

    #[test]
    fn test_tac_of_display_is_zero() {
        let ctx = Context::new();
        let srgb = Profile::srgb(&ctx).unwrap();
        assert_eq!(detect_tac(&ctx, &srgb).unwrap(), 0.0);
    }

    #[test]
    fn test_tac_of_press() {
        let ctx = Context::new();
        let press = press_profile(&ctx);
        let tac = detect_tac(&ctx, &press).unwrap();
        assert!(tac > 100.0 && tac <= 400.0, "{tac}");
    }

    #[test]
    fn test_position_out_of_range() {
        let ctx = Context::new();
        let srgb = Profile::srgb(&ctx).unwrap();
        let steps = [ChainStep::new(&srgb, Intent::PERCEPTUAL)];
        assert!(matches!(
            create_gamut_check_pipeline(&ctx, &steps, 0, &srgb),
            Err(Error::Range(_))
        ));
        assert!(matches!(
            create_gamut_check_pipeline(&ctx, &steps, 2, &srgb),
            Err(Error::Range(_))
        ));
    }

    #[test]
    fn test_srgb_against_press() {
        let ctx = Context::new();
        let srgb = Profile::srgb(&ctx).unwrap();
        let press = press_profile(&ctx);
        let steps = [ChainStep::new(&srgb, Intent::RELATIVE_COLORIMETRIC)];
        let lut = create_gamut_check_pipeline(&ctx, &steps, 1, &press).unwrap();
        assert_eq!((lut.input_channels(), lut.output_channels()), (3, 1));

        let mut out = [0u16; 1];
        lut.eval_u16(&[0x8000, 0x8000, 0x8000], &mut out);
        assert_eq!(out[0], 0, "mid gray is printable");
        lut.eval_u16(&[0, 0xffff, 0], &mut out);
        assert!(out[0] >= 1, "pure green is outside the press gamut");
    }
}
