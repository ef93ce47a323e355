//! Black point detection
//!
//! The source black point is the darkest colorant combination a profile
//! reproduces, measured through the profile's own LUT. The destination
//! black point follows the Adobe approach: round-trip an L* ramp through the
//! profile and fit a quadratic to the shadow part of the response.

use tracing::{debug, trace};

use crate::color::{Lab, Xyz};
use crate::context::Context;
use crate::error::Result;
use crate::icc::{ColorSpace, LutDirection, Profile, ProfileClass};
use crate::math::Matrix3x3;
use crate::pipeline::Pipeline;
use crate::transform::TransformFlags;

use super::{ChainStep, Intent, link_profiles};

/// Black of a v4 perceptual reference medium
const PERCEPTUAL_BLACK: Xyz = Xyz::new(0.00336, 0.0034731, 0.00287);

const RAMP_STEPS: usize = 256;

fn measure_flags() -> TransformFlags {
    TransformFlags::new().with_no_cache().with_no_optimize()
}

fn ignores_black_point(profile: &Profile, intent: Intent) -> bool {
    matches!(
        profile.device_class(),
        ProfileClass::DeviceLink | ProfileClass::Abstract | ProfileClass::NamedColor
    ) || !matches!(
        intent,
        Intent::PERCEPTUAL | Intent::RELATIVE_COLORIMETRIC | Intent::SATURATION
    )
}

/// v4 perceptual and saturation share a fixed reference black
fn v4_reference_black(ctx: &Context, profile: &Profile, intent: Intent) -> Option<Result<Xyz>> {
    let applies = profile.version().is_v4()
        && matches!(intent, Intent::PERCEPTUAL | Intent::SATURATION);
    if !applies {
        return None;
    }
    if profile.is_matrix_shaper() {
        return Some(darker_colorant(ctx, profile, Intent::RELATIVE_COLORIMETRIC));
    }
    Some(Ok(PERCEPTUAL_BLACK))
}

/// Darkest device value for the color space, in the 16-bit encoding
fn black_end_point(space: ColorSpace) -> Option<&'static [u16]> {
    match space {
        ColorSpace::Gray => Some(&[0]),
        ColorSpace::Rgb => Some(&[0, 0, 0]),
        ColorSpace::Lab => Some(&[0, 0x8080, 0x8080]),
        ColorSpace::Cmyk => Some(&[0xffff; 4]),
        ColorSpace::Cmy => Some(&[0xffff; 3]),
        _ => None,
    }
}

/// Evaluate the darkest colorant through the profile, forced to neutral
fn darker_colorant(ctx: &Context, profile: &Profile, intent: Intent) -> Result<Xyz> {
    if !profile.is_intent_supported(intent, LutDirection::Input) {
        return Ok(Xyz::default());
    }
    let Some(black) = black_end_point(profile.color_space()) else {
        return Ok(Xyz::default());
    };

    // the v2 Lab endpoint keeps the BPC policy from recursing into this profile
    let lab = Profile::lab_v2(ctx)?;
    let steps = [ChainStep::new(profile, intent), ChainStep::new(&lab, intent)];
    let lut = link_profiles(ctx, &steps, &measure_flags())?;
    if lut.input_channels() != black.len() {
        return Ok(Xyz::default());
    }

    let input: Vec<f32> = black.iter().map(|&v| v as f32 / 65535.0).collect();
    let mut out = [0f32; 3];
    lut.eval_f32(&input, &mut out);
    let mut measured = Lab::from_encoded_float(&out);
    measured.a = 0.0;
    measured.b = 0.0;
    measured.l = measured.l.clamp(0.0, 50.0);
    trace!(l = measured.l, "darker colorant");
    Ok(measured.to_xyz())
}

/// Lab -> profile -> profile -> Lab under `intent` on the first leg
fn roundtrip_lut(ctx: &Context, profile: &Profile, intent: Intent) -> Result<Pipeline> {
    let lab = Profile::lab_v4(ctx)?;
    let steps = [
        ChainStep::new(&lab, Intent::RELATIVE_COLORIMETRIC),
        ChainStep::new(profile, intent),
        ChainStep::new(profile, Intent::RELATIVE_COLORIMETRIC),
        ChainStep::new(&lab, Intent::RELATIVE_COLORIMETRIC),
    ];
    link_profiles(ctx, &steps, &measure_flags())
}

fn eval_lab(lut: &Pipeline, lab: &Lab) -> Lab {
    let mut out = [0f32; 3];
    lut.eval_f32(&lab.to_encoded_float(), &mut out);
    Lab::from_encoded_float(&out)
}

/// Black of the perceptual rendering, read back through the colorimetric one
fn perceptual_black(ctx: &Context, profile: &Profile) -> Result<Xyz> {
    if !profile.is_intent_supported(Intent::PERCEPTUAL, LutDirection::Input) {
        return Ok(Xyz::default());
    }
    let lut = roundtrip_lut(ctx, profile, Intent::PERCEPTUAL)?;
    let mut black = eval_lab(&lut, &Lab::new(0.0, 0.0, 0.0));
    black.l = black.l.min(50.0);
    black.a = 0.0;
    black.b = 0.0;
    Ok(black.to_xyz())
}

/// Black point of `profile` used as the source of a link
///
/// Zero for device links, abstract and named color profiles, and for
/// intents other than perceptual, relative colorimetric and saturation.
pub fn detect_black_point(ctx: &Context, profile: &Profile, intent: Intent) -> Result<Xyz> {
    if ignores_black_point(profile, intent) {
        return Ok(Xyz::default());
    }
    if let Some(black) = v4_reference_black(ctx, profile, intent) {
        return black;
    }
    if intent == Intent::RELATIVE_COLORIMETRIC
        && profile.device_class() == ProfileClass::Output
        && profile.color_space() == ColorSpace::Cmyk
    {
        return perceptual_black(ctx, profile);
    }
    darker_colorant(ctx, profile, intent)
}

/// Zero crossing of the least-squares quadratic through the points, clamped
/// to the shadow range of L*
fn root_of_quadratic_fit(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n < 4 {
        return 0.0;
    }
    let (mut sx, mut sx2, mut sx3, mut sx4) = (0.0, 0.0, 0.0, 0.0);
    let (mut sy, mut syx, mut syx2) = (0.0, 0.0, 0.0);
    for (&xi, &yi) in x.iter().zip(y) {
        let xi2 = xi * xi;
        sx += xi;
        sx2 += xi2;
        sx3 += xi2 * xi;
        sx4 += xi2 * xi2;
        sy += yi;
        syx += yi * xi;
        syx2 += yi * xi2;
    }
    let m = Matrix3x3::new([[n as f64, sx, sx2], [sx, sx2, sx3], [sx2, sx3, sx4]]);
    let Ok([c, b, a]) = m.solve([sy, syx, syx2]) else {
        return 0.0;
    };

    if a.abs() < 1.0e-10 {
        if b.abs() < 1.0e-10 {
            return 0.0;
        }
        return (-c / b).clamp(0.0, 50.0);
    }
    let d = b * b - 4.0 * a * c;
    if d <= 0.0 {
        return 0.0;
    }
    ((-b + d.sqrt()) / (2.0 * a)).clamp(0.0, 50.0)
}

/// Black point of `profile` used as the destination of a link
pub fn detect_destination_black_point(
    ctx: &Context,
    profile: &Profile,
    intent: Intent,
) -> Result<Xyz> {
    if ignores_black_point(profile, intent) {
        return Ok(Xyz::default());
    }
    if let Some(black) = v4_reference_black(ctx, profile, intent) {
        return black;
    }

    let space = profile.color_space();
    if !profile.is_clut(intent, LutDirection::Output)
        || !matches!(space, ColorSpace::Gray | ColorSpace::Rgb | ColorSpace::Cmyk)
    {
        return detect_black_point(ctx, profile, intent);
    }

    let initial = if intent == Intent::RELATIVE_COLORIMETRIC {
        Lab::from_xyz(detect_black_point(ctx, profile, intent)?)
    } else {
        Lab::new(0.0, 0.0, 0.0)
    };

    let lut = roundtrip_lut(ctx, profile, intent)?;
    let mut in_ramp = [0f64; RAMP_STEPS];
    let mut out_ramp = [0f64; RAMP_STEPS];
    for l in 0..RAMP_STEPS {
        let probe = Lab::new(
            l as f64 * 100.0 / 255.0,
            initial.a.clamp(-50.0, 50.0),
            initial.b.clamp(-50.0, 50.0),
        );
        in_ramp[l] = probe.l;
        out_ramp[l] = eval_lab(&lut, &probe).l;
    }

    for l in (1..RAMP_STEPS - 1).rev() {
        out_ramp[l] = out_ramp[l].min(out_ramp[l + 1]);
    }
    if !(out_ramp[0] < out_ramp[RAMP_STEPS - 1]) {
        debug!("destination black ramp is flat");
        return Ok(Xyz::default());
    }

    let min_l = out_ramp[0];
    let max_l = out_ramp[RAMP_STEPS - 1];
    if intent == Intent::RELATIVE_COLORIMETRIC {
        let straight = in_ramp.iter().zip(&out_ramp).all(|(&i, &o)| {
            i <= min_l + 0.2 * (max_l - min_l) || (i - o).abs() < 4.0
        });
        if straight {
            return Ok(initial.to_xyz());
        }
    }

    let (lo, hi) = if intent == Intent::RELATIVE_COLORIMETRIC {
        (0.1, 0.5)
    } else {
        (0.03, 0.25)
    };
    let (x, y): (Vec<f64>, Vec<f64>) = in_ramp
        .iter()
        .zip(&out_ramp)
        .map(|(&i, &o)| (i, (o - min_l) / (max_l - min_l)))
        .filter(|&(_, y)| y >= lo && y < hi)
        .unzip();
    if x.len() < 3 {
        debug!(points = x.len(), "too few shadow points for black point fit");
        return Ok(Xyz::default());
    }

    let l = root_of_quadratic_fit(&x, &y).max(0.0);
    debug!(l, "destination black point");
    Ok(Lab::new(l, initial.a, initial.b).to_xyz())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srgb_black_is_zero() {
        let ctx = Context::new();
        let srgb = Profile::srgb(&ctx).unwrap();
        let bp = detect_black_point(&ctx, &srgb, Intent::RELATIVE_COLORIMETRIC).unwrap();
        assert!(bp.approx_eq(&Xyz::default(), 1e-4), "{bp:?}");
    }

    #[test]
    fn test_light_colorant_clamped_to_mid_gray() {
        let ctx = Context::new();
        // the TRC never drops below half luminance, so black measures near L* 76
        let curve = crate::pipeline::ToneCurve::from_table16(vec![0x8000, 0xffff]).unwrap();
        let gray = Profile::gray(&ctx, &crate::color::D50.to_xyy(), curve).unwrap();
        let bp = darker_colorant(&ctx, &gray, Intent::RELATIVE_COLORIMETRIC).unwrap();
        let lab = Lab::from_xyz(bp);
        assert!((lab.l - 50.0).abs() < 1e-6, "{lab:?}");
    }

    #[test]
    fn test_abstract_has_no_black_point() {
        let ctx = Context::new();
        let lab = Profile::lab_v4(&ctx).unwrap();
        let bp = detect_black_point(&ctx, &lab, Intent::PERCEPTUAL).unwrap();
        assert_eq!(bp, Xyz::default());
    }

    #[test]
    fn test_absolute_intent_has_no_black_point() {
        let ctx = Context::new();
        let srgb = Profile::srgb(&ctx).unwrap();
        let bp = detect_black_point(&ctx, &srgb, Intent::ABSOLUTE_COLORIMETRIC).unwrap();
        assert_eq!(bp, Xyz::default());
    }

    #[test]
    fn test_quadratic_fit_finds_root() {
        let x: Vec<f64> = (10..40).map(|v| v as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| (v - 5.0) * (v + 5.0) / 1600.0).collect();
        assert!((root_of_quadratic_fit(&x, &y) - 5.0).abs() < 1e-4);

        let y: Vec<f64> = x.iter().map(|v| (v - 8.0) / 40.0).collect();
        assert!((root_of_quadratic_fit(&x, &y) - 8.0).abs() < 1e-4);
    }

    #[test]
    fn test_quadratic_fit_needs_points() {
        assert_eq!(root_of_quadratic_fit(&[1.0, 2.0, 3.0], &[0.1, 0.2, 0.3]), 0.0);
    }
}
