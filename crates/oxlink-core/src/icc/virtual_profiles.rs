//! Profiles synthesized in memory
//!
//! Matrix-shaper RGB and gray profiles, the Lab and XYZ identity profiles the
//! linker uses as PCS endpoints, and two device links: per-channel
//! linearization and CMYK ink limiting.

use tracing::debug;

use crate::color::{D50, XyY};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::intent::Intent;
use crate::math::{adaptation_to_d50, quick_saturate_word, rgb_to_xyz_d50};
use crate::pipeline::{Clut, Pipeline, Stage, ToneCurve};

use super::header::{ColorSpace, ProfileClass, ProfileVersion};
use super::profile::Profile;
use super::tags::TagValue;
use super::types::tag;

/// sRGB transfer function (ICC parametric function 3)
fn srgb_curve() -> Result<ToneCurve> {
    ToneCurve::parametric(4, &[2.4, 1.0 / 1.055, 0.055 / 1.055, 1.0 / 12.92, 0.04045])
}

/// D65 as an xyY chromaticity
pub const D65_XYY: XyY = XyY::new(0.3127, 0.3290, 1.0);

/// Rec. 709 primaries shared by sRGB
pub const REC709_PRIMARIES: [XyY; 3] = [
    XyY::new(0.64, 0.33, 1.0),
    XyY::new(0.30, 0.60, 1.0),
    XyY::new(0.15, 0.06, 1.0),
];

/// Most ink a CMYK limit may allow, in percent
pub const MAX_INK_LIMIT: f64 = 400.0;

fn identity_lut(channels: usize) -> Result<TagValue> {
    Ok(TagValue::Pipeline(Pipeline::from_stages([
        Stage::identity_curves(channels)?,
    ])?))
}

impl Profile {
    /// v4 display profile from a white point, three primaries and per-channel TRCs
    pub fn rgb(
        ctx: &Context,
        white: &XyY,
        primaries: &[XyY; 3],
        curves: [ToneCurve; 3],
    ) -> Result<Self> {
        let mut p = Self::new(
            ProfileClass::Display,
            ColorSpace::Rgb,
            ColorSpace::Xyz,
            ProfileVersion::V4_4,
        );
        let white_xyz = white.to_xyz();
        p.write_tag(ctx, tag::MEDIA_WHITE, TagValue::Xyz(D50))?;
        p.write_tag(ctx, tag::CHAD, TagValue::Matrix(adaptation_to_d50(&white_xyz)?))?;

        let m = rgb_to_xyz_d50(white, primaries)?;
        let colorants = [tag::RED_COLORANT, tag::GREEN_COLORANT, tag::BLUE_COLORANT];
        for (col, sig) in colorants.into_iter().enumerate() {
            let xyz = crate::color::Xyz::new(m.m[0][col], m.m[1][col], m.m[2][col]);
            p.write_tag(ctx, sig, TagValue::Xyz(xyz))?;
        }
        let [r, g, b] = curves;
        p.write_tag(ctx, tag::RED_TRC, TagValue::Curve(r))?;
        p.write_tag(ctx, tag::GREEN_TRC, TagValue::Curve(g))?;
        p.write_tag(ctx, tag::BLUE_TRC, TagValue::Curve(b))?;
        Ok(p)
    }

    /// IEC 61966-2-1 sRGB
    pub fn srgb(ctx: &Context) -> Result<Self> {
        let curve = srgb_curve()?;
        Self::rgb(
            ctx,
            &D65_XYY,
            &REC709_PRIMARIES,
            [curve.clone(), curve.clone(), curve],
        )
    }

    /// Gray display profile with the given white point and TRC
    pub fn gray(ctx: &Context, white: &XyY, curve: ToneCurve) -> Result<Self> {
        let mut p = Self::new(
            ProfileClass::Display,
            ColorSpace::Gray,
            ColorSpace::Xyz,
            ProfileVersion::V4_4,
        );
        p.write_tag(ctx, tag::MEDIA_WHITE, TagValue::Xyz(white.to_xyz()))?;
        p.write_tag(ctx, tag::GRAY_TRC, TagValue::Curve(curve))?;
        Ok(p)
    }

    /// Lab identity in the v2 encoding
    pub fn lab_v2(ctx: &Context) -> Result<Self> {
        let mut p = Self::new(
            ProfileClass::Abstract,
            ColorSpace::Lab,
            ColorSpace::Lab,
            ProfileVersion::V2_1,
        );
        p.write_tag(ctx, tag::MEDIA_WHITE, TagValue::Xyz(D50))?;
        p.write_tag(ctx, tag::A2B0, identity_lut(3)?)?;
        p.write_tag(ctx, tag::B2A0, identity_lut(3)?)?;
        Ok(p)
    }

    /// Lab identity in the v4 encoding
    pub fn lab_v4(ctx: &Context) -> Result<Self> {
        let mut p = Self::new(
            ProfileClass::Abstract,
            ColorSpace::Lab,
            ColorSpace::Lab,
            ProfileVersion::V4_4,
        );
        p.write_tag(ctx, tag::MEDIA_WHITE, TagValue::Xyz(D50))?;
        p.write_tag(ctx, tag::A2B0, identity_lut(3)?)?;
        p.write_tag(ctx, tag::B2A0, identity_lut(3)?)?;
        Ok(p)
    }

    /// XYZ identity
    pub fn xyz(ctx: &Context) -> Result<Self> {
        let mut p = Self::new(
            ProfileClass::Abstract,
            ColorSpace::Xyz,
            ColorSpace::Xyz,
            ProfileVersion::V4_4,
        );
        p.write_tag(ctx, tag::MEDIA_WHITE, TagValue::Xyz(D50))?;
        p.write_tag(ctx, tag::A2B0, identity_lut(3)?)?;
        p.write_tag(ctx, tag::B2A0, identity_lut(3)?)?;
        Ok(p)
    }

    /// Device link applying one curve per channel of `space`
    pub fn linearization_device_link(
        ctx: &Context,
        space: ColorSpace,
        curves: Vec<ToneCurve>,
    ) -> Result<Self> {
        if curves.len() != space.channels() {
            return Err(ctx.signal(Error::ChannelMismatch {
                expected: space.channels(),
                actual: curves.len(),
            }));
        }
        let mut p = Self::new(ProfileClass::DeviceLink, space, space, ProfileVersion::V4_4);
        p.set_rendering_intent(Intent::PERCEPTUAL);
        let lut = Pipeline::from_stages([Stage::curves(curves)?])?;
        p.write_tag(ctx, tag::A2B0, TagValue::Pipeline(lut))?;
        Ok(p)
    }

    /// CMYK device link holding total ink to `limit` percent. CMY shrink
    /// proportionally; K is kept.
    pub fn ink_limiting_device_link(ctx: &Context, space: ColorSpace, limit: f64) -> Result<Self> {
        if space != ColorSpace::Cmyk {
            return Err(ctx.signal(Error::NotSuitable(format!(
                "ink limiting on {space:?}, only CMYK is supported"
            ))));
        }
        let limit = limit.clamp(0.0, MAX_INK_LIMIT);
        debug!(limit, "building ink-limiting device link");
        let ink_limit = limit * 655.35;

        let mut clut = Clut::uniform_u16(4, 17, 4)?;
        clut.sample_16(false, |input, output| {
            let sum_cmy = input[..3].iter().map(|&v| v as f64).sum::<f64>();
            let sum_cmyk = sum_cmy + input[3] as f64;
            let ratio = if sum_cmyk > ink_limit && sum_cmy > 0.0 {
                (1.0 - (sum_cmyk - ink_limit) / sum_cmy).max(0.0)
            } else {
                1.0
            };
            for (o, &v) in output[..3].iter_mut().zip(&input[..3]) {
                *o = quick_saturate_word(v as f64 * ratio);
            }
            output[3] = input[3];
            Ok(())
        })?;

        let lut = Pipeline::from_stages([
            Stage::identity_curves(4)?,
            Stage::clut(clut),
            Stage::identity_curves(4)?,
        ])?;
        let mut p = Self::new(ProfileClass::DeviceLink, space, space, ProfileVersion::V4_4);
        p.set_rendering_intent(Intent::PERCEPTUAL);
        p.write_tag(ctx, tag::A2B0, TagValue::Pipeline(lut))?;
        Ok(p)
    }
}
