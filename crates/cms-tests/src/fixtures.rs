//! Synthetic press profile
//!
//! Inks multiply paper reflectance in a Rec. 709 space adapted to D50, over a
//! paper black floor. The forward (A2B) and reverse (B2A) tables are sampled
//! from that model, and the reverse table can cap total ink the way press
//! separations do.

use oxlink_core::color::D50;
use oxlink_core::icc::{REC709_PRIMARIES, TagValue, tag};
use oxlink_core::math::{Matrix3x3, rgb_to_xyz_d50};
use oxlink_core::pipeline::Clut;
use oxlink_core::{
    ColorSpace, Context, Error, Lab, Pipeline, Profile, ProfileClass, ProfileVersion, Result,
    Stage, Xyz,
};

/// Shape of a synthetic press
#[derive(Debug, Clone, Copy)]
pub struct PressSpec {
    /// Reflectance left under full ink
    pub black_floor: f64,
    /// Grid points of the CMYK to Lab table
    pub forward_grid: u32,
    /// Grid points of the Lab to CMYK table
    pub reverse_grid: u32,
    /// Cap on C+M+Y+K in percent for the reverse table
    pub total_ink: Option<f64>,
}

impl Default for PressSpec {
    fn default() -> Self {
        Self {
            black_floor: 0.03,
            forward_grid: 17,
            reverse_grid: 33,
            total_ink: None,
        }
    }
}

fn reflectance_matrix() -> Result<Matrix3x3> {
    rgb_to_xyz_d50(&D50.to_xyy(), &REC709_PRIMARIES)
}

/// Lab the press prints for `cmyk` in 0..1
pub fn press_lab(spec: &PressSpec, cmyk: [f64; 4]) -> Result<Lab> {
    let [c, m, y, k] = cmyk;
    let floor = spec.black_floor;
    let rho = [c, m, y].map(|ink| floor + (1.0 - floor) * (1.0 - ink) * (1.0 - k));
    let xyz = reflectance_matrix()?.multiply_vec(rho);
    Ok(Lab::from_xyz(Xyz::from_array(xyz)))
}

/// Full gray component replacement, then the ink cap
fn separate(spec: &PressSpec, lab: &Lab, inverse: &Matrix3x3) -> [f64; 4] {
    let floor = spec.black_floor;
    let rho = inverse.multiply_vec(lab.to_xyz().to_array());
    let rgb = rho.map(|v| ((v - floor) / (1.0 - floor)).clamp(0.0, 1.0));
    let k = 1.0 - rgb[0].max(rgb[1]).max(rgb[2]);
    let mut cmyk = if k >= 1.0 {
        [0.0, 0.0, 0.0, 1.0]
    } else {
        let cmy = rgb.map(|v| 1.0 - v / (1.0 - k));
        [cmy[0], cmy[1], cmy[2], k]
    };
    if let Some(limit) = spec.total_ink {
        let limit = limit / 100.0;
        let sum: f64 = cmyk.iter().sum();
        if sum > limit {
            let cmy_sum = sum - cmyk[3];
            let scale = ((limit - cmyk[3]) / cmy_sum).max(0.0);
            for v in &mut cmyk[..3] {
                *v *= scale;
            }
        }
    }
    cmyk
}

/// A v4 CMYK output profile with all three intents on both directions
pub fn press_profile(ctx: &Context, spec: &PressSpec) -> Result<Profile> {
    let mut forward_clut = Clut::uniform_u16(4, spec.forward_grid, 3)?;
    forward_clut.sample_16(false, |input, out| {
        let cmyk = [0, 1, 2, 3].map(|i| input[i] as f64 / 65535.0);
        out.copy_from_slice(&press_lab(spec, cmyk)?.to_encoded_u16());
        Ok(())
    })?;

    let inverse = reflectance_matrix()?.inverse().ok_or(Error::SingularMatrix)?;
    let mut reverse_clut = Clut::uniform_u16(3, spec.reverse_grid, 4)?;
    reverse_clut.sample_16(false, |input, out| {
        let cmyk = separate(spec, &Lab::from_encoded_u16(input), &inverse);
        for (o, v) in out.iter_mut().zip(cmyk) {
            *o = (v * 65535.0).round() as u16;
        }
        Ok(())
    })?;

    let forward = Pipeline::from_stages([
        Stage::identity_curves(4)?,
        Stage::clut(forward_clut),
        Stage::identity_curves(3)?,
    ])?;
    let reverse = Pipeline::from_stages([
        Stage::identity_curves(3)?,
        Stage::clut(reverse_clut),
        Stage::identity_curves(4)?,
    ])?;

    let mut profile = Profile::new(
        ProfileClass::Output,
        ColorSpace::Cmyk,
        ColorSpace::Lab,
        ProfileVersion::V4_4,
    );
    profile.write_tag(ctx, tag::MEDIA_WHITE, TagValue::Xyz(D50))?;
    for sig in [tag::A2B0, tag::A2B1, tag::A2B2] {
        profile.write_tag(ctx, sig, TagValue::Pipeline(forward.clone()))?;
    }
    for sig in [tag::B2A0, tag::B2A1, tag::B2A2] {
        profile.write_tag(ctx, sig, TagValue::Pipeline(reverse.clone()))?;
    }
    Ok(profile)
}

/// Serialize and parse again, so every tag goes through the codec
pub fn reparse(ctx: &Context, profile: &Profile) -> Result<Profile> {
    Profile::from_bytes(&profile.to_bytes(ctx)?)
}
