//! Synthetic press profile for unit tests
//!
//! A subtractive CMYK model over a Rec. 709 reflectance space with a paper
//! black floor. A2B0 and B2A0 are exact inverses inside the gamut.

use crate::color::{D50, Lab, Xyz};
use crate::context::Context;
use crate::icc::{
    ColorSpace, Profile, ProfileClass, ProfileVersion, REC709_PRIMARIES, TagValue, tag,
};
use crate::math::{Matrix3x3, rgb_to_xyz_d50};
use crate::pipeline::{Clut, Pipeline, Stage};

const BLACK_FLOOR: f64 = 0.03;

fn reflectance_matrix() -> Matrix3x3 {
    rgb_to_xyz_d50(&D50.to_xyy(), &REC709_PRIMARIES).unwrap()
}

pub(crate) fn cmyk_to_lab(cmyk: [f64; 4]) -> Lab {
    let [c, m, y, k] = cmyk;
    let rho = [(1.0 - c), (1.0 - m), (1.0 - y)].map(|v| BLACK_FLOOR + (1.0 - BLACK_FLOOR) * v * (1.0 - k));
    Lab::from_xyz(Xyz::from_array(reflectance_matrix().multiply_vec(rho)))
}

fn lab_to_cmyk(lab: &Lab, inverse: &Matrix3x3) -> [f64; 4] {
    let rho = inverse.multiply_vec(lab.to_xyz().to_array());
    let rgb = rho.map(|v| ((v - BLACK_FLOOR) / (1.0 - BLACK_FLOOR)).clamp(0.0, 1.0));
    let k = 1.0 - rgb[0].max(rgb[1]).max(rgb[2]);
    if k >= 1.0 {
        return [0.0, 0.0, 0.0, 1.0];
    }
    [
        1.0 - rgb[0] / (1.0 - k),
        1.0 - rgb[1] / (1.0 - k),
        1.0 - rgb[2] / (1.0 - k),
        k,
    ]
}

pub(crate) fn press_profile(ctx: &Context) -> Profile {
    let mut a2b = Clut::uniform_u16(4, 17, 3).unwrap();
    a2b.sample_16(false, |input, out| {
        let cmyk = [0, 1, 2, 3].map(|i| input[i] as f64 / 65535.0);
        out.copy_from_slice(&cmyk_to_lab(cmyk).to_encoded_u16());
        Ok(())
    })
    .unwrap();

    let inverse = reflectance_matrix().inverse().unwrap();
    let mut b2a = Clut::uniform_u16(3, 33, 4).unwrap();
    b2a.sample_16(false, |input, out| {
        let cmyk = lab_to_cmyk(&Lab::from_encoded_u16(input), &inverse);
        for (o, v) in out.iter_mut().zip(cmyk) {
            *o = (v * 65535.0).round() as u16;
        }
        Ok(())
    })
    .unwrap();

    let mut p = Profile::new(
        ProfileClass::Output,
        ColorSpace::Cmyk,
        ColorSpace::Lab,
        ProfileVersion::V4_4,
    );
    p.write_tag(ctx, tag::MEDIA_WHITE, TagValue::Xyz(D50)).unwrap();
    let forward = Pipeline::from_stages([
        Stage::identity_curves(4).unwrap(),
        Stage::clut(a2b),
        Stage::identity_curves(3).unwrap(),
    ])
    .unwrap();
    let reverse = Pipeline::from_stages([
        Stage::identity_curves(3).unwrap(),
        Stage::clut(b2a),
        Stage::identity_curves(4).unwrap(),
    ])
    .unwrap();
    for sig in [tag::A2B0, tag::A2B1, tag::A2B2] {
        p.write_tag(ctx, sig, TagValue::Pipeline(forward.clone())).unwrap();
    }
    for sig in [tag::B2A0, tag::B2A1, tag::B2A2] {
        p.write_tag(ctx, sig, TagValue::Pipeline(reverse.clone())).unwrap();
    }
    p
}
