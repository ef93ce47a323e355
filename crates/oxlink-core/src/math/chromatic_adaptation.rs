//! Chromatic Adaptation Transforms
//!
//! Bradford is the ICC default cone space and the only one the linker uses.
//!
//! References:
//! - ICC.1:2022 Annex E
//! - Lindbloom: http://www.brucelindbloom.com/index.html?Eqn_ChromAdapt.html

use crate::color::{D50, XyY, Xyz};
use crate::error::Result;
use crate::math::Matrix3x3;

/// Bradford matrix: XYZ → LMS (cone response)
pub const BRADFORD: Matrix3x3 = Matrix3x3::new([
    [0.8951, 0.2664, -0.1614],
    [-0.7502, 1.7135, 0.0367],
    [0.0389, -0.0685, 1.0296],
]);

/// Von Kries cone space, for callers that want a different adaptation
pub const VON_KRIES: Matrix3x3 = Matrix3x3::new([
    [0.40024, 0.7076, -0.08081],
    [-0.2263, 1.16532, 0.0457],
    [0.0, 0.0, 0.91822],
]);

/// Adaptation matrix taking colors seen under `src` to `dst` in the given cone space
///
/// The returned matrix M is used as: XYZ_dest = M × XYZ_src
pub fn adaptation_matrix_with(cone: &Matrix3x3, src: &Xyz, dst: &Xyz) -> Result<Matrix3x3> {
    let cone_inv = cone.try_inverse()?;
    let src_lms = cone.multiply_vec(src.to_array());
    let dst_lms = cone.multiply_vec(dst.to_array());

    let ratio = |d: f64, s: f64| if s.abs() > 1e-10 { d / s } else { 1.0 };
    let scale = Matrix3x3::diagonal(
        ratio(dst_lms[0], src_lms[0]),
        ratio(dst_lms[1], src_lms[1]),
        ratio(dst_lms[2], src_lms[2]),
    );

    // M = M_A^-1 × Scale × M_A
    Ok(cone_inv * (scale * *cone))
}

/// Bradford adaptation from `src` to `dst`
pub fn adaptation_matrix(src: &Xyz, dst: &Xyz) -> Result<Matrix3x3> {
    adaptation_matrix_with(&BRADFORD, src, dst)
}

/// Bradford adaptation from a white point to the D50 PCS illuminant
pub fn adaptation_to_d50(white: &Xyz) -> Result<Matrix3x3> {
    adaptation_matrix(white, &D50)
}

/// RGB → XYZ(D50) matrix from the chromaticities of a white point and three primaries
pub fn rgb_to_xyz_d50(white: &XyY, primaries: &[XyY; 3]) -> Result<Matrix3x3> {
    let [r, g, b] = primaries;
    let chroma = Matrix3x3::new([
        [r.x, g.x, b.x],
        [r.y, g.y, b.y],
        [1.0 - r.x - r.y, 1.0 - g.x - g.y, 1.0 - b.x - b.y],
    ]);

    let white_xyz = XyY::new(white.x, white.y, 1.0).to_xyz();
    let coef = chroma.solve(white_xyz.to_array())?;

    let mut m = chroma;
    for row in m.m.iter_mut() {
        for (cell, c) in row.iter_mut().zip(coef) {
            *cell *= c;
        }
    }

    Ok(adaptation_to_d50(&white_xyz)? * m)
}
