//! Black Point Compensation (BPC)
//!
//! BPC is a per-axis affine scaling in XYZ that maps the source black point
//! onto the destination black point while keeping the D50 white fixed. This
//! prevents crushing of dark tones when the destination black is lighter,
//! and avoids a washed-out black when it is darker.

use crate::color::{D50, Xyz};
use crate::math::Matrix3x3;

/// Black point compensation as scale and offset per XYZ axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BpcParams {
    pub scale: [f64; 3],
    pub offset: [f64; 3],
}

impl BpcParams {
    /// Compensation taking `src_bp` to `dst_bp`
    ///
    /// Returns None when a source black component sits on the white point,
    /// where no affine map through white exists.
    pub fn calculate(src_bp: &Xyz, dst_bp: &Xyz) -> Option<Self> {
        let wp = D50.to_array();
        let src = src_bp.to_array();
        let dst = dst_bp.to_array();

        let mut scale = [0.0; 3];
        let mut offset = [0.0; 3];
        for i in 0..3 {
            let t = src[i] - wp[i];
            if t.abs() < 1e-10 {
                return None;
            }
            scale[i] = (dst[i] - wp[i]) / t;
            offset[i] = -wp[i] * (dst[i] - src[i]) / t;
        }
        Some(Self { scale, offset })
    }

    #[inline]
    pub fn apply(&self, xyz: [f64; 3]) -> [f64; 3] {
        [
            self.offset[0] + xyz[0] * self.scale[0],
            self.offset[1] + xyz[1] * self.scale[1],
            self.offset[2] + xyz[2] * self.scale[2],
        ]
    }

    /// The compensation as a matrix stage payload
    pub fn to_matrix(&self) -> (Matrix3x3, [f64; 3]) {
        (
            Matrix3x3::diagonal(self.scale[0], self.scale[1], self.scale[2]),
            self.offset,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_black_points_identity() {
        let bp = Xyz::new(0.01, 0.0104, 0.0086);
        let p = BpcParams::calculate(&bp, &bp).unwrap();
        let (m, off) = p.to_matrix();
        assert!(m.is_identity(1e-12));
        assert!(off.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_maps_black_and_keeps_white() {
        let src = Xyz::new(0.0, 0.0, 0.0);
        let dst = Xyz::new(0.02, 0.021, 0.017);
        let p = BpcParams::calculate(&src, &dst).unwrap();

        let black = p.apply(src.to_array());
        assert!(Xyz::from_array(black).approx_eq(&dst, 1e-12));
        let white = p.apply(D50.to_array());
        assert!(Xyz::from_array(white).approx_eq(&D50, 1e-12));
    }

    #[test]
    fn test_degenerate_source() {
        assert!(BpcParams::calculate(&D50, &Xyz::new(0.0, 0.0, 0.0)).is_none());
    }
}
