//! Mathematical operations for color management
//!
//! - 3x3 matrix operations for PCS conversions and black point scaling
//! - Parametric transfer functions (ICC and MPE segment types)
//! - Chromatic adaptation (Bradford)
//! - Interpolation over N-dimensional lookup grids

pub mod chromatic_adaptation;
pub mod gamma;
pub mod interpolation;
pub mod matrix;

pub use chromatic_adaptation::{adaptation_matrix, adaptation_to_d50, rgb_to_xyz_d50};
pub use gamma::{ParametricCurve, eval_parametric, param_count};
pub use interpolation::{GridLayout, GridSample, InterpolationMode, interpolate};
pub use matrix::Matrix3x3;

/// Round to the nearest 16-bit value, saturating
#[inline]
pub fn quick_saturate_word(v: f64) -> u16 {
    let v = v + 0.5;
    if v <= 0.0 {
        0
    } else if v >= 65535.0 {
        0xffff
    } else {
        v.floor() as u16
    }
}

/// Normalized float to 16-bit
#[inline]
pub fn f32_to_u16(v: f32) -> u16 {
    quick_saturate_word(v as f64 * 65535.0)
}

/// 16-bit to normalized float
#[inline]
pub fn u16_to_f32(v: u16) -> f32 {
    v as f32 / 65535.0
}

/// Grid node `i` of `n` in 16-bit units: floor(i * 65535 / (n - 1) + 0.5)
#[inline]
pub fn quantize_grid(i: u32, n: u32) -> u16 {
    let x = (i as f64 * 65535.0) / (n - 1) as f64;
    quick_saturate_word(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_grid() {
        assert_eq!(quantize_grid(0, 17), 0);
        assert_eq!(quantize_grid(16, 17), 65535);
        assert_eq!(quantize_grid(8, 17), 32768);
        assert_eq!(quantize_grid(1, 3), 32768);
    }

    #[test]
    fn test_saturate() {
        assert_eq!(quick_saturate_word(-4.0), 0);
        assert_eq!(quick_saturate_word(70000.0), 0xffff);
        assert_eq!(f32_to_u16(0.5), 32768);
    }
}
