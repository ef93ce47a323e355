//! CIE XYZ Color Space
//!
//! XYZ is one of the two Profile Connection Spaces. Inside pipelines it is
//! carried in the ICC 1.15 fixed-point encoding, normalized so that the
//! largest encodeable value maps to 1.0.

use std::ops::{Add, Mul, Sub};

/// Largest XYZ component the 1.15 fixed-point PCS encoding can hold
pub const MAX_ENCODEABLE_XYZ: f64 = 1.0 + 32767.0 / 32768.0;

/// CIE 1931 XYZ color coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Xyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Chromaticity plus luminance
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XyY {
    pub x: f64,
    pub y: f64,
    pub big_y: f64,
}

impl Xyz {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn from_array(arr: [f64; 3]) -> Self {
        Self {
            x: arr[0],
            y: arr[1],
            z: arr[2],
        }
    }

    #[inline]
    pub const fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    #[inline]
    pub fn scale(&self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }

    /// Convert to xyY. Black maps to the D50 chromaticity with zero luminance.
    pub fn to_xyy(&self) -> XyY {
        let sum = self.x + self.y + self.z;
        if sum.abs() < 1e-12 {
            let d50 = super::D50.to_xyy();
            return XyY {
                big_y: 0.0,
                ..d50
            };
        }
        XyY {
            x: self.x / sum,
            y: self.y / sum,
            big_y: self.y,
        }
    }

    /// Pipeline float encoding: each component divided by [`MAX_ENCODEABLE_XYZ`]
    #[inline]
    pub fn to_encoded_float(&self) -> [f32; 3] {
        [
            (self.x / MAX_ENCODEABLE_XYZ) as f32,
            (self.y / MAX_ENCODEABLE_XYZ) as f32,
            (self.z / MAX_ENCODEABLE_XYZ) as f32,
        ]
    }

    #[inline]
    pub fn from_encoded_float(v: &[f32]) -> Self {
        Self::new(
            v[0] as f64 * MAX_ENCODEABLE_XYZ,
            v[1] as f64 * MAX_ENCODEABLE_XYZ,
            v[2] as f64 * MAX_ENCODEABLE_XYZ,
        )
    }

    /// 16-bit 1.15 fixed-point encoding
    pub fn to_encoded_u16(&self) -> [u16; 3] {
        let enc = |v: f64| (v.clamp(0.0, MAX_ENCODEABLE_XYZ) * 32768.0 + 0.5).floor() as u16;
        [enc(self.x), enc(self.y), enc(self.z)]
    }

    pub fn from_encoded_u16(v: &[u16]) -> Self {
        Self::new(
            v[0] as f64 / 32768.0,
            v[1] as f64 / 32768.0,
            v[2] as f64 / 32768.0,
        )
    }

    #[inline]
    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        (self.x - other.x).abs() < epsilon
            && (self.y - other.y).abs() < epsilon
            && (self.z - other.z).abs() < epsilon
    }
}

impl XyY {
    pub const fn new(x: f64, y: f64, big_y: f64) -> Self {
        Self { x, y, big_y }
    }

    pub fn to_xyz(&self) -> Xyz {
        if self.y.abs() < 1e-12 {
            return Xyz::default();
        }
        Xyz::new(
            self.x / self.y * self.big_y,
            self.big_y,
            (1.0 - self.x - self.y) / self.y * self.big_y,
        )
    }
}

impl From<[f64; 3]> for Xyz {
    fn from(arr: [f64; 3]) -> Self {
        Self::from_array(arr)
    }
}

impl From<Xyz> for [f64; 3] {
    fn from(xyz: Xyz) -> Self {
        xyz.to_array()
    }
}

impl Add for Xyz {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Xyz {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Xyz {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        self.scale(rhs)
    }
}
