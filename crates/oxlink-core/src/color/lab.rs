//! CIELAB (L*a*b*) Color Space
//!
//! - L*: Lightness (0 = black, 100 = white)
//! - a*: Green-red axis
//! - b*: Blue-yellow axis
//!
//! Pipelines carry Lab normalized as `L/100, (a+128)/255, (b+128)/255`,
//! which is the ICC v4 16-bit encoding divided by 65535.

use crate::color::{D50, Xyz};

/// CIELAB color coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

impl Lab {
    #[inline]
    pub const fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }

    #[inline]
    pub const fn to_array(&self) -> [f64; 3] {
        [self.l, self.a, self.b]
    }

    /// Convert from XYZ relative to the D50 PCS white
    pub fn from_xyz(xyz: Xyz) -> Self {
        Self::from_xyz_with_white(xyz, &D50)
    }

    pub fn from_xyz_with_white(xyz: Xyz, white: &Xyz) -> Self {
        let fx = lab_f(xyz.x / white.x);
        let fy = lab_f(xyz.y / white.y);
        let fz = lab_f(xyz.z / white.z);

        Self {
            l: 116.0 * fy - 16.0,
            a: 500.0 * (fx - fy),
            b: 200.0 * (fy - fz),
        }
    }

    pub fn to_xyz(&self) -> Xyz {
        self.to_xyz_with_white(&D50)
    }

    pub fn to_xyz_with_white(&self, white: &Xyz) -> Xyz {
        let fy = (self.l + 16.0) / 116.0;
        let fx = self.a / 500.0 + fy;
        let fz = fy - self.b / 200.0;

        Xyz::new(
            lab_f_inv(fx) * white.x,
            lab_f_inv(fy) * white.y,
            lab_f_inv(fz) * white.z,
        )
    }

    /// Normalized pipeline encoding
    #[inline]
    pub fn to_encoded_float(&self) -> [f32; 3] {
        [
            (self.l / 100.0) as f32,
            ((self.a + 128.0) / 255.0) as f32,
            ((self.b + 128.0) / 255.0) as f32,
        ]
    }

    #[inline]
    pub fn from_encoded_float(v: &[f32]) -> Self {
        Self::new(
            v[0] as f64 * 100.0,
            v[1] as f64 * 255.0 - 128.0,
            v[2] as f64 * 255.0 - 128.0,
        )
    }

    /// ICC v4 16-bit encoding
    pub fn to_encoded_u16(&self) -> [u16; 3] {
        [
            quantize(self.l.clamp(0.0, 100.0) * 655.35),
            quantize((self.a.clamp(-128.0, 127.0) + 128.0) * 257.0),
            quantize((self.b.clamp(-128.0, 127.0) + 128.0) * 257.0),
        ]
    }

    pub fn from_encoded_u16(v: &[u16]) -> Self {
        Self::new(
            v[0] as f64 / 655.35,
            v[1] as f64 / 257.0 - 128.0,
            v[2] as f64 / 257.0 - 128.0,
        )
    }

    /// ICC v2 16-bit encoding, where 0xFF00 is L* 100
    pub fn to_encoded_u16_v2(&self) -> [u16; 3] {
        [
            quantize(self.l.clamp(0.0, 100.0) * 652.8),
            quantize((self.a.clamp(-128.0, 127.9961) + 128.0) * 256.0),
            quantize((self.b.clamp(-128.0, 127.9961) + 128.0) * 256.0),
        ]
    }

    pub fn from_encoded_u16_v2(v: &[u16]) -> Self {
        Self::new(
            v[0] as f64 / 652.8,
            v[1] as f64 / 256.0 - 128.0,
            v[2] as f64 / 256.0 - 128.0,
        )
    }

    #[inline]
    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        (self.l - other.l).abs() < epsilon
            && (self.a - other.a).abs() < epsilon
            && (self.b - other.b).abs() < epsilon
    }
}

#[inline]
fn quantize(v: f64) -> u16 {
    (v + 0.5).floor().clamp(0.0, 65535.0) as u16
}

#[inline]
fn lab_f(t: f64) -> f64 {
    const LIMIT: f64 = (24.0 / 116.0) * (24.0 / 116.0) * (24.0 / 116.0);

    if t > LIMIT {
        t.cbrt()
    } else {
        (841.0 / 108.0) * t + 16.0 / 116.0
    }
}

#[inline]
fn lab_f_inv(t: f64) -> f64 {
    const LIMIT: f64 = 24.0 / 116.0;

    if t > LIMIT {
        t * t * t
    } else {
        (108.0 / 841.0) * (t - 16.0 / 116.0)
    }
}

/// CIE76 color difference
pub fn delta_e(a: &Lab, b: &Lab) -> f64 {
    let dl = a.l - b.l;
    let da = a.a - b.a;
    let db = a.b - b.b;
    (dl * dl + da * da + db * db).sqrt()
}
