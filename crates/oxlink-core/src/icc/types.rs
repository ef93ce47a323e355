//! ICC signatures and fixed-point number helpers
//!
//! These match the encodings of ICC.1:2022 section 4.

use std::fmt;

/// Four-byte big-endian ICC signature (tag, tag type, element or color space)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Signature(pub u32);

impl Signature {
    /// Create from 4 ASCII characters
    pub const fn from_bytes(b: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(b))
    }

    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_bytes();
        if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            for b in bytes {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            write!(f, "0x{:08X}", self.0)
        }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature('{self}')")
    }
}

/// Tag signatures
pub mod tag {
    use super::Signature;

    pub const A2B0: Signature = Signature::from_bytes(*b"A2B0");
    pub const A2B1: Signature = Signature::from_bytes(*b"A2B1");
    pub const A2B2: Signature = Signature::from_bytes(*b"A2B2");
    pub const B2A0: Signature = Signature::from_bytes(*b"B2A0");
    pub const B2A1: Signature = Signature::from_bytes(*b"B2A1");
    pub const B2A2: Signature = Signature::from_bytes(*b"B2A2");
    pub const D2B0: Signature = Signature::from_bytes(*b"D2B0");
    pub const D2B1: Signature = Signature::from_bytes(*b"D2B1");
    pub const D2B2: Signature = Signature::from_bytes(*b"D2B2");
    pub const D2B3: Signature = Signature::from_bytes(*b"D2B3");
    pub const B2D0: Signature = Signature::from_bytes(*b"B2D0");
    pub const B2D1: Signature = Signature::from_bytes(*b"B2D1");
    pub const B2D2: Signature = Signature::from_bytes(*b"B2D2");
    pub const B2D3: Signature = Signature::from_bytes(*b"B2D3");
    pub const GAMUT: Signature = Signature::from_bytes(*b"gamt");
    pub const PREVIEW0: Signature = Signature::from_bytes(*b"pre0");
    pub const PREVIEW1: Signature = Signature::from_bytes(*b"pre1");
    pub const PREVIEW2: Signature = Signature::from_bytes(*b"pre2");
    pub const RED_COLORANT: Signature = Signature::from_bytes(*b"rXYZ");
    pub const GREEN_COLORANT: Signature = Signature::from_bytes(*b"gXYZ");
    pub const BLUE_COLORANT: Signature = Signature::from_bytes(*b"bXYZ");
    pub const RED_TRC: Signature = Signature::from_bytes(*b"rTRC");
    pub const GREEN_TRC: Signature = Signature::from_bytes(*b"gTRC");
    pub const BLUE_TRC: Signature = Signature::from_bytes(*b"bTRC");
    pub const GRAY_TRC: Signature = Signature::from_bytes(*b"kTRC");
    pub const MEDIA_WHITE: Signature = Signature::from_bytes(*b"wtpt");
    pub const MEDIA_BLACK: Signature = Signature::from_bytes(*b"bkpt");
    pub const LUMINANCE: Signature = Signature::from_bytes(*b"lumi");
    pub const CHAD: Signature = Signature::from_bytes(*b"chad");
    pub const NAMED_COLOR2: Signature = Signature::from_bytes(*b"ncl2");
}

/// Tag type and multi-processing element signatures
pub mod type_sig {
    use super::Signature;

    pub const XYZ: Signature = Signature::from_bytes(*b"XYZ ");
    pub const CURVE: Signature = Signature::from_bytes(*b"curv");
    pub const PARAMETRIC_CURVE: Signature = Signature::from_bytes(*b"para");
    pub const S15_FIXED16_ARRAY: Signature = Signature::from_bytes(*b"sf32");
    pub const LUT8: Signature = Signature::from_bytes(*b"mft1");
    pub const LUT16: Signature = Signature::from_bytes(*b"mft2");
    pub const LUT_A_TO_B: Signature = Signature::from_bytes(*b"mAB ");
    pub const LUT_B_TO_A: Signature = Signature::from_bytes(*b"mBA ");
    pub const MULTI_PROCESS_ELEMENT: Signature = Signature::from_bytes(*b"mpet");
    pub const NAMED_COLOR2: Signature = Signature::from_bytes(*b"ncl2");

    pub const CURVE_SET_ELEMENT: Signature = Signature::from_bytes(*b"cvst");
    pub const MATRIX_ELEMENT: Signature = Signature::from_bytes(*b"matf");
    pub const CLUT_ELEMENT: Signature = Signature::from_bytes(*b"clut");
    pub const B_ACS_ELEMENT: Signature = Signature::from_bytes(*b"bACS");
    pub const E_ACS_ELEMENT: Signature = Signature::from_bytes(*b"eACS");

    pub const SEGMENTED_CURVE: Signature = Signature::from_bytes(*b"curf");
    pub const FORMULA_SEGMENT: Signature = Signature::from_bytes(*b"parf");
    pub const SAMPLED_SEGMENT: Signature = Signature::from_bytes(*b"samf");
}

/// s15Fixed16Number to float
pub fn s15_fixed16_to_f64(raw: i32) -> f64 {
    raw as f64 / 65536.0
}

/// Float to s15Fixed16Number, rounded to nearest
pub fn f64_to_s15_fixed16(v: f64) -> i32 {
    (v * 65536.0 + 0.5).floor() as i32
}

/// u8Fixed8Number to float
pub fn u8_fixed8_to_f64(raw: u16) -> f64 {
    raw as f64 / 256.0
}

/// Float to u8Fixed8Number, rounded to nearest
pub fn f64_to_u8_fixed8(v: f64) -> u16 {
    (v * 256.0 + 0.5).floor().clamp(0.0, u16::MAX as f64) as u16
}
