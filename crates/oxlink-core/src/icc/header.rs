//! ICC Profile Header
//!
//! The header is exactly 128 bytes. See ICC.1:2022 section 7.2.

use crate::color::D50;
use crate::error::{Error, Result};
use crate::intent::Intent;

use super::types::{Signature, f64_to_s15_fixed16};

/// Profile file signature 'acsp'
pub const PROFILE_SIGNATURE: Signature = Signature::from_bytes(*b"acsp");

/// Header length, also the smallest valid profile
pub const HEADER_SIZE: usize = 128;

/// Profile header fields this engine keeps
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileHeader {
    pub cmm_type: u32,
    pub version: ProfileVersion,
    pub device_class: ProfileClass,
    pub color_space: ColorSpace,
    pub pcs: ColorSpace,
    pub flags: u32,
    pub manufacturer: u32,
    pub model: u32,
    pub attributes: u64,
    pub rendering_intent: Intent,
    pub creator: u32,
    pub profile_id: [u8; 16],
}

impl Default for ProfileHeader {
    fn default() -> Self {
        Self {
            cmm_type: 0,
            version: ProfileVersion::V4_4,
            device_class: ProfileClass::Display,
            color_space: ColorSpace::Rgb,
            pcs: ColorSpace::Xyz,
            flags: 0,
            manufacturer: 0,
            model: 0,
            attributes: 0,
            rendering_intent: Intent::PERCEPTUAL,
            creator: 0,
            profile_id: [0; 16],
        }
    }
}

fn be_u32(data: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

impl ProfileHeader {
    /// Parse the first 128 bytes of a profile
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::truncated(0, HEADER_SIZE, data.len()));
        }

        let magic = Signature(be_u32(data, 36));
        if magic != PROFILE_SIGNATURE {
            return Err(Error::UnknownSignature {
                kind: "profile file",
                signature: magic,
            });
        }

        let mut profile_id = [0u8; 16];
        profile_id.copy_from_slice(&data[84..100]);

        Ok(Self {
            cmm_type: be_u32(data, 4),
            version: ProfileVersion::from_encoded(be_u32(data, 8)),
            device_class: ProfileClass::from_signature(Signature(be_u32(data, 12)))?,
            color_space: ColorSpace::from_signature(Signature(be_u32(data, 16)))?,
            pcs: ColorSpace::from_signature(Signature(be_u32(data, 20)))?,
            flags: be_u32(data, 44),
            manufacturer: be_u32(data, 48),
            model: be_u32(data, 52),
            attributes: u64::from_be_bytes([
                data[56], data[57], data[58], data[59], data[60], data[61], data[62], data[63],
            ]),
            rendering_intent: Intent(be_u32(data, 64)),
            creator: be_u32(data, 80),
            profile_id,
        })
    }

    /// Encode the header for a profile of `profile_size` bytes
    pub fn to_bytes(&self, profile_size: u32) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let mut put = |at: usize, v: u32| out[at..at + 4].copy_from_slice(&v.to_be_bytes());
        put(0, profile_size);
        put(4, self.cmm_type);
        put(8, self.version.encoded());
        put(12, self.device_class.signature().0);
        put(16, self.color_space.signature().0);
        put(20, self.pcs.signature().0);
        put(36, PROFILE_SIGNATURE.0);
        put(44, self.flags);
        put(48, self.manufacturer);
        put(52, self.model);
        put(64, self.rendering_intent.0);
        put(68, f64_to_s15_fixed16(D50.x) as u32);
        put(72, f64_to_s15_fixed16(D50.y) as u32);
        put(76, f64_to_s15_fixed16(D50.z) as u32);
        put(80, self.creator);
        out[56..64].copy_from_slice(&self.attributes.to_be_bytes());
        out[84..100].copy_from_slice(&self.profile_id);
        out
    }
}

/// ICC profile version (major.minor.patch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ProfileVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl ProfileVersion {
    pub const V2_1: Self = Self::new(2, 1, 0);
    pub const V4_4: Self = Self::new(4, 4, 0);

    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// From the header's BCD word, e.g. `0x04300000`
    pub fn from_encoded(raw: u32) -> Self {
        let b = raw.to_be_bytes();
        Self::new(b[0], b[1] >> 4, b[1] & 0x0F)
    }

    pub fn encoded(&self) -> u32 {
        u32::from_be_bytes([self.major, (self.minor << 4) | (self.patch & 0x0F), 0, 0])
    }

    /// Version as a decimal number, 4.3 for 4.3.0
    pub fn as_f64(&self) -> f64 {
        self.major as f64 + self.minor as f64 / 10.0 + self.patch as f64 / 100.0
    }

    pub fn at_least(&self, major: u8, minor: u8) -> bool {
        self.major > major || (self.major == major && self.minor >= minor)
    }

    pub fn is_v4(&self) -> bool {
        self.major >= 4
    }
}

/// ICC Profile Class (Device Class)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProfileClass {
    /// Input device (scanner, camera)
    Input,
    /// Display device (monitor)
    Display,
    /// Output device (printer)
    Output,
    DeviceLink,
    /// Color space conversion
    ColorSpace,
    Abstract,
    NamedColor,
}

impl ProfileClass {
    pub fn from_signature(sig: Signature) -> Result<Self> {
        match &sig.to_bytes() {
            b"scnr" => Ok(Self::Input),
            b"mntr" => Ok(Self::Display),
            b"prtr" => Ok(Self::Output),
            b"link" => Ok(Self::DeviceLink),
            b"spac" => Ok(Self::ColorSpace),
            b"abst" => Ok(Self::Abstract),
            b"nmcl" => Ok(Self::NamedColor),
            _ => Err(Error::UnknownSignature {
                kind: "device class",
                signature: sig,
            }),
        }
    }

    pub fn signature(&self) -> Signature {
        Signature::from_bytes(match self {
            Self::Input => *b"scnr",
            Self::Display => *b"mntr",
            Self::Output => *b"prtr",
            Self::DeviceLink => *b"link",
            Self::ColorSpace => *b"spac",
            Self::Abstract => *b"abst",
            Self::NamedColor => *b"nmcl",
        })
    }
}

/// ICC data color space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorSpace {
    Xyz,
    Lab,
    Luv,
    YCbCr,
    Yxy,
    Rgb,
    Gray,
    Hsv,
    Hls,
    Cmyk,
    Cmy,
    /// N-color multichannel spaces, 2 to 15 channels
    Color(u8),
}

const COLOR_N: [&[u8; 4]; 14] = [
    b"2CLR", b"3CLR", b"4CLR", b"5CLR", b"6CLR", b"7CLR", b"8CLR", b"9CLR", b"ACLR", b"BCLR",
    b"CCLR", b"DCLR", b"ECLR", b"FCLR",
];

const MCH_N: [&[u8; 4]; 14] = [
    b"MCH2", b"MCH3", b"MCH4", b"MCH5", b"MCH6", b"MCH7", b"MCH8", b"MCH9", b"MCHA", b"MCHB",
    b"MCHC", b"MCHD", b"MCHE", b"MCHF",
];

impl ColorSpace {
    pub fn from_signature(sig: Signature) -> Result<Self> {
        let bytes = sig.to_bytes();
        let space = match &bytes {
            b"XYZ " => Self::Xyz,
            b"Lab " => Self::Lab,
            b"Luv " => Self::Luv,
            b"YCbr" => Self::YCbCr,
            b"Yxy " => Self::Yxy,
            b"RGB " => Self::Rgb,
            b"GRAY" => Self::Gray,
            b"HSV " => Self::Hsv,
            b"HLS " => Self::Hls,
            b"CMYK" => Self::Cmyk,
            b"CMY " => Self::Cmy,
            other => {
                let n = COLOR_N
                    .iter()
                    .chain(MCH_N.iter())
                    .position(|s| *s == other)
                    .ok_or(Error::UnknownSignature {
                        kind: "color space",
                        signature: sig,
                    })?;
                Self::Color((n % 14) as u8 + 2)
            }
        };
        Ok(space)
    }

    pub fn signature(&self) -> Signature {
        match self {
            Self::Color(n) => {
                let i = (*n).clamp(2, 15) as usize - 2;
                Signature::from_bytes(*COLOR_N[i])
            }
            other => Signature::from_bytes(match other {
                Self::Xyz => *b"XYZ ",
                Self::Lab => *b"Lab ",
                Self::Luv => *b"Luv ",
                Self::YCbCr => *b"YCbr",
                Self::Yxy => *b"Yxy ",
                Self::Rgb => *b"RGB ",
                Self::Gray => *b"GRAY",
                Self::Hsv => *b"HSV ",
                Self::Hls => *b"HLS ",
                Self::Cmyk => *b"CMYK",
                _ => *b"CMY ",
            }),
        }
    }

    /// Number of channels for this color space
    pub fn channels(&self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Cmyk => 4,
            Self::Color(n) => *n as usize,
            _ => 3,
        }
    }

    /// XYZ or Lab
    pub fn is_pcs(&self) -> bool {
        matches!(self, Self::Xyz | Self::Lab)
    }

    /// Spaces whose float encoding is percent of ink
    pub fn is_ink_space(&self) -> bool {
        matches!(self, Self::Cmy | Self::Cmyk | Self::Color(_))
    }

    /// Whether data in `self` may feed a step declared for `other`
    pub fn is_compatible_with(&self, other: ColorSpace) -> bool {
        match (*self, other) {
            (a, b) if a == b => true,
            (Self::Cmyk, Self::Color(4)) | (Self::Color(4), Self::Cmyk) => true,
            (Self::Xyz, Self::Lab) | (Self::Lab, Self::Xyz) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_space_channels() {
        assert_eq!(ColorSpace::Gray.channels(), 1);
        assert_eq!(ColorSpace::Rgb.channels(), 3);
        assert_eq!(ColorSpace::Cmyk.channels(), 4);
        assert_eq!(ColorSpace::Color(7).channels(), 7);
    }

    #[test]
    fn test_multichannel_aliases() {
        let mch = ColorSpace::from_signature(Signature::from_bytes(*b"MCH6")).unwrap();
        assert_eq!(mch, ColorSpace::Color(6));
        assert_eq!(mch.signature(), Signature::from_bytes(*b"6CLR"));
    }

    #[test]
    fn test_compatibility() {
        assert!(ColorSpace::Cmyk.is_compatible_with(ColorSpace::Color(4)));
        assert!(ColorSpace::Lab.is_compatible_with(ColorSpace::Xyz));
        assert!(!ColorSpace::Rgb.is_compatible_with(ColorSpace::Cmyk));
    }

    #[test]
    fn test_profile_class_roundtrip() {
        for class in [
            ProfileClass::Input,
            ProfileClass::Display,
            ProfileClass::Output,
            ProfileClass::DeviceLink,
            ProfileClass::NamedColor,
        ] {
            assert_eq!(ProfileClass::from_signature(class.signature()).unwrap(), class);
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let header = ProfileHeader {
            device_class: ProfileClass::Output,
            color_space: ColorSpace::Cmyk,
            pcs: ColorSpace::Lab,
            version: ProfileVersion::new(2, 1, 0),
            rendering_intent: Intent::RELATIVE_COLORIMETRIC,
            ..Default::default()
        };
        let bytes = header.to_bytes(128);
        assert_eq!(ProfileHeader::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn test_profile_version() {
        let v = ProfileVersion::from_encoded(0x0430_0000);
        assert_eq!(v, ProfileVersion::new(4, 3, 0));
        assert_eq!(v.encoded(), 0x0430_0000);
        assert!((v.as_f64() - 4.3).abs() < 1e-9);
        assert!(v.at_least(4, 2));
        assert!(!ProfileVersion::V2_1.is_v4());
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = ProfileHeader::default().to_bytes(128);
        bytes[36] = b'x';
        assert!(ProfileHeader::parse(&bytes).is_err());
        assert!(ProfileHeader::parse(&bytes[..100]).is_err());
    }
}
