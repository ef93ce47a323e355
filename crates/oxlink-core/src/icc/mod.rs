//! ICC profile container and tag codec
//!
//! A profile is a 128-byte header, a tag directory and the tag bodies the
//! directory points at. Bodies may be shared between tags. See ICC.1:2022
//! section 7.
//!
//! The tag codec in [`tags`] decodes the types the transform core needs:
//! curves, XYZ, LUT8/LUT16, lutAtoB/lutBtoA, multi-processing elements and
//! named colors. Other tag types are carried as raw bytes.

pub mod header;
pub mod tags;

mod profile;
mod types;
mod virtual_profiles;

pub use header::{
    ColorSpace, HEADER_SIZE, PROFILE_SIGNATURE, ProfileClass, ProfileHeader, ProfileVersion,
};
pub use profile::{LutDirection, Profile};
pub use tags::{ElementHandler, TagDescriptor, TagTypeHandler, TagValue};
pub use types::{
    Signature, f64_to_s15_fixed16, f64_to_u8_fixed8, s15_fixed16_to_f64, tag, type_sig,
    u8_fixed8_to_f64,
};
pub use virtual_profiles::{D65_XYY, MAX_INK_LIMIT, REC709_PRIMARIES};
