//! Color space types and conversions
//!
//! This module provides:
//! - CIE XYZ and xyY with the ICC fixed-point encodings
//! - CIELAB with the v2 and v4 encodings
//! - White points and correlated color temperature

pub mod lab;
pub mod white_point;
pub mod xyz;

pub use lab::{Lab, delta_e};
pub use white_point::{D50, D65, temperature_from_white_point, white_point_from_temperature};
pub use xyz::{MAX_ENCODEABLE_XYZ, XyY, Xyz};
