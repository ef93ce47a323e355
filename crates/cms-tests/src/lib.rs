//! # cms-tests
//!
//! Scenario tests for oxlink.
//!
//! This crate provides:
//! - A synthetic CMYK press profile built only through the public API
//! - Seeded pixel patterns for RGB and CMYK buffers
//! - Color difference statistics over Lab buffers
//!
//! ## Test Categories
//!
//! 1. **End to end**: sRGB to CMYK and back through whole transforms
//! 2. **Codec**: pipelines surviving LUT16, mAB/mBA and MPE encodings
//! 3. **Black preservation**: K-only and K-plane CMYK links
//! 4. **Gamut check**: alarm codes on proofing transforms
//! 5. **Cache and scheduling**: cached, uncached and parallel runs agree

pub mod accuracy;
pub mod fixtures;
pub mod patterns;

pub use accuracy::{DeltaEStats, compare_lab_buffers};
pub use fixtures::{PressSpec, press_lab, press_profile, reparse};
