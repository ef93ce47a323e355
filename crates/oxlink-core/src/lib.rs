//! # oxlink - ICC pipelines, profile linking and color transforms
//!
//! The core of a color management engine in Rust.
//!
//! ## Layers
//!
//! - **Pipeline**: an ordered list of typed stages (curves, matrices, CLUTs,
//!   Lab/XYZ conversions, named colors) evaluated in float or 16-bit.
//! - **Tag codec**: reads and writes pipelines as `mft1`, `mft2`, `mAB `,
//!   `mBA ` and `mpet` tags, through registries a [`Context`] owns.
//! - **Intents**: links a chain of profiles into one pipeline with the four
//!   ICC intents, black point compensation, absolute adaptation and the
//!   black-preserving CMYK intents. Also builds gamut-check pipelines.
//! - **Transform**: binds pixel formats to a linked pipeline and converts
//!   buffers, optionally through a parallel scheduler.
//!
//! ## Quick Start
//!
//! ```
//! use oxlink_core::Context;
//! use oxlink_core::icc::Profile;
//! use oxlink_core::intent::Intent;
//! use oxlink_core::transform::{PixelFormat, Transform, TransformFlags};
//!
//! let ctx = Context::new();
//! let srgb = Profile::srgb(&ctx).unwrap();
//!
//! let transform = Transform::create(
//!     &ctx,
//!     &srgb,
//!     PixelFormat::RGB_8,
//!     &srgb,
//!     PixelFormat::RGB_8,
//!     Intent::PERCEPTUAL,
//!     TransformFlags::new(),
//! )
//! .unwrap();
//!
//! let src = [255u8, 128, 64];
//! let mut dst = [0u8; 3];
//! transform.transform(&src, &mut dst, 1).unwrap();
//! ```

pub mod color;
pub mod context;
pub mod error;
pub mod icc;
pub mod intent;
pub mod math;
pub mod pipeline;
pub mod registry;
pub mod simd;
pub mod transform;

pub use color::{Lab, Xyz};
pub use context::{Context, ContextMutex, ErrorHandler, MAX_CHANNELS, MutexProvider};
pub use error::{Error, ErrorCode, Result};
pub use icc::{ColorSpace, Profile, ProfileClass, ProfileVersion};
pub use intent::{ChainStep, Intent, link_profiles};
pub use pipeline::{Pipeline, Stage, ToneCurve};
pub use transform::{PixelFormat, Transform, TransformFlags};

/// Version of oxlink
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
