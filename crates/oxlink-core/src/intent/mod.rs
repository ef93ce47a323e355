//! Rendering intents and profile linking
//!
//! [`link_profiles`] turns a chain of profiles into one [`Pipeline`]. The
//! intent of the first step selects a handler from the context registry; the
//! built-in handlers are the four ICC intents, which share the default
//! linker, and six black-preserving intents for CMYK to CMYK chains.
//!
//! # Example
//!
//! ```
//! use oxlink_core::Context;
//! use oxlink_core::icc::Profile;
//! use oxlink_core::intent::{ChainStep, Intent, link_profiles};
//! use oxlink_core::transform::TransformFlags;
//!
//! let ctx = Context::new();
//! let srgb = Profile::srgb(&ctx).unwrap();
//! let lab = Profile::lab_v4(&ctx).unwrap();
//! let steps = [
//!     ChainStep::new(&srgb, Intent::PERCEPTUAL),
//!     ChainStep::new(&lab, Intent::PERCEPTUAL),
//! ];
//! let lut = link_profiles(&ctx, &steps, &TransformFlags::new()).unwrap();
//! assert_eq!((lut.input_channels(), lut.output_channels()), (3, 3));
//! ```

mod adaptation;
mod black_point;
mod black_preserve;
mod bpc;
#[cfg(test)]
pub(crate) mod fixtures;
mod gamut;
mod link;
mod loaders;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::icc::{ColorSpace, Profile};
use crate::pipeline::Pipeline;
use crate::transform::TransformFlags;

pub use adaptation::compute_absolute_intent;
pub use black_point::{detect_black_point, detect_destination_black_point};
pub use black_preserve::build_k_tone_curve;
pub use bpc::BpcParams;
pub use gamut::{create_gamut_check_pipeline, detect_tac};
pub use link::{IDENTITY_LAYER_TOLERANCE, default_icc_link};
pub use loaders::{read_devicelink_lut, read_input_lut, read_output_lut};

/// Most profiles a single chain may hold
pub const MAX_CHAIN_LENGTH: usize = 255;

/// Rendering intent code
///
/// Codes 0 to 3 are the ICC intents. 10 to 15 are the black-preserving
/// intents; any other value may be claimed by a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Intent(pub u32);

impl Intent {
    pub const PERCEPTUAL: Self = Self(0);
    pub const RELATIVE_COLORIMETRIC: Self = Self(1);
    pub const SATURATION: Self = Self(2);
    pub const ABSOLUTE_COLORIMETRIC: Self = Self(3);

    /// Keep K-only input pixels on the K channel
    pub const PRESERVE_K_ONLY_PERCEPTUAL: Self = Self(10);
    pub const PRESERVE_K_ONLY_RELATIVE_COLORIMETRIC: Self = Self(11);
    pub const PRESERVE_K_ONLY_SATURATION: Self = Self(12);

    /// Keep the whole K plane, re-solving CMY around it
    pub const PRESERVE_K_PLANE_PERCEPTUAL: Self = Self(13);
    pub const PRESERVE_K_PLANE_RELATIVE_COLORIMETRIC: Self = Self(14);
    pub const PRESERVE_K_PLANE_SATURATION: Self = Self(15);

    /// One of the four ICC intents
    pub fn is_icc(self) -> bool {
        self.0 <= Self::ABSOLUTE_COLORIMETRIC.0
    }

    /// Nearest ICC intent for a black-preserving one; others pass through
    pub fn to_icc(self) -> Self {
        match self.0 {
            10 | 13 => Self::PERCEPTUAL,
            11 | 14 => Self::RELATIVE_COLORIMETRIC,
            12 | 15 => Self::SATURATION,
            _ => self,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match builtin_name(*self) {
            Some(name) => f.write_str(name),
            None => write!(f, "intent {}", self.0),
        }
    }
}

fn builtin_name(intent: Intent) -> Option<&'static str> {
    Some(match intent.0 {
        0 => "Perceptual",
        1 => "Relative colorimetric",
        2 => "Saturation",
        3 => "Absolute colorimetric",
        10 => "Perceptual preserving black ink",
        11 => "Relative colorimetric preserving black ink",
        12 => "Saturation preserving black ink",
        13 => "Perceptual preserving black plane",
        14 => "Relative colorimetric preserving black plane",
        15 => "Saturation preserving black plane",
        _ => return None,
    })
}

/// One profile of a chain with its per-link settings
#[derive(Debug, Clone, Copy)]
pub struct ChainStep<'a> {
    pub profile: &'a Profile,
    pub intent: Intent,
    pub bpc: bool,
    /// 1.0 is full adaptation to the media white, 0.0 none
    pub adaptation_state: f64,
}

impl<'a> ChainStep<'a> {
    pub fn new(profile: &'a Profile, intent: Intent) -> Self {
        Self {
            profile,
            intent,
            bpc: false,
            adaptation_state: 1.0,
        }
    }

    pub fn with_bpc(mut self, bpc: bool) -> Self {
        self.bpc = bpc;
        self
    }

    pub fn with_adaptation_state(mut self, state: f64) -> Self {
        self.adaptation_state = state;
        self
    }
}

/// Builds the pipeline for a chain whose first step uses this intent
pub trait IntentHandler: Send + Sync {
    fn link(&self, ctx: &Context, steps: &[ChainStep<'_>], flags: &TransformFlags)
    -> Result<Pipeline>;
}

impl<F> IntentHandler for F
where
    F: Fn(&Context, &[ChainStep<'_>], &TransformFlags) -> Result<Pipeline> + Send + Sync,
{
    fn link(
        &self,
        ctx: &Context,
        steps: &[ChainStep<'_>],
        flags: &TransformFlags,
    ) -> Result<Pipeline> {
        self(ctx, steps, flags)
    }
}

/// Registry entry for an intent
#[derive(Clone)]
pub struct IntentEntry {
    pub intent: Intent,
    pub name: &'static str,
    pub handler: Arc<dyn IntentHandler>,
}

impl fmt::Debug for IntentEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentEntry")
            .field("intent", &self.intent)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The ten intents every context starts with
pub fn builtin_intents() -> Vec<IntentEntry> {
    let icc: Arc<dyn IntentHandler> = Arc::new(link::IccDefault);
    let k_only: Arc<dyn IntentHandler> = Arc::new(black_preserve::KOnly);
    let k_plane: Arc<dyn IntentHandler> = Arc::new(black_preserve::KPlane);

    [0, 1, 2, 3, 10, 11, 12, 13, 14, 15]
        .into_iter()
        .map(Intent)
        .filter_map(|intent| {
            let handler = match intent.0 {
                0..=3 => icc.clone(),
                10..=12 => k_only.clone(),
                _ => k_plane.clone(),
            };
            Some(IntentEntry {
                intent,
                name: builtin_name(intent)?,
                handler,
            })
        })
        .collect()
}

/// Link a chain of profiles into a single pipeline
///
/// Absolute colorimetric links never use black point compensation; v4
/// profiles under perceptual or saturation always do.
pub fn link_profiles(
    ctx: &Context,
    steps: &[ChainStep<'_>],
    flags: &TransformFlags,
) -> Result<Pipeline> {
    if steps.is_empty() || steps.len() > MAX_CHAIN_LENGTH {
        return Err(ctx.signal(Error::Range(format!(
            "{} profiles in a chain, expected 1..={MAX_CHAIN_LENGTH}",
            steps.len()
        ))));
    }

    let steps: Vec<ChainStep<'_>> = steps
        .iter()
        .map(|step| {
            let mut step = *step;
            if step.intent == Intent::ABSOLUTE_COLORIMETRIC {
                step.bpc = false;
            }
            if matches!(step.intent, Intent::PERCEPTUAL | Intent::SATURATION)
                && step.profile.version().is_v4()
            {
                step.bpc = true;
            }
            step
        })
        .collect();

    let entry = ctx
        .intent_entry(steps[0].intent)
        .ok_or_else(|| ctx.signal(Error::UnsupportedIntent(steps[0].intent.0)))?;
    debug!(intent = entry.name, profiles = steps.len(), "linking profiles");
    entry.handler.link(ctx, &steps, flags)
}

/// Link a chain that ends in an abstract Lab identity, used to measure colors
pub(crate) fn chain_to_lab(
    ctx: &Context,
    steps: &[ChainStep<'_>],
    flags: &TransformFlags,
) -> Result<Pipeline> {
    let lab = Profile::lab_v4(ctx)?;
    let mut chain = steps.to_vec();
    chain.push(ChainStep::new(&lab, Intent::RELATIVE_COLORIMETRIC));
    link_profiles(ctx, &chain, flags)
}

/// CLUT resolution for precalculating a transform from `space`
pub fn reasonable_grid_points(space: ColorSpace, flags: &TransformFlags) -> u32 {
    if let Some(points) = flags.grid_points {
        return points;
    }
    let channels = space.channels();
    if flags.high_res_precalc {
        return match channels {
            n if n > 4 => 7,
            4 => 33,
            _ => 49,
        };
    }
    if flags.low_res_precalc {
        return match channels {
            n if n > 4 => 6,
            4 => 23,
            1 => 33,
            _ => 17,
        };
    }
    match channels {
        n if n > 4 => 7,
        4 => 17,
        _ => 33,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_black_preserving() {
        assert_eq!(Intent::PRESERVE_K_ONLY_SATURATION.to_icc(), Intent::SATURATION);
        assert_eq!(
            Intent::PRESERVE_K_PLANE_RELATIVE_COLORIMETRIC.to_icc(),
            Intent::RELATIVE_COLORIMETRIC
        );
        assert_eq!(Intent(42).to_icc(), Intent(42));
        assert!(!Intent::PRESERVE_K_PLANE_PERCEPTUAL.is_icc());
    }

    #[test]
    fn test_builtins_registered() {
        let ctx = Context::new();
        let names = ctx.supported_intents();
        assert_eq!(names.len(), 10);
        assert!(names.contains(&(Intent::ABSOLUTE_COLORIMETRIC, "Absolute colorimetric")));
    }

    #[test]
    fn test_grid_points() {
        let f = TransformFlags::new();
        assert_eq!(reasonable_grid_points(ColorSpace::Cmyk, &f), 17);
        assert_eq!(reasonable_grid_points(ColorSpace::Cmyk, &f.with_high_res_precalc()), 33);
        assert_eq!(reasonable_grid_points(ColorSpace::Cmyk, &f.with_low_res_precalc()), 23);
        assert_eq!(reasonable_grid_points(ColorSpace::Rgb, &f), 33);
        assert_eq!(reasonable_grid_points(ColorSpace::Gray, &f.with_low_res_precalc()), 33);
        assert_eq!(reasonable_grid_points(ColorSpace::Color(6), &f), 7);
        assert_eq!(reasonable_grid_points(ColorSpace::Rgb, &f.with_grid_points(9)), 9);
    }

    #[test]
    fn test_empty_chain_rejected() {
        let ctx = Context::new();
        assert!(matches!(
            link_profiles(&ctx, &[], &TransformFlags::new()),
            Err(Error::Range(_))
        ));
    }

    #[test]
    fn test_unknown_intent() {
        let ctx = Context::new();
        let srgb = Profile::srgb(&ctx).unwrap();
        let steps = [ChainStep::new(&srgb, Intent(99))];
        assert_eq!(
            link_profiles(&ctx, &steps, &TransformFlags::new()),
            Err(Error::UnsupportedIntent(99))
        );
    }

    #[test]
    fn test_plugin_intent_handler() {
        let ctx = Context::new();
        fn passthrough(
            _: &Context,
            _: &[ChainStep<'_>],
            _: &TransformFlags,
        ) -> Result<Pipeline> {
            Pipeline::new(3, 3)
        }
        let handler: Arc<dyn IntentHandler> = Arc::new(passthrough);
        ctx.register_intents(vec![(Intent(300), "passthrough", handler)]);
        let srgb = Profile::srgb(&ctx).unwrap();
        let lut = link_profiles(
            &ctx,
            &[ChainStep::new(&srgb, Intent(300))],
            &TransformFlags::new(),
        )
        .unwrap();
        assert_eq!(lut.stage_count(), 0);
    }
}
