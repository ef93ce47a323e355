//! Color transforms over pixel buffers
//!
//! A [`Transform`] links a chain of profiles once, picks an execution path
//! from the flags and the pixel formats, and then converts any number of
//! buffers. Execution takes `&self`, so one transform can serve many threads.
//!
//! # Example
//!
//! ```
//! use oxlink_core::Context;
//! use oxlink_core::icc::Profile;
//! use oxlink_core::intent::Intent;
//! use oxlink_core::transform::{PixelFormat, Transform, TransformFlags};
//!
//! let ctx = Context::new();
//! let srgb = Profile::srgb(&ctx).unwrap();
//! let lab = Profile::lab_v4(&ctx).unwrap();
//! let xform = Transform::create(
//!     &ctx,
//!     &srgb,
//!     PixelFormat::RGB_8,
//!     &lab,
//!     PixelFormat::LAB_DBL,
//!     Intent::PERCEPTUAL,
//!     TransformFlags::new(),
//! )
//! .unwrap();
//!
//! let mut lab_values = [0f64; 3];
//! xform.transform_typed(&[255u8, 255, 255], &mut lab_values, 1).unwrap();
//! assert!((lab_values[0] - 100.0).abs() < 0.5);
//! ```

mod flags;
mod format;
mod scheduler;
mod worker;

use std::sync::Arc;

use bytemuck::Pod;
use tracing::debug;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::icc::{ColorSpace, Profile, ProfileClass};
use crate::intent::{
    ChainStep, Intent, create_gamut_check_pipeline, link_profiles, reasonable_grid_points,
};
use crate::pipeline::{Clut, Pipeline, Stage};

pub use flags::TransformFlags;
pub use format::PixelFormat;
#[cfg(feature = "parallel")]
pub use scheduler::RayonScheduler;
pub use scheduler::{ParallelScheduler, WorkSlice};

use format::Formatter;
use worker::{Executor, Kernel};

/// A linked, ready-to-run color transform
pub struct Transform {
    ctx: Context,
    executor: Executor,
    entry: ColorSpace,
    exit: ColorSpace,
    flags: TransformFlags,
    scheduler: Option<Arc<dyn ParallelScheduler>>,
    /// Created with formats of at least 16 bits
    reformattable: bool,
}

impl Transform {
    /// Transform between two profiles
    pub fn create(
        ctx: &Context,
        input: &Profile,
        input_format: PixelFormat,
        output: &Profile,
        output_format: PixelFormat,
        intent: Intent,
        flags: TransformFlags,
    ) -> Result<Self> {
        Self::multiprofile(ctx, &[input, output], input_format, output_format, intent, flags)
    }

    /// Transform through a chain sharing one intent
    ///
    /// Black point compensation follows the flags and adaptation follows the
    /// context.
    pub fn multiprofile(
        ctx: &Context,
        profiles: &[&Profile],
        input_format: PixelFormat,
        output_format: PixelFormat,
        intent: Intent,
        flags: TransformFlags,
    ) -> Result<Self> {
        let steps: Vec<ChainStep<'_>> = profiles
            .iter()
            .map(|p| {
                ChainStep::new(p, intent)
                    .with_bpc(flags.black_point_compensation)
                    .with_adaptation_state(ctx.adaptation_state())
            })
            .collect();
        Self::extended(ctx, &steps, None, input_format, output_format, flags)
    }

    /// Soft-proof through `proofing` and/or mark colors it cannot reproduce
    ///
    /// The four-profile proofing chain only runs with `soft_proofing`; the
    /// gamut check only with `gamut_check`.
    #[allow(clippy::too_many_arguments)]
    pub fn proofing(
        ctx: &Context,
        input: &Profile,
        input_format: PixelFormat,
        output: &Profile,
        output_format: PixelFormat,
        proofing: &Profile,
        intent: Intent,
        proofing_intent: Intent,
        flags: TransformFlags,
    ) -> Result<Self> {
        let bpc = flags.black_point_compensation;
        let adaptation = ctx.adaptation_state();
        let step = |profile, intent, bpc| {
            ChainStep::new(profile, intent)
                .with_bpc(bpc)
                .with_adaptation_state(adaptation)
        };
        let steps = if flags.soft_proofing {
            vec![
                step(input, intent, bpc),
                step(proofing, intent, bpc),
                step(proofing, Intent::RELATIVE_COLORIMETRIC, false),
                step(output, proofing_intent, false),
            ]
        } else {
            vec![step(input, intent, bpc), step(output, intent, bpc)]
        };
        Self::extended(ctx, &steps, Some((proofing, 1)), input_format, output_format, flags)
    }

    /// Transform over explicit chain steps
    ///
    /// `gamut` names the profile to check against and how many leading steps
    /// form the source side; it is used only when `gamut_check` is set.
    pub fn extended(
        ctx: &Context,
        steps: &[ChainStep<'_>],
        gamut: Option<(&Profile, usize)>,
        input_format: PixelFormat,
        output_format: PixelFormat,
        mut flags: TransformFlags,
    ) -> Result<Self> {
        let input = Formatter::bind(input_format).map_err(|e| ctx.signal(e))?;
        let output = Formatter::bind(output_format).map_err(|e| ctx.signal(e))?;
        let (entry, exit) = chain_spaces(steps).ok_or_else(|| {
            ctx.signal(Error::Range("a transform needs at least one profile".into()))
        })?;
        if !input_format.accepts(entry) {
            return Err(ctx.signal(Error::ColorSpaceMismatch(format!(
                "input format does not carry {entry:?}"
            ))));
        }
        if !output_format.accepts(exit) {
            return Err(ctx.signal(Error::ColorSpaceMismatch(format!(
                "output format does not carry {exit:?}"
            ))));
        }

        let scheduler = ctx.scheduler().cloned();
        let kernel = if flags.null_transform {
            Kernel::Null
        } else if input_format.float && output_format.float {
            Kernel::Float
        } else {
            Kernel::Precalc16
        };
        if scheduler.is_some() || kernel != Kernel::Precalc16 {
            flags.no_cache = true;
        }

        let (pipeline, gamut) = if kernel == Kernel::Null {
            (Pipeline::empty(), None)
        } else {
            let lut = link_profiles(ctx, steps, &flags)?;
            check_channels(ctx, entry.channels(), lut.input_channels())?;
            check_channels(ctx, exit.channels(), lut.output_channels())?;
            check_channels(ctx, input.channels(), lut.input_channels())?;
            check_channels(ctx, output.channels(), lut.output_channels())?;

            let gamut = match gamut {
                Some((profile, position)) if flags.gamut_check => Some(
                    create_gamut_check_pipeline(ctx, steps, position, profile)?,
                ),
                _ => None,
            };
            let optimize = kernel == Kernel::Precalc16
                && !flags.no_optimize
                && !entry.is_pcs()
                && steps[0].profile.device_class() != ProfileClass::NamedColor;
            let lut = if optimize {
                precalculate(ctx, &lut, entry, &flags)?
            } else {
                lut
            };
            (lut, gamut)
        };

        debug!(
            ?kernel,
            ?entry,
            ?exit,
            cached = !flags.no_cache,
            simd = crate::simd::active_features(),
            "transform created"
        );
        let mut executor = Executor {
            kernel,
            pipeline,
            gamut,
            cache: None,
            alarm: ctx.alarm_codes(),
            copy_alpha: flags.copy_alpha,
            input,
            output,
        };
        if !flags.no_cache {
            executor.seed_cache();
        }

        Ok(Self {
            ctx: ctx.clone(),
            executor,
            entry,
            exit,
            flags,
            scheduler,
            reformattable: input_format.is_16bits_or_more() && output_format.is_16bits_or_more(),
        })
    }

    /// Color space the input buffer carries
    pub fn entry_space(&self) -> ColorSpace {
        self.entry
    }

    /// Color space the output buffer carries
    pub fn exit_space(&self) -> ColorSpace {
        self.exit
    }

    pub fn input_format(&self) -> PixelFormat {
        self.executor.input.format()
    }

    pub fn output_format(&self) -> PixelFormat {
        self.executor.output.format()
    }

    /// Flags in effect, after creation forced any off
    pub fn flags(&self) -> TransformFlags {
        self.flags
    }

    /// The pipeline pixels go through; empty for null transforms
    pub fn pipeline(&self) -> &Pipeline {
        &self.executor.pipeline
    }

    /// Re-bind the buffer formats
    ///
    /// Only transforms created with 16-bit or deeper formats on both sides,
    /// and not running the float path, can be reformatted.
    pub fn change_formats(&mut self, input: PixelFormat, output: PixelFormat) -> Result<()> {
        if !self.reformattable || self.executor.kernel == Kernel::Float {
            return Err(self.ctx.signal(Error::NotSuitable(
                "only transforms created with at least 16 bits can change formats".into(),
            )));
        }
        let in_fmt = Formatter::bind(input).map_err(|e| self.ctx.signal(e))?;
        let out_fmt = Formatter::bind(output).map_err(|e| self.ctx.signal(e))?;
        if !input.accepts(self.entry) || !output.accepts(self.exit) {
            return Err(self.ctx.signal(Error::ColorSpaceMismatch(
                "new formats do not match the transform color spaces".into(),
            )));
        }
        check_channels(&self.ctx, self.executor.input.channels(), in_fmt.channels())?;
        check_channels(&self.ctx, self.executor.output.channels(), out_fmt.channels())?;
        self.executor.input = in_fmt;
        self.executor.output = out_fmt;
        Ok(())
    }

    /// Convert `pixels` contiguous pixels
    pub fn transform(&self, input: &[u8], output: &mut [u8], pixels: usize) -> Result<()> {
        let in_stride = pixels * self.input_format().bytes_per_pixel();
        let out_stride = pixels * self.output_format().bytes_per_pixel();
        self.transform_lines(input, output, pixels, 1, in_stride, out_stride)
    }

    /// Convert `lines` lines of `pixels_per_line` pixels with byte strides
    pub fn transform_lines(
        &self,
        input: &[u8],
        output: &mut [u8],
        pixels_per_line: usize,
        lines: usize,
        input_stride: usize,
        output_stride: usize,
    ) -> Result<()> {
        if pixels_per_line == 0 || lines == 0 {
            return Ok(());
        }
        let in_bpp = self.input_format().bytes_per_pixel();
        let out_bpp = self.output_format().bytes_per_pixel();
        let in_line = pixels_per_line * in_bpp;
        let out_line = pixels_per_line * out_bpp;
        if input_stride < in_line || output_stride < out_line {
            return Err(self.ctx.signal(Error::Range(format!(
                "strides {input_stride}/{output_stride} shorter than lines of {in_line}/{out_line} bytes"
            ))));
        }
        let in_needed = (lines - 1) * input_stride + in_line;
        let out_needed = (lines - 1) * output_stride + out_line;
        if input.len() < in_needed {
            return Err(self.ctx.signal(Error::BufferSize {
                expected: in_needed,
                actual: input.len(),
            }));
        }
        if output.len() < out_needed {
            return Err(self.ctx.signal(Error::BufferSize {
                expected: out_needed,
                actual: output.len(),
            }));
        }

        let whole = WorkSlice {
            input: &input[..in_needed],
            output: &mut output[..out_needed],
            pixels_per_line,
            lines,
            input_stride,
            output_stride,
        };
        match &self.scheduler {
            Some(scheduler) if scheduler.max_workers() > 1 => {
                let slices = scheduler::split(whole, scheduler.max_workers(), in_bpp, out_bpp);
                scheduler.run(slices, &|slice: WorkSlice<'_>| self.executor.run_slice(slice));
            }
            _ => self.executor.run_slice(whole),
        }
        Ok(())
    }

    /// Convert typed buffers, viewed as bytes
    pub fn transform_typed<I: Pod, O: Pod>(
        &self,
        input: &[I],
        output: &mut [O],
        pixels: usize,
    ) -> Result<()> {
        self.transform(
            bytemuck::cast_slice(input),
            bytemuck::cast_slice_mut(output),
            pixels,
        )
    }
}

/// Entry and exit spaces of a chain
///
/// Each step reads the space the previous one produced: device data goes in
/// through the device side unless the running space is a PCS, in which case
/// the profile is used in its output direction. Links always run forward.
fn chain_spaces(steps: &[ChainStep<'_>]) -> Option<(ColorSpace, ColorSpace)> {
    let mut entry = None;
    let mut post: Option<ColorSpace> = None;
    for (i, step) in steps.iter().enumerate() {
        let profile = step.profile;
        let as_input = i == 0 || post.is_none_or(|space| !space.is_pcs());
        let (space_in, space_out) = match profile.device_class() {
            ProfileClass::NamedColor => (
                ColorSpace::Color(1),
                if steps.len() > 1 {
                    profile.pcs()
                } else {
                    profile.color_space()
                },
            ),
            ProfileClass::DeviceLink => (profile.color_space(), profile.pcs()),
            _ if as_input => (profile.color_space(), profile.pcs()),
            _ => (profile.pcs(), profile.color_space()),
        };
        entry.get_or_insert(space_in);
        post = Some(space_out);
    }
    Some((entry?, post?))
}

fn check_channels(ctx: &Context, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ctx.signal(Error::ChannelMismatch { expected, actual }))
    }
}

/// Sample `lut` into a single 16-bit CLUT stage
fn precalculate(
    ctx: &Context,
    lut: &Pipeline,
    entry: ColorSpace,
    flags: &TransformFlags,
) -> Result<Pipeline> {
    let points = reasonable_grid_points(entry, flags);
    let mut clut = Clut::uniform_u16(lut.input_channels(), points, lut.output_channels())
        .map_err(|e| ctx.signal(e))?;
    clut.sample_16(false, |input, output| {
        lut.eval_u16(input, output);
        Ok(())
    })?;
    debug!(points, "precalculated transform");
    Pipeline::from_stages(vec![Stage::clut(clut)])
}
