//! Black-preserving intents for CMYK to CMYK chains
//!
//! K-only keeps pure K input on the K channel and links everything else
//! normally. K-plane keeps the whole K channel, mapped through a K to K
//! tone curve, and searches for the CMY that restore the colorimetric
//! result around it, within the output's total ink limit.

use tracing::{debug, warn};

use crate::color::{Lab, delta_e};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::icc::{ColorSpace, Profile, ProfileClass};
use crate::math::quick_saturate_word;
use crate::pipeline::{Clut, Pipeline, Stage, ToneCurve};
use crate::transform::TransformFlags;

use super::gamut::detect_tac;
use super::link::default_icc_link;
use super::loaders::{read_devicelink_lut, read_input_lut};
use super::{ChainStep, Intent, IntentHandler, chain_to_lab, reasonable_grid_points};

/// Resolution of the K to K tone curve
const K_TONE_POINTS: usize = 4096;

/// K values closer than this already match the preserved K
const K_TOLERANCE: f32 = 3.0 / 65535.0;

/// Keep K-only pixels on the K channel
pub(crate) struct KOnly;

/// Keep the K plane and re-solve CMY around it
pub(crate) struct KPlane;

impl IntentHandler for KOnly {
    fn link(
        &self,
        ctx: &Context,
        steps: &[ChainStep<'_>],
        flags: &TransformFlags,
    ) -> Result<Pipeline> {
        let plan = match PreservationPlan::new(steps) {
            Some(plan) => plan,
            None => return default_icc_link(ctx, &translated(steps), flags),
        };
        let prefix = plan.prefix();
        let cmyk2cmyk = default_icc_link(ctx, prefix, flags)?;
        let k_tone = build_k_tone_curve(ctx, K_TONE_POINTS, prefix, flags)?;

        let mut clut = cmyk_clut(flags)?;
        clut.sample_16(false, |input, out| {
            if input[..3].iter().all(|&v| v == 0) {
                out[..3].fill(0);
                out[3] = k_tone.eval_u16(input[3]);
            } else {
                cmyk2cmyk.eval_u16(input, out);
            }
            Ok(())
        })?;
        plan.finish(ctx, clut)
    }
}

impl IntentHandler for KPlane {
    fn link(
        &self,
        ctx: &Context,
        steps: &[ChainStep<'_>],
        flags: &TransformFlags,
    ) -> Result<Pipeline> {
        let plan = match PreservationPlan::new(steps) {
            Some(plan) => plan,
            None => return default_icc_link(ctx, &translated(steps), flags),
        };
        let prefix = plan.prefix();
        let last = plan.last();
        let cmyk2cmyk = default_icc_link(ctx, prefix, flags)?;
        let k_tone = build_k_tone_curve(ctx, K_TONE_POINTS, prefix, flags)?;

        let lab_k_to_cmyk = read_input_lut(ctx, last, Intent::RELATIVE_COLORIMETRIC)?;
        let max_tac = detect_tac(ctx, last)? / 100.0;
        if max_tac <= 0.0 {
            return Err(ctx.signal(Error::NotSuitable(
                "black plane preservation needs an output profile with ink coverage".into(),
            )));
        }
        let proof = chain_to_lab(
            ctx,
            &[ChainStep::new(last, Intent::RELATIVE_COLORIMETRIC)],
            flags,
        )?;
        let to_pcs = if last.pcs() == ColorSpace::Xyz {
            let xyz = Profile::xyz(ctx)?;
            default_icc_link(
                ctx,
                &[
                    ChainStep::new(last, Intent::RELATIVE_COLORIMETRIC),
                    ChainStep::new(&xyz, Intent::RELATIVE_COLORIMETRIC),
                ],
                flags,
            )?
        } else {
            proof.clone()
        };

        let solver = KPlaneSolver {
            cmyk2cmyk: &cmyk2cmyk,
            k_tone: &k_tone,
            lab_k_to_cmyk: &lab_k_to_cmyk,
            to_pcs: &to_pcs,
            proof: &proof,
            max_tac,
        };
        let mut max_error = 0f64;
        let mut clut = cmyk_clut(flags)?;
        clut.sample_16(false, |input, out| {
            max_error = max_error.max(solver.solve(input, out));
            Ok(())
        })?;
        debug!(max_error, max_tac, "black plane preserved");
        plan.finish(ctx, clut)
    }
}

fn translated<'a>(steps: &[ChainStep<'a>]) -> Vec<ChainStep<'a>> {
    steps
        .iter()
        .map(|step| ChainStep {
            intent: step.intent.to_icc(),
            ..*step
        })
        .collect()
}

fn is_cmyk_link(profile: &Profile) -> bool {
    profile.color_space() == ColorSpace::Cmyk && profile.device_class() == ProfileClass::DeviceLink
}

fn cmyk_clut(flags: &TransformFlags) -> Result<Clut> {
    Clut::uniform_u16(4, reasonable_grid_points(ColorSpace::Cmyk, flags), 4)
}

/// A chain split into the part the preserving CLUT replaces and trailing
/// CMYK device links appended after it
struct PreservationPlan<'a> {
    steps: Vec<ChainStep<'a>>,
    keep: usize,
}

impl<'a> PreservationPlan<'a> {
    /// None when the chain is not CMYK to CMYK and the ICC linker applies
    fn new(steps: &[ChainStep<'a>]) -> Option<Self> {
        let first = steps.first()?.profile;
        let last = steps.last()?.profile;
        let preservable = first.color_space() == ColorSpace::Cmyk
            && (last.color_space() == ColorSpace::Cmyk
                || last.device_class() == ProfileClass::Output);
        if !preservable {
            return None;
        }

        let steps = translated(steps);
        let mut keep = steps.len();
        while keep > 2 && is_cmyk_link(steps[keep - 1].profile) {
            keep -= 1;
        }
        Some(Self { steps, keep })
    }

    fn prefix(&self) -> &[ChainStep<'a>] {
        &self.steps[..self.keep]
    }

    fn last(&self) -> &'a Profile {
        self.steps[self.keep - 1].profile
    }

    /// Wrap the sampled CLUT and append the trimmed device links
    fn finish(&self, ctx: &Context, clut: Clut) -> Result<Pipeline> {
        let mut result = Pipeline::from_stages([Stage::clut(clut)])?;
        for step in &self.steps[self.keep..] {
            let link = read_devicelink_lut(ctx, step.profile, step.intent)?;
            result.concatenate(&link).map_err(|e| ctx.signal(e))?;
        }
        Ok(result)
    }
}

struct KPlaneSolver<'a> {
    cmyk2cmyk: &'a Pipeline,
    k_tone: &'a ToneCurve,
    lab_k_to_cmyk: &'a Pipeline,
    to_pcs: &'a Pipeline,
    proof: &'a Pipeline,
    max_tac: f64,
}

impl KPlaneSolver<'_> {
    fn measure(&self, cmyk: &[u16]) -> Lab {
        let input: [f32; 4] = [0, 1, 2, 3].map(|i| cmyk[i] as f32 / 65535.0);
        let mut lab = [0f32; 3];
        self.proof.eval_f32(&input, &mut lab);
        Lab::from_encoded_float(&lab)
    }

    /// Fill `out` for the CMYK node `input`; returns the color error the
    /// preserved K introduced
    fn solve(&self, input: &[u16], out: &mut [u16]) -> f64 {
        let inf: [f32; 4] = [0, 1, 2, 3].map(|i| input[i] as f32 / 65535.0);
        let k = self.k_tone.eval_f32(inf[3]);

        if input[..3].iter().all(|&v| v == 0) {
            // pure black ink, no TAC
            out[..3].fill(0);
            out[3] = quick_saturate_word(k as f64 * 65535.0);
            return 0.0;
        }

        let mut outf = [0f32; 4];
        self.cmyk2cmyk.eval_f32(&inf, &mut outf);
        for (o, &v) in out.iter_mut().zip(&outf) {
            *o = quick_saturate_word(v as f64 * 65535.0);
        }
        if (outf[3] - k).abs() < K_TOLERANCE {
            return 0.0;
        }

        let colorimetric = self.measure(out);
        let mut target = [0f32; 4];
        self.to_pcs.eval_f32(&outf, &mut target[..3]);
        target[3] = k;

        let hint = outf;
        if self
            .lab_k_to_cmyk
            .eval_reverse_f32(&target, &mut outf, Some(&hint))
            .is_err()
        {
            // keep the colorimetric result already in `out`
            return 0.0;
        }
        outf[3] = k;

        let sum_cmy = outf[..3].iter().map(|&v| v as f64).sum::<f64>();
        let sum_cmyk = sum_cmy + outf[3] as f64;
        let ratio = if sum_cmyk > self.max_tac && sum_cmy > 0.0 {
            (1.0 - (sum_cmyk - self.max_tac) / sum_cmy).max(0.0)
        } else {
            1.0
        };
        for i in 0..3 {
            out[i] = quick_saturate_word(outf[i] as f64 * ratio * 65535.0);
        }
        out[3] = quick_saturate_word(outf[3] as f64 * 65535.0);

        delta_e(&colorimetric, &self.measure(out))
    }
}

/// K to K' mapping between the first and last profile of a CMYK chain
///
/// Each side maps K-only ink to L* through its own profiles; the curve is
/// the first joined with the inverse of the second. The chain must start
/// in CMYK and end in a CMYK output profile.
pub fn build_k_tone_curve(
    ctx: &Context,
    points: usize,
    steps: &[ChainStep<'_>],
    flags: &TransformFlags,
) -> Result<ToneCurve> {
    let steps = translated(steps);
    let (Some(first), Some(last)) = (steps.first(), steps.last()) else {
        return Err(ctx.signal(Error::Range("empty profile chain".into())));
    };
    if steps.len() < 2 {
        return Err(ctx.signal(Error::NotSuitable(
            "K tone curve needs at least two profiles".into(),
        )));
    }
    if first.profile.color_space() != ColorSpace::Cmyk
        || last.profile.color_space() != ColorSpace::Cmyk
        || last.profile.device_class() != ProfileClass::Output
    {
        return Err(ctx.signal(Error::NotSuitable(
            "K tone curve needs a CMYK chain ending in an output profile".into(),
        )));
    }

    let k_in = k_to_lstar(ctx, points, &steps[..steps.len() - 1], flags)?;
    let k_out = k_to_lstar(ctx, points, &steps[steps.len() - 1..], flags)?;
    let k_tone = ToneCurve::join(&k_in, &k_out, points)?;
    if !k_tone.is_monotonic() {
        warn!("K tone curve is not monotonic");
        return Err(ctx.signal(Error::NotSuitable(
            "K tone curve is not monotonic".into(),
        )));
    }
    Ok(k_tone)
}

/// Inverted L* of K-only ink through `steps`
fn k_to_lstar(
    ctx: &Context,
    points: usize,
    steps: &[ChainStep<'_>],
    flags: &TransformFlags,
) -> Result<ToneCurve> {
    let lut = chain_to_lab(ctx, steps, flags)?;
    let mut lab = [0f32; 3];
    let samples: Vec<f32> = (0..points)
        .map(|i| {
            let k = i as f32 / (points - 1) as f32;
            lut.eval_f32(&[0.0, 0.0, 0.0, k], &mut lab);
            let l = Lab::from_encoded_float(&lab).l;
            (1.0 - l / 100.0) as f32
        })
        .collect();
    ToneCurve::from_float_table(&samples)
}
