//! Composable processing pipelines
//!
//! A [`Pipeline`] is an ordered chain of [`Stage`]s with declared input and
//! output channel counts. Pipelines come from the tag codec (decoded from a
//! profile) or from the intent linker (built fresh), and are evaluated as a
//! pure function of their stages.
//!
//! # Pipeline Architecture
//!
//! A linked transform is usually:
//! 1. Device → PCS: curves, matrix or CLUT from the input profile
//! 2. PCS bridging: Lab/XYZ conversion, adaptation, black point scaling
//! 3. PCS → device: curves, matrix or CLUT from the output profile
//!
//! An empty pipeline (no stages, 0 → 0 channels) is a valid placeholder that
//! takes the shape of whatever is concatenated onto it first.

pub mod lut;
pub mod named;
pub mod stages;
pub mod tone_curve;

pub use lut::{Clut, ClutTable, MAX_INPUT_DIMENSIONS, MAX_STAGE_CHANNELS, slice_space_16};
pub use named::{NamedColor, NamedColorList};
pub use stages::{NamedColorOutput, Stage, StageKind, StageType};
pub use tone_curve::{CurveSegment, SegmentKind, ToneCurve};

use crate::error::{Error, Result};
use crate::math::{Matrix3x3, f32_to_u16};

const JACOBIAN_EPSILON: f32 = 0.001;
const INVERSION_MAX_ITERATIONS: usize = 30;

/// Where [`Pipeline::insert_stage`] puts a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePosition {
    Begin,
    End,
}

/// An ordered chain of stages
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    input_channels: usize,
    output_channels: usize,
    stages: Vec<Stage>,
    save_as_8bit: bool,
}

impl Pipeline {
    /// Stage-less pipeline with a declared shape; evaluates as pass-through
    pub fn new(input_channels: usize, output_channels: usize) -> Result<Self> {
        for n in [input_channels, output_channels] {
            if n > MAX_STAGE_CHANNELS {
                return Err(Error::ChannelCount {
                    count: n,
                    max: MAX_STAGE_CHANNELS,
                });
            }
        }
        Ok(Self {
            input_channels,
            output_channels,
            stages: Vec::new(),
            save_as_8bit: false,
        })
    }

    /// 0 → 0 placeholder
    pub fn empty() -> Self {
        Self::default()
    }

    /// Chain the given stages in order
    pub fn from_stages(stages: impl IntoIterator<Item = Stage>) -> Result<Self> {
        let mut pipeline = Self::empty();
        for stage in stages {
            pipeline.insert_stage(StagePosition::End, stage)?;
        }
        Ok(pipeline)
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub(crate) fn stages_mut(&mut self) -> &mut [Stage] {
        &mut self.stages
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn first_stage(&self) -> Option<&Stage> {
        self.stages.first()
    }

    pub fn last_stage(&self) -> Option<&Stage> {
        self.stages.last()
    }

    /// Codec hint: prefer 8-bit encodings when writing
    pub fn save_as_8bit(&self) -> bool {
        self.save_as_8bit
    }

    pub fn set_save_as_8bit(&mut self, on: bool) {
        self.save_as_8bit = on;
    }

    fn refresh_shape(&mut self) {
        if let (Some(first), Some(last)) = (self.stages.first(), self.stages.last()) {
            self.input_channels = first.input_channels();
            self.output_channels = last.output_channels();
        }
    }

    /// Add a stage at either end; its channels must meet the neighbor's
    pub fn insert_stage(&mut self, position: StagePosition, stage: Stage) -> Result<()> {
        match position {
            StagePosition::Begin => {
                if let Some(first) = self.stages.first() {
                    if first.input_channels() != stage.output_channels() {
                        return Err(Error::ChannelMismatch {
                            expected: first.input_channels(),
                            actual: stage.output_channels(),
                        });
                    }
                }
                self.stages.insert(0, stage);
            }
            StagePosition::End => {
                if let Some(last) = self.stages.last() {
                    if last.output_channels() != stage.input_channels() {
                        return Err(Error::ChannelMismatch {
                            expected: last.output_channels(),
                            actual: stage.input_channels(),
                        });
                    }
                }
                self.stages.push(stage);
            }
        }
        self.refresh_shape();
        Ok(())
    }

    /// Remove a stage from either end
    pub fn unlink_stage(&mut self, position: StagePosition) -> Option<Stage> {
        let stage = match position {
            StagePosition::Begin if !self.stages.is_empty() => Some(self.stages.remove(0)),
            StagePosition::Begin => None,
            StagePosition::End => self.stages.pop(),
        };
        if self.stages.is_empty() {
            self.input_channels = 0;
            self.output_channels = 0;
        } else {
            self.refresh_shape();
        }
        stage
    }

    /// Append deep copies of all of `other`'s stages
    pub fn concatenate(&mut self, other: &Pipeline) -> Result<()> {
        if self.stages.is_empty() && other.stages.is_empty() {
            self.input_channels = other.input_channels;
            self.output_channels = other.output_channels;
            return Ok(());
        }
        if !self.stages.is_empty()
            && !other.stages.is_empty()
            && self.output_channels != other.input_channels
        {
            return Err(Error::ChannelMismatch {
                expected: self.output_channels,
                actual: other.input_channels,
            });
        }
        for stage in &other.stages {
            self.insert_stage(StagePosition::End, stage.clone())?;
        }
        Ok(())
    }

    /// Stages when their types match `types` exactly, in order
    pub fn check_and_retrieve(&self, types: &[StageType]) -> Option<&[Stage]> {
        (self.stages.len() == types.len()
            && self
                .stages
                .iter()
                .zip(types)
                .all(|(s, &t)| s.stage_type() == t))
        .then_some(self.stages.as_slice())
    }

    /// Evaluate one sample of normalized floats
    pub fn eval_f32(&self, input: &[f32], output: &mut [f32]) {
        let mut a = [0f32; MAX_STAGE_CHANNELS];
        let mut b = [0f32; MAX_STAGE_CHANNELS];
        let n_in = self.input_channels.min(input.len());
        a[..n_in].copy_from_slice(&input[..n_in]);

        let mut cur = &mut a;
        let mut next = &mut b;
        for stage in &self.stages {
            stage.eval_f32(&cur[..], &mut next[..]);
            std::mem::swap(&mut cur, &mut next);
        }
        let n_out = self.output_channels.min(output.len());
        output[..n_out].copy_from_slice(&cur[..n_out]);
    }

    /// Evaluate one 16-bit sample through the float stages
    pub fn eval_u16(&self, input: &[u16], output: &mut [u16]) {
        let mut fin = [0f32; MAX_STAGE_CHANNELS];
        let mut fout = [0f32; MAX_STAGE_CHANNELS];
        for (f, &v) in fin.iter_mut().zip(input.iter().take(self.input_channels)) {
            *f = v as f32 / 65535.0;
        }
        self.eval_f32(&fin, &mut fout);
        for (o, &f) in output
            .iter_mut()
            .zip(fout.iter().take(self.output_channels))
        {
            *o = f32_to_u16(f);
        }
    }

    /// Find an input producing `target` by Newton-Raphson iteration.
    ///
    /// Works on 3 → 3 and 4 → 3 pipelines. With four inputs the fourth is
    /// held at `target[3]`, so `target` needs one value per input and
    /// `result` one per input. The search starts at `hint` (three values) or
    /// at 0.3 on every axis and keeps the best point found.
    pub fn eval_reverse_f32(
        &self,
        target: &[f32],
        result: &mut [f32],
        hint: Option<&[f32]>,
    ) -> Result<()> {
        let n_in = self.input_channels;
        if !(n_in == 3 || n_in == 4) || self.output_channels != 3 {
            return Err(Error::NotSuitable(format!(
                "reverse evaluation of a {} -> {} pipeline",
                n_in, self.output_channels
            )));
        }
        if target.len() < n_in || result.len() < n_in || hint.is_some_and(|h| h.len() < 3) {
            return Err(Error::Range(format!(
                "reverse evaluation needs {n_in} target and result values, got {} and {}",
                target.len(),
                result.len()
            )));
        }

        let mut x = [0.3f32; 4];
        if let Some(h) = hint {
            x[..3].copy_from_slice(&h[..3]);
        }
        x[3] = if n_in == 4 { target[3] } else { 0.0 };

        let mut last_error = f64::INFINITY;
        let mut fx = [0f32; 3];
        let mut fxd = [0f32; 3];
        for _ in 0..INVERSION_MAX_ITERATIONS {
            self.eval_f32(&x, &mut fx);
            let error = fx
                .iter()
                .zip(target)
                .map(|(a, b)| ((a - b) as f64).powi(2))
                .sum::<f64>()
                .sqrt();
            if error >= last_error {
                break;
            }
            last_error = error;
            result[..n_in].copy_from_slice(&x[..n_in]);
            if error <= 0.0 {
                break;
            }

            let mut jacobian = Matrix3x3::identity();
            for j in 0..3 {
                let mut xd = x;
                let delta = if xd[j] < 1.0 - JACOBIAN_EPSILON {
                    JACOBIAN_EPSILON
                } else {
                    -JACOBIAN_EPSILON
                };
                xd[j] += delta;
                self.eval_f32(&xd, &mut fxd);
                for i in 0..3 {
                    jacobian.m[i][j] = ((fxd[i] - fx[i]) / delta) as f64;
                }
            }

            let residual = [
                (fx[0] - target[0]) as f64,
                (fx[1] - target[1]) as f64,
                (fx[2] - target[2]) as f64,
            ];
            let step = jacobian.solve(residual)?;
            for j in 0..3 {
                x[j] = (x[j] - step[j] as f32).clamp(0.0, 1.0);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale3(k: f64) -> Stage {
        Stage::matrix3(&Matrix3x3::diagonal(k, k, k), None)
    }

    #[test]
    fn test_empty_pipeline_adopts_shape() {
        let mut p = Pipeline::empty();
        assert_eq!((p.input_channels(), p.output_channels()), (0, 0));
        let other = Pipeline::from_stages([Stage::identity_curves(4).unwrap()]).unwrap();
        p.concatenate(&other).unwrap();
        assert_eq!((p.input_channels(), p.output_channels()), (4, 4));
    }

    #[test]
    fn test_empty_concat_empty_copies_declared_shape() {
        let mut p = Pipeline::empty();
        p.concatenate(&Pipeline::new(3, 3).unwrap()).unwrap();
        assert_eq!((p.input_channels(), p.output_channels()), (3, 3));
    }

    #[test]
    fn test_concatenate_checks_channels() {
        let mut a = Pipeline::from_stages([Stage::identity_curves(3).unwrap()]).unwrap();
        let b = Pipeline::from_stages([Stage::identity_curves(4).unwrap()]).unwrap();
        assert_eq!(
            a.concatenate(&b),
            Err(Error::ChannelMismatch {
                expected: 3,
                actual: 4
            })
        );
    }

    #[test]
    fn test_insert_checks_neighbors() {
        let mut p = Pipeline::from_stages([Stage::identity_curves(3).unwrap()]).unwrap();
        assert!(p.insert_stage(StagePosition::End, Stage::identity_curves(1).unwrap()).is_err());
        assert!(p.insert_stage(StagePosition::Begin, Stage::identity_curves(4).unwrap()).is_err());
        p.insert_stage(StagePosition::Begin, scale3(0.5)).unwrap();
        assert_eq!(p.stage_count(), 2);
    }

    #[test]
    fn test_duplicate_is_independent() {
        let p = Pipeline::from_stages([scale3(0.5)]).unwrap();
        let mut q = p.clone();
        q.insert_stage(StagePosition::End, scale3(2.0)).unwrap();
        assert_eq!(p.stage_count(), 1);
        assert_eq!(q.stage_count(), 2);
    }

    #[test]
    fn test_eval_is_deterministic() {
        let p = Pipeline::from_stages([scale3(0.5), Stage::curves(vec![ToneCurve::gamma(2.2); 3]).unwrap()])
            .unwrap();
        let mut a = [0.0; 3];
        let mut b = [0.0; 3];
        p.eval_f32(&[0.2, 0.4, 0.8], &mut a);
        p.eval_f32(&[0.2, 0.4, 0.8], &mut b);
        assert_eq!(a, b);
        assert!((a[2] - 0.4f32.powf(2.2)).abs() < 1e-5);
    }

    #[test]
    fn test_eval_u16() {
        let p = Pipeline::from_stages([scale3(0.5)]).unwrap();
        let mut out = [0u16; 3];
        p.eval_u16(&[65535, 32768, 0], &mut out);
        assert_eq!(out, [32768, 16384, 0]);
    }

    #[test]
    fn test_reverse_eval_finds_preimage() {
        let m = Matrix3x3::new([[0.8, 0.1, 0.1], [0.2, 0.7, 0.1], [0.0, 0.1, 0.9]]);
        let p = Pipeline::from_stages([
            Stage::curves(vec![ToneCurve::gamma(1.8); 3]).unwrap(),
            Stage::matrix3(&m, None),
        ])
        .unwrap();
        let x = [0.3f32, 0.6, 0.45];
        let mut target = [0.0; 3];
        p.eval_f32(&x, &mut target);
        let mut found = [0.0; 3];
        p.eval_reverse_f32(&target, &mut found, None).unwrap();
        for c in 0..3 {
            assert!((found[c] - x[c]).abs() < 1e-3, "{found:?}");
        }
    }

    #[test]
    fn test_reverse_eval_rejects_shape() {
        let p = Pipeline::from_stages([Stage::identity_curves(2).unwrap()]).unwrap();
        assert!(p.eval_reverse_f32(&[0.0; 3], &mut [0.0; 3], None).is_err());
    }

    #[test]
    fn test_reverse_eval_rejects_short_buffers() {
        let p = Pipeline::from_stages([scale3(0.5)]).unwrap();
        let mut found = [0.0; 3];
        let err = p.eval_reverse_f32(&[0.1, 0.2], &mut found, None).unwrap_err();
        assert!(matches!(err, Error::Range(_)));
        assert!(p.eval_reverse_f32(&[0.1; 3], &mut [0.0; 2], None).is_err());
        assert!(p.eval_reverse_f32(&[0.1; 3], &mut found, Some(&[0.5])).is_err());
        assert!(p.eval_reverse_f32(&[0.1; 3], &mut found, Some(&[0.5; 3])).is_ok());
    }

    #[test]
    fn test_check_and_retrieve() {
        let p = Pipeline::from_stages([Stage::identity_curves(3).unwrap(), scale3(1.0)]).unwrap();
        assert!(p.check_and_retrieve(&[StageType::CurveSet, StageType::Matrix]).is_some());
        assert!(p.check_and_retrieve(&[StageType::CurveSet]).is_none());
    }

    #[test]
    fn test_unlink() {
        let mut p = Pipeline::from_stages([scale3(1.0), Stage::matrix(1, 3, &[1.0; 3], None).unwrap()]).unwrap();
        assert_eq!(p.output_channels(), 1);
        p.unlink_stage(StagePosition::End);
        assert_eq!(p.output_channels(), 3);
    }

    #[test]
    fn test_unlink_last_stage_clears_shape() {
        let mut p = Pipeline::from_stages([Stage::matrix(1, 3, &[1.0; 3], None).unwrap()]).unwrap();
        assert!(p.unlink_stage(StagePosition::Begin).is_some());
        assert_eq!((p.input_channels(), p.output_channels()), (0, 0));
        assert!(p.unlink_stage(StagePosition::End).is_none());

        p.concatenate(&Pipeline::from_stages([Stage::identity_curves(4).unwrap()]).unwrap())
            .unwrap();
        assert_eq!((p.input_channels(), p.output_channels()), (4, 4));
    }
}
