//! Pipeline stages
//!
//! A [`Stage`] is an immutable processing element. Values flowing between
//! stages are floats normalized to the 16-bit encoding of their color space
//! (device values in 0..1, Lab as `L/100, (a+128)/255, (b+128)/255`, XYZ
//! divided by the largest encodeable value).

use std::fmt;

use tracing::warn;

use crate::color::{Lab, MAX_ENCODEABLE_XYZ, Xyz};
use crate::error::{Error, Result};
use crate::icc::Signature;
use crate::math::{Matrix3x3, quick_saturate_word};
use crate::pipeline::lut::{Clut, MAX_STAGE_CHANNELS};
use crate::pipeline::named::NamedColorList;
use crate::pipeline::tone_curve::ToneCurve;

/// Which coordinates a named color stage emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedColorOutput {
    /// Lab PCS, 3 channels
    Pcs,
    /// Device colorants
    Colorant,
}

/// Stage payload
#[derive(Debug, Clone, PartialEq)]
pub enum StageKind {
    /// Row-major `rows × cols` matrix with optional offset per row
    Matrix {
        rows: usize,
        cols: usize,
        m: Vec<f64>,
        offset: Option<Vec<f64>>,
    },
    CurveSet(Vec<ToneCurve>),
    Clut(Clut),
    NamedColor {
        list: NamedColorList,
        output: NamedColorOutput,
    },
    Identity(usize),
    XyzToLab,
    LabToXyz,
    ClipNegatives(usize),
}

/// Stage type tag used for shape matching and wire mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageType {
    Matrix,
    CurveSet,
    Clut,
    NamedColor,
    Identity,
    XyzToLab,
    LabToXyz,
    ClipNegatives,
}

impl StageType {
    pub fn signature(self) -> Signature {
        Signature::from_bytes(match self {
            Self::Matrix => *b"matf",
            Self::CurveSet => *b"cvst",
            Self::Clut => *b"clut",
            Self::NamedColor => *b"ncl ",
            Self::Identity => *b"idn ",
            Self::XyzToLab => *b"x2l ",
            Self::LabToXyz => *b"l2x ",
            Self::ClipNegatives => *b"clp ",
        })
    }
}

/// Atomic processing element
#[derive(Clone, PartialEq)]
pub struct Stage {
    kind: StageKind,
    input_channels: usize,
    output_channels: usize,
}

fn check_channels(n: usize) -> Result<()> {
    if n == 0 || n > MAX_STAGE_CHANNELS {
        return Err(Error::ChannelCount {
            count: n,
            max: MAX_STAGE_CHANNELS,
        });
    }
    Ok(())
}

impl Stage {
    /// General matrix; `m` is row-major with `rows` outputs and `cols` inputs
    pub fn matrix(rows: usize, cols: usize, m: &[f64], offset: Option<&[f64]>) -> Result<Self> {
        check_channels(rows)?;
        check_channels(cols)?;
        if m.len() != rows * cols {
            return Err(Error::BufferSize {
                expected: rows * cols,
                actual: m.len(),
            });
        }
        if let Some(off) = offset {
            if off.len() != rows {
                return Err(Error::BufferSize {
                    expected: rows,
                    actual: off.len(),
                });
            }
        }
        Ok(Self {
            kind: StageKind::Matrix {
                rows,
                cols,
                m: m.to_vec(),
                offset: offset.map(<[f64]>::to_vec),
            },
            input_channels: cols,
            output_channels: rows,
        })
    }

    /// 3×3 matrix with optional offset
    pub fn matrix3(m: &Matrix3x3, offset: Option<[f64; 3]>) -> Self {
        Self {
            kind: StageKind::Matrix {
                rows: 3,
                cols: 3,
                m: m.to_flat().to_vec(),
                offset: offset.map(|o| o.to_vec()),
            },
            input_channels: 3,
            output_channels: 3,
        }
    }

    /// One curve per channel
    pub fn curves(curves: Vec<ToneCurve>) -> Result<Self> {
        check_channels(curves.len())?;
        let n = curves.len();
        Ok(Self {
            kind: StageKind::CurveSet(curves),
            input_channels: n,
            output_channels: n,
        })
    }

    /// `n` identity curves
    pub fn identity_curves(n: usize) -> Result<Self> {
        Self::curves(vec![ToneCurve::identity(); n])
    }

    pub fn clut(clut: Clut) -> Self {
        Self {
            input_channels: clut.input_channels(),
            output_channels: clut.output_channels(),
            kind: StageKind::Clut(clut),
        }
    }

    /// Index → color lookup; one input channel
    pub fn named_color(list: NamedColorList, output: NamedColorOutput) -> Result<Self> {
        let n_out = match output {
            NamedColorOutput::Pcs => 3,
            NamedColorOutput::Colorant => list.colorant_count(),
        };
        check_channels(n_out)?;
        Ok(Self {
            kind: StageKind::NamedColor { list, output },
            input_channels: 1,
            output_channels: n_out,
        })
    }

    pub fn identity(n: usize) -> Result<Self> {
        check_channels(n)?;
        Ok(Self {
            kind: StageKind::Identity(n),
            input_channels: n,
            output_channels: n,
        })
    }

    pub fn xyz_to_lab() -> Self {
        Self {
            kind: StageKind::XyzToLab,
            input_channels: 3,
            output_channels: 3,
        }
    }

    pub fn lab_to_xyz() -> Self {
        Self {
            kind: StageKind::LabToXyz,
            input_channels: 3,
            output_channels: 3,
        }
    }

    pub fn clip_negatives(n: usize) -> Result<Self> {
        check_channels(n)?;
        Ok(Self {
            kind: StageKind::ClipNegatives(n),
            input_channels: n,
            output_channels: n,
        })
    }

    /// Lab v2 16-bit encoding to v4
    pub fn lab_v2_to_v4() -> Self {
        let k = 65535.0 / 65280.0;
        Self::matrix3(&Matrix3x3::diagonal(k, k, k), None)
    }

    /// Lab v4 16-bit encoding to v2
    pub fn lab_v4_to_v2() -> Self {
        let k = 65280.0 / 65535.0;
        Self::matrix3(&Matrix3x3::diagonal(k, k, k), None)
    }

    /// Real-unit Lab to the normalized pipeline encoding
    pub fn normalize_from_lab_float() -> Self {
        Self::matrix3(
            &Matrix3x3::diagonal(1.0 / 100.0, 1.0 / 255.0, 1.0 / 255.0),
            Some([0.0, 128.0 / 255.0, 128.0 / 255.0]),
        )
    }

    /// Normalized pipeline encoding to real-unit Lab
    pub fn normalize_to_lab_float() -> Self {
        Self::matrix3(
            &Matrix3x3::diagonal(100.0, 255.0, 255.0),
            Some([0.0, -128.0, -128.0]),
        )
    }

    /// Real-unit XYZ to the normalized pipeline encoding
    pub fn normalize_from_xyz_float() -> Self {
        let k = 1.0 / MAX_ENCODEABLE_XYZ;
        Self::matrix3(&Matrix3x3::diagonal(k, k, k), None)
    }

    /// Normalized pipeline encoding to real-unit XYZ
    pub fn normalize_to_xyz_float() -> Self {
        let k = MAX_ENCODEABLE_XYZ;
        Self::matrix3(&Matrix3x3::diagonal(k, k, k), None)
    }

    pub fn kind(&self) -> &StageKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut StageKind {
        &mut self.kind
    }

    pub fn stage_type(&self) -> StageType {
        match &self.kind {
            StageKind::Matrix { .. } => StageType::Matrix,
            StageKind::CurveSet(_) => StageType::CurveSet,
            StageKind::Clut(_) => StageType::Clut,
            StageKind::NamedColor { .. } => StageType::NamedColor,
            StageKind::Identity(_) => StageType::Identity,
            StageKind::XyzToLab => StageType::XyzToLab,
            StageKind::LabToXyz => StageType::LabToXyz,
            StageKind::ClipNegatives(_) => StageType::ClipNegatives,
        }
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    pub fn as_curves(&self) -> Option<&[ToneCurve]> {
        match &self.kind {
            StageKind::CurveSet(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_clut(&self) -> Option<&Clut> {
        match &self.kind {
            StageKind::Clut(c) => Some(c),
            _ => None,
        }
    }

    /// Matrix coefficients and offset
    pub fn as_matrix(&self) -> Option<(&[f64], Option<&[f64]>)> {
        match &self.kind {
            StageKind::Matrix { m, offset, .. } => Some((m, offset.as_deref())),
            _ => None,
        }
    }

    /// Evaluate one sample. `input` holds at least `input_channels` values,
    /// `output` at least `output_channels`.
    pub fn eval_f32(&self, input: &[f32], output: &mut [f32]) {
        match &self.kind {
            StageKind::Matrix {
                rows,
                cols,
                m,
                offset,
            } => {
                for (i, out) in output.iter_mut().enumerate().take(*rows) {
                    let row = &m[i * cols..(i + 1) * cols];
                    let mut acc: f64 = row
                        .iter()
                        .zip(input)
                        .map(|(&k, &v)| k * v as f64)
                        .sum();
                    if let Some(off) = offset {
                        acc += off[i];
                    }
                    *out = acc as f32;
                }
            }
            StageKind::CurveSet(curves) => {
                for ((out, &v), curve) in output.iter_mut().zip(input).zip(curves) {
                    *out = curve.eval_f32(v);
                }
            }
            StageKind::Clut(clut) => clut.eval_f32(input, output),
            StageKind::NamedColor { list, output: kind } => {
                let index = quick_saturate_word(input[0] as f64 * 65535.0) as usize;
                let n = self.output_channels;
                match list.get(index) {
                    Some(color) => {
                        let values: &[u16] = match kind {
                            NamedColorOutput::Pcs => &color.pcs,
                            NamedColorOutput::Colorant => &color.device,
                        };
                        for (out, &v) in output[..n].iter_mut().zip(values) {
                            *out = v as f32 / 65535.0;
                        }
                    }
                    None => {
                        warn!(index, count = list.len(), "named color index out of range");
                        output[..n].fill(0.0);
                    }
                }
            }
            StageKind::Identity(n) => output[..*n].copy_from_slice(&input[..*n]),
            StageKind::ClipNegatives(n) => {
                for (out, &v) in output[..*n].iter_mut().zip(&input[..*n]) {
                    *out = v.max(0.0);
                }
            }
            StageKind::XyzToLab => {
                let lab = Lab::from_xyz(Xyz::from_encoded_float(input));
                output[..3].copy_from_slice(&lab.to_encoded_float());
            }
            StageKind::LabToXyz => {
                let xyz = Lab::from_encoded_float(input).to_xyz();
                output[..3].copy_from_slice(&xyz.to_encoded_float());
            }
        }
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stage({:?}, {} -> {})",
            self.stage_type(),
            self.input_channels,
            self.output_channels
        )
    }
}
