//! Parametric transfer functions
//!
//! Function types 1–5 are the ICC `parametricCurveType` functions 0–4.
//! Types 6–8 are the `multiProcessElement` segment functions 0–2.
//! A negative type evaluates the inverse of the positive one.

const DET_TOLERANCE: f64 = 0.0001;
const PLUS_INF: f64 = 1e22;

/// Largest parameter count of any supported type
pub const MAX_PARAMS: usize = 7;

/// A parametric function and its parameters (unused slots are zero)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParametricCurve {
    pub kind: i32,
    pub params: [f64; MAX_PARAMS],
}

/// Number of parameters taken by a function type, or None when unsupported
pub fn param_count(kind: i32) -> Option<usize> {
    match kind.unsigned_abs() {
        1 => Some(1),
        2 => Some(3),
        3 => Some(4),
        4 => Some(5),
        5 => Some(7),
        6 => Some(4),
        7 | 8 => Some(5),
        _ => None,
    }
}

impl ParametricCurve {
    /// Build from a type and its parameters; extra parameters are ignored
    pub fn new(kind: i32, params: &[f64]) -> Option<Self> {
        let count = param_count(kind)?;
        if params.len() < count {
            return None;
        }
        let mut p = [0.0; MAX_PARAMS];
        p[..count].copy_from_slice(&params[..count]);
        Some(Self { kind, params: p })
    }

    /// Y = X^g
    pub fn gamma(g: f64) -> Self {
        let mut params = [0.0; MAX_PARAMS];
        params[0] = g;
        Self { kind: 1, params }
    }

    /// The used parameters
    pub fn params(&self) -> &[f64] {
        let count = param_count(self.kind).unwrap_or(0);
        &self.params[..count]
    }

    /// Inverse function, when the type has one
    pub fn inverse(&self) -> Option<Self> {
        param_count(-self.kind)?;
        Some(Self {
            kind: -self.kind,
            params: self.params,
        })
    }

    pub fn eval(&self, x: f64) -> f64 {
        eval_parametric(self.kind, &self.params, x)
    }
}

/// Evaluate a parametric function. `p` must hold at least `param_count(kind)` values.
pub fn eval_parametric(kind: i32, p: &[f64], r: f64) -> f64 {
    match kind {
        // Y = X ^ Gamma
        1 => {
            if r < 0.0 {
                if (p[0] - 1.0).abs() < DET_TOLERANCE { r } else { 0.0 }
            } else {
                r.powf(p[0])
            }
        }
        -1 => {
            if r < 0.0 {
                if (p[0] - 1.0).abs() < DET_TOLERANCE { r } else { 0.0 }
            } else if p[0].abs() < DET_TOLERANCE {
                PLUS_INF
            } else {
                r.powf(1.0 / p[0])
            }
        }

        // CIE 122-1966: Y = (aX + b)^Gamma | X >= -b/a, 0 otherwise
        2 => {
            if p[1].abs() < DET_TOLERANCE {
                return 0.0;
            }
            if r >= -p[2] / p[1] {
                let e = p[1] * r + p[2];
                if e > 0.0 { e.powf(p[0]) } else { 0.0 }
            } else {
                0.0
            }
        }
        -2 => {
            if p[0].abs() < DET_TOLERANCE || p[1].abs() < DET_TOLERANCE || r < 0.0 {
                return 0.0;
            }
            ((r.powf(1.0 / p[0]) - p[2]) / p[1]).max(0.0)
        }

        // IEC 61966-3: Y = (aX + b)^Gamma + c | X >= -b/a, c otherwise
        3 => {
            if p[1].abs() < DET_TOLERANCE {
                return 0.0;
            }
            let disc = (-p[2] / p[1]).max(0.0);
            if r >= disc {
                let e = p[1] * r + p[2];
                if e > 0.0 { e.powf(p[0]) + p[3] } else { 0.0 }
            } else {
                p[3]
            }
        }
        -3 => {
            if p[0].abs() < DET_TOLERANCE || p[1].abs() < DET_TOLERANCE {
                return 0.0;
            }
            if r >= p[3] {
                let e = r - p[3];
                if e > 0.0 {
                    (e.powf(1.0 / p[0]) - p[2]) / p[1]
                } else {
                    0.0
                }
            } else {
                -p[2] / p[1]
            }
        }

        // IEC 61966-2.1 (sRGB): Y = (aX + b)^Gamma | X >= d, cX otherwise
        4 => {
            if r >= p[4] {
                let e = p[1] * r + p[2];
                if e > 0.0 { e.powf(p[0]) } else { 0.0 }
            } else {
                r * p[3]
            }
        }
        -4 => {
            let e = p[1] * p[4] + p[2];
            let disc = if e < 0.0 { 0.0 } else { e.powf(p[0]) };
            if r >= disc {
                if p[0].abs() < DET_TOLERANCE || p[1].abs() < DET_TOLERANCE {
                    0.0
                } else {
                    (r.powf(1.0 / p[0]) - p[2]) / p[1]
                }
            } else if p[3].abs() < DET_TOLERANCE {
                0.0
            } else {
                r / p[3]
            }
        }

        // Y = (aX + b)^Gamma + e | X >= d, cX + f otherwise
        5 => {
            if r >= p[4] {
                let e = p[1] * r + p[2];
                if e > 0.0 { e.powf(p[0]) + p[5] } else { p[5] }
            } else {
                r * p[3] + p[6]
            }
        }
        -5 => {
            let disc = p[3] * p[4] + p[6];
            if r >= disc {
                let e = r - p[5];
                if e < 0.0 || p[0].abs() < DET_TOLERANCE || p[1].abs() < DET_TOLERANCE {
                    0.0
                } else {
                    (e.powf(1.0 / p[0]) - p[2]) / p[1]
                }
            } else if p[3].abs() < DET_TOLERANCE {
                0.0
            } else {
                (r - p[6]) / p[3]
            }
        }

        // Segment type 0: Y = (aX + b)^Gamma + c
        6 => {
            let e = p[1] * r + p[2];
            if e < 0.0 { p[3] } else { e.powf(p[0]) + p[3] }
        }
        -6 => {
            if p[1].abs() < DET_TOLERANCE {
                return 0.0;
            }
            let e = r - p[3];
            if e < 0.0 {
                0.0
            } else {
                (e.powf(1.0 / p[0]) - p[2]) / p[1]
            }
        }

        // Segment type 1: Y = a log10(b X^Gamma + c) + d
        7 => {
            let e = p[2] * r.powf(p[0]) + p[3];
            if e <= 0.0 { p[4] } else { p[1] * e.log10() + p[4] }
        }
        -7 => {
            if p[0].abs() < DET_TOLERANCE
                || p[1].abs() < DET_TOLERANCE
                || p[2].abs() < DET_TOLERANCE
            {
                return 0.0;
            }
            ((10f64.powf((r - p[4]) / p[1]) - p[3]) / p[2]).powf(1.0 / p[0])
        }

        // Segment type 2: Y = a b^(cX + d) + e
        8 => p[0] * p[1].powf(p[2] * r + p[3]) + p[4],
        -8 => {
            let disc = r - p[4];
            if disc < 0.0 || p[0].abs() < DET_TOLERANCE || p[2].abs() < DET_TOLERANCE {
                return 0.0;
            }
            ((disc / p[0]).ln() / p[1].ln() - p[3]) / p[2]
        }

        _ => 0.0,
    }
}
