//! One-dimensional tone curves
//!
//! A curve is either a plain 16-bit table, or an ordered list of segments
//! covering the real line, each parametric or sampled. Segmented curves also
//! carry a 16-bit table so the fixed-point path never evaluates them directly.

use crate::error::{Error, Result};
use crate::math::{ParametricCurve, quick_saturate_word};

/// Breakpoint used for the open ends of a segmented curve
pub const MINUS_INF: f32 = -1e22;
pub const PLUS_INF: f32 = 1e22;

const TABLE_POINTS: usize = 4096;

/// What a segment evaluates
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentKind {
    Parametric(ParametricCurve),
    /// Values spread evenly over `(x0, x1]`, first value at `x0`
    Sampled(Vec<f32>),
}

/// Piece of a segmented curve, active on `(x0, x1]`
#[derive(Debug, Clone, PartialEq)]
pub struct CurveSegment {
    pub x0: f32,
    pub x1: f32,
    pub kind: SegmentKind,
}

impl CurveSegment {
    fn eval(&self, r: f64) -> f64 {
        match &self.kind {
            SegmentKind::Parametric(p) => p.eval(r),
            SegmentKind::Sampled(points) => {
                let t = (r - self.x0 as f64) / (self.x1 as f64 - self.x0 as f64);
                lerp_table_f32(points, t)
            }
        }
    }
}

fn lerp_table_f32(points: &[f32], t: f64) -> f64 {
    match points.len() {
        0 => 0.0,
        1 => points[0] as f64,
        n => {
            let t = t.clamp(0.0, 1.0);
            let pos = t * (n - 1) as f64;
            let i = (pos.floor() as usize).min(n - 2);
            let rest = pos - i as f64;
            let y0 = points[i] as f64;
            let y1 = points[i + 1] as f64;
            y0 + (y1 - y0) * rest
        }
    }
}

/// A tone curve
#[derive(Debug, Clone, PartialEq)]
pub struct ToneCurve {
    segments: Vec<CurveSegment>,
    table16: Vec<u16>,
}

impl ToneCurve {
    /// Curve defined by a 16-bit table of at least two entries
    pub fn from_table16(table: Vec<u16>) -> Result<Self> {
        if table.len() < 2 {
            return Err(Error::Range(format!(
                "tabulated curve needs 2 or more entries, got {}",
                table.len()
            )));
        }
        Ok(Self {
            segments: Vec::new(),
            table16: table,
        })
    }

    /// Two-point identity table
    pub fn identity() -> Self {
        Self {
            segments: Vec::new(),
            table16: vec![0, 0xffff],
        }
    }

    /// Y = X^g over the whole real line
    pub fn gamma(g: f64) -> Self {
        Self::single_parametric(ParametricCurve::gamma(g))
    }

    /// Single parametric segment of the given type
    pub fn parametric(kind: i32, params: &[f64]) -> Result<Self> {
        let curve = ParametricCurve::new(kind, params).ok_or_else(|| {
            Error::Range(format!(
                "parametric type {kind} with {} parameters",
                params.len()
            ))
        })?;
        Ok(Self::single_parametric(curve))
    }

    fn single_parametric(curve: ParametricCurve) -> Self {
        let segments = vec![CurveSegment {
            x0: MINUS_INF,
            x1: PLUS_INF,
            kind: SegmentKind::Parametric(curve),
        }];
        let points = if curve.kind == 1 && (curve.params[0] - 1.0).abs() < 0.001 {
            2
        } else {
            TABLE_POINTS
        };
        Self::from_segments_with_points(segments, points)
    }

    /// Curve built from explicit segments
    pub fn segmented(segments: Vec<CurveSegment>) -> Result<Self> {
        if segments.is_empty() {
            return Err(Error::Range("segmented curve without segments".into()));
        }
        let short_sampled = segments
            .iter()
            .any(|s| matches!(&s.kind, SegmentKind::Sampled(points) if points.len() < 2));
        if short_sampled {
            return Err(Error::Range("sampled segment needs 2 or more points".into()));
        }
        Ok(Self::from_segments_with_points(segments, TABLE_POINTS))
    }

    /// Curve through evenly spaced float samples, held constant outside [0, 1]
    pub fn from_float_table(values: &[f32]) -> Result<Self> {
        let (first, last) = match values {
            [first, .., last] => (*first, *last),
            _ => return Err(Error::Range("float table needs 2 or more samples".into())),
        };
        let constant = |c: f32| {
            SegmentKind::Parametric(ParametricCurve {
                kind: 6,
                params: [1.0, 0.0, 0.0, c as f64, 0.0, 0.0, 0.0],
            })
        };
        Self::segmented(vec![
            CurveSegment {
                x0: MINUS_INF,
                x1: 0.0,
                kind: constant(first),
            },
            CurveSegment {
                x0: 0.0,
                x1: 1.0,
                kind: SegmentKind::Sampled(values.to_vec()),
            },
            CurveSegment {
                x0: 1.0,
                x1: PLUS_INF,
                kind: constant(last),
            },
        ])
    }

    fn from_segments_with_points(segments: Vec<CurveSegment>, points: usize) -> Self {
        let mut curve = Self {
            segments,
            table16: Vec::new(),
        };
        curve.table16 = (0..points)
            .map(|i| {
                let x = i as f64 / (points - 1) as f64;
                quick_saturate_word(curve.eval_segments(x) * 65535.0)
            })
            .collect();
        curve
    }

    pub fn segments(&self) -> &[CurveSegment] {
        &self.segments
    }

    pub fn table16(&self) -> &[u16] {
        &self.table16
    }

    /// The parametric function when the curve is exactly one parametric segment
    pub fn as_parametric(&self) -> Option<&ParametricCurve> {
        match self.segments.as_slice() {
            [
                CurveSegment {
                    kind: SegmentKind::Parametric(p),
                    ..
                },
            ] => Some(p),
            _ => None,
        }
    }

    fn eval_segments(&self, r: f64) -> f64 {
        for seg in self.segments.iter().rev() {
            if r > seg.x0 as f64 && r <= seg.x1 as f64 {
                let out = seg.eval(r);
                return if out.is_infinite() {
                    PLUS_INF as f64
                } else {
                    out
                };
            }
        }
        MINUS_INF as f64
    }

    pub fn eval_f64(&self, v: f64) -> f64 {
        if self.segments.is_empty() {
            let n = self.table16.len();
            let pos = v.clamp(0.0, 1.0) * (n - 1) as f64;
            let i = (pos.floor() as usize).min(n - 2);
            let rest = pos - i as f64;
            let y0 = self.table16[i] as f64;
            let y1 = self.table16[i + 1] as f64;
            (y0 + (y1 - y0) * rest) / 65535.0
        } else {
            self.eval_segments(v)
        }
    }

    pub fn eval_f32(&self, v: f32) -> f32 {
        self.eval_f64(v as f64) as f32
    }

    pub fn eval_u16(&self, v: u16) -> u16 {
        let n = self.table16.len();
        if v == 0xffff {
            return self.table16[n - 1];
        }
        let pos = (n - 1) as f64 * (v as f64 / 65535.0);
        let i = pos.floor() as usize;
        let rest = pos - i as f64;
        let y0 = self.table16[i] as f64;
        let y1 = self.table16[(i + 1).min(n - 1)] as f64;
        quick_saturate_word(y0 + (y1 - y0) * rest)
    }

    pub fn is_descending(&self) -> bool {
        self.table16[0] > self.table16[self.table16.len() - 1]
    }

    /// Monotonic within two 16-bit steps of noise
    pub fn is_monotonic(&self) -> bool {
        let t = &self.table16;
        let step_ok = |a: u16, b: u16| (a as i32 - b as i32) <= 2;
        if self.is_descending() {
            t.windows(2).all(|w| step_ok(w[1], w[0]))
        } else {
            t.windows(2).all(|w| step_ok(w[0], w[1]))
        }
    }

    /// Within one 16-bit step of the identity
    pub fn is_linear(&self) -> bool {
        let n = self.table16.len();
        self.table16.iter().enumerate().all(|(i, &v)| {
            let expected = quick_saturate_word(i as f64 * 65535.0 / (n - 1) as f64);
            (v as i32 - expected as i32).abs() <= 1
        })
    }

    /// Average exponent of a pure power law fitted to the curve, or None
    /// if the fit spread exceeds `precision`
    pub fn estimate_gamma(&self, precision: f64) -> Option<f64> {
        let n = self.table16.len();
        let (mut sum, mut sum2, mut count) = (0.0, 0.0, 0.0);
        for (i, &v) in self.table16.iter().enumerate().take(n - 1).skip(1) {
            let x = i as f64 / (n - 1) as f64;
            let y = v as f64 / 65535.0;
            if x > 0.07 && x < 0.93 && y > 0.0 {
                let g = y.ln() / x.ln();
                sum += g;
                sum2 += g * g;
                count += 1.0;
            }
        }
        if count == 0.0 {
            return None;
        }
        let std = ((count * sum2 - sum * sum) / (count * (count - 1.0))).abs().sqrt();
        (std <= precision).then_some(sum / count)
    }

    /// Inverse curve with 4096 entries
    pub fn reverse(&self) -> Self {
        self.reverse_with(TABLE_POINTS)
    }

    /// Inverse curve. Single invertible parametric curves stay analytic.
    pub fn reverse_with(&self, points: usize) -> Self {
        if let Some(inv) = self.as_parametric().and_then(|p| p.inverse()) {
            return Self::single_parametric(inv);
        }

        let points = points.max(2);
        let table = &self.table16;
        let n = table.len();
        let ascending = !self.is_descending();
        let out = (0..points)
            .map(|i| {
                let y = i as f64 * 65535.0 / (points - 1) as f64;
                let Some(j) = find_interval(y, table) else {
                    return 0;
                };
                let x1 = table[j] as f64;
                let x2 = table[j + 1] as f64;
                let y1 = j as f64 * 65535.0 / (n - 1) as f64;
                let y2 = (j + 1) as f64 * 65535.0 / (n - 1) as f64;
                if x1 == x2 {
                    return quick_saturate_word(if ascending { y2 } else { y1 });
                }
                let a = (y2 - y1) / (x2 - x1);
                let b = y2 - a * x2;
                quick_saturate_word(a * y + b)
            })
            .collect();

        Self {
            segments: Vec::new(),
            table16: out,
        }
    }

    /// `y⁻¹(x(t))` sampled at `points` positions
    pub fn join(x: &ToneCurve, y: &ToneCurve, points: usize) -> Result<Self> {
        let y_rev = y.reverse_with(points);
        let values: Vec<f32> = (0..points)
            .map(|i| {
                let t = i as f32 / (points - 1) as f32;
                y_rev.eval_f32(x.eval_f32(t))
            })
            .collect();
        Self::from_float_table(&values)
    }
}

/// Table interval containing `v`, searched from the end for ascending tables
fn find_interval(v: f64, table: &[u16]) -> Option<usize> {
    let n = table.len();
    if n < 2 {
        return None;
    }
    let contains = |i: usize| {
        let y0 = table[i] as f64;
        let y1 = table[i + 1] as f64;
        if y0 <= y1 {
            v >= y0 && v <= y1
        } else {
            v >= y1 && v <= y0
        }
    };
    if table[0] < table[n - 1] {
        (0..n - 1).rev().find(|&i| contains(i))
    } else {
        (0..n - 1).find(|&i| contains(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let c = ToneCurve::identity();
        assert_eq!(c.eval_u16(0x1234), 0x1234);
        assert!((c.eval_f32(0.3) - 0.3).abs() < 1e-6);
        assert!(c.is_linear());
    }

    #[test]
    fn test_gamma_one_uses_short_table() {
        assert_eq!(ToneCurve::gamma(1.0).table16().len(), 2);
        assert_eq!(ToneCurve::gamma(2.2).table16().len(), 4096);
    }

    #[test]
    fn test_gamma_eval_paths_agree() {
        let c = ToneCurve::gamma(2.2);
        let f = c.eval_f32(0.5);
        let v = c.eval_u16(32768) as f32 / 65535.0;
        assert!((f - 0.5f32.powf(2.2)).abs() < 1e-6);
        assert!((f - v).abs() < 2.0 / 65535.0);
    }

    #[test]
    fn test_parametric_reverse_is_analytic() {
        let c = ToneCurve::gamma(2.2);
        let r = c.reverse();
        assert_eq!(r.as_parametric().map(|p| p.kind), Some(-1));
        assert!((r.eval_f32(c.eval_f32(0.4)) - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_table_reverse() {
        let table: Vec<u16> = (0..256)
            .map(|i| quick_saturate_word(((i as f64) / 255.0).powf(2.0) * 65535.0))
            .collect();
        let c = ToneCurve::from_table16(table).unwrap();
        let r = c.reverse();
        assert!(r.is_monotonic());
        let back = r.eval_f32(c.eval_f32(0.6));
        assert!((back - 0.6).abs() < 2e-3, "{back}");
    }

    #[test]
    fn test_descending_reverse() {
        let c = ToneCurve::from_table16(vec![0xffff, 0x8000, 0]).unwrap();
        assert!(c.is_descending());
        assert!(c.is_monotonic());
        let r = c.reverse();
        assert!((r.eval_f32(0.25) - 0.75).abs() < 1e-3);
    }

    #[test]
    fn test_non_monotonic_detected() {
        let c = ToneCurve::from_table16(vec![0, 40000, 20000, 65535]).unwrap();
        assert!(!c.is_monotonic());
    }

    #[test]
    fn test_float_table_constant_outside_domain() {
        let c = ToneCurve::from_float_table(&[0.2, 0.5, 0.9]).unwrap();
        assert!((c.eval_f32(-3.0) - 0.2).abs() < 1e-6);
        assert!((c.eval_f32(5.0) - 0.9).abs() < 1e-6);
        assert!((c.eval_f32(0.25) - 0.35).abs() < 1e-6);
        assert_eq!(c.segments().len(), 3);
    }

    #[test]
    fn test_join_inverts_second_curve() {
        let x = ToneCurve::gamma(2.2);
        let joined = ToneCurve::join(&x, &x, 256).unwrap();
        for t in [0.1f32, 0.5, 0.9] {
            assert!((joined.eval_f32(t) - t).abs() < 1e-3);
        }
    }

    #[test]
    fn test_estimate_gamma() {
        let c = ToneCurve::gamma(1.8);
        let g = c.estimate_gamma(0.01).unwrap();
        assert!((g - 1.8).abs() < 0.01);
    }

    #[test]
    fn test_rejects_short_tables() {
        assert!(ToneCurve::from_table16(vec![1]).is_err());
        assert!(ToneCurve::from_float_table(&[0.5]).is_err());
        assert!(ToneCurve::parametric(4, &[2.4]).is_err());
    }
}
