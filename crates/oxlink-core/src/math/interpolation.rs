//! Interpolation over regular N-dimensional grids
//!
//! Tables are laid out with the first input dimension varying slowest and
//! the output channels of one node stored contiguously. Inputs are clamped
//! to [0, 1] (NaN is treated as 0).

/// Maximum channels one grid node can hold
pub const MAX_NODE_CHANNELS: usize = 128;

/// A grid table element that can be read as a normalized float
pub trait GridSample: Copy + Send + Sync {
    fn value(self) -> f32;
}

impl GridSample for u16 {
    #[inline]
    fn value(self) -> f32 {
        self as f32 / 65535.0
    }
}

impl GridSample for f32 {
    #[inline]
    fn value(self) -> f32 {
        self
    }
}

/// How three-input grids are interpolated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InterpolationMode {
    #[default]
    Tetrahedral,
    Trilinear,
}

/// Shape of a grid table
#[derive(Debug, Clone, Copy)]
pub struct GridLayout<'a> {
    /// Grid points per input dimension
    pub grid: &'a [u32],
    /// Element stride per input dimension
    pub strides: &'a [usize],
    /// Output channels per node
    pub n_out: usize,
}

#[inline]
fn clamp_unit(v: f32) -> f32 {
    // Also catches NaN
    if v.is_nan() || v < 1e-9 {
        0.0
    } else if v > 1.0 {
        1.0
    } else {
        v
    }
}

/// Cell origin, upper neighbor offset and fraction along one axis
#[inline]
fn locate(v: f32, points: u32, stride: usize) -> (usize, usize, f32) {
    let v = clamp_unit(v);
    let p = v * (points - 1) as f32;
    let cell = (p.floor() as usize).min(points as usize - 1);
    let frac = p - cell as f32;
    let next = if v >= 1.0 { 0 } else { stride };
    (cell * stride, next, frac)
}

/// Interpolate `input` through the grid into `output`
pub fn interpolate<T: GridSample>(
    table: &[T],
    layout: &GridLayout<'_>,
    mode: InterpolationMode,
    input: &[f32],
    output: &mut [f32],
) {
    let out = &mut output[..layout.n_out];
    match layout.grid.len() {
        0 => out.fill(0.0),
        1 => linear(table, layout, 0, input, out),
        2 => bilinear(table, layout, 0, input, out),
        3 => match mode {
            InterpolationMode::Tetrahedral => tetrahedral(table, layout, 0, 0, input, out),
            InterpolationMode::Trilinear => trilinear(table, layout, 0, 0, input, out),
        },
        _ => recursive(table, layout, mode, 0, 0, input, out),
    }
}

fn linear<T: GridSample>(
    table: &[T],
    layout: &GridLayout<'_>,
    base: usize,
    input: &[f32],
    out: &mut [f32],
) {
    let (x0, dx, rx) = locate(input[0], layout.grid[0], layout.strides[0]);
    let k0 = base + x0;
    for (o, v) in out.iter_mut().enumerate() {
        let y0 = table[k0 + o].value();
        let y1 = table[k0 + dx + o].value();
        *v = y0 + (y1 - y0) * rx;
    }
}

fn bilinear<T: GridSample>(
    table: &[T],
    layout: &GridLayout<'_>,
    base: usize,
    input: &[f32],
    out: &mut [f32],
) {
    let (x0, dx, rx) = locate(input[0], layout.grid[0], layout.strides[0]);
    let (y0, dy, ry) = locate(input[1], layout.grid[1], layout.strides[1]);
    let k = base + x0 + y0;
    for (o, v) in out.iter_mut().enumerate() {
        let d00 = table[k + o].value();
        let d01 = table[k + dy + o].value();
        let d10 = table[k + dx + o].value();
        let d11 = table[k + dx + dy + o].value();
        let dx0 = d00 + (d10 - d00) * rx;
        let dx1 = d01 + (d11 - d01) * rx;
        *v = dx0 + (dx1 - dx0) * ry;
    }
}

fn trilinear<T: GridSample>(
    table: &[T],
    layout: &GridLayout<'_>,
    dim: usize,
    base: usize,
    input: &[f32],
    out: &mut [f32],
) {
    let (x0, dx, rx) = locate(input[0], layout.grid[dim], layout.strides[dim]);
    let (y0, dy, ry) = locate(input[1], layout.grid[dim + 1], layout.strides[dim + 1]);
    let (z0, dz, rz) = locate(input[2], layout.grid[dim + 2], layout.strides[dim + 2]);
    let k = base + x0 + y0 + z0;
    let at = |off: usize, o: usize| table[k + off + o].value();
    for (o, v) in out.iter_mut().enumerate() {
        let c00 = at(0, o) + (at(dx, o) - at(0, o)) * rx;
        let c10 = at(dy, o) + (at(dx + dy, o) - at(dy, o)) * rx;
        let c01 = at(dz, o) + (at(dx + dz, o) - at(dz, o)) * rx;
        let c11 = at(dy + dz, o) + (at(dx + dy + dz, o) - at(dy + dz, o)) * rx;
        let c0 = c00 + (c10 - c00) * ry;
        let c1 = c01 + (c11 - c01) * ry;
        *v = c0 + (c1 - c0) * rz;
    }
}

fn tetrahedral<T: GridSample>(
    table: &[T],
    layout: &GridLayout<'_>,
    dim: usize,
    base: usize,
    input: &[f32],
    out: &mut [f32],
) {
    let (x0, x1, rx) = locate(input[0], layout.grid[dim], layout.strides[dim]);
    let (y0, y1, ry) = locate(input[1], layout.grid[dim + 1], layout.strides[dim + 1]);
    let (z0, z1, rz) = locate(input[2], layout.grid[dim + 2], layout.strides[dim + 2]);
    let k = base + x0 + y0 + z0;
    let at = |x: usize, y: usize, z: usize, o: usize| table[k + x + y + z + o].value();

    for (o, v) in out.iter_mut().enumerate() {
        let c0 = at(0, 0, 0, o);
        let (c1, c2, c3) = if rx >= ry && ry >= rz {
            (
                at(x1, 0, 0, o) - c0,
                at(x1, y1, 0, o) - at(x1, 0, 0, o),
                at(x1, y1, z1, o) - at(x1, y1, 0, o),
            )
        } else if rx >= rz && rz >= ry {
            (
                at(x1, 0, 0, o) - c0,
                at(x1, y1, z1, o) - at(x1, 0, z1, o),
                at(x1, 0, z1, o) - at(x1, 0, 0, o),
            )
        } else if rz >= rx && rx >= ry {
            (
                at(x1, 0, z1, o) - at(0, 0, z1, o),
                at(x1, y1, z1, o) - at(x1, 0, z1, o),
                at(0, 0, z1, o) - c0,
            )
        } else if ry >= rx && rx >= rz {
            (
                at(x1, y1, 0, o) - at(0, y1, 0, o),
                at(0, y1, 0, o) - c0,
                at(x1, y1, z1, o) - at(x1, y1, 0, o),
            )
        } else if ry >= rz && rz >= rx {
            (
                at(x1, y1, z1, o) - at(0, y1, z1, o),
                at(0, y1, 0, o) - c0,
                at(0, y1, z1, o) - at(0, y1, 0, o),
            )
        } else if rz >= ry && ry >= rx {
            (
                at(x1, y1, z1, o) - at(0, y1, z1, o),
                at(0, y1, z1, o) - at(0, 0, z1, o),
                at(0, 0, z1, o) - c0,
            )
        } else {
            (0.0, 0.0, 0.0)
        };
        *v = c0 + c1 * rx + c2 * ry + c3 * rz;
    }
}

/// Linear blend along the leading dimension of the two (N-1)-D sub-grids
fn recursive<T: GridSample>(
    table: &[T],
    layout: &GridLayout<'_>,
    mode: InterpolationMode,
    dim: usize,
    base: usize,
    input: &[f32],
    out: &mut [f32],
) {
    let remaining = layout.grid.len() - dim;
    if remaining == 3 {
        return match mode {
            InterpolationMode::Tetrahedral => tetrahedral(table, layout, dim, base, input, out),
            InterpolationMode::Trilinear => trilinear(table, layout, dim, base, input, out),
        };
    }

    let (x0, dx, rx) = locate(input[0], layout.grid[dim], layout.strides[dim]);
    let n = out.len();
    let mut lo = [0f32; MAX_NODE_CHANNELS];
    let mut hi = [0f32; MAX_NODE_CHANNELS];
    recursive(table, layout, mode, dim + 1, base + x0, &input[1..], &mut lo[..n]);
    recursive(table, layout, mode, dim + 1, base + x0 + dx, &input[1..], &mut hi[..n]);

    for ((v, a), b) in out.iter_mut().zip(&lo[..n]).zip(&hi[..n]) {
        *v = a + (b - a) * rx;
    }
}
