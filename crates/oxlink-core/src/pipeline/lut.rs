//! Multidimensional lookup tables (CLUT)
//!
//! Nodes are stored with the first input dimension varying slowest; every
//! node holds `n_out` contiguous values. A table is either 16-bit or float.

use tracing::trace;

use crate::error::{Error, Result};
use crate::math::{GridLayout, InterpolationMode, interpolate, quantize_grid};

/// Most input dimensions a CLUT can have
pub const MAX_INPUT_DIMENSIONS: usize = 15;

/// Most channels a stage can carry
pub const MAX_STAGE_CHANNELS: usize = 128;

/// Sample storage
#[derive(Debug, Clone, PartialEq)]
pub enum ClutTable {
    U16(Vec<u16>),
    F32(Vec<f32>),
}

/// Lookup table payload
#[derive(Debug, Clone, PartialEq)]
pub struct Clut {
    grid: Vec<u32>,
    strides: Vec<usize>,
    n_out: usize,
    table: ClutTable,
    mode: InterpolationMode,
}

/// Number of table entries for a grid, or an error on invalid or oversized grids
pub fn table_len(grid: &[u32], n_out: usize) -> Result<usize> {
    if grid.is_empty() || grid.len() > MAX_INPUT_DIMENSIONS {
        return Err(Error::ChannelCount {
            count: grid.len(),
            max: MAX_INPUT_DIMENSIONS,
        });
    }
    if n_out == 0 || n_out > MAX_STAGE_CHANNELS {
        return Err(Error::ChannelCount {
            count: n_out,
            max: MAX_STAGE_CHANNELS,
        });
    }
    let mut nodes: usize = 1;
    for &points in grid {
        if points < 2 || points == u32::MAX {
            return Err(Error::InvalidGridPoints(points));
        }
        nodes = nodes
            .checked_mul(points as usize)
            .ok_or_else(|| Error::Resource("CLUT grid size overflow".into()))?;
    }
    nodes
        .checked_mul(n_out)
        .ok_or_else(|| Error::Resource("CLUT table size overflow".into()))
}

fn strides_for(grid: &[u32], n_out: usize) -> Vec<usize> {
    let mut strides = vec![0; grid.len()];
    let mut acc = n_out;
    for (stride, &points) in strides.iter_mut().zip(grid).rev() {
        *stride = acc;
        acc *= points as usize;
    }
    strides
}

/// Grid coordinates of node `index`, first dimension slowest
fn node_coords(mut index: usize, grid: &[u32], coords: &mut [u32]) {
    for (c, &points) in coords.iter_mut().zip(grid).rev() {
        *c = (index % points as usize) as u32;
        index /= points as usize;
    }
}

impl Clut {
    /// 16-bit table; `None` allocates a zero-filled one
    pub fn new_u16(grid: &[u32], n_out: usize, table: Option<Vec<u16>>) -> Result<Self> {
        let len = table_len(grid, n_out)?;
        let table = match table {
            Some(t) if t.len() != len => {
                return Err(Error::BufferSize {
                    expected: len,
                    actual: t.len(),
                });
            }
            Some(t) => t,
            None => vec![0; len],
        };
        Ok(Self {
            grid: grid.to_vec(),
            strides: strides_for(grid, n_out),
            n_out,
            table: ClutTable::U16(table),
            mode: InterpolationMode::default(),
        })
    }

    /// Float table; `None` allocates a zero-filled one
    pub fn new_f32(grid: &[u32], n_out: usize, table: Option<Vec<f32>>) -> Result<Self> {
        let len = table_len(grid, n_out)?;
        let table = match table {
            Some(t) if t.len() != len => {
                return Err(Error::BufferSize {
                    expected: len,
                    actual: t.len(),
                });
            }
            Some(t) => t,
            None => vec![0.0; len],
        };
        Ok(Self {
            grid: grid.to_vec(),
            strides: strides_for(grid, n_out),
            n_out,
            table: ClutTable::F32(table),
            mode: InterpolationMode::default(),
        })
    }

    /// Same number of points in every dimension
    pub fn uniform_u16(n_in: usize, points: u32, n_out: usize) -> Result<Self> {
        Self::new_u16(&vec![points; n_in], n_out, None)
    }

    pub fn uniform_f32(n_in: usize, points: u32, n_out: usize) -> Result<Self> {
        Self::new_f32(&vec![points; n_in], n_out, None)
    }

    pub fn grid(&self) -> &[u32] {
        &self.grid
    }

    pub fn input_channels(&self) -> usize {
        self.grid.len()
    }

    pub fn output_channels(&self) -> usize {
        self.n_out
    }

    pub fn table(&self) -> &ClutTable {
        &self.table
    }

    pub fn is_float(&self) -> bool {
        matches!(self.table, ClutTable::F32(_))
    }

    /// Grid size when every dimension has the same number of points
    pub fn uniform_points(&self) -> Option<u32> {
        let first = *self.grid.first()?;
        self.grid.iter().all(|&g| g == first).then_some(first)
    }

    pub fn interpolation(&self) -> InterpolationMode {
        self.mode
    }

    pub fn set_interpolation(&mut self, mode: InterpolationMode) {
        self.mode = mode;
    }

    /// The table as 16-bit values, converting a float table
    pub fn table_u16(&self) -> Vec<u16> {
        match &self.table {
            ClutTable::U16(t) => t.clone(),
            ClutTable::F32(t) => t.iter().map(|&v| crate::math::f32_to_u16(v)).collect(),
        }
    }

    /// The table as floats, converting a 16-bit table
    pub fn table_f32(&self) -> Vec<f32> {
        match &self.table {
            ClutTable::U16(t) => t.iter().map(|&v| v as f32 / 65535.0).collect(),
            ClutTable::F32(t) => t.clone(),
        }
    }

    pub fn eval_f32(&self, input: &[f32], output: &mut [f32]) {
        let layout = GridLayout {
            grid: &self.grid,
            strides: &self.strides,
            n_out: self.n_out,
        };
        match &self.table {
            ClutTable::U16(t) => interpolate(t, &layout, self.mode, input, output),
            ClutTable::F32(t) => interpolate(t, &layout, self.mode, input, output),
        }
    }

    /// Visit every node with its 16-bit grid coordinates.
    ///
    /// The sampler sees the current node values in `out`; unless
    /// `inspect_only` is set, whatever it leaves there is stored back.
    /// A float table is written through 16-bit quantization.
    pub fn sample_16<F>(&mut self, inspect_only: bool, mut sampler: F) -> Result<()>
    where
        F: FnMut(&[u16], &mut [u16]) -> Result<()>,
    {
        let n_in = self.grid.len();
        let nodes = table_len(&self.grid, 1)?;
        trace!(nodes, n_in, n_out = self.n_out, "sampling 16-bit CLUT");

        let mut coords = [0u32; MAX_INPUT_DIMENSIONS];
        let mut input = [0u16; MAX_INPUT_DIMENSIONS];
        let mut out = vec![0u16; self.n_out];
        for node in 0..nodes {
            node_coords(node, &self.grid, &mut coords[..n_in]);
            for ((v, &c), &points) in input.iter_mut().zip(&coords[..n_in]).zip(&self.grid) {
                *v = quantize_grid(c, points);
            }
            let base = node * self.n_out;
            match &self.table {
                ClutTable::U16(t) => out.copy_from_slice(&t[base..base + self.n_out]),
                ClutTable::F32(t) => {
                    for (o, &v) in out.iter_mut().zip(&t[base..base + self.n_out]) {
                        *o = crate::math::f32_to_u16(v);
                    }
                }
            }
            sampler(&input[..n_in], &mut out)?;
            if !inspect_only {
                match &mut self.table {
                    ClutTable::U16(t) => t[base..base + self.n_out].copy_from_slice(&out),
                    ClutTable::F32(t) => {
                        for (dst, &v) in t[base..base + self.n_out].iter_mut().zip(&out) {
                            *dst = v as f32 / 65535.0;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Float counterpart of [`sample_16`](Self::sample_16)
    pub fn sample_f32<F>(&mut self, inspect_only: bool, mut sampler: F) -> Result<()>
    where
        F: FnMut(&[f32], &mut [f32]) -> Result<()>,
    {
        let n_in = self.grid.len();
        let nodes = table_len(&self.grid, 1)?;
        trace!(nodes, n_in, n_out = self.n_out, "sampling float CLUT");

        let mut coords = [0u32; MAX_INPUT_DIMENSIONS];
        let mut input = [0f32; MAX_INPUT_DIMENSIONS];
        let mut out = vec![0f32; self.n_out];
        for node in 0..nodes {
            node_coords(node, &self.grid, &mut coords[..n_in]);
            for ((v, &c), &points) in input.iter_mut().zip(&coords[..n_in]).zip(&self.grid) {
                *v = quantize_grid(c, points) as f32 / 65535.0;
            }
            let base = node * self.n_out;
            match &self.table {
                ClutTable::U16(t) => {
                    for (o, &v) in out.iter_mut().zip(&t[base..base + self.n_out]) {
                        *o = v as f32 / 65535.0;
                    }
                }
                ClutTable::F32(t) => out.copy_from_slice(&t[base..base + self.n_out]),
            }
            sampler(&input[..n_in], &mut out)?;
            if !inspect_only {
                match &mut self.table {
                    ClutTable::U16(t) => {
                        for (dst, &v) in t[base..base + self.n_out].iter_mut().zip(&out) {
                            *dst = crate::math::f32_to_u16(v);
                        }
                    }
                    ClutTable::F32(t) => t[base..base + self.n_out].copy_from_slice(&out),
                }
            }
        }
        Ok(())
    }
}

/// Walk every node of an arbitrary grid without a backing table
pub fn slice_space_16<F>(grid: &[u32], mut visit: F) -> Result<()>
where
    F: FnMut(&[u16]) -> Result<()>,
{
    let n_in = grid.len();
    let nodes = table_len(grid, 1)?;
    let mut coords = [0u32; MAX_INPUT_DIMENSIONS];
    let mut input = [0u16; MAX_INPUT_DIMENSIONS];
    for node in 0..nodes {
        node_coords(node, grid, &mut coords[..n_in]);
        for ((v, &c), &points) in input.iter_mut().zip(&coords[..n_in]).zip(grid) {
            *v = quantize_grid(c, points);
        }
        visit(&input[..n_in])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_of_one_rejected() {
        assert_eq!(
            Clut::new_u16(&[1, 2, 2], 3, None),
            Err(Error::InvalidGridPoints(1))
        );
        assert_eq!(Clut::uniform_f32(3, 0, 3), Err(Error::InvalidGridPoints(0)));
    }

    #[test]
    fn test_channel_limits() {
        assert!(matches!(
            Clut::new_u16(&[2; 16], 1, None),
            Err(Error::ChannelCount { count: 16, .. })
        ));
        assert!(matches!(
            Clut::uniform_u16(3, 2, 0),
            Err(Error::ChannelCount { count: 0, .. })
        ));
    }

    #[test]
    fn test_size_overflow_is_resource_error() {
        let grid = [255u32; 15];
        assert!(matches!(table_len(&grid, 128), Err(Error::Resource(_))));
    }

    #[test]
    fn test_table_length_checked() {
        assert!(matches!(
            Clut::new_u16(&[2, 2], 1, Some(vec![0; 3])),
            Err(Error::BufferSize { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_sample_identity_then_eval() {
        let mut clut = Clut::uniform_u16(3, 9, 3).unwrap();
        clut.sample_16(false, |input, out| {
            out.copy_from_slice(input);
            Ok(())
        })
        .unwrap();
        let mut out = [0.0; 3];
        clut.eval_f32(&[0.2, 0.4, 0.6], &mut out);
        assert!((out[0] - 0.2).abs() < 1e-4);
        assert!((out[1] - 0.4).abs() < 1e-4);
        assert!((out[2] - 0.6).abs() < 1e-4);
    }

    #[test]
    fn test_first_dimension_slowest() {
        let mut clut = Clut::new_u16(&[2, 3], 1, None).unwrap();
        let mut seen = Vec::new();
        clut.sample_16(true, |input, _| {
            seen.push(input.to_vec());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen[0], [0, 0]);
        assert_eq!(seen[1], [0, 32768]);
        assert_eq!(seen[3], [65535, 0]);
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn test_inspect_only_leaves_table() {
        let mut clut = Clut::uniform_u16(2, 2, 1).unwrap();
        clut.sample_16(true, |_, out| {
            out[0] = 7;
            Ok(())
        })
        .unwrap();
        assert_eq!(clut.table_u16(), vec![0; 4]);
    }

    #[test]
    fn test_sampler_error_propagates() {
        let mut clut = Clut::uniform_f32(1, 4, 1).unwrap();
        let result = clut.sample_f32(false, |_, _| Err(Error::Range("stop".into())));
        assert_eq!(result, Err(Error::Range("stop".into())));
    }

    #[test]
    fn test_slice_space() {
        let mut count = 0;
        slice_space_16(&[6, 74, 74], |_| {
            count += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(count, 6 * 74 * 74);
    }
}
